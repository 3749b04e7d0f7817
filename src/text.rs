//! Heading cursor consumed by the keyword search.
//!
//! Keyword indexes store group elements without per-element heading
//! locations; the walker instead streams headings from the text layer,
//! one `forward_heading` step per group element. Text parsing itself
//! lives outside this crate, behind this trait.

use crate::error::Result;
use crate::types::Location;

/// Cursor over the subbook's heading stream.
pub trait TextCursor: Send {
    /// Position the cursor on `location`.
    fn seek_text(&mut self, location: Location) -> Result<()>;

    /// Current position of the cursor.
    fn tell_text(&mut self) -> Result<Location>;

    /// Advance to the start of the next heading.
    fn forward_heading(&mut self) -> Result<()>;
}

/// Cursor for subbooks whose leaves always carry explicit heading
/// locations. Seeking is accepted and ignored; any attempt to stream
/// headings is a format error.
#[derive(Debug, Default)]
pub struct NullTextCursor;

impl TextCursor for NullTextCursor {
    fn seek_text(&mut self, _location: Location) -> Result<()> {
        Ok(())
    }

    fn tell_text(&mut self) -> Result<Location> {
        Err(crate::error::Error::new(
            crate::error::ErrorCode::UnexpectedText,
        ))
    }

    fn forward_heading(&mut self) -> Result<()> {
        Err(crate::error::Error::new(
            crate::error::ErrorCode::UnexpectedText,
        ))
    }
}
