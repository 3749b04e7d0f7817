//! Single-slot cache for the index page being searched.
//!
//! The search engine walks index pages monotonically, so one slot is
//! enough to spare re-reads while a hit-list call advances through a
//! leaf. The slot is shared by every book in the process; a search on
//! another book simply displaces it, and walkers re-check the tag
//! before each use.

use std::sync::Mutex;

use crate::error::{Error, ErrorCode, Result};
use crate::storage::stream::{page_offset, read_full, BlockSource};
use crate::types::{BookCode, Pgno, BOOK_NONE, SIZE_PAGE};

/// One cached index page, tagged with the book it came from.
pub struct PageCache {
    book_code: BookCode,
    page: Pgno,
    buffer: [u8; SIZE_PAGE],
}

impl PageCache {
    pub fn new() -> Self {
        Self {
            book_code: BOOK_NONE,
            page: 0,
            buffer: [0; SIZE_PAGE],
        }
    }

    /// Whether the slot currently holds `page` of `book_code`.
    pub fn holds(&self, book_code: BookCode, page: Pgno) -> bool {
        self.book_code == book_code && self.page == page
    }

    /// Mark the slot empty.
    pub fn invalidate(&mut self) {
        self.book_code = BOOK_NONE;
    }

    /// Mark the slot empty if it belongs to `book_code`.
    pub fn invalidate_book(&mut self, book_code: BookCode) {
        if self.book_code == book_code {
            self.book_code = BOOK_NONE;
        }
    }

    pub fn buffer(&self) -> &[u8; SIZE_PAGE] {
        &self.buffer
    }

    /// Fill the slot with `page` of `book_code` from `source`.
    ///
    /// A failed seek leaves the previous contents tagged valid (the
    /// buffer was not touched). The tag is cleared before the buffer
    /// is overwritten, so a failed or short read leaves the slot
    /// empty.
    pub fn load(
        &mut self,
        source: &mut dyn BlockSource,
        book_code: BookCode,
        page: Pgno,
    ) -> Result<()> {
        source
            .seek(page_offset(page))
            .map_err(|_| Error::new(ErrorCode::FailSeekText))?;
        self.book_code = BOOK_NONE;
        let n = read_full(source, &mut self.buffer)
            .map_err(|_| Error::new(ErrorCode::FailReadText))?;
        if n != SIZE_PAGE {
            return Err(Error::new(ErrorCode::FailReadText));
        }
        self.book_code = book_code;
        self.page = page;
        Ok(())
    }
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new()
    }
}

// Process-wide cache slot, locked before any book state.
lazy_static::lazy_static! {
    static ref PAGE_CACHE: Mutex<PageCache> = Mutex::new(PageCache::new());
}

/// The process-wide cache slot used by the public search entry points.
pub(crate) fn page_cache() -> &'static Mutex<PageCache> {
    &PAGE_CACHE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn two_page_stream() -> Cursor<Vec<u8>> {
        let mut data = vec![0xaau8; SIZE_PAGE];
        data.extend(std::iter::repeat(0xbb).take(SIZE_PAGE));
        Cursor::new(data)
    }

    #[test]
    fn test_load_tags_and_fills_the_slot() {
        let mut cache = PageCache::new();
        let mut source = two_page_stream();
        cache.load(&mut source, 7, 2).unwrap();
        assert!(cache.holds(7, 2));
        assert!(!cache.holds(7, 1));
        assert!(!cache.holds(8, 2));
        assert_eq!(cache.buffer()[0], 0xbb);
    }

    #[test]
    fn test_short_read_invalidates_the_slot() {
        let mut cache = PageCache::new();
        let mut source = two_page_stream();
        cache.load(&mut source, 7, 1).unwrap();

        // Page 3 does not exist; the stale tag must not survive.
        let err = cache.load(&mut source, 7, 3).unwrap_err();
        assert_eq!(err.code(), ErrorCode::FailReadText);
        assert!(!cache.holds(7, 1));
        assert!(!cache.holds(7, 3));
    }

    #[test]
    fn test_invalidate_book_leaves_other_books_alone() {
        let mut cache = PageCache::new();
        let mut source = two_page_stream();
        cache.load(&mut source, 7, 1).unwrap();
        cache.invalidate_book(8);
        assert!(cache.holds(7, 1));
        cache.invalidate_book(7);
        assert!(!cache.holds(7, 1));
    }
}
