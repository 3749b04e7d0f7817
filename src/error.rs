//! Error codes and Result alias for RustEB (error.c translation).

use std::fmt;

/// Error conditions reported by the search engine and the appendix layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// eb_error_message: "current subbook is not set"
    NoCurrentSubbook,
    /// "current appendix subbook is not set"
    NoCurrentAppendixSubbook,
    /// "current font is not set"
    NoCurrentFont,
    /// "no such character text"
    NoSuchCharText,
    /// "failed to seek the text file"
    FailSeekText,
    /// "failed to read the text file"
    FailReadText,
    /// "failed to seek the appendix file"
    FailSeekAppendix,
    /// "failed to read the appendix file"
    FailReadAppendix,
    /// "unexpected format in the text file"
    UnexpectedText,
    /// "no previous search"
    NoPreviousSearch,
    /// "no such search method"
    NoSuchSearch,
    /// "no such multi search"
    NoSuchMulti,
    /// "no such multi search entry"
    NoSuchEntry,
    /// "no word specified"
    NoWord,
    /// "word is too long"
    TooLongWord,
    /// "too many words specified"
    TooManyWords,
    /// "internal error"
    Internal,
}

impl ErrorCode {
    /// eb_error_message
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::NoCurrentSubbook => "current subbook is not set",
            ErrorCode::NoCurrentAppendixSubbook => "current appendix subbook is not set",
            ErrorCode::NoCurrentFont => "current font is not set",
            ErrorCode::NoSuchCharText => "no such character text",
            ErrorCode::FailSeekText => "failed to seek the text file",
            ErrorCode::FailReadText => "failed to read the text file",
            ErrorCode::FailSeekAppendix => "failed to seek the appendix file",
            ErrorCode::FailReadAppendix => "failed to read the appendix file",
            ErrorCode::UnexpectedText => "unexpected format in the text file",
            ErrorCode::NoPreviousSearch => "no previous search",
            ErrorCode::NoSuchSearch => "no such search method",
            ErrorCode::NoSuchMulti => "no such multi search",
            ErrorCode::NoSuchEntry => "no such multi search entry",
            ErrorCode::NoWord => "no word specified",
            ErrorCode::TooLongWord => "word is too long",
            ErrorCode::TooManyWords => "too many words specified",
            ErrorCode::Internal => "internal error",
        }
    }
}

/// Error type carrying an [`ErrorCode`] and an optional detail message.
#[derive(Debug, Clone)]
pub struct Error {
    code: ErrorCode,
    message: Option<String>,
}

impl Error {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            message: None,
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{}: {}", self.code.message(), message),
            None => f.write_str(self.code.message()),
        }
    }
}

impl std::error::Error for Error {}

/// Result type alias for RustEB operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_detail() {
        let err = Error::with_message(ErrorCode::FailSeekText, "page 12");
        assert_eq!(err.to_string(), "failed to seek the text file: page 12");
        assert_eq!(err.code(), ErrorCode::FailSeekText);
    }

    #[test]
    fn test_error_message_table() {
        assert_eq!(
            ErrorCode::UnexpectedText.message(),
            "unexpected format in the text file"
        );
        assert_eq!(ErrorCode::NoPreviousSearch.message(), "no previous search");
    }
}
