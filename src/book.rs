//! Book and subbook state owned by the search engine.
//!
//! Opening a dictionary from disk (catalog parsing, subbook metadata,
//! decompression setup) happens outside this crate; a caller builds a
//! [`Subbook`] from a page stream plus the index root pages and
//! installs it here.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use crate::compare::{ExactWord, WordComparator};
use crate::storage::cache::page_cache;
use crate::storage::stream::BlockSource;
use crate::text::TextCursor;
use crate::types::{
    BookCode, EntryArrangement, Location, PageId, Pgno, SearchCode, NUMBER_OF_SEARCH_CONTEXTS,
};

static NEXT_BOOK_CODE: AtomicI32 = AtomicI32::new(0);

/// Root pages of the indexes a subbook provides. A `None` root means
/// the subbook does not support that search kind.
#[derive(Debug, Default)]
pub struct SearchIndexes {
    /// Exact-word index
    pub word_exact: Option<Pgno>,
    /// Forward-word index
    pub word: Option<Pgno>,
    /// Endword index (keys stored reversed)
    pub endword: Option<Pgno>,
    /// Keyword index
    pub keyword: Option<Pgno>,
    /// Multi searches, each with one index root per entry field
    pub multi: Vec<MultiSearch>,
}

/// One multi search: an index root per entry field.
#[derive(Debug, Default)]
pub struct MultiSearch {
    pub entries: Vec<Pgno>,
}

/// The currently selected subbook of a book.
pub struct Subbook {
    /// Text stream, also holding the index pages
    pub text: Box<dyn BlockSource>,
    /// Heading cursor over the text stream, used by keyword searches
    pub cursor: Box<dyn TextCursor>,
    pub indexes: SearchIndexes,
}

/// Cursor state of one sub-query through an index.
#[derive(Clone)]
pub(crate) struct SearchContext {
    pub code: SearchCode,
    pub word: Vec<u8>,
    pub canonicalized_word: Vec<u8>,
    pub compare: Arc<dyn WordComparator>,
    /// Page currently being traversed
    pub page: Pgno,
    pub page_id: PageId,
    pub entry_arrangement: EntryArrangement,
    /// Fixed entry length, or length of the current variable entry
    pub entry_length: usize,
    pub entry_count: usize,
    pub entry_index: usize,
    /// Byte offset of the next entry within the page
    pub offset: usize,
    /// Last comparator result; negative once the walk is exhausted
    pub comparison_result: i32,
    pub in_group_entry: bool,
    /// Saved heading position for resuming a keyword group walk
    pub keyword_heading: Location,
}

impl SearchContext {
    pub fn new() -> Self {
        Self {
            code: SearchCode::None,
            word: Vec::new(),
            canonicalized_word: Vec::new(),
            compare: Arc::new(ExactWord),
            page: 0,
            page_id: PageId::empty(),
            entry_arrangement: EntryArrangement::Fixed,
            entry_length: 0,
            entry_count: 0,
            entry_index: 0,
            offset: 0,
            comparison_result: 0,
            in_group_entry: false,
            keyword_heading: Location::default(),
        }
    }
}

impl Default for SearchContext {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct BookState {
    pub subbook: Option<Subbook>,
    pub contexts: [SearchContext; NUMBER_OF_SEARCH_CONTEXTS],
}

/// An opened dictionary title.
///
/// All public operations lock the process-wide page cache first and
/// the book state second, so books may be shared freely between
/// threads.
pub struct Book {
    code: BookCode,
    pub(crate) state: Mutex<BookState>,
}

impl Book {
    pub fn new() -> Self {
        Self {
            code: NEXT_BOOK_CODE.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(BookState {
                subbook: None,
                contexts: std::array::from_fn(|_| SearchContext::new()),
            }),
        }
    }

    /// Identity of this book, used to tag cached pages.
    pub fn code(&self) -> BookCode {
        self.code
    }

    /// eb_set_subbook
    ///
    /// Installs `subbook` as the current one, drops any submitted
    /// search and this book's cached page.
    pub fn set_subbook(&self, subbook: Subbook) {
        let mut cache = page_cache().lock().expect("page cache mutex poisoned");
        let mut state = self.state.lock().expect("book mutex poisoned");
        cache.invalidate_book(self.code);
        for context in state.contexts.iter_mut() {
            *context = SearchContext::new();
        }
        state.subbook = Some(subbook);
    }

    /// eb_unset_subbook
    pub fn unset_subbook(&self) {
        let mut cache = page_cache().lock().expect("page cache mutex poisoned");
        let mut state = self.state.lock().expect("book mutex poisoned");
        cache.invalidate_book(self.code);
        for context in state.contexts.iter_mut() {
            *context = SearchContext::new();
        }
        state.subbook = None;
    }
}

impl Default for Book {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::NullTextCursor;
    use std::io::Cursor;

    fn empty_subbook() -> Subbook {
        Subbook {
            text: Box::new(Cursor::new(Vec::new())),
            cursor: Box::new(NullTextCursor),
            indexes: SearchIndexes::default(),
        }
    }

    #[test]
    fn test_book_codes_are_distinct() {
        let a = Book::new();
        let b = Book::new();
        assert_ne!(a.code(), b.code());
    }

    #[test]
    fn test_set_subbook_resets_contexts() {
        let book = Book::new();
        {
            let mut state = book.state.lock().unwrap();
            state.contexts[0].code = SearchCode::Word;
        }
        book.set_subbook(empty_subbook());
        let state = book.state.lock().unwrap();
        assert_eq!(state.contexts[0].code, SearchCode::None);
        assert!(state.subbook.is_some());
    }

    #[test]
    fn test_unset_subbook_clears_current() {
        let book = Book::new();
        book.set_subbook(empty_subbook());
        book.unset_subbook();
        assert!(book.state.lock().unwrap().subbook.is_none());
    }
}
