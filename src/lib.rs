//! RustEB - EB/EPWING electronic dictionary engine rewritten in Rust
//!
//! The crate covers the indexed search core (B+tree-style descent over
//! fixed 2 KiB pages, leaf entry decoding, AND-merge for compound
//! queries) and the narrow-font alternation tables of an appendix.
//! Dictionary discovery, subbook catalog parsing, text rendering and
//! character-set conversion live outside this crate; callers hand in
//! page streams and index root pages instead.

pub mod appendix;
pub mod book;
pub mod compare;
pub mod error;
pub mod search;
pub mod storage;
pub mod text;
pub mod types;

// Re-export main public types
pub use error::{Error, ErrorCode, Result};

pub use book::{Book, MultiSearch, SearchIndexes, Subbook};

pub use search::{
    hit_list, initialize_search, search_endword, search_exactword, search_keyword, search_multi,
    search_word,
};

pub use appendix::{
    backward_narrow_alt_character, forward_narrow_alt_character, have_narrow_alt,
    narrow_alt_character_text, narrow_alt_end, narrow_alt_start, Appendix, AppendixSubbook,
};

pub use types::{Hit, Location};
