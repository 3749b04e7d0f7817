//! Index traversal and hit collection (search.c translation).
//!
//! A submitted search descends the intermediate index layers to a leaf
//! page (pre-search), then successive hit-list calls walk the leaf
//! layer and decode entries into [`Hit`] records. Keyword and multi
//! searches run one context per sub-query and AND-intersect the
//! resulting hit streams by text location.

use std::sync::Arc;

use crate::book::{Book, BookState, SearchContext, Subbook};
use crate::compare::{ExactWord, PrefixWord};
use crate::error::{Error, ErrorCode, Result};
use crate::storage::cache::{page_cache, PageCache};
use crate::types::{
    location_at, BookCode, EntryArrangement, Hit, PageId, Pgno, SearchCode, MAX_INDEX_DEPTH,
    MAX_KEYWORDS, MAX_MULTI_ENTRIES, MAX_WORD_LENGTH, SIZE_PAGE,
};

/// Capacity of one row of the temporary hit matrix used by compound
/// searches.
const TMP_MAX_HITS: usize = 64;

fn internal_error() -> Error {
    Error::new(ErrorCode::Internal)
}

/// eb_initialize_search
///
/// Drops the submitted search of `book` and this book's cached page.
pub fn initialize_search(book: &Book) {
    let mut cache = page_cache().lock().expect("page cache mutex poisoned");
    let mut state = book.state.lock().expect("book mutex poisoned");
    cache.invalidate_book(book.code());
    state.contexts[0].code = SearchCode::None;
}

// ============================================================================
// Query submission
// ============================================================================

fn checked_word(word: &[u8]) -> Result<Vec<u8>> {
    if word.is_empty() {
        return Err(Error::new(ErrorCode::NoWord));
    }
    if word.len() > MAX_WORD_LENGTH {
        return Err(Error::new(ErrorCode::TooLongWord));
    }
    Ok(word.to_vec())
}

/// eb_search_exactword
pub fn search_exactword(book: &Book, word: &[u8]) -> Result<()> {
    submit_word(book, word, SearchCode::ExactWord)
}

/// eb_search_word
pub fn search_word(book: &Book, word: &[u8]) -> Result<()> {
    submit_word(book, word, SearchCode::Word)
}

/// eb_search_endword
///
/// The endword index stores its keys reversed; `word` is expected in
/// that stored form (reversal is character-set dependent and happens
/// in the caller's conversion layer).
pub fn search_endword(book: &Book, word: &[u8]) -> Result<()> {
    submit_word(book, word, SearchCode::EndWord)
}

fn submit_word(book: &Book, word: &[u8], code: SearchCode) -> Result<()> {
    let mut cache = page_cache().lock().map_err(|_| internal_error())?;
    let mut state = book.state.lock().map_err(|_| internal_error())?;
    let result = submit_word_locked(&mut cache, book.code(), &mut state, word, code);
    if result.is_err() {
        state.contexts[0].code = SearchCode::None;
    }
    result
}

fn submit_word_locked(
    cache: &mut PageCache,
    book_code: BookCode,
    state: &mut BookState,
    word: &[u8],
    code: SearchCode,
) -> Result<()> {
    let BookState { subbook, contexts } = state;
    let sub = subbook
        .as_mut()
        .ok_or_else(|| Error::new(ErrorCode::NoCurrentSubbook))?;
    let word = checked_word(word)?;
    let root = match code {
        SearchCode::ExactWord => sub.indexes.word_exact,
        SearchCode::Word => sub.indexes.word,
        SearchCode::EndWord => sub.indexes.endword,
        _ => None,
    };
    let root = root.ok_or_else(|| Error::new(ErrorCode::NoSuchSearch))?;

    let context = &mut contexts[0];
    *context = SearchContext::new();
    context.code = code;
    context.page = root;
    context.canonicalized_word = word.clone();
    context.word = word;
    context.compare = match code {
        SearchCode::ExactWord => Arc::new(ExactWord),
        _ => Arc::new(PrefixWord),
    };
    for context in contexts[1..].iter_mut() {
        context.code = SearchCode::None;
    }
    presearch_word(cache, book_code, sub, &mut contexts[0])
}

/// eb_search_keyword
///
/// Submits one sub-query per keyword, all rooted at the keyword
/// index. Hit listing intersects the sub-queries.
pub fn search_keyword(book: &Book, words: &[&[u8]]) -> Result<()> {
    let mut cache = page_cache().lock().map_err(|_| internal_error())?;
    let mut state = book.state.lock().map_err(|_| internal_error())?;
    let result = submit_keyword_locked(&mut cache, book.code(), &mut state, words);
    if result.is_err() {
        state.contexts[0].code = SearchCode::None;
    }
    result
}

fn submit_keyword_locked(
    cache: &mut PageCache,
    book_code: BookCode,
    state: &mut BookState,
    words: &[&[u8]],
) -> Result<()> {
    let BookState { subbook, contexts } = state;
    let sub = subbook
        .as_mut()
        .ok_or_else(|| Error::new(ErrorCode::NoCurrentSubbook))?;
    if words.is_empty() {
        return Err(Error::new(ErrorCode::NoWord));
    }
    if words.len() > MAX_KEYWORDS {
        return Err(Error::new(ErrorCode::TooManyWords));
    }
    let root = sub
        .indexes
        .keyword
        .ok_or_else(|| Error::new(ErrorCode::NoSuchSearch))?;

    for (i, &word) in words.iter().enumerate() {
        let word = checked_word(word)?;
        let context = &mut contexts[i];
        *context = SearchContext::new();
        context.code = SearchCode::Keyword;
        context.page = root;
        context.canonicalized_word = word.clone();
        context.word = word;
        context.compare = Arc::new(PrefixWord);
        presearch_word(cache, book_code, sub, &mut contexts[i])?;
    }
    for context in contexts[words.len()..].iter_mut() {
        context.code = SearchCode::None;
    }
    Ok(())
}

/// eb_search_multi
///
/// `words` holds one pattern per entry field of the multi search
/// `multi_id`; an empty pattern leaves its field unconstrained.
pub fn search_multi(book: &Book, multi_id: usize, words: &[&[u8]]) -> Result<()> {
    let mut cache = page_cache().lock().map_err(|_| internal_error())?;
    let mut state = book.state.lock().map_err(|_| internal_error())?;
    let result = submit_multi_locked(&mut cache, book.code(), &mut state, multi_id, words);
    if result.is_err() {
        state.contexts[0].code = SearchCode::None;
    }
    result
}

fn submit_multi_locked(
    cache: &mut PageCache,
    book_code: BookCode,
    state: &mut BookState,
    multi_id: usize,
    words: &[&[u8]],
) -> Result<()> {
    let BookState { subbook, contexts } = state;
    let sub = subbook
        .as_mut()
        .ok_or_else(|| Error::new(ErrorCode::NoCurrentSubbook))?;
    let roots: Vec<Pgno> = sub
        .indexes
        .multi
        .get(multi_id)
        .ok_or_else(|| Error::new(ErrorCode::NoSuchMulti))?
        .entries
        .clone();
    if words.len() > roots.len() || words.len() > MAX_MULTI_ENTRIES {
        return Err(Error::new(ErrorCode::NoSuchEntry));
    }

    let mut slot = 0;
    for (entry_id, &word) in words.iter().enumerate() {
        if word.is_empty() {
            continue;
        }
        let word = checked_word(word)?;
        let context = &mut contexts[slot];
        *context = SearchContext::new();
        context.code = SearchCode::Multi;
        context.page = roots[entry_id];
        context.canonicalized_word = word.clone();
        context.word = word;
        context.compare = Arc::new(ExactWord);
        presearch_word(cache, book_code, sub, &mut contexts[slot])?;
        slot += 1;
    }
    if slot == 0 {
        return Err(Error::new(ErrorCode::NoWord));
    }
    for context in contexts[slot..].iter_mut() {
        context.code = SearchCode::None;
    }
    Ok(())
}

// ============================================================================
// Pre-search
// ============================================================================

/// eb_presearch_word
///
/// Descends intermediate index layers until the context sits on the
/// leaf page that may contain the word. A self-referencing child or a
/// scan past the last internal entry exhausts the search (no hits)
/// without error; descending past `MAX_INDEX_DEPTH` levels is a
/// format error.
pub(crate) fn presearch_word(
    cache: &mut PageCache,
    book_code: BookCode,
    sub: &mut Subbook,
    context: &mut SearchContext,
) -> Result<()> {
    cache.invalidate();
    match presearch_descend(cache, book_code, sub, context) {
        Ok(true) => {
            context.entry_index = 0;
            context.comparison_result = 1;
            context.entry_length = 0;
            context.in_group_entry = false;
            Ok(())
        }
        Ok(false) => {
            cache.invalidate();
            Ok(())
        }
        Err(err) => {
            cache.invalidate();
            Err(err)
        }
    }
}

fn presearch_descend(
    cache: &mut PageCache,
    book_code: BookCode,
    sub: &mut Subbook,
    context: &mut SearchContext,
) -> Result<bool> {
    for _ in 0..MAX_INDEX_DEPTH {
        let mut next_page = context.page;

        cache.load(sub.text.as_mut(), book_code, context.page)?;
        let buffer = cache.buffer();

        context.page_id = PageId::from_bits_retain(buffer[0]);
        context.entry_length = buffer[1] as usize;
        context.entry_arrangement = if context.entry_length == 0 {
            EntryArrangement::Variable
        } else {
            EntryArrangement::Fixed
        };
        context.entry_count = u16::from_be_bytes([buffer[2], buffer[3]]) as usize;
        context.offset = 4;

        if context.page_id.contains(PageId::LEAF_LAYER) {
            return Ok(true);
        }

        // Select the child page on the next level down.
        context.entry_index = 0;
        while context.entry_index < context.entry_count {
            if SIZE_PAGE < context.offset + context.entry_length + 4 {
                return Err(Error::new(ErrorCode::UnexpectedText));
            }
            let key_end = context.offset + context.entry_length;
            let key = &buffer[context.offset..key_end];
            if context.compare.compare(&context.canonicalized_word, key) <= 0 {
                next_page = crate::types::uint4(buffer, key_end)
                    .ok_or_else(|| Error::new(ErrorCode::UnexpectedText))?;
                break;
            }
            context.offset += context.entry_length + 4;
            context.entry_index += 1;
        }
        if context.entry_count <= context.entry_index || context.page == next_page {
            context.comparison_result = -1;
            return Ok(false);
        }
        context.page = next_page;
    }
    Err(Error::new(ErrorCode::UnexpectedText))
}

// ============================================================================
// Hit listing
// ============================================================================

/// eb_hit_list
///
/// Collects up to `max_hit_count` further hits of the submitted
/// search. Repeated calls continue where the previous one stopped;
/// once the walk is exhausted they return an empty list.
pub fn hit_list(book: &Book, max_hit_count: usize) -> Result<Vec<Hit>> {
    let mut cache = page_cache().lock().map_err(|_| internal_error())?;
    let mut state = book.state.lock().map_err(|_| internal_error())?;
    let book_code = book.code();

    let mut hits = Vec::new();
    if max_hit_count == 0 {
        return Ok(hits);
    }

    let BookState { subbook, contexts } = &mut *state;
    let sub = subbook
        .as_mut()
        .ok_or_else(|| Error::new(ErrorCode::NoCurrentSubbook))?;

    match contexts[0].code {
        SearchCode::ExactWord | SearchCode::Word | SearchCode::EndWord => {
            hits = hit_list_word(&mut cache, book_code, sub, &mut contexts[0], max_hit_count)?;
        }
        SearchCode::Keyword | SearchCode::Multi => {
            let code = contexts[0].code;
            hit_list_compound(
                &mut cache,
                book_code,
                sub,
                contexts,
                code,
                max_hit_count,
                &mut hits,
            )?;
        }
        SearchCode::None => return Err(Error::new(ErrorCode::NoPreviousSearch)),
    }
    Ok(hits)
}

/// Compound driver shared by keyword and multi searches: pull a bounded
/// block of hits from every live sub-context, AND-merge the blocks,
/// then advance each original context by exactly the prefix the merge
/// consumed.
fn hit_list_compound(
    cache: &mut PageCache,
    book_code: BookCode,
    sub: &mut Subbook,
    contexts: &mut [SearchContext],
    code: SearchCode,
    max_hit_count: usize,
    hits: &mut Vec<Hit>,
) -> Result<()> {
    let limit = match code {
        SearchCode::Keyword => MAX_KEYWORDS,
        _ => MAX_MULTI_ENTRIES,
    };
    loop {
        let mut rows: Vec<Vec<Hit>> = Vec::new();
        let mut drained = false;
        for i in 0..limit {
            if contexts[i].code != code {
                break;
            }
            let mut scratch = contexts[i].clone();
            let row = match code {
                SearchCode::Keyword => {
                    hit_list_keyword(cache, book_code, sub, &mut scratch, TMP_MAX_HITS)?
                }
                _ => hit_list_multi(cache, book_code, sub, &mut scratch, TMP_MAX_HITS)?,
            };
            let empty = row.is_empty();
            rows.push(row);
            if empty {
                drained = true;
                break;
            }
        }
        if rows.is_empty() || drained {
            return Ok(());
        }

        let mut consumed = vec![0usize; rows.len()];
        and_hit_lists(hits, max_hit_count - hits.len(), &rows, &mut consumed);

        for (i, &n) in consumed.iter().enumerate() {
            if n == 0 {
                continue;
            }
            match code {
                SearchCode::Keyword => {
                    hit_list_keyword(cache, book_code, sub, &mut contexts[i], n)?;
                }
                _ => {
                    hit_list_multi(cache, book_code, sub, &mut contexts[i], n)?;
                }
            }
        }

        if max_hit_count <= hits.len() {
            return Ok(());
        }
    }
}

/// Reload the context's page when the cache slot holds something else,
/// and decode the page header at the start of a page.
///
/// A displacement miss in the middle of a page reloads the buffer only;
/// walk state survives untouched.
fn refresh_page(
    cache: &mut PageCache,
    book_code: BookCode,
    sub: &mut Subbook,
    context: &mut SearchContext,
) -> Result<()> {
    if !cache.holds(book_code, context.page) {
        cache.load(sub.text.as_mut(), book_code, context.page)?;
    }
    if context.entry_index == 0 {
        let buffer = cache.buffer();
        context.page_id = PageId::from_bits_retain(buffer[0]);
        context.entry_length = buffer[1] as usize;
        context.entry_arrangement = if context.entry_length == 0 {
            EntryArrangement::Variable
        } else {
            EntryArrangement::Fixed
        };
        context.entry_count = u16::from_be_bytes([buffer[2], buffer[3]]) as usize;
        context.offset = 4;
    }
    Ok(())
}

fn read_location(buffer: &[u8], offset: usize) -> Result<crate::types::Location> {
    location_at(buffer, offset).ok_or_else(|| Error::new(ErrorCode::UnexpectedText))
}

/// eb_hit_list_word
fn hit_list_word(
    cache: &mut PageCache,
    book_code: BookCode,
    sub: &mut Subbook,
    context: &mut SearchContext,
    max_hit_count: usize,
) -> Result<Vec<Hit>> {
    let mut hits = Vec::new();

    // A negative comparison means all matching entries have already
    // been found.
    if context.comparison_result < 0 {
        return Ok(hits);
    }
    let compare = Arc::clone(&context.compare);

    loop {
        refresh_page(cache, book_code, sub, context)?;
        let buffer = cache.buffer();

        if !context.page_id.contains(PageId::LEAF_LAYER) {
            return Err(Error::new(ErrorCode::UnexpectedText));
        }

        if !context.page_id.contains(PageId::GROUP_ENTRY)
            && context.entry_arrangement == EntryArrangement::Fixed
        {
            while context.entry_index < context.entry_count {
                if SIZE_PAGE < context.offset + context.entry_length + 12 {
                    return Err(Error::new(ErrorCode::UnexpectedText));
                }
                let key_end = context.offset + context.entry_length;
                context.comparison_result =
                    compare.compare(&context.word, &buffer[context.offset..key_end]);
                if context.comparison_result == 0 {
                    hits.push(Hit {
                        heading: read_location(buffer, key_end + 6)?,
                        text: read_location(buffer, key_end)?,
                    });
                }
                context.entry_index += 1;
                context.offset += context.entry_length + 12;

                if context.comparison_result < 0 || max_hit_count <= hits.len() {
                    return Ok(hits);
                }
            }
        } else if !context.page_id.contains(PageId::GROUP_ENTRY)
            && context.entry_arrangement == EntryArrangement::Variable
        {
            while context.entry_index < context.entry_count {
                if SIZE_PAGE < context.offset + 1 {
                    return Err(Error::new(ErrorCode::UnexpectedText));
                }
                context.entry_length = buffer[context.offset] as usize;
                if SIZE_PAGE < context.offset + context.entry_length + 13 {
                    return Err(Error::new(ErrorCode::UnexpectedText));
                }
                let key_start = context.offset + 1;
                let key_end = key_start + context.entry_length;
                context.comparison_result =
                    compare.compare(&context.word, &buffer[key_start..key_end]);
                if context.comparison_result == 0 {
                    hits.push(Hit {
                        heading: read_location(buffer, key_end + 6)?,
                        text: read_location(buffer, key_end)?,
                    });
                }
                context.entry_index += 1;
                context.offset += context.entry_length + 13;

                if context.comparison_result < 0 || max_hit_count <= hits.len() {
                    return Ok(hits);
                }
            }
        } else {
            while context.entry_index < context.entry_count {
                if SIZE_PAGE < context.offset + 2 {
                    return Err(Error::new(ErrorCode::UnexpectedText));
                }
                match buffer[context.offset] {
                    0x00 => {
                        // Single entry.
                        context.entry_length = buffer[context.offset + 1] as usize;
                        if SIZE_PAGE < context.offset + context.entry_length + 14 {
                            return Err(Error::new(ErrorCode::UnexpectedText));
                        }
                        let key_start = context.offset + 2;
                        let key_end = key_start + context.entry_length;
                        let key = &buffer[key_start..key_end];
                        context.comparison_result =
                            compare.compare(&context.canonicalized_word, key);
                        if context.comparison_result == 0
                            && compare.compare(&context.word, key) == 0
                        {
                            hits.push(Hit {
                                heading: read_location(buffer, key_end + 6)?,
                                text: read_location(buffer, key_end)?,
                            });
                        }
                        context.in_group_entry = false;
                        context.offset += context.entry_length + 14;
                    }
                    0x80 => {
                        // Start of a group entry.
                        context.entry_length = buffer[context.offset + 1] as usize;
                        if SIZE_PAGE < context.offset + context.entry_length + 4 {
                            return Err(Error::new(ErrorCode::UnexpectedText));
                        }
                        let key_start = context.offset + 4;
                        let key_end = key_start + context.entry_length;
                        context.comparison_result = compare
                            .compare(&context.canonicalized_word, &buffer[key_start..key_end]);
                        context.in_group_entry = true;
                        context.offset += context.entry_length + 4;
                    }
                    0xc0 => {
                        // Element of the group entry.
                        context.entry_length = buffer[context.offset + 1] as usize;
                        if SIZE_PAGE < context.offset + context.entry_length + 14 {
                            return Err(Error::new(ErrorCode::UnexpectedText));
                        }
                        let key_start = context.offset + 2;
                        let key_end = key_start + context.entry_length;
                        if context.comparison_result == 0
                            && context.in_group_entry
                            && compare.compare(&context.word, &buffer[key_start..key_end]) == 0
                        {
                            hits.push(Hit {
                                heading: read_location(buffer, key_end + 6)?,
                                text: read_location(buffer, key_end)?,
                            });
                        }
                        context.offset += context.entry_length + 14;
                    }
                    _ => return Err(Error::new(ErrorCode::UnexpectedText)),
                }
                context.entry_index += 1;

                if context.comparison_result < 0 || max_hit_count <= hits.len() {
                    return Ok(hits);
                }
            }
        }

        if context.page_id.contains(PageId::LAYER_END) {
            context.comparison_result = -1;
            return Ok(hits);
        }
        context.page += 1;
        context.entry_index = 0;
    }
}

/// eb_hit_list_keyword
///
/// Keyword group elements carry only a text location; their headings
/// are streamed from the subbook's heading cursor, one step per
/// element, starting at the group heading stored in the 0x80 record.
fn hit_list_keyword(
    cache: &mut PageCache,
    book_code: BookCode,
    sub: &mut Subbook,
    context: &mut SearchContext,
    max_hit_count: usize,
) -> Result<Vec<Hit>> {
    let mut hits = Vec::new();

    if context.in_group_entry && context.comparison_result == 0 {
        sub.cursor.seek_text(context.keyword_heading)?;
    }
    if context.comparison_result < 0 {
        return Ok(hits);
    }
    let compare = Arc::clone(&context.compare);

    'walk: loop {
        refresh_page(cache, book_code, sub, context)?;

        if !context.page_id.contains(PageId::LEAF_LAYER) {
            return Err(Error::new(ErrorCode::UnexpectedText));
        }

        if !context.page_id.contains(PageId::GROUP_ENTRY)
            && context.entry_arrangement == EntryArrangement::Fixed
        {
            while context.entry_index < context.entry_count {
                let buffer = cache.buffer();
                if SIZE_PAGE < context.offset + context.entry_length + 12 {
                    return Err(Error::new(ErrorCode::UnexpectedText));
                }
                let key_end = context.offset + context.entry_length;
                context.comparison_result =
                    compare.compare(&context.word, &buffer[context.offset..key_end]);
                if context.comparison_result == 0 {
                    hits.push(Hit {
                        heading: read_location(buffer, key_end + 6)?,
                        text: read_location(buffer, key_end)?,
                    });
                }
                context.entry_index += 1;
                context.offset += context.entry_length + 12;

                if context.comparison_result < 0 || max_hit_count <= hits.len() {
                    break 'walk;
                }
            }
        } else if !context.page_id.contains(PageId::GROUP_ENTRY)
            && context.entry_arrangement == EntryArrangement::Variable
        {
            while context.entry_index < context.entry_count {
                let buffer = cache.buffer();
                if SIZE_PAGE < context.offset + 1 {
                    return Err(Error::new(ErrorCode::UnexpectedText));
                }
                context.entry_length = buffer[context.offset] as usize;
                if SIZE_PAGE < context.offset + context.entry_length + 13 {
                    return Err(Error::new(ErrorCode::UnexpectedText));
                }
                let key_start = context.offset + 1;
                let key_end = key_start + context.entry_length;
                context.comparison_result =
                    compare.compare(&context.word, &buffer[key_start..key_end]);
                if context.comparison_result == 0 {
                    hits.push(Hit {
                        heading: read_location(buffer, key_end + 6)?,
                        text: read_location(buffer, key_end)?,
                    });
                }
                context.entry_index += 1;
                context.offset += context.entry_length + 13;

                if context.comparison_result < 0 || max_hit_count <= hits.len() {
                    break 'walk;
                }
            }
        } else {
            while context.entry_index < context.entry_count {
                let buffer = cache.buffer();
                if SIZE_PAGE < context.offset + 2 {
                    return Err(Error::new(ErrorCode::UnexpectedText));
                }
                match buffer[context.offset] {
                    0x00 => {
                        // Single entry.
                        context.entry_length = buffer[context.offset + 1] as usize;
                        if SIZE_PAGE < context.offset + context.entry_length + 14 {
                            return Err(Error::new(ErrorCode::UnexpectedText));
                        }
                        let key_start = context.offset + 2;
                        let key_end = key_start + context.entry_length;
                        let key = &buffer[key_start..key_end];
                        context.comparison_result =
                            compare.compare(&context.canonicalized_word, key);
                        if context.comparison_result == 0
                            && compare.compare(&context.word, key) == 0
                        {
                            hits.push(Hit {
                                heading: read_location(buffer, key_end + 6)?,
                                text: read_location(buffer, key_end)?,
                            });
                        }
                        context.in_group_entry = false;
                        context.offset += context.entry_length + 14;
                    }
                    0x80 => {
                        // Start of a group entry; the stored heading
                        // location seeds the heading stream.
                        context.entry_length = buffer[context.offset + 1] as usize;
                        if SIZE_PAGE < context.offset + context.entry_length + 12 {
                            return Err(Error::new(ErrorCode::UnexpectedText));
                        }
                        let key_start = context.offset + 6;
                        let key_end = key_start + context.entry_length;
                        context.comparison_result = compare
                            .compare(&context.canonicalized_word, &buffer[key_start..key_end]);
                        context.keyword_heading = read_location(buffer, key_end)?;
                        context.in_group_entry = true;
                        context.offset += context.entry_length + 12;

                        if context.comparison_result == 0 {
                            sub.cursor.seek_text(context.keyword_heading)?;
                        }
                    }
                    0xc0 => {
                        // Element of the group entry.
                        if SIZE_PAGE < context.offset + 7 {
                            return Err(Error::new(ErrorCode::UnexpectedText));
                        }
                        if context.in_group_entry && context.comparison_result == 0 {
                            let text = read_location(buffer, context.offset + 1)?;
                            let heading = sub.cursor.tell_text()?;
                            context.keyword_heading = heading;
                            hits.push(Hit { heading, text });
                            sub.cursor.forward_heading()?;
                        }
                        context.offset += 7;
                    }
                    _ => return Err(Error::new(ErrorCode::UnexpectedText)),
                }
                context.entry_index += 1;

                if context.comparison_result < 0 || max_hit_count <= hits.len() {
                    break 'walk;
                }
            }
        }

        if context.page_id.contains(PageId::LAYER_END) {
            context.comparison_result = -1;
            break 'walk;
        }
        context.page += 1;
        context.entry_index = 0;
    }

    // Remember where the heading stream stands so the next call can
    // resume inside the group.
    if context.in_group_entry && context.comparison_result == 0 {
        context.keyword_heading = sub.cursor.tell_text()?;
    }
    Ok(hits)
}

/// eb_hit_list_multi
fn hit_list_multi(
    cache: &mut PageCache,
    book_code: BookCode,
    sub: &mut Subbook,
    context: &mut SearchContext,
    max_hit_count: usize,
) -> Result<Vec<Hit>> {
    let mut hits = Vec::new();

    if context.comparison_result < 0 {
        return Ok(hits);
    }
    let compare = Arc::clone(&context.compare);

    loop {
        refresh_page(cache, book_code, sub, context)?;
        let buffer = cache.buffer();

        if !context.page_id.contains(PageId::LEAF_LAYER) {
            return Err(Error::new(ErrorCode::UnexpectedText));
        }

        if !context.page_id.contains(PageId::GROUP_ENTRY)
            && context.entry_arrangement == EntryArrangement::Fixed
        {
            while context.entry_index < context.entry_count {
                if SIZE_PAGE < context.offset + context.entry_length + 12 {
                    return Err(Error::new(ErrorCode::UnexpectedText));
                }
                let key_end = context.offset + context.entry_length;
                context.comparison_result =
                    compare.compare(&context.word, &buffer[context.offset..key_end]);
                if context.comparison_result == 0 {
                    hits.push(Hit {
                        heading: read_location(buffer, key_end + 6)?,
                        text: read_location(buffer, key_end)?,
                    });
                }
                context.entry_index += 1;
                context.offset += context.entry_length + 12;

                if context.comparison_result < 0 || max_hit_count <= hits.len() {
                    return Ok(hits);
                }
            }
        } else if !context.page_id.contains(PageId::GROUP_ENTRY)
            && context.entry_arrangement == EntryArrangement::Variable
        {
            while context.entry_index < context.entry_count {
                if SIZE_PAGE < context.offset + 1 {
                    return Err(Error::new(ErrorCode::UnexpectedText));
                }
                context.entry_length = buffer[context.offset] as usize;
                if SIZE_PAGE < context.offset + context.entry_length + 13 {
                    return Err(Error::new(ErrorCode::UnexpectedText));
                }
                let key_start = context.offset + 1;
                let key_end = key_start + context.entry_length;
                context.comparison_result =
                    compare.compare(&context.word, &buffer[key_start..key_end]);
                if context.comparison_result == 0 {
                    hits.push(Hit {
                        heading: read_location(buffer, key_end + 6)?,
                        text: read_location(buffer, key_end)?,
                    });
                }
                context.entry_index += 1;
                context.offset += context.entry_length + 13;

                if context.comparison_result < 0 || max_hit_count <= hits.len() {
                    return Ok(hits);
                }
            }
        } else {
            while context.entry_index < context.entry_count {
                if SIZE_PAGE < context.offset + 2 {
                    return Err(Error::new(ErrorCode::UnexpectedText));
                }
                match buffer[context.offset] {
                    0x00 => {
                        // Single entry.
                        context.entry_length = buffer[context.offset + 1] as usize;
                        if SIZE_PAGE < context.offset + context.entry_length + 14 {
                            return Err(Error::new(ErrorCode::UnexpectedText));
                        }
                        let key_start = context.offset + 2;
                        let key_end = key_start + context.entry_length;
                        let key = &buffer[key_start..key_end];
                        context.comparison_result =
                            compare.compare(&context.canonicalized_word, key);
                        if context.comparison_result == 0
                            && compare.compare(&context.word, key) == 0
                        {
                            hits.push(Hit {
                                heading: read_location(buffer, key_end + 6)?,
                                text: read_location(buffer, key_end)?,
                            });
                        }
                        context.in_group_entry = false;
                        context.offset += context.entry_length + 14;
                    }
                    0x80 => {
                        // Start of a group entry. Unlike keyword
                        // leaves this record has no stored heading.
                        context.entry_length = buffer[context.offset + 1] as usize;
                        if SIZE_PAGE < context.offset + context.entry_length + 6 {
                            return Err(Error::new(ErrorCode::UnexpectedText));
                        }
                        let key_start = context.offset + 6;
                        let key_end = key_start + context.entry_length;
                        context.comparison_result = compare
                            .compare(&context.canonicalized_word, &buffer[key_start..key_end]);
                        context.in_group_entry = true;
                        context.offset += context.entry_length + 6;
                    }
                    0xc0 => {
                        // Element of the group entry, 13 bytes.
                        if SIZE_PAGE < context.offset + 13 {
                            return Err(Error::new(ErrorCode::UnexpectedText));
                        }
                        if context.in_group_entry && context.comparison_result == 0 {
                            hits.push(Hit {
                                heading: read_location(buffer, context.offset + 7)?,
                                text: read_location(buffer, context.offset + 1)?,
                            });
                        }
                        context.offset += 13;
                    }
                    _ => return Err(Error::new(ErrorCode::UnexpectedText)),
                }
                context.entry_index += 1;

                if context.comparison_result < 0 || max_hit_count <= hits.len() {
                    return Ok(hits);
                }
            }
        }

        if context.page_id.contains(PageId::LAYER_END) {
            context.comparison_result = -1;
            return Ok(hits);
        }
        context.page += 1;
        context.entry_index = 0;
    }
}

// ============================================================================
// AND merge
// ============================================================================

/// eb_and_hit_lists
///
/// K-way intersection of sorted hit streams by text location. Emits a
/// hit when every live stream head coincides; otherwise advances only
/// the heads that lag behind the greatest one, and stops when no head
/// can move. On return `consumed[i]` holds how many entries of
/// `hit_lists[i]` were used up.
fn and_hit_lists(
    and_list: &mut Vec<Hit>,
    max_and_count: usize,
    hit_lists: &[Vec<Hit>],
    consumed: &mut [usize],
) {
    let list_count = hit_lists.len();
    let mut indexes = vec![0usize; list_count];
    let mut and_count = 0;

    while and_count < max_and_count {
        let mut greatest: Option<(Pgno, u16)> = None;
        let mut equal_count = 0;

        for i in 0..list_count {
            if hit_lists[i].len() <= indexes[i] {
                continue;
            }
            let current = hit_lists[i][indexes[i]].text;
            let current = (current.page, current.offset);
            match greatest {
                None => {
                    greatest = Some(current);
                    equal_count += 1;
                }
                Some(top) if top < current => {
                    greatest = Some(current);
                }
                Some(top) if top == current => {
                    equal_count += 1;
                }
                Some(_) => {}
            }
        }

        if equal_count == list_count {
            and_list.push(hit_lists[0][indexes[0]]);
            and_count += 1;
            for i in 0..list_count {
                if indexes[i] < hit_lists[i].len() {
                    indexes[i] += 1;
                }
            }
        } else {
            let Some(top) = greatest else {
                break;
            };
            let mut increment_count = 0;
            for i in 0..list_count {
                if hit_lists[i].len() <= indexes[i] {
                    continue;
                }
                let current = hit_lists[i][indexes[i]].text;
                if (current.page, current.offset) != top {
                    indexes[i] += 1;
                    increment_count += 1;
                }
            }
            if increment_count == 0 {
                break;
            }
        }
    }

    consumed.copy_from_slice(&indexes);
}
