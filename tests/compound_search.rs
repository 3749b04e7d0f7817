//! Keyword and multi searches: parallel sub-queries AND-merged by
//! text location.

mod common;

use common::*;

use rusteb::error::ErrorCode;
use rusteb::text::NullTextCursor;
use rusteb::{
    hit_list, search_keyword, search_multi, Book, Location, MultiSearch, SearchIndexes, Subbook,
};

fn keyword_book(groups: &[(&[u8], Location, &[Location])]) -> Book {
    let file = image_file(&book_image(vec![keyword_leaf(groups)]));
    let book = Book::new();
    book.set_subbook(Subbook {
        text: Box::new(file),
        cursor: Box::new(CountingCursor::new()),
        indexes: SearchIndexes {
            keyword: Some(1),
            ..Default::default()
        },
    });
    book
}

#[test]
fn test_keyword_and_merge() {
    let book = keyword_book(&[
        (b"alfa", loc(100, 0), &[loc(1, 0), loc(3, 0), loc(5, 0)]),
        (
            b"brav",
            loc(200, 0),
            &[loc(2, 0), loc(3, 0), loc(5, 0), loc(7, 0)],
        ),
    ]);

    search_keyword(&book, &[b"alfa", b"brav"]).unwrap();
    let texts: Vec<_> = hit_list(&book, 10).unwrap().iter().map(|h| h.text).collect();
    assert_eq!(texts, vec![loc(3, 0), loc(5, 0)]);
}

#[test]
fn test_keyword_single_term_matches_its_posting_list() {
    let postings = [loc(1, 0), loc(3, 0), loc(5, 0), loc(9, 2)];
    let book = keyword_book(&[(b"alfa", loc(100, 0), &postings)]);

    search_keyword(&book, &[b"alfa"]).unwrap();
    let texts: Vec<_> = hit_list(&book, 10).unwrap().iter().map(|h| h.text).collect();
    assert_eq!(texts, postings.to_vec());
}

#[test]
fn test_keyword_hits_arrive_in_text_order_across_calls() {
    let book = keyword_book(&[
        (b"alfa", loc(100, 0), &[loc(1, 0), loc(2, 0), loc(3, 0), loc(4, 0)]),
        (b"brav", loc(200, 0), &[loc(1, 0), loc(2, 0), loc(3, 0), loc(4, 0)]),
    ]);

    search_keyword(&book, &[b"alfa", b"brav"]).unwrap();
    let first = hit_list(&book, 3).unwrap();
    let second = hit_list(&book, 3).unwrap();
    let texts: Vec<_> = first.iter().chain(second.iter()).map(|h| h.text).collect();
    assert_eq!(texts, vec![loc(1, 0), loc(2, 0), loc(3, 0), loc(4, 0)]);
    assert!(hit_list(&book, 3).unwrap().is_empty());
}

#[test]
fn test_keyword_headings_stream_from_the_group_heading() {
    let book = keyword_book(&[(b"alfa", loc(100, 0), &[loc(1, 0), loc(3, 0)])]);

    search_keyword(&book, &[b"alfa"]).unwrap();
    let hits = hit_list(&book, 10).unwrap();
    let headings: Vec<_> = hits.iter().map(|h| h.heading).collect();
    assert_eq!(headings, vec![loc(100, 0), loc(100, 1)]);
}

#[test]
fn test_multi_search_over_entry_fields() {
    let title_index = fixed_leaf(
        0xa0,
        &[
            (b"blue", loc(11, 0), loc(11, 6)),
            (b"blue", loc(13, 0), loc(13, 6)),
            (b"rose", loc(15, 0), loc(15, 6)),
        ],
    );
    let author_index = fixed_leaf(
        0xa0,
        &[
            (b"hana", loc(13, 0), loc(13, 6)),
            (b"hana", loc(17, 0), loc(17, 6)),
        ],
    );
    let file = image_file(&book_image(vec![title_index, author_index]));
    let book = Book::new();
    book.set_subbook(Subbook {
        text: Box::new(file),
        cursor: Box::new(NullTextCursor),
        indexes: SearchIndexes {
            multi: vec![MultiSearch {
                entries: vec![1, 2],
            }],
            ..Default::default()
        },
    });

    search_multi(&book, 0, &[b"blue", b"hana"]).unwrap();
    assert_eq!(
        hit_list(&book, 10)
            .unwrap()
            .iter()
            .map(|h| h.text)
            .collect::<Vec<_>>(),
        vec![loc(13, 0)]
    );

    // Leaving the author field empty keeps every title hit.
    search_multi(&book, 0, &[b"blue", b""]).unwrap();
    assert_eq!(
        hit_list(&book, 10)
            .unwrap()
            .iter()
            .map(|h| h.text)
            .collect::<Vec<_>>(),
        vec![loc(11, 0), loc(13, 0)]
    );

    search_multi(&book, 1, &[b"blue"]).unwrap_err();
}

#[test]
fn test_keyword_errors() {
    let book = keyword_book(&[(b"alfa", loc(100, 0), &[loc(1, 0)])]);

    assert_eq!(
        search_keyword(&book, &[]).unwrap_err().code(),
        ErrorCode::NoWord
    );
    let words: Vec<&[u8]> = vec![b"a", b"b", b"c", b"d", b"e", b"f"];
    assert_eq!(
        search_keyword(&book, &words).unwrap_err().code(),
        ErrorCode::TooManyWords
    );

    // A book without a keyword index rejects the search kind.
    let file = image_file(&book_image(vec![]));
    let plain = Book::new();
    plain.set_subbook(Subbook {
        text: Box::new(file),
        cursor: Box::new(NullTextCursor),
        indexes: SearchIndexes::default(),
    });
    assert_eq!(
        search_keyword(&plain, &[b"alfa"]).unwrap_err().code(),
        ErrorCode::NoSuchSearch
    );
}
