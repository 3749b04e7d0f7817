//! Shared fixture builders for the integration tests: synthetic index
//! pages in the on-disk layout, written to temporary files.

#![allow(dead_code)]

use std::io::Write;

use rusteb::error::Result;
use rusteb::text::TextCursor;
use rusteb::types::SIZE_PAGE;
use rusteb::Location;

pub fn page_header(page_id: u8, entry_length: u8, entry_count: u16) -> Vec<u8> {
    let mut page = Vec::with_capacity(SIZE_PAGE);
    page.push(page_id);
    page.push(entry_length);
    page.extend_from_slice(&entry_count.to_be_bytes());
    page
}

pub fn loc_bytes(location: Location) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(6);
    bytes.extend_from_slice(&location.page.to_be_bytes());
    bytes.extend_from_slice(&location.offset.to_be_bytes());
    bytes
}

pub fn loc(page: u32, offset: u16) -> Location {
    Location::new(page, offset)
}

/// Fixed-arrangement leaf page: keys of one shared length, each
/// followed by a text and a heading location.
pub fn fixed_leaf(page_id: u8, entries: &[(&[u8], Location, Location)]) -> Vec<u8> {
    let entry_length = entries[0].0.len();
    let mut page = page_header(page_id, entry_length as u8, entries.len() as u16);
    for (key, text, heading) in entries {
        assert_eq!(key.len(), entry_length, "fixed keys share one length");
        page.extend_from_slice(key);
        page.extend(loc_bytes(*text));
        page.extend(loc_bytes(*heading));
    }
    page
}

/// Variable-arrangement leaf page: a 1-byte length before every key.
pub fn variable_leaf(page_id: u8, entries: &[(&[u8], Location, Location)]) -> Vec<u8> {
    let mut page = page_header(page_id, 0, entries.len() as u16);
    for (key, text, heading) in entries {
        page.push(key.len() as u8);
        page.extend_from_slice(key);
        page.extend(loc_bytes(*text));
        page.extend(loc_bytes(*heading));
    }
    page
}

/// Internal index page: keys followed by child page numbers.
pub fn internal_page(entry_length: u8, entries: &[(&[u8], u32)]) -> Vec<u8> {
    let mut page = page_header(0x00, entry_length, entries.len() as u16);
    for (key, child) in entries {
        assert_eq!(key.len(), entry_length as usize);
        page.extend_from_slice(key);
        page.extend_from_slice(&child.to_be_bytes());
    }
    page
}

/// Keyword group leaf: 0x80 records with a stored group heading,
/// 0xc0 elements carrying only text locations.
pub fn keyword_leaf(groups: &[(&[u8], Location, &[Location])]) -> Vec<u8> {
    let entry_count: usize = groups.iter().map(|(_, _, texts)| 1 + texts.len()).sum();
    let mut page = page_header(0xb0, 0, entry_count as u16);
    for (key, group_heading, texts) in groups {
        page.push(0x80);
        page.push(key.len() as u8);
        page.extend_from_slice(&[0, 0, 0, 0]);
        page.extend_from_slice(key);
        page.extend(loc_bytes(*group_heading));
        for text in *texts {
            page.push(0xc0);
            page.extend(loc_bytes(*text));
        }
    }
    page
}

/// Concatenate pages into a book image, padding each to 2 KiB.
pub fn book_image(pages: Vec<Vec<u8>>) -> Vec<u8> {
    let mut image = Vec::new();
    for mut page in pages {
        assert!(page.len() <= SIZE_PAGE, "fixture page overflows");
        page.resize(SIZE_PAGE, 0);
        image.extend(page);
    }
    image
}

/// Write a book image to a temporary file and reopen it for reading.
pub fn image_file(image: &[u8]) -> std::fs::File {
    let mut file = tempfile::tempfile().expect("create temp book");
    file.write_all(image).expect("write temp book");
    file
}

/// Heading cursor that hands out positions without a text stream:
/// each forward step bumps the offset by one.
pub struct CountingCursor {
    position: Location,
}

impl CountingCursor {
    pub fn new() -> Self {
        Self {
            position: Location::default(),
        }
    }
}

impl TextCursor for CountingCursor {
    fn seek_text(&mut self, location: Location) -> Result<()> {
        self.position = location;
        Ok(())
    }

    fn tell_text(&mut self) -> Result<Location> {
        Ok(self.position)
    }

    fn forward_heading(&mut self) -> Result<()> {
        self.position.offset += 1;
        Ok(())
    }
}
