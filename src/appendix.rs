//! Narrow-font alternation tables (narwalt.c translation).
//!
//! An appendix maps narrow-font gaiji to substitute text: one 32-byte
//! NUL-terminated slot per character, laid out row by row from the
//! subbook's start character. Lookups go through a small direct-mapped
//! cache keyed by the low four bits of the character number.

use std::sync::Mutex;

use crate::error::{Error, ErrorCode, Result};
use crate::storage::stream::{read_full, BlockSource};
use crate::types::{CharacterCode, Pgno, MAX_ALTERNATION_TEXT_LENGTH, SIZE_PAGE};

/// Number of slots in the alternation cache.
const ALTERNATION_CACHE_SIZE: usize = 16;

/// On-disk size of one alternation slot, text plus terminating NUL.
const SLOT_SIZE: usize = MAX_ALTERNATION_TEXT_LENGTH + 1;

/// EB_HASH_ALT_CACHE
fn cache_index(character_number: i32) -> usize {
    (character_number & 0x0f) as usize
}

/// Character-number arithmetic of one numbering regime.
///
/// Character numbers are two overlaid base systems: the high byte is a
/// row, the low byte a cell within the row. Stepping off either edge
/// of the valid low-byte range jumps to the adjacent row.
#[derive(Debug, Clone, Copy)]
struct CharacterGrid {
    low_min: i32,
    low_max: i32,
    row_stride: i32,
    row_jump: i32,
}

impl CharacterGrid {
    const JIS: Self = Self {
        low_min: 0x21,
        low_max: 0x7e,
        row_stride: 0x5e,
        row_jump: 0xa3,
    };

    const LATIN: Self = Self {
        low_min: 0x01,
        low_max: 0xfe,
        row_stride: 0xfe,
        row_jump: 3,
    };

    fn of(code: CharacterCode) -> Self {
        match code {
            CharacterCode::JisX0208 => Self::JIS,
            CharacterCode::Iso8859_1 => Self::LATIN,
        }
    }

    fn has_valid_low_byte(self, character_number: i32) -> bool {
        let low = character_number & 0xff;
        self.low_min <= low && low <= self.low_max
    }

    fn successor(self, character_number: i32) -> i32 {
        if self.low_max <= (character_number & 0xff) {
            character_number + self.row_jump
        } else {
            character_number + 1
        }
    }

    fn predecessor(self, character_number: i32) -> i32 {
        if (character_number & 0xff) <= self.low_min {
            character_number - self.row_jump
        } else {
            character_number - 1
        }
    }

    /// Cell index of `character_number` counted from `start`.
    fn cell_index(self, start: i32, character_number: i32) -> i32 {
        ((character_number >> 8) - (start >> 8)) * self.row_stride + (character_number & 0xff)
            - (start & 0xff)
    }
}

#[derive(Clone, Copy)]
struct AlternationCache {
    /// Cached character number, -1 when the slot is empty
    character_number: i32,
    text: [u8; SLOT_SIZE],
}

impl AlternationCache {
    const EMPTY: Self = Self {
        character_number: -1,
        text: [0; SLOT_SIZE],
    };
}

/// The currently selected subbook of an appendix.
pub struct AppendixSubbook {
    pub character_code: CharacterCode,
    /// First page of the narrow alternation region, 0 when absent
    pub narrow_page: Pgno,
    pub narrow_start: i32,
    pub narrow_end: i32,
    /// Appendix stream holding the alternation region
    pub stream: Box<dyn BlockSource>,
    cache: [AlternationCache; ALTERNATION_CACHE_SIZE],
}

impl AppendixSubbook {
    pub fn new(
        character_code: CharacterCode,
        narrow_page: Pgno,
        narrow_start: i32,
        narrow_end: i32,
        stream: Box<dyn BlockSource>,
    ) -> Self {
        Self {
            character_code,
            narrow_page,
            narrow_start,
            narrow_end,
            stream,
            cache: [AlternationCache::EMPTY; ALTERNATION_CACHE_SIZE],
        }
    }

    /// eb_narrow_character_text_jis / eb_narrow_character_text_latin
    fn character_text(&mut self, character_number: i32) -> Result<[u8; SLOT_SIZE]> {
        let grid = CharacterGrid::of(self.character_code);
        if character_number < self.narrow_start
            || self.narrow_end < character_number
            || !grid.has_valid_low_byte(character_number)
        {
            return Err(Error::new(ErrorCode::NoSuchCharText));
        }

        let cell = grid.cell_index(self.narrow_start, character_number);
        let location =
            (self.narrow_page as u64 - 1) * SIZE_PAGE as u64 + cell as u64 * SLOT_SIZE as u64;

        let index = cache_index(character_number);
        if self.cache[index].character_number == character_number {
            return Ok(self.cache[index].text);
        }

        let Self { stream, cache, .. } = self;
        let slot = &mut cache[index];
        stream
            .seek(location)
            .map_err(|_| Error::new(ErrorCode::FailSeekAppendix))?;
        slot.character_number = -1;
        let n = read_full(stream.as_mut(), &mut slot.text)
            .map_err(|_| Error::new(ErrorCode::FailReadAppendix))?;
        if n != SLOT_SIZE {
            return Err(Error::new(ErrorCode::FailReadAppendix));
        }
        slot.text[MAX_ALTERNATION_TEXT_LENGTH] = b'\0';
        slot.character_number = character_number;
        Ok(slot.text)
    }
}

/// An opened appendix package.
pub struct Appendix {
    state: Mutex<Option<AppendixSubbook>>,
}

impl Appendix {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }

    /// eb_set_appendix_subbook
    pub fn set_subbook(&self, subbook: AppendixSubbook) {
        *self.state.lock().expect("appendix mutex poisoned") = Some(subbook);
    }

    /// eb_unset_appendix_subbook
    pub fn unset_subbook(&self) {
        *self.state.lock().expect("appendix mutex poisoned") = None;
    }
}

impl Default for Appendix {
    fn default() -> Self {
        Self::new()
    }
}

fn internal_error() -> Error {
    Error::new(ErrorCode::Internal)
}

/// eb_have_narrow_alt
pub fn have_narrow_alt(appendix: &Appendix) -> bool {
    let state = match appendix.state.lock() {
        Ok(state) => state,
        Err(_) => return false,
    };
    match state.as_ref() {
        Some(subbook) => subbook.narrow_page != 0,
        None => false,
    }
}

/// eb_narrow_alt_start
pub fn narrow_alt_start(appendix: &Appendix) -> Result<i32> {
    let state = appendix.state.lock().map_err(|_| internal_error())?;
    let subbook = state
        .as_ref()
        .ok_or_else(|| Error::new(ErrorCode::NoCurrentAppendixSubbook))?;
    if subbook.narrow_page == 0 {
        return Err(Error::new(ErrorCode::NoSuchCharText));
    }
    Ok(subbook.narrow_start)
}

/// eb_narrow_alt_end
pub fn narrow_alt_end(appendix: &Appendix) -> Result<i32> {
    let state = appendix.state.lock().map_err(|_| internal_error())?;
    let subbook = state
        .as_ref()
        .ok_or_else(|| Error::new(ErrorCode::NoCurrentAppendixSubbook))?;
    if subbook.narrow_page == 0 {
        return Err(Error::new(ErrorCode::NoSuchCharText));
    }
    Ok(subbook.narrow_end)
}

/// eb_narrow_alt_character_text
///
/// Returns the 32-byte NUL-terminated alternation text of
/// `character_number`.
pub fn narrow_alt_character_text(
    appendix: &Appendix,
    character_number: i32,
) -> Result<[u8; SLOT_SIZE]> {
    let mut state = appendix.state.lock().map_err(|_| internal_error())?;
    let subbook = state
        .as_mut()
        .ok_or_else(|| Error::new(ErrorCode::NoCurrentAppendixSubbook))?;
    if subbook.narrow_page == 0 {
        return Err(Error::new(ErrorCode::NoSuchCharText));
    }
    subbook.character_text(character_number)
}

/// eb_forward_narrow_alt_character
pub fn forward_narrow_alt_character(
    appendix: &Appendix,
    n: i32,
    character_number: i32,
) -> Result<i32> {
    if n < 0 {
        return step_backward(appendix, n.unsigned_abs(), character_number);
    }
    step_forward(appendix, n as u32, character_number)
}

/// eb_backward_narrow_alt_character
pub fn backward_narrow_alt_character(
    appendix: &Appendix,
    n: i32,
    character_number: i32,
) -> Result<i32> {
    if n < 0 {
        return step_forward(appendix, n.unsigned_abs(), character_number);
    }
    step_backward(appendix, n as u32, character_number)
}

fn step_forward(appendix: &Appendix, n: u32, character_number: i32) -> Result<i32> {
    let state = appendix.state.lock().map_err(|_| internal_error())?;
    let subbook = state
        .as_ref()
        .ok_or_else(|| Error::new(ErrorCode::NoCurrentAppendixSubbook))?;
    if subbook.narrow_page == 0 {
        return Err(Error::new(ErrorCode::NoSuchCharText));
    }

    let grid = CharacterGrid::of(subbook.character_code);
    if character_number < subbook.narrow_start
        || subbook.narrow_end < character_number
        || !grid.has_valid_low_byte(character_number)
    {
        return Err(Error::new(ErrorCode::NoSuchCharText));
    }

    let mut character_number = character_number;
    for _ in 0..n {
        character_number = grid.successor(character_number);
        if subbook.narrow_end < character_number {
            return Err(Error::new(ErrorCode::NoSuchCharText));
        }
    }
    Ok(character_number)
}

fn step_backward(appendix: &Appendix, n: u32, character_number: i32) -> Result<i32> {
    let state = appendix.state.lock().map_err(|_| internal_error())?;
    let subbook = state
        .as_ref()
        .ok_or_else(|| Error::new(ErrorCode::NoCurrentAppendixSubbook))?;
    if subbook.narrow_page == 0 {
        return Err(Error::new(ErrorCode::NoCurrentFont));
    }

    let grid = CharacterGrid::of(subbook.character_code);
    if character_number < subbook.narrow_start
        || subbook.narrow_end < character_number
        || !grid.has_valid_low_byte(character_number)
    {
        return Err(Error::new(ErrorCode::NoSuchCharText));
    }

    let mut character_number = character_number;
    for _ in 0..n {
        character_number = grid.predecessor(character_number);
        if character_number < subbook.narrow_start {
            return Err(Error::new(ErrorCode::NoSuchCharText));
        }
    }
    Ok(character_number)
}
