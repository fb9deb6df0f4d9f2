//! Screen buffer: cell grid, field-attribute storage, and buffer addressing (C2).
//!
//! Grounded on the donor's `lib3270::display` (`Display3270`/`ScreenSize`/cell
//! grid/buffer-addressing helpers) and `lib3270::field` (`FieldAttribute`,
//! `ExtendedAttributes`, attribute-byte bit layout). The field model itself
//! departs from the donor: rather than a separately maintained
//! `FieldManager { fields: Vec<FieldAttribute> }` kept in sync with the grid
//! by hand, field-attribute bytes live directly on the [`Cell`] they occupy
//! and [`ScreenBuffer::fields`] derives the field list by scanning the grid.
//! There is no parallel table that can drift out of sync with the buffer.
//!
//! This also fixes three donor bugs found while reading `display.rs`:
//! `repeat_to_address`/`erase_unprotected_to_address` now wrap circularly
//! instead of silently doing nothing when the target precedes the cursor,
//! erase-unprotected now actually consults the covering field's protected
//! bit instead of only checking `is_field_attr`, and field-attribute cells
//! render as a space rather than a block glyph.

use crate::codes::{
    ATTR_DISPLAY, ATTR_MDT, ATTR_NUMERIC, ATTR_PROTECTED, ATTR_RESERVED, DISPLAY_HIDDEN,
    DISPLAY_INTENSIFIED, VALIDATION_MANDATORY_ENTRY, VALIDATION_MANDATORY_FILL, VALIDATION_TRIGGER,
};
use crate::ebcdic::CodePage;

/// EBCDIC space, byte 0x40. An erased or newly allocated buffer position
/// holds this, not a null byte.
const EBCDIC_SPACE: u8 = 0x40;

/// Standard 3270 screen geometries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenSize {
    /// Model 2: 24x80 (1920 positions), the default negotiated size.
    Model2,
    /// Model 3: 32x80 (2560 positions).
    Model3,
    /// Model 4: 43x80 (3440 positions).
    Model4,
    /// Model 5: 27x132 (3564 positions).
    Model5,
}

impl ScreenSize {
    pub fn rows(&self) -> usize {
        match self {
            Self::Model2 => 24,
            Self::Model3 => 32,
            Self::Model4 => 43,
            Self::Model5 => 27,
        }
    }

    pub fn cols(&self) -> usize {
        match self {
            Self::Model2 | Self::Model3 | Self::Model4 => 80,
            Self::Model5 => 132,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.rows() * self.cols()
    }

    pub fn address_to_coords(&self, address: u16) -> (usize, usize) {
        let cols = self.cols();
        ((address as usize) / cols, (address as usize) % cols)
    }

    pub fn coords_to_address(&self, row: usize, col: usize) -> u16 {
        ((row * self.cols()) + col) as u16
    }
}

/// Extended attributes set by an SFE order, one `Option` per attribute type
/// so an absent pair leaves the field's prior value (or the default)
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtendedAttributes {
    pub highlighting: Option<u8>,
    pub foreground_color: Option<u8>,
    pub background_color: Option<u8>,
    pub charset: Option<u8>,
    pub validation: Option<u8>,
    pub outlining: Option<u8>,
    pub transparency: Option<u8>,
}

impl ExtendedAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_highlighting(mut self, value: u8) -> Self {
        self.highlighting = Some(value);
        self
    }

    pub fn with_foreground(mut self, color: u8) -> Self {
        self.foreground_color = Some(color);
        self
    }

    pub fn with_background(mut self, color: u8) -> Self {
        self.background_color = Some(color);
        self
    }

    pub fn with_charset(mut self, charset: u8) -> Self {
        self.charset = Some(charset);
        self
    }

    pub fn with_validation(mut self, validation: u8) -> Self {
        self.validation = Some(validation);
        self
    }
}

/// A single screen position. When `field_attr` is `Some`, this cell holds a
/// field-attribute byte rather than displayable data and `char_data` is
/// unused for rendering (the covering field, not this cell, renders here).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Cell {
    pub char_data: u8,
    field_attr: Option<FieldAttrData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct FieldAttrData {
    base_attr: u8,
    extended: ExtendedAttributes,
}

impl Cell {
    pub fn is_field_attribute(&self) -> bool {
        self.field_attr.is_some()
    }
}

/// A field, derived on demand by scanning the cell grid for attribute bytes.
/// Not an independently stored structure: mutating a field means mutating
/// the attribute cell that defines it.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Address of the field-attribute cell itself. Field data begins at
    /// `address + 1` (mod buffer size).
    pub address: u16,
    pub base_attr: u8,
    pub extended: ExtendedAttributes,
    /// Number of data positions belonging to this field, not counting the
    /// attribute cell.
    pub length: usize,
}

impl Field {
    pub fn is_protected(&self) -> bool {
        self.base_attr & ATTR_PROTECTED != 0
    }

    pub fn is_numeric(&self) -> bool {
        self.base_attr & ATTR_NUMERIC != 0
    }

    pub fn is_hidden(&self) -> bool {
        self.base_attr & ATTR_DISPLAY == DISPLAY_HIDDEN
    }

    pub fn is_intensified(&self) -> bool {
        self.base_attr & ATTR_DISPLAY == DISPLAY_INTENSIFIED
    }

    pub fn is_reserved(&self) -> bool {
        self.base_attr & ATTR_RESERVED != 0
    }

    pub fn is_modified(&self) -> bool {
        self.base_attr & ATTR_MDT != 0
    }

    pub fn is_mandatory_fill(&self) -> bool {
        self.extended.validation.is_some_and(|v| v & VALIDATION_MANDATORY_FILL != 0)
    }

    pub fn is_mandatory_entry(&self) -> bool {
        self.extended.validation.is_some_and(|v| v & VALIDATION_MANDATORY_ENTRY != 0)
    }

    pub fn is_trigger(&self) -> bool {
        self.extended.validation.is_some_and(|v| v & VALIDATION_TRIGGER != 0)
    }

    /// First data position of this field (the cell after the attribute byte).
    pub fn data_start(&self, buffer_size: usize) -> u16 {
        ((self.address as usize + 1) % buffer_size) as u16
    }

    pub fn validate_content(&self, content: &[u8]) -> Result<(), String> {
        if self.is_mandatory_fill() {
            if content.len() < self.length {
                return Err("mandatory fill: field is not completely filled".into());
            }
            if content.iter().any(|&ch| ch == 0x00 || ch == 0x40) {
                return Err("mandatory fill: field contains unfilled positions".into());
            }
        }
        if self.is_mandatory_entry() && !content.iter().any(|&ch| ch != 0x00 && ch != 0x40) {
            return Err("mandatory entry: field has no content".into());
        }
        if self.is_numeric() && content.iter().any(|&ch| ch != 0x00 && ch != 0x40 && !(0xF0..=0xF9).contains(&ch)) {
            return Err("numeric field: non-digit content".into());
        }
        Ok(())
    }
}

/// The 3270 screen buffer: cell grid, cursor, and derived field view.
#[derive(Debug)]
pub struct ScreenBuffer {
    size: ScreenSize,
    cells: Vec<Cell>,
    cursor: u16,
    keyboard_locked: bool,
    alarm: bool,
}

impl ScreenBuffer {
    pub fn new(size: ScreenSize) -> Self {
        let len = size.buffer_size();
        Self {
            size,
            cells: vec![Cell::default(); len],
            cursor: 0,
            keyboard_locked: true,
            alarm: false,
        }
    }

    pub fn size(&self) -> ScreenSize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cursor(&self) -> u16 {
        self.cursor
    }

    pub fn set_cursor(&mut self, address: u16) {
        if (address as usize) < self.cells.len() {
            self.cursor = address;
        }
    }

    pub fn cursor_coords(&self) -> (usize, usize) {
        self.size.address_to_coords(self.cursor)
    }

    pub fn is_keyboard_locked(&self) -> bool {
        self.keyboard_locked
    }

    pub fn lock_keyboard(&mut self) {
        self.keyboard_locked = true;
    }

    pub fn unlock_keyboard(&mut self) {
        self.keyboard_locked = false;
    }

    pub fn alarm(&self) -> bool {
        self.alarm
    }

    pub fn set_alarm(&mut self, on: bool) {
        self.alarm = on;
    }

    /// Erase every position and drop all field attributes. Cells become
    /// EBCDIC space (`0x40`), not null: a Read-Buffer taken right after an
    /// Erase/Write must report space bytes, not `0x00`.
    pub fn erase_all(&mut self) {
        for cell in &mut self.cells {
            cell.char_data = EBCDIC_SPACE;
            cell.field_attr = None;
        }
        self.cursor = 0;
    }

    /// Look up the field covering `address`: the nearest field-attribute
    /// cell at or before it, scanning backward with wraparound.
    pub fn field_at(&self, address: u16) -> Option<Field> {
        let len = self.cells.len();
        if len == 0 {
            return None;
        }
        let start = address as usize;
        for back in 0..len {
            let idx = (start + len - back) % len;
            if let Some(attr) = self.cells[idx].field_attr {
                return Some(self.build_field(idx as u16, attr));
            }
        }
        None
    }

    fn build_field(&self, address: u16, attr: FieldAttrData) -> Field {
        let len = self.cells.len();
        let mut distance = len;
        for step in 1..=len {
            let idx = (address as usize + step) % len;
            if self.cells[idx].field_attr.is_some() {
                distance = step - 1;
                break;
            }
        }
        Field {
            address,
            base_attr: attr.base_attr,
            extended: attr.extended,
            length: distance,
        }
    }

    /// All fields on the screen, in ascending address order, derived purely
    /// by scanning the grid.
    pub fn fields(&self) -> Vec<Field> {
        let mut out = Vec::new();
        for (idx, cell) in self.cells.iter().enumerate() {
            if let Some(attr) = cell.field_attr {
                out.push(self.build_field(idx as u16, attr));
            }
        }
        out
    }

    pub fn modified_fields(&self) -> Vec<Field> {
        self.fields().into_iter().filter(|f| f.is_modified()).collect()
    }

    /// Clear the MDT bit on every field (WCC reset-MDT bit).
    pub fn reset_all_mdt(&mut self) {
        for cell in &mut self.cells {
            if let Some(attr) = &mut cell.field_attr {
                attr.base_attr &= !ATTR_MDT;
            }
        }
    }

    /// Define a field attribute at `address`. The attribute cell itself
    /// never holds displayable data.
    pub fn set_field_attribute(&mut self, address: u16, base_attr: u8, extended: ExtendedAttributes) {
        if let Some(cell) = self.cells.get_mut(address as usize) {
            cell.char_data = 0x00;
            cell.field_attr = Some(FieldAttrData { base_attr, extended });
        }
    }

    /// Set or clear MDT on the field covering `address`, mutating the
    /// underlying attribute cell directly (there is no separate table to
    /// fall out of sync).
    fn set_field_modified_at(&mut self, address: u16, modified: bool) {
        let len = self.cells.len();
        if len == 0 {
            return;
        }
        let start = address as usize;
        for back in 0..len {
            let idx = (start + len - back) % len;
            if let Some(attr) = &mut self.cells[idx].field_attr {
                if modified {
                    attr.base_attr |= ATTR_MDT;
                } else {
                    attr.base_attr &= !ATTR_MDT;
                }
                return;
            }
        }
    }

    pub fn read_at(&self, address: u16) -> Option<u8> {
        self.cells.get(address as usize).map(|c| c.char_data)
    }

    pub fn is_field_attribute_at(&self, address: u16) -> bool {
        self.cells.get(address as usize).is_some_and(Cell::is_field_attribute)
    }

    /// Write one byte at `address`. Writes to a field-attribute cell, or to
    /// a protected field's data, are rejected unless `circumvent_protection`
    /// is set. Marks the covering field modified on a successful write to
    /// an unprotected field's data position.
    pub fn write_at(&mut self, address: u16, ch: u8, circumvent_protection: bool) -> Result<(), crate::error::Error> {
        let idx = address as usize;
        if idx >= self.cells.len() {
            return Ok(());
        }
        if self.cells[idx].is_field_attribute() && !circumvent_protection {
            return Err(crate::error::Error::ProtectedViolation { address });
        }
        if !circumvent_protection {
            if let Some(field) = self.field_at(address) {
                if field.is_protected() {
                    return Err(crate::error::Error::ProtectedViolation { address });
                }
            }
        }
        self.cells[idx].char_data = ch;
        if !self.cells[idx].is_field_attribute() {
            self.set_field_modified_at(address, true);
        }
        Ok(())
    }

    /// Write one byte at `address` the way a host Write order does:
    /// unconditionally, bypassing protection, and without marking the
    /// covering field modified. MDT reflects user data entry only, never
    /// the host's own painting of the screen.
    pub fn paint_at(&mut self, address: u16, ch: u8) {
        if let Some(cell) = self.cells.get_mut(address as usize) {
            cell.char_data = ch;
        }
    }

    /// Write at the cursor and advance it by one position, wrapping.
    pub fn write_char(&mut self, ch: u8, circumvent_protection: bool) -> Result<(), crate::error::Error> {
        let addr = self.cursor;
        self.write_at(addr, ch, circumvent_protection)?;
        self.cursor = ((addr as usize + 1) % self.cells.len()) as u16;
        Ok(())
    }

    /// Repeat `ch` from the cursor up to (but not including) `target_address`,
    /// wrapping circularly if the target precedes the cursor, then leave the
    /// cursor at the target. Matches real 3270 RA semantics: the stop
    /// address itself is never filled, it becomes the next write position.
    /// When `target_address` equals the cursor, the whole buffer is filled
    /// once around: `target == current` is a full `N`-cell wrap, not a
    /// no-op.
    pub fn repeat_to_address(&mut self, ch: u8, target_address: u16) {
        let len = self.cells.len();
        if len == 0 {
            return;
        }
        let mut addr = self.cursor as usize;
        loop {
            self.cells[addr].char_data = ch;
            self.cells[addr].field_attr = None;
            addr = (addr + 1) % len;
            if addr == target_address as usize {
                break;
            }
        }
        self.cursor = target_address;
    }

    /// Erase unprotected positions from the cursor up to (but not including)
    /// `target_address`, wrapping circularly, then leave the cursor at the
    /// target. Field-attribute cells and positions inside protected fields
    /// are left untouched.
    pub fn erase_unprotected_to_address(&mut self, target_address: u16) {
        let len = self.cells.len();
        if len == 0 {
            return;
        }
        let mut addr = self.cursor as usize;
        while addr != target_address as usize {
            if !self.cells[addr].is_field_attribute() {
                let protected = self.field_at(addr as u16).is_some_and(|f| f.is_protected());
                if !protected {
                    self.cells[addr].char_data = EBCDIC_SPACE;
                }
            }
            addr = (addr + 1) % len;
        }
        self.cursor = target_address;
    }

    /// Clear every unprotected field's data and reset its MDT bit.
    pub fn erase_all_unprotected(&mut self) {
        let fields = self.fields();
        for field in fields {
            if field.is_protected() {
                continue;
            }
            let start = field.data_start(self.cells.len()) as usize;
            for offset in 0..field.length {
                let idx = (start + offset) % self.cells.len();
                self.cells[idx].char_data = EBCDIC_SPACE;
            }
            self.set_field_modified_at(field.address, false);
        }
        self.cursor = 0;
    }

    /// Locate the next unprotected field's first data position after the
    /// cursor, wrapping around the screen once.
    pub fn find_next_unprotected_field(&self) -> Option<u16> {
        let len = self.cells.len();
        for offset in 1..=len {
            let idx = (self.cursor as usize + offset) % len;
            if let Some(attr) = self.cells[idx].field_attr {
                let field = self.build_field(idx as u16, attr);
                if !field.is_protected() {
                    return Some(field.data_start(len));
                }
            }
        }
        None
    }

    pub fn tab_to_next_field(&mut self) -> bool {
        match self.find_next_unprotected_field() {
            Some(addr) => {
                self.cursor = addr;
                true
            }
            None => false,
        }
    }

    /// Render one row as text, decoding EBCDIC and showing a space for
    /// field-attribute cells and any unmapped character.
    pub fn row_text(&self, row: usize, codepage: &CodePage) -> Option<String> {
        if row >= self.size.rows() {
            return None;
        }
        let cols = self.size.cols();
        let start = row * cols;
        let mut out = String::with_capacity(cols);
        for cell in &self.cells[start..start + cols] {
            if cell.is_field_attribute() {
                out.push(' ');
            } else {
                let ch = codepage.decode(cell.char_data);
                out.push(if ch.is_ascii_graphic() || ch == ' ' { ch } else { ' ' });
            }
        }
        Some(out)
    }

    pub fn raw_bytes(&self) -> Vec<u8> {
        self.cells.iter().map(|c| c.char_data).collect()
    }
}

/// Buffer-address encoding per the 3270 data stream. Decoding mode is
/// selected per call from the top two bits of the first address byte, not
/// from a fixed session-wide flag.
///
/// `00` or `11` selects 14-bit addressing (`addr = ((byte0 & 0x3F) << 8) | byte1`),
/// `01` or `10` selects 12-bit addressing (`addr = ((byte0 & 0x3F) << 6) |
/// (byte1 & 0x3F)`) — plain bit masking on both bytes, not the 6-bit
/// printable-code translation table real 3270 terminals use on a
/// non-binary-safe line. `encode_12bit`/`encode_14bit` mirror that: they set
/// the top two bits to select the matching mode on decode and otherwise
/// leave the rest of each byte as a plain bit field.
pub mod addressing {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum AddressMode {
        TwelveBit,
        FourteenBit,
    }

    /// Inspect the top two bits of the first address byte: `01`/`10` select
    /// 12-bit addressing, `00`/`11` select 14-bit.
    pub fn mode_of(byte1: u8) -> AddressMode {
        match byte1 & 0xC0 {
            0x40 | 0x80 => AddressMode::TwelveBit,
            _ => AddressMode::FourteenBit,
        }
    }

    pub fn decode(byte1: u8, byte2: u8) -> u16 {
        match mode_of(byte1) {
            AddressMode::TwelveBit => decode_12bit(byte1, byte2),
            AddressMode::FourteenBit => decode_14bit(byte1, byte2),
        }
    }

    pub fn decode_12bit(byte1: u8, byte2: u8) -> u16 {
        (((byte1 & 0x3F) as u16) << 6) | ((byte2 & 0x3F) as u16)
    }

    pub fn decode_14bit(byte1: u8, byte2: u8) -> u16 {
        (((byte1 & 0x3F) as u16) << 8) | byte2 as u16
    }

    /// Encode for 12-bit addressing: top bits of `byte1` set to `01` so
    /// `mode_of` selects `TwelveBit` on decode.
    pub fn encode_12bit(address: u16) -> (u8, u8) {
        let high = ((address >> 6) & 0x3F) as u8 | 0x40;
        let low = (address & 0x3F) as u8;
        (high, low)
    }

    /// Encode for 14-bit addressing: top bits of `byte1` left clear (`00`)
    /// so `mode_of` selects `FourteenBit` on decode.
    pub fn encode_14bit(address: u16) -> (u8, u8) {
        (((address >> 8) & 0x3F) as u8, (address & 0xFF) as u8)
    }
}
