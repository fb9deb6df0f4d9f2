//! Public operations surface: named actions dispatched over a screen buffer
//! (C7).
//!
//! Grounded on the donor's `lib3270::codes::AidKey` enum/match idiom,
//! generalized against the s3270-style dynamic command table: an enum of
//! actions plus a pure function from `(action, session_state) -> effect`.
//! [`Action`] is that enum;
//! [`dispatch`] is that pure function — it borrows the buffer mutably for
//! the duration of the call and never talks to the network directly. A
//! [`Session`](crate::session::Session) turns an [`Effect::Aid`] into bytes
//! on the wire using [`crate::datastream::DataStreamProcessor`].

use crate::buffer::ScreenBuffer;
use crate::codes::AidKey;
use crate::ebcdic::CodePage;
use crate::error::Error;

/// Session-scoped mode flags. These reset at each `connect`; they do not
/// persist across reconnects.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionMode {
    pub insert_mode: bool,
    pub circumvent_protection: bool,
}

/// A named operation from the classic s3270 scripting surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Enter,
    Pf(u8),
    Pa(u8),
    Clear,
    SysReq,
    Reset,
    CursorUp,
    CursorDown,
    CursorLeft,
    CursorRight,
    Tab,
    BackTab,
    Newline,
    Home,
    EndOfField,
    NextWord,
    PrevWord,
    InsertText(String),
    DeleteChar,
    EraseEof,
    EraseInput,
    ToggleInsertMode,
    ToggleCircumventProtection,
}

/// What dispatching an action produced. Only the AID-bearing variant needs
/// anything sent to the host; everything else is a local buffer edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Build and send an inbound transmission for this AID.
    Aid(AidKey),
    /// The buffer was mutated locally; nothing goes to the host.
    BufferChanged,
    /// Nothing observable happened (e.g. cursor already at a screen edge).
    None,
}

/// Apply one action to `buffer`, honouring `mode`'s protection/insert flags.
/// Pure: no I/O, no borrow of anything outside `buffer` and `mode`.
pub fn dispatch(
    action: &Action,
    buffer: &mut ScreenBuffer,
    mode: &mut SessionMode,
    codepage: &CodePage,
) -> Result<Effect, Error> {
    match action {
        Action::Enter => Ok(Effect::Aid(AidKey::Enter)),
        Action::Pf(n) => AidKey::pf(*n).map(Effect::Aid).ok_or(Error::DataStream(
            crate::error::DataStreamError::Unknown { order_or_command: *n, context: "PF key number" },
        )),
        Action::Pa(n) => AidKey::pa(*n).map(Effect::Aid).ok_or(Error::DataStream(
            crate::error::DataStreamError::Unknown { order_or_command: *n, context: "PA key number" },
        )),
        Action::Clear => {
            buffer.erase_all();
            buffer.unlock_keyboard();
            Ok(Effect::Aid(AidKey::Clear))
        }
        Action::SysReq => Ok(Effect::Aid(AidKey::SysReq)),
        Action::Reset => {
            buffer.unlock_keyboard();
            buffer.set_alarm(false);
            Ok(Effect::BufferChanged)
        }
        Action::CursorUp => {
            move_cursor(buffer, -(buffer.size().cols() as isize));
            Ok(Effect::BufferChanged)
        }
        Action::CursorDown => {
            move_cursor(buffer, buffer.size().cols() as isize);
            Ok(Effect::BufferChanged)
        }
        Action::CursorLeft => {
            move_cursor(buffer, -1);
            Ok(Effect::BufferChanged)
        }
        Action::CursorRight => {
            move_cursor(buffer, 1);
            Ok(Effect::BufferChanged)
        }
        Action::Tab => {
            buffer.tab_to_next_field();
            Ok(Effect::BufferChanged)
        }
        Action::BackTab => {
            back_tab(buffer);
            Ok(Effect::BufferChanged)
        }
        Action::Newline => {
            let cols = buffer.size().cols();
            let row = buffer.cursor_coords().0;
            let next_row = (row + 1) % buffer.size().rows();
            buffer.set_cursor((next_row * cols) as u16);
            Ok(Effect::BufferChanged)
        }
        Action::Home => {
            buffer.set_cursor(0);
            Ok(Effect::BufferChanged)
        }
        Action::EndOfField => {
            if let Some(field) = buffer.field_at(buffer.cursor()) {
                let end = (field.data_start(buffer.len()) as usize + field.length.saturating_sub(1)) % buffer.len();
                buffer.set_cursor(end as u16);
            }
            Ok(Effect::BufferChanged)
        }
        Action::NextWord => {
            next_word(buffer, codepage);
            Ok(Effect::BufferChanged)
        }
        Action::PrevWord => {
            prev_word(buffer, codepage);
            Ok(Effect::BufferChanged)
        }
        Action::InsertText(text) => {
            insert_text(buffer, mode, codepage, text)?;
            Ok(Effect::BufferChanged)
        }
        Action::DeleteChar => {
            buffer.write_at(buffer.cursor(), 0x00, mode.circumvent_protection)?;
            Ok(Effect::BufferChanged)
        }
        Action::EraseEof => {
            if let Some(field) = buffer.field_at(buffer.cursor()) {
                let end = (field.data_start(buffer.len()) as usize + field.length) % buffer.len();
                buffer.erase_unprotected_to_address(end as u16);
            }
            Ok(Effect::BufferChanged)
        }
        Action::EraseInput => {
            buffer.erase_all_unprotected();
            Ok(Effect::BufferChanged)
        }
        Action::ToggleInsertMode => {
            mode.insert_mode = !mode.insert_mode;
            Ok(Effect::None)
        }
        Action::ToggleCircumventProtection => {
            mode.circumvent_protection = !mode.circumvent_protection;
            Ok(Effect::None)
        }
    }
}

/// Insert `text` at the cursor, honouring field protection: when the cursor
/// sits in (or steps into) a protected field and `circumvent_protection` is
/// not set, skip forward to the next unprotected field's first position
/// before continuing.
fn insert_text(buffer: &mut ScreenBuffer, mode: &SessionMode, codepage: &CodePage, text: &str) -> Result<(), Error> {
    for ch in text.chars() {
        let byte = codepage.encode(ch).unwrap_or(0x40);
        loop {
            match buffer.write_at(buffer.cursor(), byte, mode.circumvent_protection) {
                Ok(()) => {
                    let next = (buffer.cursor() as usize + 1) % buffer.len();
                    buffer.set_cursor(next as u16);
                    break;
                }
                Err(Error::ProtectedViolation { .. }) if !mode.circumvent_protection => {
                    match buffer.find_next_unprotected_field() {
                        Some(addr) => buffer.set_cursor(addr),
                        None => return Ok(()),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(())
}

fn move_cursor(buffer: &mut ScreenBuffer, delta: isize) {
    let len = buffer.len() as isize;
    let current = buffer.cursor() as isize;
    let next = (((current + delta) % len) + len) % len;
    buffer.set_cursor(next as u16);
}

fn back_tab(buffer: &mut ScreenBuffer) {
    let len = buffer.len();
    if len == 0 {
        return;
    }
    let start = buffer.cursor() as usize;
    for offset in 1..=len {
        let idx = (start + len - offset) % len;
        if let Some(field) = buffer.field_at(idx as u16) {
            if field.address as usize == idx && !field.is_protected() {
                buffer.set_cursor(field.data_start(len));
                return;
            }
        }
    }
}

fn next_word(buffer: &mut ScreenBuffer, codepage: &CodePage) {
    let len = buffer.len();
    if len == 0 {
        return;
    }
    let start = buffer.cursor() as usize;
    let mut idx = start;
    let mut seen_space = false;
    for _ in 0..len {
        idx = (idx + 1) % len;
        let is_space = buffer.read_at(idx as u16).map(|b| codepage.decode(b) == ' ').unwrap_or(true);
        if seen_space && !is_space {
            buffer.set_cursor(idx as u16);
            return;
        }
        seen_space = seen_space || is_space;
    }
}

fn prev_word(buffer: &mut ScreenBuffer, codepage: &CodePage) {
    let len = buffer.len();
    if len == 0 {
        return;
    }
    let start = buffer.cursor() as usize;
    let mut idx = start;
    let mut seen_nonspace = false;
    for _ in 0..len {
        idx = (idx + len - 1) % len;
        let is_space = buffer.read_at(idx as u16).map(|b| codepage.decode(b) == ' ').unwrap_or(true);
        if seen_nonspace && is_space {
            buffer.set_cursor(((idx + 1) % len) as u16);
            return;
        }
        seen_nonspace = seen_nonspace || !is_space;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{ExtendedAttributes, ScreenSize};
    use crate::codes::ATTR_PROTECTED;

    fn cp() -> &'static CodePage {
        CodePage::cp037()
    }

    #[test]
    fn enter_produces_aid_effect_without_mutating_buffer() {
        let mut buf = ScreenBuffer::new(ScreenSize::Model2);
        let mut mode = SessionMode::default();
        let effect = dispatch(&Action::Enter, &mut buf, &mut mode, cp()).unwrap();
        assert_eq!(effect, Effect::Aid(AidKey::Enter));
    }

    #[test]
    fn insert_text_skips_protected_field() {
        let mut buf = ScreenBuffer::new(ScreenSize::Model2);
        buf.set_field_attribute(0, ATTR_PROTECTED, ExtendedAttributes::default());
        buf.set_field_attribute(6, 0, ExtendedAttributes::default());
        buf.set_cursor(1);
        let mut mode = SessionMode::default();
        dispatch(&Action::InsertText("AB".to_string()), &mut buf, &mut mode, cp()).unwrap();
        assert_eq!(buf.read_at(7), Some(cp().encode('A').unwrap()));
        assert_eq!(buf.read_at(8), Some(cp().encode('B').unwrap()));
    }

    #[test]
    fn insert_text_circumvent_protection_writes_into_protected_cell() {
        let mut buf = ScreenBuffer::new(ScreenSize::Model2);
        buf.set_field_attribute(0, ATTR_PROTECTED, ExtendedAttributes::default());
        buf.set_cursor(1);
        let mut mode = SessionMode { circumvent_protection: true, ..Default::default() };
        dispatch(&Action::InsertText("X".to_string()), &mut buf, &mut mode, cp()).unwrap();
        assert_eq!(buf.read_at(1), Some(cp().encode('X').unwrap()));
    }

    #[test]
    fn cursor_movement_wraps_at_buffer_edges() {
        let mut buf = ScreenBuffer::new(ScreenSize::Model2);
        let mut mode = SessionMode::default();
        buf.set_cursor(0);
        dispatch(&Action::CursorLeft, &mut buf, &mut mode, cp()).unwrap();
        assert_eq!(buf.cursor(), (buf.len() - 1) as u16);
        dispatch(&Action::CursorRight, &mut buf, &mut mode, cp()).unwrap();
        assert_eq!(buf.cursor(), 0);
    }

    #[test]
    fn clear_action_erases_buffer_and_unlocks_keyboard() {
        let mut buf = ScreenBuffer::new(ScreenSize::Model2);
        buf.write_at(0, 0xC1, true).unwrap();
        buf.lock_keyboard();
        let mut mode = SessionMode::default();
        let effect = dispatch(&Action::Clear, &mut buf, &mut mode, cp()).unwrap();
        assert_eq!(effect, Effect::Aid(AidKey::Clear));
        assert_eq!(buf.read_at(0), Some(0x00));
        assert!(!buf.is_keyboard_locked());
    }

    #[test]
    fn erase_eof_clears_through_the_last_cell_of_the_field() {
        let mut buf = ScreenBuffer::new(ScreenSize::Model2);
        buf.set_field_attribute(0, 0, ExtendedAttributes::default());
        buf.write_at(1, 0xC1, false).unwrap();
        buf.write_at(2, 0xC2, false).unwrap();
        buf.write_at(3, 0xC3, false).unwrap();
        buf.set_field_attribute(4, 0, ExtendedAttributes::default());
        buf.set_cursor(2);
        let mut mode = SessionMode::default();
        dispatch(&Action::EraseEof, &mut buf, &mut mode, cp()).unwrap();
        assert_eq!(buf.read_at(1), Some(0xC1), "before the cursor is untouched");
        assert_eq!(buf.read_at(2), Some(0x00));
        assert_eq!(buf.read_at(3), Some(0x00), "last cell of the field is erased too");
    }

    #[test]
    fn toggle_flags_do_not_touch_buffer() {
        let mut buf = ScreenBuffer::new(ScreenSize::Model2);
        let mut mode = SessionMode::default();
        dispatch(&Action::ToggleInsertMode, &mut buf, &mut mode, cp()).unwrap();
        assert!(mode.insert_mode);
        dispatch(&Action::ToggleCircumventProtection, &mut buf, &mut mode, cp()).unwrap();
        assert!(mode.circumvent_protection);
    }
}
