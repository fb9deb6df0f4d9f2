//! 3270 data-stream parser and encoder (C3).
//!
//! Grounded on the donor's `lib3270::protocol::{ProtocolProcessor3270,
//! DataStreamParser}`: command/order dispatch, WCC bit handling, and the
//! read-buffer/read-modified response shape are all carried over. Three
//! gaps are closed relative to the donor:
//!
//! - Buffer addressing mode is decided per SBA/RA/EUA call from the address
//!   bytes themselves ([`crate::buffer::addressing::mode_of`]), not from a
//!   single `use_14bit_addressing` flag fixed for the whole processor.
//! - SA (Set Attribute) and MF (Modify Field) actually mutate the field
//!   covering the current position instead of being parsed and discarded.
//! - IC (Insert Cursor) records the position for the write in progress and
//!   applies it once the write completes, instead of being a no-op.

use crate::buffer::{addressing, ExtendedAttributes, ScreenBuffer};
use crate::codes::*;
use crate::error::{DataStreamError, Error};

/// What the host asked for once the current Write/WSF command finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingRead {
    None,
    ReadBuffer,
    ReadModified,
    ReadModifiedAll,
    /// A pre-built response transmission a structured field produced (e.g.
    /// a Query Reply answering Read Partition Query), sent back verbatim.
    StructuredField(Vec<u8>),
}

/// Parses one inbound data-stream transmission against a screen buffer.
pub struct DataStreamProcessor;

impl DataStreamProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Process one complete host-to-terminal transmission (the payload of a
    /// single TN3270E DATA record, stripped of its header).
    pub fn process(&mut self, buffer: &mut ScreenBuffer, data: &[u8]) -> Result<PendingRead, Error> {
        if data.is_empty() {
            return Ok(PendingRead::None);
        }
        let mut parser = Parser { data, pos: 0, sf_response: Vec::new() };
        parser.parse(buffer)
    }

    /// Build the inbound transmission for Read Buffer: AID, cursor address,
    /// then every cell verbatim.
    pub fn read_buffer_response(&self, buffer: &ScreenBuffer, aid: AidKey) -> Vec<u8> {
        let mut out = vec![aid.to_u8()];
        push_address(&mut out, buffer.cursor(), buffer.len());
        out.extend(buffer.raw_bytes());
        out
    }

    /// Build the inbound transmission for Read Modified / Read Modified
    /// All: AID, cursor address, then one SBA + field bytes per modified
    /// field (trailing nulls trimmed, matching what a real 3270 omits).
    pub fn read_modified_response(&self, buffer: &ScreenBuffer, aid: AidKey) -> Vec<u8> {
        let mut out = vec![aid.to_u8()];
        push_address(&mut out, buffer.cursor(), buffer.len());
        for field in buffer.modified_fields() {
            let start = field.data_start(buffer.len());
            let mut content = Vec::with_capacity(field.length);
            for offset in 0..field.length {
                let addr = (start as usize + offset) % buffer.len();
                content.push(buffer.read_at(addr as u16).unwrap_or(0x00));
            }
            while content.last() == Some(&0x00) {
                content.pop();
            }
            if content.is_empty() {
                continue;
            }
            out.push(ORDER_SBA);
            push_address(&mut out, start, buffer.len());
            out.extend(content);
        }
        out
    }
}

impl Default for DataStreamProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn push_address(out: &mut Vec<u8>, address: u16, buffer_len: usize) {
    let (b1, b2) = if buffer_len > 4096 {
        addressing::encode_14bit(address)
    } else {
        addressing::encode_12bit(address)
    };
    out.push(b1);
    out.push(b2);
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
    /// Bytes a structured field queued up to send back to the host (e.g. a
    /// Query Reply), accumulated across every WSF in this transmission.
    sf_response: Vec<u8>,
}

impl<'a> Parser<'a> {
    fn parse(&mut self, buffer: &mut ScreenBuffer) -> Result<PendingRead, Error> {
        let cmd_byte = self.next_byte("command")?;
        let command = CommandCode::from_u8(cmd_byte).ok_or(Error::DataStream(DataStreamError::Unknown {
            order_or_command: cmd_byte,
            context: "command",
        }))?;

        match command {
            CommandCode::Nop => Ok(PendingRead::None),
            CommandCode::Write => {
                self.process_write(buffer)?;
                Ok(PendingRead::None)
            }
            CommandCode::EraseWrite | CommandCode::EraseWriteAlternate => {
                buffer.erase_all();
                self.process_write(buffer)?;
                Ok(PendingRead::None)
            }
            CommandCode::ReadBuffer => Ok(PendingRead::ReadBuffer),
            CommandCode::ReadModified => Ok(PendingRead::ReadModified),
            CommandCode::ReadModifiedAll => Ok(PendingRead::ReadModifiedAll),
            CommandCode::EraseAllUnprotected => {
                buffer.erase_all_unprotected();
                buffer.unlock_keyboard();
                Ok(PendingRead::None)
            }
            CommandCode::WriteStructuredField => {
                self.process_wsf(buffer)?;
                if self.sf_response.is_empty() {
                    Ok(PendingRead::None)
                } else {
                    Ok(PendingRead::StructuredField(std::mem::take(&mut self.sf_response)))
                }
            }
        }
    }

    fn next_byte(&mut self, context: &'static str) -> Result<u8, Error> {
        let b = *self.data.get(self.pos).ok_or(Error::DataStream(DataStreamError::Truncated { at: self.pos }))?;
        let _ = context;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if self.pos + n > self.data.len() {
            return Err(Error::DataStream(DataStreamError::Truncated { at: self.pos }));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_address(&mut self) -> Result<u16, Error> {
        let bytes = self.take(2)?;
        Ok(addressing::decode(bytes[0], bytes[1]))
    }

    fn process_write(&mut self, buffer: &mut ScreenBuffer) -> Result<(), Error> {
        buffer.lock_keyboard();
        let wcc = self.next_byte("WCC")?;

        if wcc & WCC_RESET != 0 {
            // Reset establishes the unlocked, alarm-off baseline the other
            // WCC bits below then apply on top of.
            buffer.set_alarm(false);
            buffer.unlock_keyboard();
        }
        if wcc & WCC_ALARM != 0 {
            buffer.set_alarm(true);
        }
        if wcc & WCC_RESTORE != 0 {
            buffer.unlock_keyboard();
        }
        if wcc & WCC_RESET_MDT != 0 {
            buffer.reset_all_mdt();
        }

        let mut insert_cursor_at: Option<u16> = None;

        while self.pos < self.data.len() {
            let byte = self.data[self.pos];
            if let Some(order) = OrderCode::from_u8(byte) {
                self.pos += 1;
                self.process_order(order, buffer, &mut insert_cursor_at)?;
            } else {
                self.pos += 1;
                // The host paints unconditionally and never sets MDT: only
                // user data entry does.
                buffer.paint_at(buffer.cursor(), byte);
                let next = (buffer.cursor() as usize + 1) % buffer.len();
                buffer.set_cursor(next as u16);
            }
        }

        if let Some(addr) = insert_cursor_at {
            buffer.set_cursor(addr);
        }
        Ok(())
    }

    fn process_order(
        &mut self,
        order: OrderCode,
        buffer: &mut ScreenBuffer,
        insert_cursor_at: &mut Option<u16>,
    ) -> Result<(), Error> {
        match order {
            OrderCode::StartField => {
                let attr = self.next_byte("SF attribute")?;
                let addr = buffer.cursor();
                buffer.set_field_attribute(addr, attr, ExtendedAttributes::default());
                buffer.set_cursor(((addr as usize + 1) % buffer.len()) as u16);
            }
            OrderCode::StartFieldExtended => {
                let (base_attr, extended) = self.parse_attribute_pairs()?;
                let addr = buffer.cursor();
                buffer.set_field_attribute(addr, base_attr, extended);
                buffer.set_cursor(((addr as usize + 1) % buffer.len()) as u16);
            }
            OrderCode::SetBufferAddress => {
                let addr = self.read_address()?;
                buffer.set_cursor(addr);
            }
            OrderCode::SetAttribute => {
                // SA applies to the field covering the current position: a
                // field-granularity simplification of the character-level
                // attribute 3270 terminals support, sufficient for a single
                // cell-grid buffer with no per-character attribute storage.
                let attr_type = self.next_byte("SA type")?;
                let attr_value = self.next_byte("SA value")?;
                apply_single_attribute(buffer, attr_type, attr_value);
            }
            OrderCode::ModifyField => {
                let (_base_attr, extended) = self.parse_attribute_pairs()?;
                if let Some(field) = buffer.field_at(buffer.cursor()) {
                    buffer.set_field_attribute(field.address, field.base_attr, extended);
                }
            }
            OrderCode::InsertCursor => {
                *insert_cursor_at = Some(buffer.cursor());
            }
            OrderCode::ProgramTab => {
                buffer.tab_to_next_field();
            }
            OrderCode::RepeatToAddress => {
                let target = self.read_address()?;
                let ch = self.next_byte("RA character")?;
                buffer.repeat_to_address(ch, target);
            }
            OrderCode::EraseUnprotectedToAddress => {
                let target = self.read_address()?;
                buffer.erase_unprotected_to_address(target);
            }
            OrderCode::GraphicEscape => {
                let ch = self.next_byte("GE character")?;
                buffer.paint_at(buffer.cursor(), ch);
                let next = (buffer.cursor() as usize + 1) % buffer.len();
                buffer.set_cursor(next as u16);
            }
        }
        Ok(())
    }

    /// Shared SFE/MF attribute-pair parser: count byte, then `count`
    /// (type, value) pairs. `XA_3270` carries the base field-attribute byte.
    fn parse_attribute_pairs(&mut self) -> Result<(u8, ExtendedAttributes), Error> {
        let count = self.next_byte("attribute count")? as usize;
        let mut base_attr = 0u8;
        let mut extended = ExtendedAttributes::default();
        for _ in 0..count {
            let pair = self.take(2)?;
            let (attr_type, attr_value) = (pair[0], pair[1]);
            match attr_type {
                XA_3270 => base_attr = attr_value,
                XA_HIGHLIGHTING => extended.highlighting = Some(attr_value),
                XA_FOREGROUND => extended.foreground_color = Some(attr_value),
                XA_BACKGROUND => extended.background_color = Some(attr_value),
                XA_CHARSET => extended.charset = Some(attr_value),
                XA_VALIDATION => extended.validation = Some(attr_value),
                XA_OUTLINING => extended.outlining = Some(attr_value),
                XA_TRANSPARENCY => extended.transparency = Some(attr_value),
                _ => {}
            }
        }
        Ok((base_attr, extended))
    }

    fn process_wsf(&mut self, buffer: &mut ScreenBuffer) -> Result<(), Error> {
        while self.pos < self.data.len() {
            let header = self.take(2)?;
            let length = u16::from_be_bytes([header[0], header[1]]) as usize;
            if length < 3 {
                return Err(Error::DataStream(DataStreamError::Truncated { at: self.pos }));
            }
            let sfid = self.next_byte("SF id")?;
            let remaining = length - 3;
            let sf_data = self.take(remaining)?;
            self.process_structured_field(sfid, sf_data, buffer)?;
        }
        Ok(())
    }

    /// `sf_data` is the structured field's payload, after its length prefix
    /// and id byte. Unknown structured fields are skipped using the
    /// self-described length prefix alone.
    fn process_structured_field(&mut self, sfid: u8, sf_data: &[u8], buffer: &mut ScreenBuffer) -> Result<(), Error> {
        match sfid {
            SFID_ERASE_RESET => buffer.erase_all(),
            SFID_READ_PARTITION_QUERY => {
                self.sf_response.extend(build_query_reply(buffer));
            }
            SFID_OUTBOUND_3270DS => {
                // Payload is [partition id][WCC][orders...]: process the
                // embedded stream the way a Write command's payload is
                // processed, past the partition id byte.
                let inner = sf_data.get(1..).ok_or(Error::DataStream(DataStreamError::Truncated { at: self.pos }))?;
                let mut nested = Parser { data: inner, pos: 0, sf_response: Vec::new() };
                nested.process_write(buffer)?;
            }
            // Set Reply Mode selects how Read Modified output is framed;
            // this core only ever produces the one format `read_modified_
            // response` builds, so the request is acknowledged implicitly
            // by not erroring.
            SFID_SET_REPLY_MODE | SFID_QUERY_REPLY => {}
            _ => {}
        }
        Ok(())
    }
}

/// Build the Query Reply structured field answering Read Partition Query:
/// usable-area device characteristics (rows, columns) derived from the
/// buffer's own geometry.
fn build_query_reply(buffer: &ScreenBuffer) -> Vec<u8> {
    let size = buffer.size();
    let mut sf = vec![0u8, 0u8, SFID_QUERY_REPLY, QCODE_USABLE_AREA];
    sf.extend((size.rows() as u16).to_be_bytes());
    sf.extend((size.cols() as u16).to_be_bytes());
    let len = (sf.len() as u16).to_be_bytes();
    sf[0] = len[0];
    sf[1] = len[1];
    sf
}

fn apply_single_attribute(buffer: &mut ScreenBuffer, attr_type: u8, attr_value: u8) {
    let Some(field) = buffer.field_at(buffer.cursor()) else {
        return;
    };
    let mut extended = field.extended;
    match attr_type {
        XA_HIGHLIGHTING => extended.highlighting = Some(attr_value),
        XA_FOREGROUND => extended.foreground_color = Some(attr_value),
        XA_BACKGROUND => extended.background_color = Some(attr_value),
        XA_CHARSET => extended.charset = Some(attr_value),
        XA_VALIDATION => extended.validation = Some(attr_value),
        XA_OUTLINING => extended.outlining = Some(attr_value),
        XA_TRANSPARENCY => extended.transparency = Some(attr_value),
        _ => return,
    }
    buffer.set_field_attribute(field.address, field.base_attr, extended);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ScreenSize;

    fn new_buffer() -> ScreenBuffer {
        ScreenBuffer::new(ScreenSize::Model2)
    }

    #[test]
    fn write_command_unlocks_on_restore() {
        let mut buf = new_buffer();
        let mut proc = DataStreamProcessor::new();
        let data = vec![CMD_WRITE, WCC_RESTORE, 0xC1, 0xC2];
        let result = proc.process(&mut buf, &data).unwrap();
        assert_eq!(result, PendingRead::None);
        assert!(!buf.is_keyboard_locked());
        assert_eq!(buf.read_at(0), Some(0xC1));
        assert_eq!(buf.read_at(1), Some(0xC2));
    }

    #[test]
    fn erase_write_clears_buffer_first() {
        let mut buf = new_buffer();
        buf.write_at(0, 0xC1, true).unwrap();
        let mut proc = DataStreamProcessor::new();
        let data = vec![CMD_ERASE_WRITE, 0x00];
        proc.process(&mut buf, &data).unwrap();
        assert_eq!(buf.read_at(0), Some(0x40), "erased cells are EBCDIC space, not null");
        assert_eq!(buf.cursor(), 0);
    }

    #[test]
    fn sba_then_sf_places_field_and_advances_cursor() {
        let mut buf = new_buffer();
        let mut proc = DataStreamProcessor::new();
        let (b1, b2) = addressing::encode_12bit(100);
        let data = vec![CMD_WRITE, 0x00, ORDER_SBA, b1, b2, ORDER_SF, ATTR_PROTECTED];
        proc.process(&mut buf, &data).unwrap();
        assert_eq!(buf.cursor(), 101);
        assert!(buf.field_at(100).unwrap().is_protected());
    }

    #[test]
    fn read_modified_response_includes_only_dirty_fields() {
        let mut buf = new_buffer();
        buf.set_field_attribute(0, 0, ExtendedAttributes::default());
        buf.write_at(1, 0xC1, false).unwrap();
        let proc = DataStreamProcessor::new();
        let resp = proc.read_modified_response(&buf, AidKey::Enter);
        assert_eq!(resp[0], AID_ENTER);
        assert!(resp.contains(&ORDER_SBA));
        assert!(resp.contains(&0xC1));
    }

    #[test]
    fn unknown_command_reports_unknown_error() {
        let mut buf = new_buffer();
        let mut proc = DataStreamProcessor::new();
        let result = proc.process(&mut buf, &[0xAA]);
        assert!(matches!(result, Err(Error::DataStream(DataStreamError::Unknown { order_or_command: 0xAA, .. }))));
    }

    #[test]
    fn truncated_write_reports_truncated_error() {
        let mut buf = new_buffer();
        let mut proc = DataStreamProcessor::new();
        let result = proc.process(&mut buf, &[CMD_WRITE]);
        assert!(matches!(result, Err(Error::DataStream(DataStreamError::Truncated { .. }))));
    }

    #[test]
    fn insert_cursor_order_repositions_cursor_after_write() {
        let mut buf = new_buffer();
        let mut proc = DataStreamProcessor::new();
        let (b1, b2) = addressing::encode_12bit(50);
        let data = vec![CMD_WRITE, 0x00, ORDER_SBA, b1, b2, ORDER_IC, 0xC1];
        proc.process(&mut buf, &data).unwrap();
        assert_eq!(buf.cursor(), 50);
    }
}
