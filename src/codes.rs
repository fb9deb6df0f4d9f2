//! 3270 protocol byte constants and their enum views (C3/C6 shared vocabulary).
//!
//! Reused near verbatim from the donor's `lib3270::codes` — this table of
//! constants needed no semantic change, only a new home outside the
//! 5250-and-3270 dual-protocol tree this crate doesn't carry forward.
//!
//! # References
//! - RFC 1576/1646/2355 (TN3270/TN3270E)
//! - IBM 3270 Data Stream Programmer's Reference (GA23-0059)

/// 3270 command codes, first byte of an outbound-from-host stream.
pub const CMD_WRITE: u8 = 0x01;
pub const CMD_READ_BUFFER: u8 = 0x02;
pub const CMD_NOP: u8 = 0x03;
pub const CMD_ERASE_WRITE: u8 = 0x05;
pub const CMD_READ_MODIFIED: u8 = 0x06;
pub const CMD_ERASE_WRITE_ALTERNATE: u8 = 0x0D;
pub const CMD_READ_MODIFIED_ALL: u8 = 0x0E;
pub const CMD_ERASE_ALL_UNPROTECTED: u8 = 0x0F;
pub const CMD_WRITE_STRUCTURED_FIELD: u8 = 0x11;

/// Orders embedded in a Write/Erase-Write payload.
pub const ORDER_PT: u8 = 0x05;
pub const ORDER_GE: u8 = 0x08;
pub const ORDER_SBA: u8 = 0x11;
pub const ORDER_EUA: u8 = 0x12;
pub const ORDER_IC: u8 = 0x13;
pub const ORDER_SF: u8 = 0x1D;
pub const ORDER_SA: u8 = 0x28;
pub const ORDER_SFE: u8 = 0x29;
pub const ORDER_MF: u8 = 0x2C;
pub const ORDER_RA: u8 = 0x3C;

/// Write Control Character bits, the byte immediately after a Write command.
pub const WCC_RESET_MDT: u8 = 0x01;
pub const WCC_RESTORE: u8 = 0x02;
pub const WCC_ALARM: u8 = 0x04;
pub const WCC_RESET: u8 = 0x40;

/// AID (Attention Identifier) byte, first byte of an inbound transmission.
pub const AID_NO_AID: u8 = 0x60;
pub const AID_READ_PARTITION: u8 = 0x61;
pub const AID_PA3: u8 = 0x6B;
pub const AID_CLEAR: u8 = 0x6D;
pub const AID_PA1: u8 = 0x6C;
pub const AID_PA2: u8 = 0x6E;
pub const AID_ENTER: u8 = 0x7D;
pub const AID_TRIGGER: u8 = 0x7F;
pub const AID_PF1: u8 = 0xF1;
pub const AID_PF2: u8 = 0xF2;
pub const AID_PF3: u8 = 0xF3;
pub const AID_PF4: u8 = 0xF4;
pub const AID_PF5: u8 = 0xF5;
pub const AID_PF6: u8 = 0xF6;
pub const AID_PF7: u8 = 0xF7;
pub const AID_PF8: u8 = 0xF8;
pub const AID_PF9: u8 = 0xF9;
pub const AID_PF10: u8 = 0x7A;
pub const AID_PF11: u8 = 0x7B;
pub const AID_PF12: u8 = 0x7C;
pub const AID_PF13: u8 = 0xC1;
pub const AID_PF14: u8 = 0xC2;
pub const AID_PF15: u8 = 0xC3;
pub const AID_PF16: u8 = 0xC4;
pub const AID_PF17: u8 = 0xC5;
pub const AID_PF18: u8 = 0xC6;
pub const AID_PF19: u8 = 0xC7;
pub const AID_PF20: u8 = 0xC8;
pub const AID_PF21: u8 = 0xC9;
pub const AID_PF22: u8 = 0x4A;
pub const AID_PF23: u8 = 0x4B;
pub const AID_PF24: u8 = 0x4C;
pub const AID_STRUCTURED_FIELD: u8 = 0x88;
pub const AID_SYSREQ: u8 = 0xF0;

/// Field attribute byte bits (SF order payload).
pub const ATTR_MDT: u8 = 0x01;
pub const ATTR_RESERVED: u8 = 0x02;
pub const ATTR_DISPLAY: u8 = 0x0C;
pub const ATTR_NUMERIC: u8 = 0x10;
pub const ATTR_PROTECTED: u8 = 0x20;

pub const DISPLAY_NORMAL: u8 = 0x00;
pub const DISPLAY_INTENSIFIED: u8 = 0x08;
pub const DISPLAY_HIDDEN: u8 = 0x0C;

/// Extended attribute type bytes (SFE order pairs).
pub const XA_ALL: u8 = 0x00;
pub const XA_HIGHLIGHTING: u8 = 0x41;
pub const XA_FOREGROUND: u8 = 0x42;
pub const XA_CHARSET: u8 = 0x43;
pub const XA_BACKGROUND: u8 = 0x45;
pub const XA_TRANSPARENCY: u8 = 0x46;
pub const XA_VALIDATION: u8 = 0xC1;
pub const XA_OUTLINING: u8 = 0xC2;
pub const XA_3270: u8 = 0xC0;

pub const COLOR_DEFAULT: u8 = 0x00;
pub const COLOR_BLUE: u8 = 0xF1;
pub const COLOR_RED: u8 = 0xF2;
pub const COLOR_PINK: u8 = 0xF3;
pub const COLOR_GREEN: u8 = 0xF4;
pub const COLOR_TURQUOISE: u8 = 0xF5;
pub const COLOR_YELLOW: u8 = 0xF6;
pub const COLOR_WHITE: u8 = 0xF7;
pub const COLOR_BLACK: u8 = 0xF8;
pub const COLOR_DEEP_BLUE: u8 = 0xF9;
pub const COLOR_ORANGE: u8 = 0xFA;
pub const COLOR_PURPLE: u8 = 0xFB;
pub const COLOR_PALE_GREEN: u8 = 0xFC;
pub const COLOR_PALE_TURQUOISE: u8 = 0xFD;
pub const COLOR_GREY: u8 = 0xFE;
pub const COLOR_NEUTRAL: u8 = 0xFF;

pub const HIGHLIGHT_DEFAULT: u8 = 0x00;
pub const HIGHLIGHT_NORMAL: u8 = 0xF0;
pub const HIGHLIGHT_BLINK: u8 = 0xF1;
pub const HIGHLIGHT_REVERSE: u8 = 0xF2;
pub const HIGHLIGHT_UNDERSCORE: u8 = 0xF4;

pub const VALIDATION_TRIGGER: u8 = 0x01;
pub const VALIDATION_MANDATORY_ENTRY: u8 = 0x02;
pub const VALIDATION_MANDATORY_FILL: u8 = 0x04;

/// Structured field types (WSF payload, class byte is always 0xD9 for 3270 WSF).
pub const SF_CLASS_3270DS: u8 = 0xD9;
pub const SFID_READ_PARTITION_QUERY: u8 = 0x01;
pub const SFID_QUERY_REPLY: u8 = 0x81;
pub const SFID_ERASE_RESET: u8 = 0x03;
pub const SFID_SET_REPLY_MODE: u8 = 0x09;
pub const SFID_OUTBOUND_3270DS: u8 = 0x40;

/// Query Reply QCODE: which device characteristic the reply describes.
pub const QCODE_USABLE_AREA: u8 = 0x81;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandCode {
    Write,
    ReadBuffer,
    Nop,
    EraseWrite,
    ReadModified,
    EraseWriteAlternate,
    ReadModifiedAll,
    EraseAllUnprotected,
    WriteStructuredField,
}

impl CommandCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            CMD_WRITE => Self::Write,
            CMD_READ_BUFFER => Self::ReadBuffer,
            CMD_NOP => Self::Nop,
            CMD_ERASE_WRITE => Self::EraseWrite,
            CMD_READ_MODIFIED => Self::ReadModified,
            CMD_ERASE_WRITE_ALTERNATE => Self::EraseWriteAlternate,
            CMD_READ_MODIFIED_ALL => Self::ReadModifiedAll,
            CMD_ERASE_ALL_UNPROTECTED => Self::EraseAllUnprotected,
            CMD_WRITE_STRUCTURED_FIELD => Self::WriteStructuredField,
            _ => return None,
        })
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::Write => CMD_WRITE,
            Self::ReadBuffer => CMD_READ_BUFFER,
            Self::Nop => CMD_NOP,
            Self::EraseWrite => CMD_ERASE_WRITE,
            Self::ReadModified => CMD_READ_MODIFIED,
            Self::EraseWriteAlternate => CMD_ERASE_WRITE_ALTERNATE,
            Self::ReadModifiedAll => CMD_READ_MODIFIED_ALL,
            Self::EraseAllUnprotected => CMD_ERASE_ALL_UNPROTECTED,
            Self::WriteStructuredField => CMD_WRITE_STRUCTURED_FIELD,
        }
    }

    /// Whether this command implies the buffer is cleared before any order runs.
    pub fn is_erase_variant(self) -> bool {
        matches!(self, Self::EraseWrite | Self::EraseWriteAlternate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderCode {
    ProgramTab,
    GraphicEscape,
    SetBufferAddress,
    EraseUnprotectedToAddress,
    InsertCursor,
    StartField,
    SetAttribute,
    StartFieldExtended,
    ModifyField,
    RepeatToAddress,
}

impl OrderCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            ORDER_PT => Self::ProgramTab,
            ORDER_GE => Self::GraphicEscape,
            ORDER_SBA => Self::SetBufferAddress,
            ORDER_EUA => Self::EraseUnprotectedToAddress,
            ORDER_IC => Self::InsertCursor,
            ORDER_SF => Self::StartField,
            ORDER_SA => Self::SetAttribute,
            ORDER_SFE => Self::StartFieldExtended,
            ORDER_MF => Self::ModifyField,
            ORDER_RA => Self::RepeatToAddress,
            _ => return None,
        })
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::ProgramTab => ORDER_PT,
            Self::GraphicEscape => ORDER_GE,
            Self::SetBufferAddress => ORDER_SBA,
            Self::EraseUnprotectedToAddress => ORDER_EUA,
            Self::InsertCursor => ORDER_IC,
            Self::StartField => ORDER_SF,
            Self::SetAttribute => ORDER_SA,
            Self::StartFieldExtended => ORDER_SFE,
            Self::ModifyField => ORDER_MF,
            Self::RepeatToAddress => ORDER_RA,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AidKey {
    NoAid,
    ReadPartition,
    Enter,
    Clear,
    PA1,
    PA2,
    PA3,
    PF1, PF2, PF3, PF4, PF5, PF6,
    PF7, PF8, PF9, PF10, PF11, PF12,
    PF13, PF14, PF15, PF16, PF17, PF18,
    PF19, PF20, PF21, PF22, PF23, PF24,
    StructuredField,
    Trigger,
    SysReq,
}

impl AidKey {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            AID_NO_AID => Self::NoAid,
            AID_READ_PARTITION => Self::ReadPartition,
            AID_ENTER => Self::Enter,
            AID_CLEAR => Self::Clear,
            AID_PA1 => Self::PA1,
            AID_PA2 => Self::PA2,
            AID_PA3 => Self::PA3,
            AID_PF1 => Self::PF1,
            AID_PF2 => Self::PF2,
            AID_PF3 => Self::PF3,
            AID_PF4 => Self::PF4,
            AID_PF5 => Self::PF5,
            AID_PF6 => Self::PF6,
            AID_PF7 => Self::PF7,
            AID_PF8 => Self::PF8,
            AID_PF9 => Self::PF9,
            AID_PF10 => Self::PF10,
            AID_PF11 => Self::PF11,
            AID_PF12 => Self::PF12,
            AID_PF13 => Self::PF13,
            AID_PF14 => Self::PF14,
            AID_PF15 => Self::PF15,
            AID_PF16 => Self::PF16,
            AID_PF17 => Self::PF17,
            AID_PF18 => Self::PF18,
            AID_PF19 => Self::PF19,
            AID_PF20 => Self::PF20,
            AID_PF21 => Self::PF21,
            AID_PF22 => Self::PF22,
            AID_PF23 => Self::PF23,
            AID_PF24 => Self::PF24,
            AID_STRUCTURED_FIELD => Self::StructuredField,
            AID_TRIGGER => Self::Trigger,
            AID_SYSREQ => Self::SysReq,
            _ => return None,
        })
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::NoAid => AID_NO_AID,
            Self::ReadPartition => AID_READ_PARTITION,
            Self::Enter => AID_ENTER,
            Self::Clear => AID_CLEAR,
            Self::PA1 => AID_PA1,
            Self::PA2 => AID_PA2,
            Self::PA3 => AID_PA3,
            Self::PF1 => AID_PF1, Self::PF2 => AID_PF2, Self::PF3 => AID_PF3,
            Self::PF4 => AID_PF4, Self::PF5 => AID_PF5, Self::PF6 => AID_PF6,
            Self::PF7 => AID_PF7, Self::PF8 => AID_PF8, Self::PF9 => AID_PF9,
            Self::PF10 => AID_PF10, Self::PF11 => AID_PF11, Self::PF12 => AID_PF12,
            Self::PF13 => AID_PF13, Self::PF14 => AID_PF14, Self::PF15 => AID_PF15,
            Self::PF16 => AID_PF16, Self::PF17 => AID_PF17, Self::PF18 => AID_PF18,
            Self::PF19 => AID_PF19, Self::PF20 => AID_PF20, Self::PF21 => AID_PF21,
            Self::PF22 => AID_PF22, Self::PF23 => AID_PF23, Self::PF24 => AID_PF24,
            Self::StructuredField => AID_STRUCTURED_FIELD,
            Self::Trigger => AID_TRIGGER,
            Self::SysReq => AID_SYSREQ,
        }
    }

    pub fn pf(n: u8) -> Option<Self> {
        Self::from_u8(match n {
            1 => AID_PF1, 2 => AID_PF2, 3 => AID_PF3, 4 => AID_PF4,
            5 => AID_PF5, 6 => AID_PF6, 7 => AID_PF7, 8 => AID_PF8,
            9 => AID_PF9, 10 => AID_PF10, 11 => AID_PF11, 12 => AID_PF12,
            13 => AID_PF13, 14 => AID_PF14, 15 => AID_PF15, 16 => AID_PF16,
            17 => AID_PF17, 18 => AID_PF18, 19 => AID_PF19, 20 => AID_PF20,
            21 => AID_PF21, 22 => AID_PF22, 23 => AID_PF23, 24 => AID_PF24,
            _ => return None,
        })
    }

    pub fn pa(n: u8) -> Option<Self> {
        match n {
            1 => Some(Self::PA1),
            2 => Some(Self::PA2),
            3 => Some(Self::PA3),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_code_round_trips() {
        assert_eq!(CommandCode::from_u8(CMD_ERASE_WRITE), Some(CommandCode::EraseWrite));
        assert_eq!(CommandCode::EraseWrite.to_u8(), CMD_ERASE_WRITE);
        assert!(CommandCode::EraseWrite.is_erase_variant());
        assert!(!CommandCode::Write.is_erase_variant());
        assert_eq!(CommandCode::from_u8(0xAA), None);
    }

    #[test]
    fn order_code_round_trips() {
        assert_eq!(OrderCode::from_u8(ORDER_RA), Some(OrderCode::RepeatToAddress));
        assert_eq!(OrderCode::RepeatToAddress.to_u8(), ORDER_RA);
    }

    #[test]
    fn aid_key_round_trips_and_helpers() {
        assert_eq!(AidKey::from_u8(AID_ENTER), Some(AidKey::Enter));
        assert_eq!(AidKey::pf(1), Some(AidKey::PF1));
        assert_eq!(AidKey::pf(24), Some(AidKey::PF24));
        assert_eq!(AidKey::pf(25), None);
        assert_eq!(AidKey::pa(2), Some(AidKey::PA2));
        assert_eq!(AidKey::pa(4), None);
    }
}
