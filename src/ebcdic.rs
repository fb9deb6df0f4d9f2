//! EBCDIC ↔ Unicode translation (C1).
//!
//! The lookup table is the donor's CP037 table (`protocol_common::ebcdic`)
//! verbatim; this module adds the pieces the donor's bare function pair
//! didn't have: a named, pluggable [`CodePage`], an unmappable-byte count on
//! decode, and a reverse table built once from the forward table so
//! `encode`/`decode` stay provably consistent with each other.

use std::sync::OnceLock;

/// Code page 037 (US/Canada), the default and only code page bundled today.
/// The table maps all 256 EBCDIC byte values to their Unicode code point.
const CP037_TO_UNICODE: [char; 256] = [
    // 0x00-0x0F
    '\x00', '\x01', '\x02', '\x03', '\u{009C}', '\t', '\u{0086}', '\x7F',
    '\u{0097}', '\u{008D}', '\u{008E}', '\x0B', '\x0C', '\r', '\x0E', '\x0F',
    // 0x10-0x1F
    '\x10', '\x11', '\x12', '\x13', '\u{009D}', '\u{0085}', '\x08', '\u{0087}',
    '\x18', '\x19', '\u{0092}', '\u{008F}', '\x1C', '\x1D', '\x1E', '\x1F',
    // 0x20-0x2F
    '\u{0080}', '\u{0081}', '\u{0082}', '\u{0083}', '\u{0084}', '\n', '\x17', '\x1B',
    '\u{0088}', '\u{0089}', '\u{008A}', '\u{008B}', '\u{008C}', '\x05', '\x06', '\x07',
    // 0x30-0x3F
    '\u{0090}', '\u{0091}', '\x16', '\u{0093}', '\u{0094}', '\u{0095}', '\u{0096}', '\x04',
    '\u{0098}', '\u{0099}', '\u{009A}', '\u{009B}', '\x14', '\x15', '\u{009E}', '\x1A',
    // 0x40-0x4F: note 0x40 == SPACE, required by spec
    ' ', '\u{00A0}', '\u{00E2}', '\u{00E4}', '\u{00E0}', '\u{00E1}', '\u{00E3}', '\u{00E5}',
    '\u{00E7}', '\u{00F1}', '\u{00A2}', '.', '<', '(', '+', '|',
    // 0x50-0x5F
    '&', '\u{00E9}', '\u{00EA}', '\u{00EB}', '\u{00E8}', '\u{00ED}', '\u{00EE}', '\u{00EF}',
    '\u{00EC}', '\u{00DF}', '!', '$', '*', ')', ';', '\u{00AC}',
    // 0x60-0x6F
    '-', '/', '\u{00C2}', '\u{00C4}', '\u{00C0}', '\u{00C1}', '\u{00C3}', '\u{00C5}',
    '\u{00C7}', '\u{00D1}', '\u{00A6}', ',', '%', '_', '>', '?',
    // 0x70-0x7F
    '\u{00F8}', '\u{00C9}', '\u{00CA}', '\u{00CB}', '\u{00C8}', '\u{00CD}', '\u{00CE}', '\u{00CF}',
    '\u{00CC}', '`', ':', '#', '@', '\'', '=', '"',
    // 0x80-0x8F
    '\u{00D8}', 'a', 'b', 'c', 'd', 'e', 'f', 'g',
    'h', 'i', '\u{00AB}', '\u{00BB}', '\u{00F0}', '\u{00FD}', '\u{00FE}', '\u{00B1}',
    // 0x90-0x9F
    '\u{00B0}', 'j', 'k', 'l', 'm', 'n', 'o', 'p',
    'q', 'r', '\u{00AA}', '\u{00BA}', '\u{00E6}', '\u{00B8}', '\u{00C6}', '\u{00A4}',
    // 0xA0-0xAF
    '\u{00B5}', '~', 's', 't', 'u', 'v', 'w', 'x',
    'y', 'z', '\u{00A1}', '\u{00BF}', '\u{00D0}', '\u{00DD}', '\u{00DE}', '\u{00AE}',
    // 0xB0-0xBF
    '^', '\u{00A3}', '\u{00A5}', '\u{00B7}', '\u{00A9}', '\u{00A7}', '\u{00B6}', '\u{00BC}',
    '\u{00BD}', '\u{00BE}', '[', ']', '\u{00AF}', '\u{00A8}', '\u{00B4}', '\u{00D7}',
    // 0xC0-0xCF
    '{', 'A', 'B', 'C', 'D', 'E', 'F', 'G',
    'H', 'I', '\u{00AD}', '\u{00F4}', '\u{00F6}', '\u{00F2}', '\u{00F3}', '\u{00F5}',
    // 0xD0-0xDF
    '}', 'J', 'K', 'L', 'M', 'N', 'O', 'P',
    'Q', 'R', '\u{00B9}', '\u{00FB}', '\u{00FC}', '\u{00F9}', '\u{00FA}', '\u{00FF}',
    // 0xE0-0xEF
    '\\', '\u{00F7}', 'S', 'T', 'U', 'V', 'W', 'X',
    'Y', 'Z', '\u{00B2}', '\u{00D4}', '\u{00D6}', '\u{00D2}', '\u{00D3}', '\u{00D5}',
    // 0xF0-0xFF
    '0', '1', '2', '3', '4', '5', '6', '7',
    '8', '9', '\u{00B3}', '\u{00DB}', '\u{00DC}', '\u{00D9}', '\u{00DA}', '\u{009F}',
];

/// A named, bidirectional EBCDIC table.
///
/// Only `"cp037"` ships today; the type is shaped so additional tables can
/// be registered in [`CodePage::by_name`] without touching callers.
pub struct CodePage {
    pub name: &'static str,
    forward: &'static [char; 256],
}

struct ReverseTable {
    latin1: [Option<u8>; 256],
}

fn build_reverse(forward: &[char; 256]) -> ReverseTable {
    let mut latin1 = [None; 256];
    for (byte, &ch) in forward.iter().enumerate() {
        let cp = ch as u32;
        if cp < 256 && latin1[cp as usize].is_none() {
            latin1[cp as usize] = Some(byte as u8);
        }
    }
    ReverseTable { latin1 }
}

static CP037_REVERSE: OnceLock<ReverseTable> = OnceLock::new();

impl CodePage {
    /// Code page 037, the default table used when none is configured.
    pub fn cp037() -> &'static CodePage {
        static CP037: CodePage = CodePage { name: "cp037", forward: &CP037_TO_UNICODE };
        &CP037
    }

    /// Resolve a code page by configuration name (`"cp037"`, `"037"`,
    /// `"ibm037"` all select the bundled table).
    pub fn by_name(name: &str) -> Option<&'static CodePage> {
        match name.to_ascii_lowercase().as_str() {
            "cp037" | "037" | "ibm037" => Some(Self::cp037()),
            _ => None,
        }
    }

    /// Decode a single EBCDIC byte. Byte 0x40 always decodes to SPACE;
    /// byte 0x00 always decodes to NUL (the screen layer renders it as a
    /// space, but the codec itself returns the literal NUL).
    pub fn decode(&self, byte: u8) -> char {
        self.forward[byte as usize]
    }

    /// Decode a byte slice, returning the decoded text and a count of bytes
    /// that had no literal Unicode counterpart and were substituted with
    /// U+FFFD. CP037 is a total function over its forward table (every byte
    /// maps to *some* character), so this only matters for code pages that
    /// leave gaps; the count is always 0 for `cp037` and kept for parity
    /// with future tables.
    pub fn decode_all(&self, bytes: &[u8]) -> DecodeOutcome {
        let mut text = String::with_capacity(bytes.len());
        let mut replaced = 0usize;
        for &b in bytes {
            let ch = self.forward[b as usize];
            if ch == '\u{FFFD}' {
                replaced += 1;
            }
            text.push(ch);
        }
        DecodeOutcome { text, replaced }
    }

    /// Encode a single Unicode character to its EBCDIC byte, or `None` if
    /// the character is outside this table's encodable set.
    pub fn encode(&self, ch: char) -> Option<u8> {
        let cp = ch as u32;
        if cp >= 256 {
            return None;
        }
        if self.name == "cp037" {
            let reverse = CP037_REVERSE.get_or_init(|| build_reverse(self.forward));
            return reverse.latin1[cp as usize];
        }
        build_reverse(self.forward).latin1[cp as usize]
    }

    /// Encode a string, substituting EBCDIC space (0x40) for any character
    /// outside the table's encodable set.
    pub fn encode_lossy(&self, s: &str) -> Vec<u8> {
        s.chars().map(|c| self.encode(c).unwrap_or(0x40)).collect()
    }
}

pub struct DecodeOutcome {
    pub text: String,
    pub replaced: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_0x40_is_space() {
        assert_eq!(CodePage::cp037().decode(0x40), ' ');
    }

    #[test]
    fn byte_0x00_is_nul() {
        assert_eq!(CodePage::cp037().decode(0x00), '\x00');
    }

    #[test]
    fn round_trip_over_bijective_subset() {
        let cp = CodePage::cp037();
        for b in 0u8..=255 {
            let ch = cp.decode(b);
            if let Some(back) = cp.encode(ch) {
                assert_eq!(cp.decode(back), ch, "round trip broke for byte {b:#04x}");
            }
        }
    }

    #[test]
    fn known_letters_round_trip() {
        let cp = CodePage::cp037();
        assert_eq!(cp.decode(0xC1), 'A');
        assert_eq!(cp.encode('A'), Some(0xC1));
        assert_eq!(cp.decode(0x81), 'a');
        assert_eq!(cp.encode('a'), Some(0x81));
        assert_eq!(cp.decode(0xF0), '0');
        assert_eq!(cp.encode('0'), Some(0xF0));
    }

    #[test]
    fn decode_all_counts_no_replacements_for_cp037() {
        let cp = CodePage::cp037();
        let bytes = [0xC8, 0xC5, 0xD3, 0xD3, 0xD6]; // "HELLO"
        let outcome = cp.decode_all(&bytes);
        assert_eq!(outcome.text, "HELLO");
        assert_eq!(outcome.replaced, 0);
    }

    #[test]
    fn by_name_resolves_aliases() {
        assert!(CodePage::by_name("CP037").is_some());
        assert!(CodePage::by_name("037").is_some());
        assert!(CodePage::by_name("nonexistent").is_none());
    }

    #[test]
    fn encode_lossy_falls_back_to_space() {
        let cp = CodePage::cp037();
        let bytes = cp.encode_lossy("A\u{1F600}B");
        assert_eq!(bytes, vec![0xC1, 0x40, 0xC2]);
    }
}
