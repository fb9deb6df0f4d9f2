//! Incremental Telnet command/option framer (C4).
//!
//! Constants and the escaping rules are grounded on the donor's
//! `protocol_common::telnet_base` (`TelnetCommand`/`TelnetOption`,
//! `build_negotiation`/`build_subnegotiation`). The parser itself is
//! restructured: the donor's `parse_telnet_stream` takes a whole buffer and
//! returns everything it found, which breaks the moment a negotiation or
//! subnegotiation sequence is split across two socket reads. [`Framer`] is a
//! byte-at-a-time state machine instead, so a partial `IAC SB ...` sequence
//! at the end of one read resumes correctly when the rest arrives in the
//! next.

pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
pub const SB: u8 = 250;
pub const GA: u8 = 249;
pub const EL: u8 = 248;
pub const EC: u8 = 247;
pub const AYT: u8 = 246;
pub const AO: u8 = 245;
pub const IP: u8 = 244;
pub const BRK: u8 = 243;
pub const DM: u8 = 242;
pub const NOP: u8 = 241;
pub const SE: u8 = 240;
/// End-of-Record marker (RFC 885): `IAC EOR` closes one TN3270(E) record.
pub const EOR: u8 = 239;

pub const OPT_BINARY: u8 = 0;
pub const OPT_ECHO: u8 = 1;
pub const OPT_SUPPRESS_GO_AHEAD: u8 = 3;
pub const OPT_TERMINAL_TYPE: u8 = 24;
pub const OPT_END_OF_RECORD: u8 = 25;
pub const OPT_TN3270E: u8 = 40;

/// One decoded unit of the telnet stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A contiguous run of de-escaped application data.
    Data(Vec<u8>),
    /// A bare command with no option, e.g. `IAC NOP`, `IAC GA`.
    Command(u8),
    /// `IAC WILL/WONT/DO/DONT <option>`.
    Negotiate { command: u8, option: u8 },
    /// `IAC SB <option> ... IAC SE`, payload de-escaped.
    Subnegotiation { option: u8, data: Vec<u8> },
    /// `IAC EOR`: the preceding data completes one TN3270(E) record.
    EndOfRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    Data,
    SawIac,
    SawCommand(u8),
    SawSb,
    InSubnegotiation { option: u8, data: Vec<u8> },
    InSubnegotiationIac { option: u8, data: Vec<u8> },
}

/// Incremental framer: feed it bytes as they arrive off the socket, get back
/// whatever complete events those bytes completed.
#[derive(Debug)]
pub struct Framer {
    state: State,
    pending_data: Vec<u8>,
}

impl Framer {
    pub fn new() -> Self {
        Self { state: State::Data, pending_data: Vec::new() }
    }

    /// Feed a chunk of bytes, returning every event it completed, in order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();
        for &b in bytes {
            self.feed_byte(b, &mut events);
        }
        if matches!(self.state, State::Data) {
            self.flush_data(&mut events);
        }
        events
    }

    fn flush_data(&mut self, events: &mut Vec<Event>) {
        if !self.pending_data.is_empty() {
            events.push(Event::Data(std::mem::take(&mut self.pending_data)));
        }
    }

    fn feed_byte(&mut self, b: u8, events: &mut Vec<Event>) {
        match std::mem::replace(&mut self.state, State::Data) {
            State::Data => {
                if b == IAC {
                    self.state = State::SawIac;
                } else {
                    self.pending_data.push(b);
                    self.state = State::Data;
                }
            }
            State::SawIac => match b {
                IAC => {
                    self.pending_data.push(IAC);
                    self.state = State::Data;
                }
                WILL | WONT | DO | DONT => {
                    self.state = State::SawCommand(b);
                }
                SB => {
                    self.flush_data(events);
                    self.state = State::SawSb;
                }
                EOR => {
                    self.flush_data(events);
                    events.push(Event::EndOfRecord);
                    self.state = State::Data;
                }
                other => {
                    self.flush_data(events);
                    events.push(Event::Command(other));
                    self.state = State::Data;
                }
            },
            State::SawCommand(cmd) => {
                self.flush_data(events);
                events.push(Event::Negotiate { command: cmd, option: b });
                self.state = State::Data;
            }
            State::SawSb => {
                self.state = State::InSubnegotiation { option: b, data: Vec::new() };
            }
            State::InSubnegotiation { option, mut data } => {
                if b == IAC {
                    self.state = State::InSubnegotiationIac { option, data };
                } else {
                    data.push(b);
                    self.state = State::InSubnegotiation { option, data };
                }
            }
            State::InSubnegotiationIac { option, mut data } => match b {
                SE => {
                    events.push(Event::Subnegotiation { option, data });
                    self.state = State::Data;
                }
                IAC => {
                    data.push(IAC);
                    self.state = State::InSubnegotiation { option, data };
                }
                other => {
                    // Malformed (IAC not followed by IAC or SE inside a
                    // subnegotiation): keep the bytes and resynchronize on
                    // plain data, rather than dropping the whole sequence.
                    data.push(IAC);
                    data.push(other);
                    self.state = State::InSubnegotiation { option, data };
                }
            },
        }
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

/// `IAC <command> <option>`.
pub fn encode_negotiation(command: u8, option: u8) -> Vec<u8> {
    vec![IAC, command, option]
}

/// `IAC SB <option> <data, IAC-escaped> IAC SE`.
pub fn encode_subnegotiation(option: u8, data: &[u8]) -> Vec<u8> {
    let mut out = vec![IAC, SB, option];
    for &b in data {
        out.push(b);
        if b == IAC {
            out.push(IAC);
        }
    }
    out.push(IAC);
    out.push(SE);
    out
}

/// Escape any literal `IAC` bytes in outbound application data and append
/// `IAC EOR` to close the record.
pub fn encode_record(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 2);
    for &b in data {
        out.push(b);
        if b == IAC {
            out.push(IAC);
        }
    }
    out.push(IAC);
    out.push(EOR);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_data_passes_through() {
        let mut framer = Framer::new();
        let events = framer.feed(b"hello");
        assert_eq!(events, vec![Event::Data(b"hello".to_vec())]);
    }

    #[test]
    fn escaped_iac_becomes_single_byte() {
        let mut framer = Framer::new();
        let events = framer.feed(&[b'a', IAC, IAC, b'b']);
        assert_eq!(events, vec![Event::Data(vec![b'a', IAC, b'b'])]);
    }

    #[test]
    fn negotiation_sequence_decodes() {
        let mut framer = Framer::new();
        let events = framer.feed(&[IAC, WILL, OPT_BINARY]);
        assert_eq!(events, vec![Event::Negotiate { command: WILL, option: OPT_BINARY }]);
    }

    #[test]
    fn negotiation_split_across_two_feeds_still_decodes() {
        let mut framer = Framer::new();
        assert!(framer.feed(&[IAC, WILL]).is_empty());
        let events = framer.feed(&[OPT_TN3270E]);
        assert_eq!(events, vec![Event::Negotiate { command: WILL, option: OPT_TN3270E }]);
    }

    #[test]
    fn subnegotiation_split_mid_payload_still_decodes() {
        let mut framer = Framer::new();
        assert!(framer.feed(&[IAC, SB, OPT_TERMINAL_TYPE, 1]).is_empty());
        let events = framer.feed(&[IAC, SE]);
        assert_eq!(events, vec![Event::Subnegotiation { option: OPT_TERMINAL_TYPE, data: vec![1] }]);
    }

    #[test]
    fn end_of_record_flushes_pending_data_first() {
        let mut framer = Framer::new();
        let events = framer.feed(&[b'x', b'y', IAC, EOR]);
        assert_eq!(events, vec![Event::Data(vec![b'x', b'y']), Event::EndOfRecord]);
    }

    #[test]
    fn encode_record_escapes_iac_and_appends_eor() {
        let out = encode_record(&[1, IAC, 2]);
        assert_eq!(out, vec![1, IAC, IAC, 2, IAC, EOR]);
    }

    #[test]
    fn encode_subnegotiation_wraps_payload() {
        let out = encode_subnegotiation(OPT_TERMINAL_TYPE, b"IBM-3278-2");
        assert_eq!(out[0], IAC);
        assert_eq!(out[1], SB);
        assert_eq!(out[2], OPT_TERMINAL_TYPE);
        assert_eq!(&out[out.len() - 2..], &[IAC, SE]);
    }
}
