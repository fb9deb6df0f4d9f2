//! Telnet option and TN3270E device/functions negotiation (C5).
//!
//! The per-option bookkeeping style (`NegotiationState`, track-then-react)
//! is grounded on the donor's `lib5250::telnet::TelnetNegotiator`, generalized
//! from its single `HashMap<TelnetOption, NegotiationState>` to the 3270
//! option set (`BINARY`/`SUPPRESS-GO-AHEAD`/`TERMINAL-TYPE`/`END-OF-RECORD`)
//! plus TN3270E device-type and functions sub-negotiation, neither of which
//! any donor module implements for real: the donor's own 3270 processor
//! (`lib3270::protocol::ProtocolProcessor3270::handle_tn3270e_negotiation`)
//! just echoes back whatever sub-command byte it received rather than
//! computing a genuine FUNCTIONS intersection, and its TN3270E never falls
//! back to basic 3270 or NVT mode.
//!
//! `EndOfRecord = 25` is used throughout (RFC-correct, matching
//! `protocol_common::telnet_base::TelnetOption::EndOfRecord`), not the `19`
//! the donor's `lib5250::telnet::TelnetOption` uses for the same option.

use crate::telnet::{self, Event};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Disabled,
    Enabled,
}

impl Default for NegotiationState {
    fn default() -> Self {
        NegotiationState::Disabled
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct OptionState {
    local: NegotiationState,
    remote: NegotiationState,
}

impl OptionState {
    fn enabled(&self) -> bool {
        matches!(self.local, NegotiationState::Enabled) && matches!(self.remote, NegotiationState::Enabled)
    }
}

/// TN3270E function bits, one per RFC 2355 function byte.
pub const FN_BIND_IMAGE: u16 = 1 << 0;
pub const FN_DATA_STREAM_CTL: u16 = 1 << 1;
pub const FN_RESPONSES: u16 = 1 << 2;
pub const FN_SCS_CTL_CODES: u16 = 1 << 3;
pub const FN_SYSREQ: u16 = 1 << 4;

fn function_byte_to_bit(byte: u8) -> Option<u16> {
    Some(match byte {
        0 => FN_BIND_IMAGE,
        1 => FN_DATA_STREAM_CTL,
        2 => FN_RESPONSES,
        3 => FN_SCS_CTL_CODES,
        4 => FN_SYSREQ,
        _ => return None,
    })
}

fn bits_to_bytes(bits: u16) -> Vec<u8> {
    let table = [
        (FN_BIND_IMAGE, 0u8),
        (FN_DATA_STREAM_CTL, 1),
        (FN_RESPONSES, 2),
        (FN_SCS_CTL_CODES, 3),
        (FN_SYSREQ, 4),
    ];
    table.iter().filter(|(bit, _)| bits & bit != 0).map(|&(_, byte)| byte).collect()
}

/// TN3270E sub-negotiation command bytes (RFC 2355 section 4).
mod tn3270e {
    pub const CONNECT: u8 = 1;
    pub const DEVICE_TYPE: u8 = 2;
    pub const FUNCTIONS: u8 = 3;
    pub const IS: u8 = 4;
    pub const REASON: u8 = 5;
    pub const REJECT: u8 = 6;
    pub const REQUEST: u8 = 7;
    pub const SEND: u8 = 8;
}

/// The terminal mode negotiation converged on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiatedMode {
    /// TN3270E with the agreed function set.
    Tn3270e { functions: u16, device_type: String },
    /// Plain TN3270 (BINARY + EOR + SUPPRESS-GO-AHEAD, no TN3270E wrapper).
    Basic3270,
    /// Neither side could agree on a usable 3270 transport; NVT line mode.
    Nvt,
}

/// Drives telnet option negotiation and TN3270E device/functions
/// sub-negotiation from a stream of [`telnet::Event`]s.
#[derive(Debug)]
pub struct Negotiator {
    binary: OptionState,
    sga: OptionState,
    ttype: OptionState,
    eor: OptionState,
    tn3270e: OptionState,
    device_type: String,
    supported_functions: u16,
    functions_agreed: Option<u16>,
    device_type_confirmed: bool,
    tn3270e_offered: bool,
    tn3270e_rejected: bool,
    ttype_sent: bool,
    binary_rejected: bool,
    eor_rejected: bool,
}

impl Negotiator {
    pub fn new(device_type: impl Into<String>, supported_functions: u16) -> Self {
        Self {
            binary: OptionState::default(),
            sga: OptionState::default(),
            ttype: OptionState::default(),
            eor: OptionState::default(),
            tn3270e: OptionState::default(),
            device_type: device_type.into(),
            supported_functions,
            functions_agreed: None,
            device_type_confirmed: false,
            tn3270e_offered: false,
            tn3270e_rejected: false,
            ttype_sent: false,
            binary_rejected: false,
            eor_rejected: false,
        }
    }

    /// Feed one decoded telnet event, returning any bytes to send in reply.
    pub fn handle(&mut self, event: &Event) -> Vec<u8> {
        match event {
            Event::Negotiate { command, option } => self.handle_negotiate(*command, *option),
            Event::Subnegotiation { option, data } if *option == telnet::OPT_TERMINAL_TYPE => {
                self.handle_ttype_subnegotiation(data)
            }
            Event::Subnegotiation { option, data } if *option == telnet::OPT_TN3270E => {
                self.handle_tn3270e_subnegotiation(data)
            }
            _ => Vec::new(),
        }
    }

    fn handle_negotiate(&mut self, command: u8, option: u8) -> Vec<u8> {
        use telnet::{DO, DONT, WILL, WONT};
        let acceptable = option == telnet::OPT_BINARY
            || option == telnet::OPT_SUPPRESS_GO_AHEAD
            || option == telnet::OPT_TERMINAL_TYPE
            || option == telnet::OPT_END_OF_RECORD
            || option == telnet::OPT_TN3270E;

        if option == telnet::OPT_TN3270E {
            self.tn3270e_offered = true;
        }

        let state = self.option_state_mut(option);

        match command {
            WILL => {
                if acceptable {
                    state.remote = NegotiationState::Enabled;
                    telnet::encode_negotiation(DO, option)
                } else {
                    telnet::encode_negotiation(DONT, option)
                }
            }
            WONT => {
                state.remote = NegotiationState::Disabled;
                self.mark_rejected(option);
                Vec::new()
            }
            DO => {
                if acceptable {
                    state.local = NegotiationState::Enabled;
                    telnet::encode_negotiation(WILL, option)
                } else {
                    telnet::encode_negotiation(WONT, option)
                }
            }
            DONT => {
                state.local = NegotiationState::Disabled;
                self.mark_rejected(option);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn mark_rejected(&mut self, option: u8) {
        if option == telnet::OPT_TN3270E {
            self.tn3270e_rejected = true;
        } else if option == telnet::OPT_BINARY {
            self.binary_rejected = true;
        } else if option == telnet::OPT_END_OF_RECORD {
            self.eor_rejected = true;
        }
    }

    /// True once the peer has explicitly declined BINARY or END-OF-RECORD
    /// (`WONT`/`DONT`, not merely "never offered"): neither TN3270E nor
    /// basic 3270 can ever become reachable from here, only NVT. A caller
    /// can use this to fail fast instead of waiting out the full
    /// negotiation deadline.
    pub fn essential_rejected(&self) -> bool {
        self.binary_rejected || self.eor_rejected
    }

    fn option_state_mut(&mut self, option: u8) -> &mut OptionState {
        if option == telnet::OPT_BINARY {
            &mut self.binary
        } else if option == telnet::OPT_SUPPRESS_GO_AHEAD {
            &mut self.sga
        } else if option == telnet::OPT_TERMINAL_TYPE {
            &mut self.ttype
        } else if option == telnet::OPT_END_OF_RECORD {
            &mut self.eor
        } else {
            &mut self.tn3270e
        }
    }

    fn handle_ttype_subnegotiation(&mut self, data: &[u8]) -> Vec<u8> {
        if data.first() == Some(&1) {
            self.ttype_sent = true;
            let mut payload = vec![0u8]; // IS
            payload.extend_from_slice(self.device_type.as_bytes());
            telnet::encode_subnegotiation(telnet::OPT_TERMINAL_TYPE, &payload)
        } else {
            Vec::new()
        }
    }

    fn handle_tn3270e_subnegotiation(&mut self, data: &[u8]) -> Vec<u8> {
        let Some(&sub) = data.first() else { return Vec::new() };
        match sub {
            tn3270e::SEND if data.get(1) == Some(&tn3270e::DEVICE_TYPE) => {
                let mut payload = vec![tn3270e::DEVICE_TYPE, tn3270e::REQUEST];
                payload.extend_from_slice(self.device_type.as_bytes());
                telnet::encode_subnegotiation(telnet::OPT_TN3270E, &payload)
            }
            tn3270e::DEVICE_TYPE if data.get(1) == Some(&tn3270e::IS) => {
                self.device_type_confirmed = true;
                Vec::new()
            }
            tn3270e::DEVICE_TYPE if data.get(1) == Some(&tn3270e::REJECT) => {
                self.tn3270e_rejected = true;
                Vec::new()
            }
            tn3270e::FUNCTIONS if data.get(1) == Some(&tn3270e::REQUEST) => {
                let requested: u16 = data[2..].iter().filter_map(|&b| function_byte_to_bit(b)).fold(0, |acc, bit| acc | bit);
                let agreed = requested & self.supported_functions;
                self.functions_agreed = Some(agreed);
                let mut payload = vec![tn3270e::FUNCTIONS, tn3270e::IS];
                payload.extend(bits_to_bytes(agreed));
                telnet::encode_subnegotiation(telnet::OPT_TN3270E, &payload)
            }
            tn3270e::FUNCTIONS if data.get(1) == Some(&tn3270e::IS) => {
                let agreed: u16 = data[2..].iter().filter_map(|&b| function_byte_to_bit(b)).fold(0, |acc, bit| acc | bit);
                self.functions_agreed = Some(agreed & self.supported_functions);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Whether enough has converged to hand off to a [`crate::session::Session`]:
    /// either a confirmed TN3270E function set, or basic BINARY+EOR (SGA is
    /// best-effort, not essential) with TN3270E explicitly declined or never
    /// offered.
    pub fn is_complete(&self) -> bool {
        self.outcome().is_some()
    }

    pub fn outcome(&self) -> Option<NegotiatedMode> {
        if let Some(functions) = self.functions_agreed {
            if self.binary.enabled() && self.eor.enabled() {
                return Some(NegotiatedMode::Tn3270e { functions, device_type: self.device_type.clone() });
            }
        }
        if self.binary.enabled() && self.eor.enabled() {
            if self.tn3270e.enabled() && !self.tn3270e_rejected && self.functions_agreed.is_none() {
                // Both sides agreed to the TN3270E option itself; give its
                // device-type/functions sub-negotiation a chance to land
                // before settling for the basic fallback.
                return None;
            }
            return Some(NegotiatedMode::Basic3270);
        }
        None
    }

    /// Fallback reached when the negotiation deadline expires: NVT if
    /// nothing usable was ever reached, otherwise whatever partial mode
    /// the caller already has via [`Self::outcome`].
    pub fn fallback_outcome(&self) -> NegotiatedMode {
        self.outcome().unwrap_or(NegotiatedMode::Nvt)
    }
}
