//! TN3270/TN3270E protocol core: Telnet negotiation, 3270 data-stream
//! parsing, screen buffer/field model, EBCDIC codec, and an async session
//! core built on top of them.

/// Protocol byte constants (commands, orders, WCC bits, AID codes, field
/// attribute bits) and their enum views.
pub mod codes;

/// EBCDIC <-> Unicode translation.
pub mod ebcdic;

/// Screen buffer: cell grid, derived field view, buffer addressing.
pub mod buffer;

/// 3270 data-stream parser and inbound-transmission encoder.
pub mod datastream;

/// Incremental Telnet command/option framer.
pub mod telnet;

/// Telnet option and TN3270E device/functions negotiation.
pub mod negotiate;

/// Structured error taxonomy.
pub mod error;

/// Explicit logger handle passed into each component.
pub mod logging;

/// Session configuration surface and on-disk persistence.
pub mod config;

/// Public operations surface: named actions dispatched over a screen buffer.
pub mod actions;

/// Async session core: connect/negotiate/data-stream loop.
pub mod session;

/// Optional on-disk negotiation/data-stream trace recorder and player.
#[cfg(feature = "trace")]
pub mod trace;

pub use actions::{Action, Effect, SessionMode};
pub use config::SessionConfig;
pub use error::{Error, Result};
pub use session::{ScreenSnapshot, Session, SessionPhase};
