//! Wire conventions for talking to the administrative command shell.
//!
//! The admin host exposes no structured protocol: commands go in over stdin,
//! free text comes back over stdout. This crate defines the sentinel-marker
//! convention layered on top of that stream:
//!
//! - **Completion tokens**: a unique token per command invocation so that
//!   concurrent output on a shared stream can never be confused.
//! - **Markers**: token-suffixed sentinel lines signalling step-level and
//!   overall success/failure of a compound command.
//! - **Frame parser**: a small state machine that extracts JSON payloads
//!   delimited by sentinel lines, across arbitrary chunk boundaries.
//! - **Script generation**: wraps caller commands in the scaffolding that
//!   emits those sentinels host-side.

pub mod frame;
pub mod marker;
pub mod script;

pub use frame::{FrameError, FrameEvent, FrameParser, is_echo_line};
pub use marker::{CompletionToken, MarkerLine};
pub use script::{CompoundScript, QueryScript};
