//! Admin-shell runtime - process lifecycle, transport, and script execution
//!
//! This crate provides the low-level runtime infrastructure for talking to
//! the platform's administrative command shell:
//!
//! - **Host location**: finding a usable shell binary, with an environment
//!   guard for sandboxes that structurally cannot run it
//! - **Process**: launching the shell with piped stdio and tearing it down
//!   with a graceful-then-forceful escalation
//! - **Transport**: bidirectional text transport over the stdio pipes
//! - **Executor**: one-shot, stateless script runs with a hard timeout and
//!   scoped temporary storage
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │  line-core   │  Sessions, lifecycle engine, orchestration
//! └──────┬───────┘
//! ┌──────▼───────┐
//! │ line-runtime │  This crate
//! │  ┌─────────┐ │
//! │  │ Exec    │ │  One-shot script runs
//! │  └─────────┘ │
//! │  ┌─────────┐ │
//! │  │ Trans   │ │  Stdio pipe transport
//! │  └─────────┘ │
//! │  ┌─────────┐ │
//! │  │ Host    │ │  Process management
//! │  └─────────┘ │
//! └──────────────┘
//! ```

pub mod error;
pub mod executor;
pub mod host;
pub mod process;
pub mod transport;

pub use error::{Error, Result};
pub use executor::{Credentials, ExecOutcome, ScriptExecutor};
pub use host::{environment_supported, locate_admin_shell};
pub use process::HostProcess;
pub use transport::{PipeTransport, PipeTransportReceiver, PipeTransportSender};
