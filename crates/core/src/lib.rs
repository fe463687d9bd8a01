//! Core session orchestration and phone-number lifecycle for linectl.
//!
//! Operators provision telephony identifiers for tenants of a hosted
//! collaboration platform. Some mutations only exist as cmdlets on an
//! external administrative shell, so this crate manages long-lived
//! interactive sessions against that shell, frames its unstructured output
//! into structured events, and keeps the phone-number inventory consistent
//! across interruption, retry, and partial failure.

pub mod config;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod orchestrate;
pub mod session;
pub mod sweeper;

pub use config::Config;
pub use error::{Error, Result};
pub use inventory::{InventoryStore, MemoryStore, NumberStatus, PhoneNumber};
pub use lifecycle::{Assignment, LifecycleEngine};
pub use orchestrate::{AssignmentOutcome, AssignmentRequest, assign_number};
pub use session::{
    AuthMethod, CompletionOutcome, MfaDetector, SessionEvent, SessionId, SessionInfo,
    SessionRegistry, SessionSpec, SessionState,
};
pub use sweeper::Sweeper;
