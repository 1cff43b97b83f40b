//! Trace session upsert engine.
//!
//! Given a target user, a debug level name and a duration expression, the
//! engine keeps at most one active `USER_DEBUG` trace flag per user:
//!
//! - [`user`] maps a [`TargetIdentity`] to one `User` record
//! - [`debug_level`] finds a `DebugLevel` by developer name, provisioning a
//!   default one on first use
//! - [`duration`] turns `"1hr"` / `"15m"` into a window capped at 24 hours
//! - [`session`] extends the most recent trace flag or creates a new one
//! - [`debug_mode`] flips the Lightning debug-mode preference on a user
//!
//! [`TraceEngine`] ties them together over an injected
//! [`ToolingApi`](sftrace_tooling::ToolingApi).

pub mod debug_level;
pub mod debug_mode;
pub mod duration;
pub mod engine;
pub mod error;
pub mod session;
pub mod user;

pub use debug_level::{
    DebugLevel, DebugLevelResolution, ProvisionPolicy, DEFAULT_APEX_CODE_LEVEL,
    DEFAULT_DEBUG_LEVEL_NAME, PROVISIONED_DEBUG_LEVEL_LABEL,
};
pub use debug_mode::DebugModeChange;
pub use duration::{compute_expiration, TraceDuration, DEFAULT_TRACE_DURATION, MAX_TRACE_WINDOW};
pub use engine::{TraceEngine, TraceReport, TraceRequest};
pub use error::TraceError;
pub use session::{TraceSession, UpsertOutcome, TRACE_LOG_TYPE};
pub use user::{ResolvedUser, TargetIdentity, AUTOMATED_PROCESS_ALIAS};
