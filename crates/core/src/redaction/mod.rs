//! PDF redaction sessions.
//!
//! A session is prepared from an object in storage, redacted any number of
//! times (each apply starts again from the original bytes), optionally saved
//! back through the storage gateway, and dropped on cleanup or after an idle
//! period:
//!
//! ```text
//! prepare ─► created ─► apply ─► redacted ─► save ─► saved
//!               └────────── cleanup / idle expiry ──────┘
//! ```
//!
//! Rectangles use a top-left origin. Each coordinate is a page fraction when
//! it lies in `[0, 1]` and absolute points otherwise.

pub mod config;
pub mod detect;
mod document;
mod engine;
pub mod error;
pub mod geometry;
pub mod preview;
pub mod service;
pub mod store;
pub mod types;

pub use config::RedactionConfig;
pub use error::RedactionError;
pub use geometry::Rgb;
pub use service::RedactionService;
pub use store::SessionStore;
pub use types::{
    ApplyOptions, ApplyOutcome, DetectionKind, PageInfo, PreparedSession, Preview,
    RedactionRectangle, RedactionViolation, SaveTarget, SessionDetails, SessionState, Suggestion,
};
