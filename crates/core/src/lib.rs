//! Clonescope Core
//!
//! Error taxonomy shared by every Clonescope crate: the closed set of
//! failure kinds, the [`AppError`] carried across layers, the wire body
//! sent to clients, and the best-effort classifier for untyped errors.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod classify;
pub mod error;
pub mod result;

pub use classify::{Matched, classify_error, classify_text, match_patterns, signal_text};
pub use error::{AppError, ErrorBody, ErrorKind, ExternalError, UNKNOWN_REQUEST_ID};
pub use result::{Result, ResultExt};
