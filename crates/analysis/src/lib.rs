//! Clonescope Analysis
//!
//! Everything that stands between an untrusted AI payload and a stored
//! analysis record:
//!
//! - [`request`]: validation of user-supplied request bodies, ids and timeouts
//! - [`sanitize`]: URL and text sanitization
//! - [`first_party`]: metadata scraped from the target site
//! - [`provenance`]: confidence scores and source citations
//! - [`validator`]: repair of a raw analysis payload
//! - [`schema`]: the typed, versioned analysis record
//!
//! All validators are synchronous and side-effect free apart from logging.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod first_party;
pub mod provenance;
pub mod request;
pub mod sanitize;
pub mod schema;
pub mod validator;

pub use error::{ValidationError, ValidationKind, ValidationResult};
pub use first_party::{FirstPartyData, validate_first_party_data};
pub use provenance::{
    SPECULATIVE_THRESHOLD, Source, add_target_site_as_source, check_confidence, is_speculative,
    validate_confidence_score, validate_source, validate_sources,
};
pub use request::{
    AnalysisRequest, ImprovementRequest, validate_analysis_id, validate_analysis_id_str,
    validate_analysis_request, validate_improvement_request, validate_timeout, validate_timeout_ms,
};
pub use sanitize::{is_web_url, sanitize_excerpt, sanitize_url};
pub use schema::{AnalysisDocument, EnhancedAnalysis, LegacyAnalysis, upgrade};
pub use validator::{finalize_analysis, validate_enhanced_analysis};
