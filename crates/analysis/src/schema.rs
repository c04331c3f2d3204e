//! Typed analysis schema and explicit schema versioning.
//!
//! Version 1 is the original structured analysis. Version 2 ("enhanced")
//! adds `technical.confidence` and `sources`. Stored documents carry a
//! `schemaVersion` tag; legacy documents are upgraded by [`upgrade`] rather
//! than by retrying a failed parse against the older shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ValidationError, ValidationKind, ValidationResult};
use crate::provenance::{Source, is_speculative};

/// Tag key carried by stored documents.
pub const SCHEMA_VERSION_KEY: &str = "schemaVersion";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub value_proposition: String,
    pub target_audience: String,
    pub monetization: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competitor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Swot {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub opportunities: Vec<String>,
    pub threats: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    #[serde(default)]
    pub competitors: Vec<Competitor>,
    #[serde(default)]
    pub swot: Swot,
}

/// Technical section of an enhanced analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Technical {
    pub tech_stack: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub ui_colors: Vec<String>,
    pub key_pages: Vec<String>,
}

/// Technical section of a legacy analysis (no confidence).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyTechnical {
    pub tech_stack: Vec<String>,
    pub ui_colors: Vec<String>,
    pub key_pages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficEstimate {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetric {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traffic_estimates: Option<TrafficEstimate>,
    pub key_metrics: Vec<KeyMetric>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Synthesis {
    pub summary: String,
    pub key_insights: Vec<String>,
    pub next_actions: Vec<String>,
}

/// Schema version 2: the validated analysis record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedAnalysis {
    pub overview: Overview,
    pub market: Market,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical: Option<Technical>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataSection>,
    pub synthesis: Synthesis,
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl EnhancedAnalysis {
    /// Technical confidence, if present.
    #[must_use]
    pub fn confidence(&self) -> Option<f64> {
        self.technical.as_ref().and_then(|t| t.confidence)
    }

    /// Whether this analysis should carry the "Speculative" badge.
    #[must_use]
    pub fn is_speculative(&self) -> bool {
        is_speculative(self.confidence())
    }
}

/// Schema version 1: the original structured analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyAnalysis {
    pub overview: Overview,
    pub market: Market,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical: Option<LegacyTechnical>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataSection>,
    pub synthesis: Synthesis,
}

/// Upgrade a legacy analysis: no confidence, no sources.
#[must_use]
pub fn upgrade(legacy: LegacyAnalysis) -> EnhancedAnalysis {
    EnhancedAnalysis {
        overview: legacy.overview,
        market: legacy.market,
        technical: legacy.technical.map(|t| Technical {
            tech_stack: t.tech_stack,
            confidence: None,
            ui_colors: t.ui_colors,
            key_pages: t.key_pages,
        }),
        data: legacy.data,
        synthesis: legacy.synthesis,
        sources: Vec::new(),
    }
}

/// A stored document tagged with its schema version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "schemaVersion")]
pub enum AnalysisDocument {
    #[serde(rename = "1")]
    V1(LegacyAnalysis),
    #[serde(rename = "2")]
    V2(EnhancedAnalysis),
}

impl AnalysisDocument {
    /// Current schema version number.
    pub const CURRENT_VERSION: u32 = 2;

    /// Parse a stored document by its explicit version tag.
    ///
    /// Untagged documents predate versioning and are read as version 1.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if the tag is unknown or the body does not match the
    /// tagged version.
    pub fn from_stored(value: &Value) -> ValidationResult<Self> {
        let obj = value.as_object().ok_or_else(|| {
            ValidationError::new(
                ValidationKind::AnalysisMustBeObject,
                "Stored analysis must be an object",
            )
        })?;

        let version = match obj.get(SCHEMA_VERSION_KEY) {
            None => 1,
            Some(tag) => parse_version(tag)?,
        };

        let mut body = obj.clone();
        body.remove(SCHEMA_VERSION_KEY);
        let body = Value::Object(body);

        match version {
            1 => serde_json::from_value(body).map(Self::V1),
            Self::CURRENT_VERSION => serde_json::from_value(body).map(Self::V2),
            other => {
                return Err(ValidationError::new(
                    ValidationKind::SchemaMismatch,
                    format!("Unsupported schema version: {other}"),
                ));
            }
        }
        .map_err(|e| {
            ValidationError::new(
                ValidationKind::SchemaMismatch,
                format!("Stored analysis does not match schema version {version}: {e}"),
            )
        })
    }

    /// Schema version of this document.
    #[must_use]
    pub const fn version(&self) -> u32 {
        match self {
            Self::V1(_) => 1,
            Self::V2(_) => Self::CURRENT_VERSION,
        }
    }

    /// Upgrade to the current schema.
    #[must_use]
    pub fn into_current(self) -> EnhancedAnalysis {
        match self {
            Self::V1(legacy) => upgrade(legacy),
            Self::V2(enhanced) => enhanced,
        }
    }
}

impl From<EnhancedAnalysis> for AnalysisDocument {
    fn from(analysis: EnhancedAnalysis) -> Self {
        Self::V2(analysis)
    }
}

fn parse_version(tag: &Value) -> ValidationResult<u32> {
    let parsed = match tag {
        Value::String(s) => s.parse::<u32>().ok(),
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        _ => None,
    };
    parsed.ok_or_else(|| {
        ValidationError::new(
            ValidationKind::SchemaMismatch,
            format!("Invalid schema version tag: {tag}"),
        )
    })
}
