//! End-to-end validation of one raw AI analysis payload.
//!
//! Only a non-object payload is rejected outright. Every other problem is
//! recovered locally by dropping the offending optional field, so one bad
//! AI-generated value never discards an otherwise usable analysis.

use serde_json::{Map, Value};

use clonescope_core::ResultExt;

use crate::error::{ValidationError, ValidationKind, ValidationResult};
use crate::first_party::FirstPartyData;
use crate::provenance::{Source, add_target_site_as_source, validate_confidence_score, validate_sources};
use crate::sanitize::is_web_url;
use crate::schema::EnhancedAnalysis;

/// Validate and repair a raw analysis, returning the repaired JSON object.
///
/// # Errors
///
/// `AnalysisMustBeObject` if `raw` is not a JSON object.
pub fn validate_enhanced_analysis(
    raw: &Value,
    target_url: &str,
    first_party: Option<&FirstPartyData>,
) -> ValidationResult<Value> {
    let mut analysis = raw.as_object().cloned().ok_or_else(|| {
        ValidationError::new(
            ValidationKind::AnalysisMustBeObject,
            "Analysis must be an object",
        )
    })?;

    if let Some(technical) = analysis.get_mut("technical").and_then(Value::as_object_mut) {
        repair_confidence(technical);
    }

    if let Some(market) = analysis.get_mut("market").and_then(Value::as_object_mut) {
        if let Some(competitors) = market.get_mut("competitors").and_then(Value::as_array_mut) {
            competitors
                .iter_mut()
                .filter_map(Value::as_object_mut)
                .for_each(|c| drop_invalid_url(c, "url"));
        }
    }

    if let Some(data) = analysis.get_mut("data").and_then(Value::as_object_mut) {
        if let Some(traffic) = data.get_mut("trafficEstimates").and_then(Value::as_object_mut) {
            drop_invalid_url(traffic, "source");
        }
        if let Some(metrics) = data.get_mut("keyMetrics").and_then(Value::as_array_mut) {
            metrics
                .iter_mut()
                .filter_map(Value::as_object_mut)
                .for_each(|m| drop_invalid_url(m, "source"));
        }
    }

    let sources = repair_sources(analysis.get("sources"));
    let sources = add_target_site_as_source(sources, target_url, first_party);
    let sources = serde_json::to_value(sources).or_default_logged(
        "Failed to serialize sources",
        Value::Array(Vec::new()),
    );
    analysis.insert("sources".to_string(), sources);

    Ok(Value::Object(analysis))
}

/// Validate, repair, and parse a raw analysis into the typed schema.
///
/// # Errors
///
/// `AnalysisMustBeObject` for non-object payloads, `SchemaMismatch` when a
/// required section is missing or mistyped after repair.
pub fn finalize_analysis(
    raw: &Value,
    target_url: &str,
    first_party: Option<&FirstPartyData>,
) -> ValidationResult<EnhancedAnalysis> {
    let repaired = validate_enhanced_analysis(raw, target_url, first_party)?;
    serde_json::from_value(repaired).map_err(|e| {
        ValidationError::new(
            ValidationKind::SchemaMismatch,
            format!("Analysis failed schema validation: {e}"),
        )
    })
}

fn repair_confidence(technical: &mut Map<String, Value>) {
    match validate_confidence_score(technical.get("confidence")) {
        Ok(Some(_)) => {}
        Ok(None) => {
            technical.remove("confidence");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Dropping invalid confidence score");
            technical.remove("confidence");
        }
    }
}

fn drop_invalid_url(obj: &mut Map<String, Value>, key: &str) {
    let valid = match obj.get(key) {
        None => return,
        Some(Value::String(s)) => is_web_url(s),
        Some(_) => false,
    };
    if !valid {
        tracing::warn!(field = key, "Dropping invalid URL field");
        obj.remove(key);
    }
}

/// Any invalid entry empties the whole list; partial lists are never kept.
fn repair_sources(raw: Option<&Value>) -> Vec<Source> {
    raw.map_or_else(
        || Ok(Vec::new()),
        validate_sources,
    )
    .or_default_logged("Discarding invalid sources", Vec::new())
}
