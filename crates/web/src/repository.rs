//! Analysis repository layer.
//!
//! Stored records hold the analysis as an opaque, schema-versioned JSON
//! document; the typed record is recovered with [`StoredAnalysis::analysis`].
//! Every read returns owned, sorted copies so callers never alias
//! repository state.
//!
//! # Architecture
//!
//! - `AnalysisRepository`: Trait defining repository operations
//! - `InMemoryAnalysisRepository`: In-memory implementation keyed by client

#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clonescope_analysis::{AnalysisDocument, EnhancedAnalysis, ValidationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::provider::ImprovementPlan;

const DEFAULT_MAX_PER_CLIENT: usize = 1_000;

/// A persisted analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnalysis {
    pub id: Uuid,
    pub client_id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Schema-versioned analysis document.
    pub document: Value,
    #[serde(default)]
    pub improvements: Vec<ImprovementPlan>,
}

impl StoredAnalysis {
    /// Create a record holding `analysis` as a current-version document.
    ///
    /// # Errors
    ///
    /// Returns an error if the analysis cannot be serialized.
    pub fn new(
        client_id: &str,
        url: String,
        goal: Option<String>,
        analysis: EnhancedAnalysis,
    ) -> Result<Self, serde_json::Error> {
        let document = serde_json::to_value(AnalysisDocument::from(analysis))?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            client_id: client_id.to_string(),
            url,
            goal,
            created_at: now,
            updated_at: now,
            document,
            improvements: Vec::new(),
        })
    }

    /// Parse the stored document, upgrading older schema versions.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if the document does not match its version tag.
    pub fn analysis(&self) -> ValidationResult<EnhancedAnalysis> {
        AnalysisDocument::from_stored(&self.document).map(AnalysisDocument::into_current)
    }

    /// Append an improvement plan and bump `updated_at`.
    pub fn push_improvement(&mut self, plan: ImprovementPlan) {
        self.improvements.push(plan);
        self.updated_at = Utc::now();
    }
}

/// Repository errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Analysis not found for this client.
    #[error("Analysis not found: {id}")]
    NotFound { id: Uuid },

    /// Analysis already exists.
    #[error("Analysis already exists: {id}")]
    AlreadyExists { id: Uuid },

    /// Per-client capacity exceeded.
    #[error("Repository capacity exceeded: max {max} analyses per client")]
    CapacityExceeded { max: usize },
}

/// Repository trait for analysis records.
#[async_trait::async_trait]
pub trait AnalysisRepository: Send + Sync {
    /// Store a new record.
    ///
    /// # Errors
    ///
    /// Returns an error if the id already exists or capacity is exceeded.
    async fn create(&self, record: StoredAnalysis) -> Result<StoredAnalysis, RepositoryError>;

    /// Fetch one of `client_id`'s records.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is not found.
    async fn get(&self, client_id: &str, id: Uuid) -> Result<StoredAnalysis, RepositoryError>;

    /// All of `client_id`'s records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository is inaccessible.
    async fn list(&self, client_id: &str) -> Result<Vec<StoredAnalysis>, RepositoryError>;

    /// Replace an existing record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is not found.
    async fn update(&self, record: StoredAnalysis) -> Result<StoredAnalysis, RepositoryError>;
}

/// In-memory repository keyed by client id.
#[derive(Debug, Clone)]
pub struct InMemoryAnalysisRepository {
    records: Arc<RwLock<HashMap<String, Vec<StoredAnalysis>>>>,
    max_per_client: usize,
}

impl InMemoryAnalysisRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_PER_CLIENT)
    }

    #[must_use]
    pub fn with_capacity(max_per_client: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            max_per_client,
        }
    }
}

impl Default for InMemoryAnalysisRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn newest_first(mut records: Vec<StoredAnalysis>) -> Vec<StoredAnalysis> {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
}

#[async_trait::async_trait]
impl AnalysisRepository for InMemoryAnalysisRepository {
    async fn create(&self, record: StoredAnalysis) -> Result<StoredAnalysis, RepositoryError> {
        let mut records = self.records.write().await;
        let bucket = records.entry(record.client_id.clone()).or_default();

        if bucket.iter().any(|r| r.id == record.id) {
            return Err(RepositoryError::AlreadyExists { id: record.id });
        }
        if bucket.len() >= self.max_per_client {
            return Err(RepositoryError::CapacityExceeded {
                max: self.max_per_client,
            });
        }

        bucket.push(record.clone());
        tracing::debug!(id = %record.id, client_id = %record.client_id, "Stored analysis");
        Ok(record)
    }

    async fn get(&self, client_id: &str, id: Uuid) -> Result<StoredAnalysis, RepositoryError> {
        let records = self.records.read().await;
        records
            .get(client_id)
            .and_then(|bucket| bucket.iter().find(|r| r.id == id))
            .cloned()
            .ok_or(RepositoryError::NotFound { id })
    }

    async fn list(&self, client_id: &str) -> Result<Vec<StoredAnalysis>, RepositoryError> {
        let records = self.records.read().await;
        let bucket = records.get(client_id).cloned().unwrap_or_default();
        Ok(newest_first(bucket))
    }

    async fn update(&self, record: StoredAnalysis) -> Result<StoredAnalysis, RepositoryError> {
        let mut records = self.records.write().await;
        let slot = records
            .get_mut(&record.client_id)
            .and_then(|bucket| bucket.iter_mut().find(|r| r.id == record.id))
            .ok_or(RepositoryError::NotFound { id: record.id })?;

        *slot = record.clone();
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn record(client_id: &str, age_secs: i64) -> StoredAnalysis {
        let created = Utc::now() - Duration::seconds(age_secs);
        StoredAnalysis {
            id: Uuid::new_v4(),
            client_id: client_id.to_string(),
            url: "https://example.com/".to_string(),
            goal: None,
            created_at: created,
            updated_at: created,
            document: json!({}),
            improvements: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = InMemoryAnalysisRepository::new();
        let stored = repo.create(record("alice", 0)).await.unwrap();

        let fetched = repo.get("alice", stored.id).await.unwrap();
        assert_eq!(fetched, stored);
    }

    #[tokio::test]
    async fn test_get_is_scoped_to_client() {
        let repo = InMemoryAnalysisRepository::new();
        let stored = repo.create(record("alice", 0)).await.unwrap();

        let result = repo.get("bob", stored.id).await;
        assert_eq!(result, Err(RepositoryError::NotFound { id: stored.id }));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let repo = InMemoryAnalysisRepository::new();
        let stored = repo.create(record("alice", 0)).await.unwrap();
        let result = repo.create(stored.clone()).await;
        assert!(matches!(result, Err(RepositoryError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_capacity() {
        let repo = InMemoryAnalysisRepository::with_capacity(1);
        repo.create(record("alice", 0)).await.unwrap();
        let result = repo.create(record("alice", 0)).await;
        assert_eq!(result, Err(RepositoryError::CapacityExceeded { max: 1 }));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let repo = InMemoryAnalysisRepository::new();
        let old = repo.create(record("alice", 300)).await.unwrap();
        let new = repo.create(record("alice", 0)).await.unwrap();
        let mid = repo.create(record("alice", 100)).await.unwrap();

        let ids: Vec<Uuid> = repo.list("alice").await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![new.id, mid.id, old.id]);
    }

    #[tokio::test]
    async fn test_list_returns_copies() {
        let repo = InMemoryAnalysisRepository::new();
        let stored = repo.create(record("alice", 0)).await.unwrap();

        let mut listed = repo.list("alice").await.unwrap();
        listed[0].url = "https://mutated.example/".to_string();
        listed.clear();

        let again = repo.list("alice").await.unwrap();
        assert_eq!(again, vec![stored]);
    }

    #[tokio::test]
    async fn test_list_unknown_client_is_empty() {
        let repo = InMemoryAnalysisRepository::new();
        assert!(repo.list("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update() {
        let repo = InMemoryAnalysisRepository::new();
        let mut stored = repo.create(record("alice", 0)).await.unwrap();
        stored.push_improvement(ImprovementPlan {
            summary: "Add a free tier".to_string(),
            recommendations: vec!["Launch freemium".to_string()],
        });

        repo.update(stored.clone()).await.unwrap();
        let fetched = repo.get("alice", stored.id).await.unwrap();
        assert_eq!(fetched.improvements.len(), 1);

        let missing = record("alice", 0);
        assert!(matches!(
            repo.update(missing).await,
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_legacy_document_is_upgraded() {
        let mut stored = record("alice", 0);
        stored.document = json!({
            "overview": {"valueProposition": "v", "targetAudience": "t", "monetization": "m"},
            "market": {"competitors": []},
            "synthesis": {"summary": "s", "keyInsights": [], "nextActions": []}
        });

        let analysis = stored.analysis().unwrap();
        assert!(analysis.sources.is_empty());
        assert_eq!(analysis.confidence(), None);
    }
}
