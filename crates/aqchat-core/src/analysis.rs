//! Contracts for the external analysis collaborators.
//!
//! The aggregation engine, the long-form analysis service, and the
//! vector-backed analysis store are all outside this core; only their
//! consumed surfaces live here. Each downstream call returns its own
//! concrete result type with a named raw-text field, so no call site has
//! to populate result shapes dynamically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::extract::DateRange;

/// One aggregate statistics row for a pollutant parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    /// Versioned parameter code (see `extract::normalize_db_parameter`).
    pub parameter: String,
    pub average: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub measurement_count: u64,
    pub unit: Option<String>,
}

/// Numeric aggregation engine over raw measurements.
#[async_trait]
pub trait AggregateEngine: Send + Sync {
    /// Computes aggregate statistics per normalized parameter over the
    /// given device set and half-open UTC range.
    async fn aggregates(
        &self,
        device_ids: &[String],
        range: DateRange,
        parameters: &[String],
    ) -> Result<Vec<AggregateRow>>;
}

/// Long-form time-range analysis output; the reply uses `raw_text`
/// verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRangeAnalysis {
    pub raw_text: String,
}

/// Monthly comparison output; the reply uses `raw_text` verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyComparison {
    pub raw_text: String,
}

/// External long-form analysis/report generation service.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn time_range_analysis(
        &self,
        tenant_slug: &str,
        range: DateRange,
        pollutants: &[String],
        comparison: Option<DateRange>,
    ) -> Result<TimeRangeAnalysis>;

    async fn monthly_comparison(
        &self,
        tenant_slug: &str,
        month1: &str,
        month2: &str,
        year: Option<i32>,
    ) -> Result<MonthlyComparison>;
}

/// One similarity hit from the vector analysis store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisHit {
    pub score: f64,
    pub text: String,
    pub kind: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Vector-similarity store of historical analyses.
#[async_trait]
pub trait VectorAnalysisStore: Send + Sync {
    /// Persists an analysis text for later retrieval; returns its id.
    async fn save_analysis(
        &self,
        tenant_slug: &str,
        text: &str,
        kind: &str,
        metadata: serde_json::Value,
    ) -> Result<String>;

    /// Similarity search over a tenant's saved analyses.
    async fn search_analysis(
        &self,
        tenant_slug: &str,
        query: &str,
        limit: usize,
        score_threshold: f64,
        filter_kind: Option<&str>,
    ) -> Result<Vec<AnalysisHit>>;
}
