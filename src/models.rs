//! Marketplace data types as returned by the service's GraphQL schema

use serde::{Deserialize, Deserializer, Serialize};

/// Job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Posted,
    InProgress,
    Completed,
}

/// A job posting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: u64,
    pub client: String,
    pub description: String,
    /// Amount in token units, as formatted by the chain (e.g. "10.5")
    pub payment: String,
    pub status: JobStatus,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub bids: Vec<Bid>,
    /// Microseconds since the epoch
    #[serde(deserialize_with = "u64_or_string")]
    pub created_at: u64,
}

/// A bid on a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub agent: String,
    pub bid_id: u64,
    #[serde(deserialize_with = "u64_or_string")]
    pub timestamp: u64,
}

/// Agent profile with reputation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    pub owner: String,
    pub name: String,
    pub service_description: String,
    pub jobs_completed: u64,
    pub total_rating_points: u64,
    pub total_ratings: u64,
    #[serde(deserialize_with = "u64_or_string")]
    pub registered_at: u64,
}

impl AgentProfile {
    /// Mean rating (1-5), or None before the first rating
    pub fn average_rating(&self) -> Option<f64> {
        if self.total_ratings == 0 {
            None
        } else {
            Some(self.total_rating_points as f64 / self.total_ratings as f64)
        }
    }
}

/// Agent rating/review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRating {
    pub job_id: u64,
    pub rater: String,
    pub rating: u8,
    pub review: String,
    #[serde(deserialize_with = "u64_or_string")]
    pub timestamp: u64,
}

/// Marketplace statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceStats {
    pub total_jobs: u64,
    pub posted_jobs: u64,
    pub in_progress_jobs: u64,
    pub completed_jobs: u64,
    pub total_agents: u64,
    pub total_payment_volume: String,
}

/// Job filter options
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_payment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_payment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
}

/// Agent filter options
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_jobs_completed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_rating: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobSortField {
    #[default]
    CreatedAt,
    Payment,
    Id,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentSortField {
    #[default]
    JobsCompleted,
    Rating,
    RegisteredAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Pagination (server defaults: offset 0, limit 100)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Timestamps arrive as numbers or numeric strings depending on the node
fn u64_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
