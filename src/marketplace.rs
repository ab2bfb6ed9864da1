//! Typed job marketplace calls over a [`ConnectionAdapter`]
//!
//! Reads go through `query` with the configured timeout; writes go through
//! `mutate` and inherit its timeout retry policy. Contract rules (who may
//! bid, accept or rate) are enforced on chain; the only local check is the
//! rating range, which the contract would reject anyway.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::adapter::ConnectionAdapter;
use crate::error::{AdapterError, Result};
use crate::models::*;
use crate::queries;

/// Typed client for the marketplace application
#[derive(Clone)]
pub struct MarketplaceClient {
    adapter: ConnectionAdapter,
}

#[derive(Deserialize)]
struct JobsData {
    jobs: Vec<Job>,
}

#[derive(Deserialize)]
struct JobData {
    job: Option<Job>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobsCountData {
    jobs_count: u64,
}

#[derive(Deserialize)]
struct AgentsData {
    agents: Vec<AgentProfile>,
}

#[derive(Deserialize)]
struct AgentData {
    agent: Option<AgentProfile>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentRatingsData {
    agent_ratings: Vec<AgentRating>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentsCountData {
    agents_count: u64,
}

#[derive(Deserialize)]
struct StatsData {
    stats: MarketplaceStats,
}

impl MarketplaceClient {
    pub fn new(adapter: ConnectionAdapter) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &ConnectionAdapter {
        &self.adapter
    }

    // === Queries ===

    pub async fn jobs(
        &self,
        filter: Option<JobFilter>,
        sort: Option<(JobSortField, SortDirection)>,
        page: Page,
    ) -> Result<Vec<Job>> {
        let variables = list_variables(filter, sort, page)?;
        let data: JobsData = self.read(queries::GET_JOBS, Some(variables)).await?;
        Ok(data.jobs)
    }

    pub async fn job(&self, id: u64) -> Result<Option<Job>> {
        let data: JobData = self.read(queries::GET_JOB, Some(json!({ "id": id }))).await?;
        Ok(data.job)
    }

    pub async fn jobs_count(&self, status: Option<JobStatus>) -> Result<u64> {
        let variables = match status {
            Some(status) => json!({ "status": status }),
            None => json!({}),
        };
        let data: JobsCountData = self.read(queries::GET_JOBS_COUNT, Some(variables)).await?;
        Ok(data.jobs_count)
    }

    pub async fn agents(
        &self,
        filter: Option<AgentFilter>,
        sort: Option<(AgentSortField, SortDirection)>,
        page: Page,
    ) -> Result<Vec<AgentProfile>> {
        let variables = list_variables(filter, sort, page)?;
        let data: AgentsData = self.read(queries::GET_AGENTS, Some(variables)).await?;
        Ok(data.agents)
    }

    pub async fn agent(&self, owner: &str) -> Result<Option<AgentProfile>> {
        let data: AgentData = self
            .read(queries::GET_AGENT, Some(json!({ "owner": owner })))
            .await?;
        Ok(data.agent)
    }

    pub async fn agent_ratings(&self, agent_owner: &str) -> Result<Vec<AgentRating>> {
        let data: AgentRatingsData = self
            .read(queries::GET_AGENT_RATINGS, Some(json!({ "agentOwner": agent_owner })))
            .await?;
        Ok(data.agent_ratings)
    }

    pub async fn agents_count(&self) -> Result<u64> {
        let data: AgentsCountData = self.read(queries::GET_AGENTS_COUNT, None).await?;
        Ok(data.agents_count)
    }

    pub async fn stats(&self) -> Result<MarketplaceStats> {
        let data: StatsData = self.read(queries::GET_STATS, None).await?;
        Ok(data.stats)
    }

    // === Mutations ===

    pub async fn post_job(&self, description: &str, payment: &str) -> Result<Value> {
        self.write(
            queries::POST_JOB,
            json!({ "description": description, "payment": payment }),
        )
        .await
    }

    pub async fn place_bid(&self, job_id: u64) -> Result<Value> {
        self.write(queries::PLACE_BID, json!({ "jobId": job_id })).await
    }

    pub async fn accept_bid(&self, job_id: u64, agent: &str) -> Result<Value> {
        self.write(queries::ACCEPT_BID, json!({ "jobId": job_id, "agent": agent }))
            .await
    }

    pub async fn complete_job(&self, job_id: u64) -> Result<Value> {
        self.write(queries::COMPLETE_JOB, json!({ "jobId": job_id })).await
    }

    pub async fn register_agent(&self, name: &str, service_description: &str) -> Result<Value> {
        self.write(
            queries::REGISTER_AGENT,
            json!({ "name": name, "serviceDescription": service_description }),
        )
        .await
    }

    /// Rate the agent of a completed job (1-5 stars)
    pub async fn rate_agent(&self, job_id: u64, rating: u8, review: &str) -> Result<Value> {
        if !(1..=5).contains(&rating) {
            return Err(AdapterError::Config(format!(
                "rating must be between 1 and 5, got {}",
                rating
            )));
        }
        self.write(
            queries::RATE_AGENT,
            json!({ "jobId": job_id, "rating": rating, "review": review }),
        )
        .await
    }

    pub async fn update_agent_profile(
        &self,
        name: Option<&str>,
        service_description: Option<&str>,
    ) -> Result<Value> {
        self.write(
            queries::UPDATE_AGENT_PROFILE,
            json!({ "name": name, "serviceDescription": service_description }),
        )
        .await
    }

    async fn read<T: serde::de::DeserializeOwned>(
        &self,
        request: &str,
        variables: Option<Value>,
    ) -> Result<T> {
        self.adapter.query(request, variables, None).await
    }

    async fn write(&self, request: &str, variables: Value) -> Result<Value> {
        self.adapter.mutate(request, Some(variables), None).await
    }
}

/// Variables shared by the `jobs` and `agents` list queries
fn list_variables<F: serde::Serialize, S: serde::Serialize>(
    filter: Option<F>,
    sort: Option<(S, SortDirection)>,
    page: Page,
) -> Result<Value> {
    let mut variables = serde_json::Map::new();
    if let Some(filter) = filter {
        variables.insert("filter".into(), serde_json::to_value(filter)?);
    }
    if let Some((field, direction)) = sort {
        variables.insert("sortBy".into(), serde_json::to_value(field)?);
        variables.insert("sortDir".into(), serde_json::to_value(direction)?);
    }
    if let Some(limit) = page.limit {
        variables.insert("limit".into(), json!(limit));
    }
    if let Some(offset) = page.offset {
        variables.insert("offset".into(), json!(offset));
    }
    Ok(Value::Object(variables))
}
