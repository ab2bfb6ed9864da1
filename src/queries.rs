//! GraphQL documents for the job marketplace service.
//!
//! Field and argument names follow the service schema (camelCase).
//! Mutations schedule contract operations on the bound chain.

// =============================================================================
// Queries
// =============================================================================

pub const HELLO: &str = "query { hello }";

pub const GET_JOBS: &str = r#"
query GetJobs($filter: JobFilter, $sortBy: JobSortField, $sortDir: SortDirection, $limit: Int, $offset: Int) {
  jobs(filter: $filter, sortBy: $sortBy, sortDir: $sortDir, limit: $limit, offset: $offset) {
    id
    client
    description
    payment
    status
    agent
    bids { agent bidId timestamp }
    createdAt
  }
}
"#;

pub const GET_JOB: &str = r#"
query GetJob($id: Int!) {
  job(id: $id) {
    id
    client
    description
    payment
    status
    agent
    bids { agent bidId timestamp }
    createdAt
  }
}
"#;

pub const GET_JOBS_COUNT: &str = r#"
query GetJobsCount($status: JobStatus) {
  jobsCount(status: $status)
}
"#;

pub const GET_AGENTS: &str = r#"
query GetAgents($filter: AgentFilter, $sortBy: AgentSortField, $sortDir: SortDirection, $limit: Int, $offset: Int) {
  agents(filter: $filter, sortBy: $sortBy, sortDir: $sortDir, limit: $limit, offset: $offset) {
    owner
    name
    serviceDescription
    jobsCompleted
    totalRatingPoints
    totalRatings
    registeredAt
  }
}
"#;

pub const GET_AGENT: &str = r#"
query GetAgent($owner: String!) {
  agent(owner: $owner) {
    owner
    name
    serviceDescription
    jobsCompleted
    totalRatingPoints
    totalRatings
    registeredAt
  }
}
"#;

pub const GET_AGENT_RATINGS: &str = r#"
query GetAgentRatings($agentOwner: String!) {
  agentRatings(agentOwner: $agentOwner) {
    jobId
    rater
    rating
    review
    timestamp
  }
}
"#;

pub const GET_AGENTS_COUNT: &str = "query { agentsCount }";

pub const GET_STATS: &str = r#"
query {
  stats {
    totalJobs
    postedJobs
    inProgressJobs
    completedJobs
    totalAgents
    totalPaymentVolume
  }
}
"#;

// =============================================================================
// Mutations
// =============================================================================

pub const POST_JOB: &str = r#"
mutation PostJob($description: String!, $payment: Amount!) {
  postJob(description: $description, payment: $payment)
}
"#;

pub const PLACE_BID: &str = r#"
mutation PlaceBid($jobId: Int!) {
  placeBid(jobId: $jobId)
}
"#;

pub const ACCEPT_BID: &str = r#"
mutation AcceptBid($jobId: Int!, $agent: AccountOwner!) {
  acceptBid(jobId: $jobId, agent: $agent)
}
"#;

pub const COMPLETE_JOB: &str = r#"
mutation CompleteJob($jobId: Int!) {
  completeJob(jobId: $jobId)
}
"#;

pub const REGISTER_AGENT: &str = r#"
mutation RegisterAgent($name: String!, $serviceDescription: String!) {
  registerAgent(name: $name, serviceDescription: $serviceDescription)
}
"#;

pub const RATE_AGENT: &str = r#"
mutation RateAgent($jobId: Int!, $rating: Int!, $review: String!) {
  rateAgent(jobId: $jobId, rating: $rating, review: $review)
}
"#;

pub const UPDATE_AGENT_PROFILE: &str = r#"
mutation UpdateAgentProfile($name: String, $serviceDescription: String) {
  updateAgentProfile(name: $name, serviceDescription: $serviceDescription)
}
"#;
