//! Query and mutation execution against the bound application.
//!
//! Requests travel as a GraphQL envelope serialized to a string. A query is
//! raced against a timer; mutations repeat the query on timeout only, with
//! linear backoff between attempts.
//!
//! When the timer fires the request future is dropped. The node may still
//! execute a mutation that was already delivered, so a retried mutation can
//! land twice on a slow chain; callers should keep operations idempotent
//! where the contract allows it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::ConnectionAdapter;
use crate::config::RetryPolicy;
use crate::error::{AdapterError, Result};

/// GraphQL request envelope
#[derive(Debug, Clone, Serialize)]
pub struct GraphQlRequest<'a> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<&'a serde_json::Value>,
}

/// GraphQL response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub path: Option<Vec<serde_json::Value>>,
}

impl GraphQlResponse {
    /// Decode the success payload; a non-empty error list fails with its
    /// first message.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T> {
        if let Some(first) = self.errors.as_ref().and_then(|errors| errors.first()) {
            return Err(AdapterError::Query(first.message.clone()));
        }

        match self.data {
            Some(data) if !data.is_null() => Ok(serde_json::from_value(data)?),
            _ => Err(AdapterError::Application("response carried no data".into())),
        }
    }
}

impl ConnectionAdapter {
    /// Run a GraphQL query against the bound application.
    ///
    /// `timeout` defaults to the configured query timeout. Never retries.
    pub async fn query<T: DeserializeOwned>(
        &self,
        request: &str,
        variables: Option<serde_json::Value>,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let binding = self.binding().ok_or(AdapterError::NotBound)?;
        let timeout = timeout.unwrap_or_else(|| self.config().query_timeout());

        let payload = serde_json::to_string(&GraphQlRequest {
            query: request,
            variables: variables.as_ref(),
        })?;

        debug!(
            application = %binding.application_id(),
            bytes = payload.len(),
            "Sending query"
        );

        let raw = match tokio::time::timeout(timeout, binding.application().query(&payload)).await {
            Ok(response) => response?,
            Err(_) => {
                warn!(
                    application = %binding.application_id(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Query timed out"
                );
                return Err(AdapterError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        };

        let response: GraphQlResponse = serde_json::from_str(&raw)?;
        response.into_data()
    }

    /// Run a GraphQL mutation, retrying attempts that time out.
    ///
    /// Any error other than a timeout is returned immediately. After attempt
    /// `n` times out the adapter waits `n * base_delay`. When every attempt
    /// times out the result is [`AdapterError::RetriesExhausted`].
    pub async fn mutate<T: DeserializeOwned>(
        &self,
        request: &str,
        variables: Option<serde_json::Value>,
        policy: Option<RetryPolicy>,
    ) -> Result<T> {
        let policy = policy.unwrap_or_else(|| self.config().retry_policy());
        let max_attempts = policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self
                .query::<T>(request, variables.clone(), Some(policy.attempt_timeout))
                .await
            {
                Ok(response) => {
                    if attempt > 1 {
                        info!(attempt, "Mutation succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(e) if e.is_timeout() => {
                    if attempt < max_attempts {
                        let delay = policy.delay_after(attempt);
                        warn!(
                            attempt,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            "Mutation timed out, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        error!(attempts = max_attempts, "Mutation retries exhausted");
        Err(AdapterError::RetriesExhausted {
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_absent_variables() {
        let body = serde_json::to_value(GraphQlRequest {
            query: "query { hello }",
            variables: None,
        })
        .unwrap();
        assert_eq!(body, json!({ "query": "query { hello }" }));

        let vars = json!({ "id": 7 });
        let body = serde_json::to_value(GraphQlRequest {
            query: "query Job($id: Int!) { job(id: $id) { id } }",
            variables: Some(&vars),
        })
        .unwrap();
        assert_eq!(body["variables"]["id"], 7);
    }

    #[test]
    fn test_first_error_wins() {
        let response: GraphQlResponse = serde_json::from_value(json!({
            "data": { "jobs": [] },
            "errors": [{ "message": "Job not found: 9" }, { "message": "second" }]
        }))
        .unwrap();

        let err = response.into_data::<serde_json::Value>().unwrap_err();
        assert_eq!(err, AdapterError::Query("Job not found: 9".into()));
    }

    #[test]
    fn test_empty_error_list_is_success() {
        let response: GraphQlResponse =
            serde_json::from_value(json!({ "data": { "hello": "hi" }, "errors": [] })).unwrap();
        let data: serde_json::Value = response.into_data().unwrap();
        assert_eq!(data["hello"], "hi");
    }

    #[test]
    fn test_missing_data_is_application_error() {
        let response: GraphQlResponse = serde_json::from_value(json!({ "data": null })).unwrap();
        let err = response.into_data::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, AdapterError::Application(_)));
    }
}
