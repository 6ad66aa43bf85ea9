use crate::error::FetchError;
use crate::models::{BackoffMode, Config, RawVacancy};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Source of vacancy pages.
///
/// Implementations never fail: a page that could not be retrieved is
/// reported as empty, and the harvester decides what an empty page means.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, page: u32, session_token: &str) -> Vec<RawVacancy>;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: BackoffMode,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff,
            base_delay: Duration::from_millis(config.backoff_ms),
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            BackoffMode::Fixed => self.base_delay,
            BackoffMode::Linear => self.base_delay * attempt,
        }
    }
}

pub struct VacancyFetcher {
    client: reqwest::Client,
    base_url: String,
    page_limit: u32,
    timeout: Duration,
    retry: RetryPolicy,
}

impl VacancyFetcher {
    pub fn new(base_url: impl Into<String>, page_limit: u32, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            page_limit,
            timeout,
            retry,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.base_url.clone(),
            config.page_limit,
            Duration::from_secs(config.request_timeout_secs),
            RetryPolicy::from_config(config),
        )
    }

    async fn fetch_once(&self, page: u32, session_token: &str) -> Result<Vec<RawVacancy>, FetchError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("page", page.to_string()),
                ("limit", self.page_limit.to_string()),
                ("_", session_token.to_string()),
            ])
            .timeout(self.timeout)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::Status(response.status()));
        }

        let body = response.bytes().await?;
        let value: Value = serde_json::from_slice(&body)?;
        Ok(extract_page(value))
    }
}

#[async_trait]
impl PageSource for VacancyFetcher {
    async fn fetch(&self, page: u32, session_token: &str) -> Vec<RawVacancy> {
        for attempt in 1..=self.retry.max_attempts {
            match self.fetch_once(page, session_token).await {
                Ok(records) => {
                    debug!(page, attempt, count = records.len(), "fetched page");
                    return records;
                }
                Err(e) => {
                    warn!(page, attempt, timeout = e.is_timeout(), error = %e, "page fetch attempt failed");
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    }
                }
            }
        }

        warn!(page, attempts = self.retry.max_attempts, "giving up on page, treating it as empty");
        Vec::new()
    }
}

/// Pull the vacancy list out of a listing response body.
///
/// Accepts `{"data": [...]}` and the paginated `{"data": {"data": [...]}}`
/// envelope; anything else is an empty page. Non-object entries are skipped.
pub fn extract_page(body: Value) -> Vec<RawVacancy> {
    let data = match body {
        Value::Object(mut map) => map.remove("data"),
        _ => None,
    };

    let items = match data {
        Some(Value::Array(items)) => items,
        Some(Value::Object(mut inner)) => match inner.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items.into_iter().filter_map(RawVacancy::from_value).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher_for(server: &MockServer, attempts: u32) -> VacancyFetcher {
        VacancyFetcher::new(
            format!("{}/vacancies", server.uri()),
            50,
            Duration::from_millis(300),
            RetryPolicy {
                max_attempts: attempts,
                backoff: BackoffMode::Fixed,
                base_delay: Duration::from_millis(1),
            },
        )
    }

    #[test]
    fn linear_backoff_grows_with_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: BackoffMode::Linear,
            base_delay: Duration::from_millis(200),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(600));

        let fixed = RetryPolicy { backoff: BackoffMode::Fixed, ..policy };
        assert_eq!(fixed.delay_after(3), Duration::from_millis(200));
    }

    #[test]
    fn extract_page_handles_envelopes() {
        let flat = extract_page(json!({"data": [{"posisi": "A"}, 7, {"posisi": "B"}]}));
        assert_eq!(flat.len(), 2);

        let nested = extract_page(json!({"data": {"data": [{"posisi": "A"}], "total": 1}}));
        assert_eq!(nested.len(), 1);

        assert!(extract_page(json!({"data": null})).is_empty());
        assert!(extract_page(json!({"message": "ok"})).is_empty());
        assert!(extract_page(json!([{"posisi": "A"}])).is_empty());
    }

    #[tokio::test]
    async fn sends_page_limit_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/vacancies"))
            .and(query_param("page", "2"))
            .and(query_param("limit", "50"))
            .and(query_param("_", "token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"posisi": "Staf IT"}, {"posisi": "Admin"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let records = fetcher_for(&server, 3).fetch(2, "token-1").await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("posisi"), Some(&json!("Staf IT")));
    }

    #[tokio::test]
    async fn retries_after_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"posisi": "A"}]})))
            .expect(1)
            .mount(&server)
            .await;

        let records = fetcher_for(&server, 3).fetch(1, "t").await;
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_yield_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let records = fetcher_for(&server, 3).fetch(1, "t").await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_retried_then_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .expect(2)
            .mount(&server)
            .await;

        assert!(fetcher_for(&server, 2).fetch(1, "t").await.is_empty());
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": [{"posisi": "A"}]}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        assert!(fetcher_for(&server, 1).fetch(1, "t").await.is_empty());
    }
}
