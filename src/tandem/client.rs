//! t:connect HTTP client
//!
//! Logs in with account credentials, then runs the ControlIQ data queries
//! for a date range. Each query result is stored under its key in one JSON
//! object; `ciqEvents` is the feed the importer consumes.

use super::{DateRange, TandemError, TandemLogin, TherapyDataSource};
use crate::config::TandemConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// Key of the therapy event feed in fetched data
pub const QUERY_EVENTS: &str = "ciqEvents";

/// One retrievable data source
#[derive(Debug, Clone, Copy)]
struct DataQuery {
    key: &'static str,
    desc: &'static str,
    /// Path under the base URL; `{user}` is replaced by the account GUID
    path: &'static str,
    /// Consumed by the importer (others are only dumped to file)
    used: bool,
}

const QUERIES: &[DataQuery] = &[
    DataQuery {
        key: "ciqSummary",
        desc: "ControlIQ dashboard summary",
        path: "tconnect/controliq/api/summary/summary/{user}",
        used: false,
    },
    DataQuery {
        key: "ciqTimeline",
        desc: "ControlIQ therapy timeline",
        path: "tconnect/controliq/api/therapytimeline/users/{user}",
        used: false,
    },
    DataQuery {
        key: QUERY_EVENTS,
        desc: "ControlIQ event history",
        path: "tconnect/controliq/api/therapyevents/tconnect/{user}",
        used: true,
    },
];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_token: String,
    user_guid: String,
}

/// t:connect API integration
pub struct TandemClient {
    client: Client,
    config: TandemConfig,
    login: TandemLogin,
}

impl TandemClient {
    pub fn new(config: TandemConfig, login: TandemLogin) -> Result<Self, TandemError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            config,
            login,
        })
    }

    async fn sign_in(&self) -> Result<Session, TandemError> {
        tracing::info!("Logging in to t:connect as {}", self.login);

        let response = self
            .client
            .post(&self.config.login_url)
            .json(&serde_json::json!({
                "username": self.login.email,
                "password": self.login.password,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TandemError::AuthFailed(format!(
                "login returned {}",
                response.status()
            )));
        }

        response
            .json::<Session>()
            .await
            .map_err(|e| TandemError::Parse(format!("login response: {}", e)))
    }

    async fn run_query(
        &self,
        session: &Session,
        query: &DataQuery,
        range: &DateRange,
    ) -> Result<Value, TandemError> {
        let (start, end) = range.api_dates();
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            query.path.replace("{user}", &session.user_guid)
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&session.access_token)
            .query(&[("startDate", start.as_str()), ("endDate", end.as_str())])
            .send()
            .await?;

        if response.status() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            return Err(TandemError::RateLimited(retry_after));
        }

        if !response.status().is_success() {
            return Err(TandemError::Api(format!(
                "{} returned {}",
                query.desc,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TandemError::Parse(format!("{}: {}", query.desc, e)))
    }
}

#[async_trait]
impl TherapyDataSource for TandemClient {
    fn name(&self) -> &str {
        "t:connect"
    }

    async fn fetch(&self, range: &DateRange, all_sources: bool) -> Result<Value, TandemError> {
        let session = self.sign_in().await?;
        let mut data = Map::new();

        for query in QUERIES.iter().filter(|q| q.used || all_sources) {
            tracing::info!("Querying for {}", query.desc);
            match self.run_query(&session, query, range).await {
                Ok(value) => {
                    data.insert(query.key.to_string(), value);
                }
                Err(e) => tracing::error!("Error querying for {}: {}", query.desc, e),
            }
        }

        Ok(Value::Object(data))
    }
}
