//! Issues authenticated fetches against the photo-network's private web
//! API using one shared cookie, with retry/backoff, header rotation, and
//! typed outcome classification. Grounded on
//! `original_source/app/services/instagram_scraper.py`'s request loop,
//! reimplemented around `reqwest` instead of `httpx`.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use serde_json::Value;

use crate::config::Settings;
use crate::error::UpstreamError;

const BASE_URL: &str = "https://www.example-photo-network.com";
const GRAPHQL_URL: &str = "https://www.example-photo-network.com/graphql/query";
const APP_ID_HEADER_VALUE: &str = "936619743392459";

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
];

#[derive(Debug, Clone)]
pub struct Profile {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub is_private: bool,
    pub follower_count: i64,
    pub following_count: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionUser {
    pub id: i64,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    Followers,
    Following,
}

impl ConnectionKind {
    fn label(self) -> &'static str {
        match self {
            ConnectionKind::Followers => "followers",
            ConnectionKind::Following => "following",
        }
    }
}

pub struct UpstreamClient {
    http: reqwest::Client,
    settings: Arc<Settings>,
}

impl UpstreamClient {
    pub fn new(http: reqwest::Client, settings: Arc<Settings>) -> Self {
        Self { http, settings }
    }

    fn random_user_agent(&self) -> &'static str {
        USER_AGENTS[rand::thread_rng().gen_range(0..USER_AGENTS.len())]
    }

    async fn random_delay(&self, min: Duration, max: Duration) {
        let millis = if max > min {
            rand::thread_rng().gen_range(min.as_millis()..=max.as_millis())
        } else {
            min.as_millis()
        };
        tokio::time::sleep(Duration::from_millis(millis as u64)).await;
    }

    fn build_request(
        &self,
        url: &str,
        params: &[(&str, String)],
        cookie: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut req = self
            .http
            .get(url)
            .query(params)
            .header("User-Agent", self.random_user_agent())
            .header("X-App-Id", APP_ID_HEADER_VALUE)
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Referer", BASE_URL)
            .header("Origin", BASE_URL);

        if let Some(cookie) = cookie {
            req = req.header("Cookie", format!("sessionid={cookie}"));
        }

        req
    }

    fn classify_status(status: u16, context: RequestContext) -> Option<UpstreamError> {
        match status {
            401 => Some(UpstreamError::SessionExpired),
            429 => Some(UpstreamError::RateLimited),
            404 if context == RequestContext::Profile => Some(UpstreamError::UserNotFound),
            200..=299 => None,
            s => Some(UpstreamError::Transient(format!("HTTP {s}"))),
        }
    }

    /// Retry loop shared by profile lookups and paginated fetches.
    /// 401/429/404 are non-retryable; 5xx and transport errors retry with
    /// exponential backoff and jitter up to `upstream_max_retries`.
    async fn request_json(
        &self,
        url: &str,
        params: &[(&str, String)],
        cookie: Option<&str>,
        context: RequestContext,
    ) -> Result<Value, UpstreamError> {
        let max_retries = self.settings.upstream_max_retries;

        for attempt in 0..=max_retries {
            let response = self.build_request(url, params, cookie).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if let Some(err) = Self::classify_status(status, context) {
                        match err {
                            UpstreamError::Transient(_) if attempt < max_retries => {
                                self.backoff(attempt).await;
                                continue;
                            }
                            UpstreamError::Transient(msg) => {
                                return Err(UpstreamError::Transient(msg));
                            }
                            non_retryable => return Err(non_retryable),
                        }
                    }
                    return resp
                        .json::<Value>()
                        .await
                        .map_err(|e| UpstreamError::Transient(format!("decode error: {e}")));
                }
                Err(e) if attempt < max_retries => {
                    tracing::warn!("upstream: transport error (attempt {}): {}", attempt, e);
                    self.backoff(attempt).await;
                }
                Err(e) => return Err(UpstreamError::Transient(format!("transport error: {e}"))),
            }
        }

        Err(UpstreamError::Transient("retries exhausted".to_string()))
    }

    async fn backoff(&self, attempt: u32) {
        let base = 2u64.saturating_pow(attempt);
        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        let seconds = base as f64 + jitter;
        tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
    }

    pub async fn get_profile(
        &self,
        handle: &str,
        cookie: Option<&str>,
    ) -> Result<Profile, UpstreamError> {
        self.random_delay(self.settings.upstream_delay_min, self.settings.upstream_delay_max)
            .await;

        let url = format!("{BASE_URL}/api/v1/users/{handle}/info");
        let value = self
            .request_json(&url, &[], cookie, RequestContext::Profile)
            .await?;

        let user = value
            .get("user")
            .ok_or_else(|| UpstreamError::Transient("malformed profile response".to_string()))?;

        Ok(Profile {
            id: user.get("id").and_then(Value::as_str).and_then(|s| s.parse().ok()).unwrap_or(0),
            username: user.get("username").and_then(Value::as_str).unwrap_or(handle).to_string(),
            full_name: user.get("full_name").and_then(Value::as_str).map(str::to_string),
            is_private: user.get("is_private").and_then(Value::as_bool).unwrap_or(false),
            follower_count: user.get("follower_count").and_then(Value::as_i64).unwrap_or(0),
            following_count: user.get("following_count").and_then(Value::as_i64).unwrap_or(0),
        })
    }

    /// Fetches the full connection list, paginating until exhausted or
    /// `max_items`. On a mid-stream `RateLimited`/`Transient` halt after at
    /// least one page succeeded, returns `IncompleteData` rather than the
    /// raw error — callers must never treat a partial list as complete.
    pub async fn fetch_connections(
        &self,
        user_id: i64,
        kind: ConnectionKind,
        cookie: Option<&str>,
        delay_min: Duration,
        delay_max: Duration,
        page_size: u32,
        max_items: u32,
        mut on_page: impl FnMut(usize, Option<usize>),
    ) -> Result<Vec<ConnectionUser>, UpstreamError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            self.random_delay(delay_min, delay_max).await;

            let mut params = vec![
                ("id".to_string(), user_id.to_string()),
                ("count".to_string(), page_size.to_string()),
            ];
            if let Some(c) = &cursor {
                params.push(("max_id".to_string(), c.clone()));
            }
            let params_ref: Vec<(&str, String)> =
                params.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();

            let page_result = self
                .request_json(&format!("{GRAPHQL_URL}/{}", kind.label()), &params_ref, cookie, RequestContext::Page)
                .await;

            let page = match page_result {
                Ok(page) => page,
                Err(e) if !items.is_empty() && matches!(e, UpstreamError::RateLimited | UpstreamError::Transient(_)) => {
                    return Err(UpstreamError::IncompleteData {
                        fetched_count: items.len(),
                        connection_type: kind.label().to_string(),
                    });
                }
                Err(e) => return Err(e),
            };

            let users: Vec<ConnectionUser> = page
                .get("users")
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default();

            let has_more = page.get("has_more").and_then(Value::as_bool).unwrap_or(false);
            let next_cursor = page.get("next_max_id").and_then(Value::as_str).map(str::to_string);

            items.extend(users);
            on_page(items.len(), None);

            if !has_more || next_cursor.is_none() || items.len() as u32 >= max_items {
                break;
            }
            cursor = next_cursor;
        }

        Ok(items)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestContext {
    Profile,
    Page,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_auth_and_rate_limit() {
        assert!(matches!(
            UpstreamClient::classify_status(401, RequestContext::Page),
            Some(UpstreamError::SessionExpired)
        ));
        assert!(matches!(
            UpstreamClient::classify_status(429, RequestContext::Page),
            Some(UpstreamError::RateLimited)
        ));
        assert!(matches!(
            UpstreamClient::classify_status(404, RequestContext::Profile),
            Some(UpstreamError::UserNotFound)
        ));
        assert!(UpstreamClient::classify_status(404, RequestContext::Page).is_some());
        assert!(UpstreamClient::classify_status(200, RequestContext::Page).is_none());
    }
}
