//! HTTP fetcher implementation
//!
//! This module handles the transport side of platform API calls:
//! - Building the HTTP client with the configured user agent
//! - Sending a prepared request and reading the body
//! - Classifying the response for the rate governor
//!
//! # Response Classification
//!
//! | Condition | Result |
//! |-----------|--------|
//! | 2xx | Success |
//! | 403/429 with `x-ratelimit-remaining: 0` | QuotaExhausted |
//! | 403/429 with `retry-after` | QuotaExhausted |
//! | 403 mentioning "access blocked" | Blocked |
//! | 451 | Blocked |
//! | anything else | Failed |

use crate::config::ApiConfig;
use crate::crawler::governor::ApiResponse;
use crate::{Result, SponsorGraphError};
use chrono::Utc;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;

/// Fallback wait when an exhausted response carries no reset time
const DEFAULT_RESET_SECS: i64 = 60;

/// Classification of one HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    QuotaExhausted { reset_epoch: i64 },
    Blocked,
    Failed,
}

/// Body of a successful response plus the rate-limit reset it advertised
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub body: String,
    pub reset_epoch: Option<i64>,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The API configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ApiConfig) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Reads the advertised quota reset time (unix seconds)
pub fn reset_epoch(headers: &HeaderMap) -> Option<i64> {
    header_i64(headers, "x-ratelimit-reset")
}

/// Classifies a response by status, rate-limit headers and body
pub fn classify_response(status: StatusCode, headers: &HeaderMap, body: &str) -> ResponseClass {
    if status.is_success() {
        return ResponseClass::Success;
    }

    if status == StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS {
        return ResponseClass::Blocked;
    }

    if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
        let now = Utc::now().timestamp();

        if header_i64(headers, "x-ratelimit-remaining") == Some(0) {
            let reset = reset_epoch(headers).unwrap_or(now + DEFAULT_RESET_SECS);
            return ResponseClass::QuotaExhausted { reset_epoch: reset };
        }

        // Secondary limits only say how long to back off
        if let Some(retry_after) = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
        {
            return ResponseClass::QuotaExhausted {
                reset_epoch: now + retry_after,
            };
        }

        if status == StatusCode::FORBIDDEN && body.to_lowercase().contains("access blocked") {
            return ResponseClass::Blocked;
        }
    }

    ResponseClass::Failed
}

/// Sends a prepared request and classifies the response
///
/// Transport failures become [`SponsorGraphError::Http`]; responses classified
/// as failed become [`SponsorGraphError::Api`].
pub async fn execute_request(request: RequestBuilder, url: &str) -> Result<ApiResponse<RawResponse>> {
    let response = request.send().await.map_err(|source| SponsorGraphError::Http {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    let headers = response.headers().clone();
    let body = response.text().await.map_err(|source| SponsorGraphError::Http {
        url: url.to_string(),
        source,
    })?;

    match classify_response(status, &headers, &body) {
        ResponseClass::Success => Ok(ApiResponse::Success(RawResponse {
            body,
            reset_epoch: reset_epoch(&headers),
        })),
        ResponseClass::QuotaExhausted { reset_epoch } => {
            Ok(ApiResponse::QuotaExhausted { reset_epoch })
        }
        ResponseClass::Blocked => {
            tracing::debug!("{} answered HTTP {}, treating as empty", url, status.as_u16());
            Ok(ApiResponse::Blocked)
        }
        ResponseClass::Failed => {
            Err(SponsorGraphError::Api {
                url: url.to_string(),
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            })
        }
    }
}
