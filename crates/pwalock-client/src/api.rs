//! Server API used by the lock controller

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};

use pwalock_core::protocol::{ApiStatus, ConfigResponse, StatusBody};
use pwalock_core::{EffectiveConfig, ReportOutcome, VerifyOutcome};

use crate::error::{ClientError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Calls the client makes to the lock server
#[async_trait]
pub trait LockApi: Send + Sync {
    /// Effective configuration for the current user
    async fn fetch_config(&self) -> Result<EffectiveConfig>;

    /// Verify a server-mode PIN
    async fn verify_pin(&self, pin: &str) -> Result<VerifyOutcome>;

    /// Report the local-mode failure count
    async fn report_failure(&self, count: u32) -> Result<ReportOutcome>;

    /// Set or change the server-mode PIN
    async fn set_pin(&self, pin: &str) -> Result<()>;

    /// Persist the user's idle timeout
    async fn save_idle(&self, seconds: u32) -> Result<()>;

    /// Ask the server to end the session
    async fn lockdown(&self) -> Result<()>;
}

/// [`LockApi`] over HTTP with bearer authentication
#[derive(Clone)]
pub struct HttpLockApi {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpLockApi {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: None,
        })
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<Response> {
        let mut req = self.client.get(self.url(path));
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        Ok(req.send().await?)
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<Response> {
        let mut req = self.client.post(self.url(path)).form(form);
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        Ok(req.send().await?)
    }

    async fn fetch_config_at(&self, path: &str) -> Result<EffectiveConfig> {
        let response = self.get(path).await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthenticated);
        }
        if !status.is_success() {
            return Err(ClientError::Server {
                status: status.as_u16(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let body = response
            .json::<ConfigResponse>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        Ok(body.config.clamped())
    }
}

/// Read a status body regardless of the HTTP status
async fn read_status(response: Response) -> Result<(StatusCode, StatusBody)> {
    let status = response.status();
    let text = response.text().await?;
    match serde_json::from_str::<StatusBody>(&text) {
        Ok(body) => Ok((status, body)),
        Err(_) if status == StatusCode::UNAUTHORIZED => Err(ClientError::Unauthenticated),
        Err(e) => Err(ClientError::Decode(format!("HTTP {}: {}", status.as_u16(), e))),
    }
}

/// Map a non-outcome status body to an error
fn status_error(status: StatusCode, body: StatusBody) -> ClientError {
    let message = body
        .message
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthenticated,
        StatusCode::BAD_REQUEST => ClientError::InvalidInput(message),
        _ => ClientError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

/// Expect `{status:"ok"}`
async fn expect_ok(response: Response) -> Result<()> {
    let (status, body) = read_status(response).await?;
    if body.status == ApiStatus::Ok && status.is_success() {
        Ok(())
    } else {
        Err(status_error(status, body))
    }
}

#[async_trait]
impl LockApi for HttpLockApi {
    async fn fetch_config(&self) -> Result<EffectiveConfig> {
        match self.fetch_config_at("/config/effective").await {
            Ok(config) => Ok(config),
            Err(ClientError::Unauthenticated) => Err(ClientError::Unauthenticated),
            Err(e) => {
                debug!(error = %e, "Primary config route failed, trying legacy route");
                self.fetch_config_at("/config").await
            }
        }
    }

    async fn verify_pin(&self, pin: &str) -> Result<VerifyOutcome> {
        let response = self.post_form("/security/verify", &[("pin", pin)]).await?;
        let (status, body) = read_status(response).await?;

        match (body.status, status) {
            (ApiStatus::Ok, s) if s.is_success() => Ok(VerifyOutcome::Unlocked),
            (ApiStatus::Fail, _) => Ok(VerifyOutcome::Fail {
                remaining: body.remaining.unwrap_or(0),
            }),
            (ApiStatus::LockedOut, _) => Ok(VerifyOutcome::LockedOut),
            (ApiStatus::NotConfigured, _) => Ok(VerifyOutcome::NotConfigured),
            _ => Err(status_error(status, body)),
        }
    }

    async fn report_failure(&self, count: u32) -> Result<ReportOutcome> {
        let count = count.to_string();
        let response = self
            .post_form("/security/failure", &[("count", count.as_str())])
            .await?;
        let (status, body) = read_status(response).await?;

        match (body.status, status) {
            (ApiStatus::Ok, s) if s.is_success() => Ok(ReportOutcome::Recorded),
            (ApiStatus::LockedOut, _) => Ok(ReportOutcome::LockedOut),
            _ => Err(status_error(status, body)),
        }
    }

    async fn set_pin(&self, pin: &str) -> Result<()> {
        let response = self.post_form("/security/pin", &[("pin", pin)]).await?;
        expect_ok(response).await
    }

    async fn save_idle(&self, seconds: u32) -> Result<()> {
        let seconds = seconds.to_string();
        let response = self
            .post_form("/config/user", &[("idleSeconds", seconds.as_str())])
            .await?;
        expect_ok(response).await
    }

    async fn lockdown(&self) -> Result<()> {
        let response = self.post_form("/security/lockdown", &[]).await?;
        let (status, body) = read_status(response).await?;
        if body.status == ApiStatus::LockedOut {
            return Ok(());
        }
        warn!(status = status.as_u16(), "Unexpected lockdown response");
        Err(status_error(status, body))
    }
}
