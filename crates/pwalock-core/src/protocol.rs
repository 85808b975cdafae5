//! JSON bodies exchanged between the client and the server

use serde::{Deserialize, Serialize};

use crate::config::EffectiveConfig;
use crate::pin::{ReportOutcome, VerifyOutcome};

/// `status` field of every response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiStatus {
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "fail")]
    Fail,
    #[serde(rename = "lockedOut")]
    LockedOut,
    #[serde(rename = "not_configured")]
    NotConfigured,
    #[serde(rename = "error")]
    Error,
}

/// Generic status response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: ApiStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusBody {
    pub fn ok() -> Self {
        Self::new(ApiStatus::Ok)
    }

    pub fn new(status: ApiStatus) -> Self {
        Self {
            status,
            remaining: None,
            message: None,
        }
    }

    pub fn with_remaining(mut self, remaining: u32) -> Self {
        self.remaining = Some(remaining);
        self
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ApiStatus::Error,
            remaining: None,
            message: Some(message.into()),
        }
    }
}

impl From<VerifyOutcome> for StatusBody {
    fn from(outcome: VerifyOutcome) -> Self {
        match outcome {
            VerifyOutcome::Unlocked => StatusBody::ok(),
            VerifyOutcome::Fail { remaining } => {
                StatusBody::new(ApiStatus::Fail).with_remaining(remaining)
            }
            VerifyOutcome::LockedOut => StatusBody::new(ApiStatus::LockedOut).with_remaining(0),
            VerifyOutcome::NotConfigured => StatusBody::new(ApiStatus::NotConfigured),
        }
    }
}

impl From<ReportOutcome> for StatusBody {
    fn from(outcome: ReportOutcome) -> Self {
        match outcome {
            ReportOutcome::Recorded => StatusBody::ok(),
            ReportOutcome::LockedOut => StatusBody::new(ApiStatus::LockedOut),
        }
    }
}

/// `GET /config/effective` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub status: ApiStatus,
    #[serde(flatten)]
    pub config: EffectiveConfig,
}

impl ConfigResponse {
    pub fn ok(config: EffectiveConfig) -> Self {
        Self {
            status: ApiStatus::Ok,
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verify_outcome_bodies() {
        let body = serde_json::to_value(StatusBody::from(VerifyOutcome::Fail { remaining: 2 }))
            .unwrap();
        assert_eq!(body, json!({"status": "fail", "remaining": 2}));

        let body = serde_json::to_value(StatusBody::from(VerifyOutcome::LockedOut)).unwrap();
        assert_eq!(body, json!({"status": "lockedOut", "remaining": 0}));

        let body = serde_json::to_value(StatusBody::from(VerifyOutcome::NotConfigured)).unwrap();
        assert_eq!(body, json!({"status": "not_configured"}));

        let body = serde_json::to_value(StatusBody::from(VerifyOutcome::Unlocked)).unwrap();
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[test]
    fn test_config_response_is_flat() {
        let body = serde_json::to_value(ConfigResponse::ok(EffectiveConfig::default())).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["maxFailures"], 5);
        assert_eq!(body["askOnBackground"], true);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: ConfigResponse =
            serde_json::from_value(json!({"status": "ok", "hasServerPin": true})).unwrap();
        assert!(parsed.config.has_server_pin);
        assert_eq!(parsed.config.idle_seconds, 300);
    }
}
