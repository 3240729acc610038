//! Vendor API credentials.
//!
//! Held in a [`CredentialStore`] that is created once at startup and passed
//! explicitly to whatever needs it (the vendor client, the settings
//! endpoints). The lifecycle is load → update → clear; absence of
//! credentials is a normal state that routes research to synthetic data.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use thiserror::Error;

use crate::config::CredentialsConfig;

pub const ENV_CLIENT_ID: &str = "NAVER_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "NAVER_CLIENT_SECRET";
pub const ENV_CUSTOMER_ID: &str = "NAVER_CUSTOMER_ID";

/// Returned by credentialed sources when no client id/secret is configured.
#[derive(Debug, Error)]
#[error("vendor credentials are not configured")]
pub struct MissingCredentials;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub customer_id: Option<String>,
}

impl Credentials {
    /// Client id and secret, when both are set. Search and trend APIs need both.
    pub fn search_pair(&self) -> Option<(String, String)> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => Some((id.clone(), secret.clone())),
            _ => None,
        }
    }
}

/// Partial update; `None` and empty strings leave a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialUpdate {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    pub is_configured: bool,
    pub has_client_id: bool,
    pub has_client_secret: bool,
    pub has_customer_id: bool,
    pub client_id_masked: String,
    pub client_secret_masked: String,
    pub customer_id_masked: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialCheck {
    pub is_valid: bool,
    pub message: String,
}

pub struct CredentialStore {
    inner: RwLock<Credentials>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl CredentialStore {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            inner: RwLock::new(credentials),
        }
    }

    pub fn empty() -> Self {
        Self::new(Credentials::default())
    }

    /// Config file values, overridden by the process environment.
    pub fn load(config: &CredentialsConfig) -> Self {
        Self::load_with(config, |name| std::env::var(name).ok())
    }

    /// Like [`load`](Self::load) with an injectable environment lookup.
    pub fn load_with<F>(config: &CredentialsConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |var: &str, file: &Option<String>| non_empty(env(var)).or_else(|| non_empty(file.clone()));
        let credentials = Credentials {
            client_id: pick(ENV_CLIENT_ID, &config.client_id),
            client_secret: pick(ENV_CLIENT_SECRET, &config.client_secret),
            customer_id: pick(ENV_CUSTOMER_ID, &config.customer_id),
        };
        tracing::debug!(
            has_client_id = credentials.client_id.is_some(),
            has_client_secret = credentials.client_secret.is_some(),
            has_customer_id = credentials.customer_id.is_some(),
            "credentials loaded"
        );
        Self::new(credentials)
    }

    pub fn snapshot(&self) -> Credentials {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn update(&self, update: CredentialUpdate) -> CredentialStatus {
        {
            let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
            if let Some(v) = non_empty(update.client_id) {
                guard.client_id = Some(v);
            }
            if let Some(v) = non_empty(update.client_secret) {
                guard.client_secret = Some(v);
            }
            if let Some(v) = non_empty(update.customer_id) {
                guard.customer_id = Some(v);
            }
        }
        tracing::info!("credentials updated");
        self.status()
    }

    pub fn clear(&self) -> CredentialStatus {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Credentials::default();
        tracing::info!("credentials cleared");
        self.status()
    }

    pub fn status(&self) -> CredentialStatus {
        let c = self.snapshot();
        CredentialStatus {
            is_configured: c.client_id.is_some() && c.client_secret.is_some() && c.customer_id.is_some(),
            has_client_id: c.client_id.is_some(),
            has_client_secret: c.client_secret.is_some(),
            has_customer_id: c.customer_id.is_some(),
            client_id_masked: mask(c.client_id.as_deref()),
            client_secret_masked: mask(c.client_secret.as_deref()),
            customer_id_masked: mask(c.customer_id.as_deref()),
        }
    }
}

/// Mask a secret for display: empty when absent, all `*` up to 8 chars,
/// otherwise the first and last 4 chars around `*`s.
pub fn mask(value: Option<&str>) -> String {
    let chars: Vec<char> = match value {
        Some(v) if !v.is_empty() => v.chars().collect(),
        _ => return String::new(),
    };
    let n = chars.len();
    if n <= 8 {
        return "*".repeat(n);
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[n - 4..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(n - 8))
}
