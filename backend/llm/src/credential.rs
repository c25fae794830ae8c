//! Credentials for Azure-hosted cognitive services.
//!
//! One process-wide provider is created lazily on first use and shared by the
//! chat, image and analysis clients. Entra ID tokens come from the Azure CLI
//! and are cached until five minutes before expiry.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use confab_config::LlmConfig;
use confab_core::ConfabError;

/// Audience every token is requested for.
pub const COGNITIVE_SERVICES_SCOPE: &str = "https://cognitiveservices.azure.com/.default";

/// Refresh a cached token this long before it expires.
const TOKEN_REFRESH_BUFFER_SECS: i64 = 300;

/// Assumed lifetime when the CLI does not report an expiry.
const FALLBACK_TOKEN_LIFETIME_SECS: i64 = 1800;

const CLI_TIMEOUT: Duration = Duration::from_secs(30);

/// How a request is authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthHeader {
    /// `api-key: <key>`
    ApiKey(String),
    /// `Authorization: Bearer <token>`
    Bearer(String),
}

impl AuthHeader {
    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            AuthHeader::ApiKey(key) => request.header("api-key", key),
            AuthHeader::Bearer(token) => request.bearer_auth(token),
        }
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Produce a currently valid authorization header.
    async fn authorize(&self) -> Result<AuthHeader>;
}

/// Static resource key.
pub struct ApiKeyCredential {
    key: String,
}

impl ApiKeyCredential {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

#[async_trait]
impl CredentialProvider for ApiKeyCredential {
    fn name(&self) -> &str {
        "api-key"
    }

    async fn authorize(&self) -> Result<AuthHeader> {
        Ok(AuthHeader::ApiKey(self.key.clone()))
    }
}

/// A bearer token supplied up front, e.g. from a managed identity sidecar.
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenCredential {
    fn name(&self) -> &str {
        "static-token"
    }

    async fn authorize(&self) -> Result<AuthHeader> {
        Ok(AuthHeader::Bearer(self.token.clone()))
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        (self.expires_at - now).num_seconds() > TOKEN_REFRESH_BUFFER_SECS
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,
    /// Epoch seconds; only newer CLI versions emit it.
    #[serde(default, rename = "expires_on")]
    expires_on: Option<i64>,
}

/// Entra ID token obtained through `az account get-access-token`.
pub struct AzureCliCredential {
    command: Vec<String>,
    cached: Mutex<Option<CachedToken>>,
}

impl AzureCliCredential {
    pub fn new() -> Self {
        Self::with_command(vec![
            "az".into(),
            "account".into(),
            "get-access-token".into(),
            "--scope".into(),
            COGNITIVE_SERVICES_SCOPE.into(),
            "--output".into(),
            "json".into(),
        ])
    }

    /// Use a different token command; it must print the CLI's JSON shape.
    pub fn with_command(command: Vec<String>) -> Self {
        Self {
            command,
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<CachedToken> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| ConfabError::Credential("empty token command".into()))?;
        debug!(program = %program, "Requesting access token");

        let output = tokio::time::timeout(
            CLI_TIMEOUT,
            tokio::process::Command::new(program).args(args).output(),
        )
        .await
        .map_err(|_| ConfabError::Credential("token command timed out".into()))?
        .with_context(|| format!("Failed to run {program}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ConfabError::Credential(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr.trim()
            ))
            .into());
        }
        parse_cli_token(&output.stdout, Utc::now())
    }
}

impl Default for AzureCliCredential {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_cli_token(stdout: &[u8], now: DateTime<Utc>) -> Result<CachedToken> {
    let parsed: CliTokenResponse =
        serde_json::from_slice(stdout).context("Unexpected token command output")?;
    let expires_at = parsed
        .expires_on
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(|| now + chrono::Duration::seconds(FALLBACK_TOKEN_LIFETIME_SECS));
    Ok(CachedToken {
        token: parsed.access_token,
        expires_at,
    })
}

#[async_trait]
impl CredentialProvider for AzureCliCredential {
    fn name(&self) -> &str {
        "azure-cli"
    }

    async fn authorize(&self) -> Result<AuthHeader> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(AuthHeader::Bearer(token.token.clone()));
        }
        let token = self.fetch().await?;
        info!(expires_at = %token.expires_at, "Acquired access token");
        let header = AuthHeader::Bearer(token.token.clone());
        *cached = Some(token);
        Ok(header)
    }
}

static SHARED: OnceCell<Arc<dyn CredentialProvider>> = OnceCell::new();

/// The process-wide credential, created on first call from the chat config.
///
/// A configured API key wins; otherwise Entra ID tokens are used.
pub fn shared_credential(config: &LlmConfig) -> Arc<dyn CredentialProvider> {
    SHARED
        .get_or_init(|| match config.api_key.as_deref() {
            Some(key) => Arc::new(ApiKeyCredential::new(key)),
            None => Arc::new(AzureCliCredential::new()),
        })
        .clone()
}
