//! Auth methods and credential resolution

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::FedsyncError;
use crate::secrets::SecretStore;

/// Recognized federation auth methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMethod {
    Bearer,
    ApiKey,
    NoAuth,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bearer => "BEARER",
            Self::ApiKey => "API_KEY",
            Self::NoAuth => "NO_AUTH",
        }
    }
}

impl FromStr for AuthMethod {
    type Err = FedsyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BEARER" => Ok(Self::Bearer),
            "API_KEY" => Ok(Self::ApiKey),
            "NO_AUTH" => Ok(Self::NoAuth),
            _ => Err(FedsyncError::UnknownAuthMethod(s.to_string())),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A resolved federation credential.
///
/// Tagged by auth method so callers never inspect raw secret payloads; the
/// wire shapes (`{bearer_token}`, `{api_key, client_id, client_secret}`)
/// stay private to this module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretPayload {
    Bearer {
        token: String,
    },
    ApiKey {
        key: String,
        client_id: String,
        client_secret: String,
    },
    None,
}

impl SecretPayload {
    /// Attach this credential to an outgoing request.
    ///
    /// `Bearer` becomes an `Authorization: Bearer` header, `ApiKey` an
    /// `apikey` header, `None` leaves the request untouched.
    pub fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            SecretPayload::Bearer { token } => request.bearer_auth(token),
            SecretPayload::ApiKey { key, .. } => request.header("apikey", key),
            SecretPayload::None => request,
        }
    }
}

#[derive(Deserialize)]
struct BearerTokenPayload {
    bearer_token: String,
}

#[derive(Deserialize)]
struct ApiKeyPayload {
    api_key: String,
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    client_secret: String,
}

/// Resolve a federation's secret reference into a usable credential.
///
/// `NoAuth` resolves without contacting the secret backend. Backend errors
/// surface unchanged so the caller can skip the federation for this run;
/// there is no inline retry.
pub async fn resolve_credential(
    store: &dyn SecretStore,
    method: AuthMethod,
    secret_name: &str,
) -> Result<SecretPayload, FedsyncError> {
    match method {
        AuthMethod::NoAuth => Ok(SecretPayload::None),
        AuthMethod::Bearer => {
            let raw = store.fetch_latest(secret_name).await?;
            let payload: BearerTokenPayload = serde_json::from_str(&raw).map_err(|e| {
                FedsyncError::Decode(format!("secret payload for {}: {}", secret_name, e))
            })?;
            Ok(SecretPayload::Bearer {
                token: payload.bearer_token,
            })
        }
        AuthMethod::ApiKey => {
            let raw = store.fetch_latest(secret_name).await?;
            let payload: ApiKeyPayload = serde_json::from_str(&raw).map_err(|e| {
                FedsyncError::Decode(format!("secret payload for {}: {}", secret_name, e))
            })?;
            Ok(SecretPayload::ApiKey {
                key: payload.api_key,
                client_id: payload.client_id,
                client_secret: payload.client_secret,
            })
        }
    }
}
