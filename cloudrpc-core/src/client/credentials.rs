//! # Credentials
//!
//! Turns an application credential into what the transport needs:
//!
//! * a TLS configuration for the channel, and
//! * a `Bearer` `authorization` value attached to every call.
//!
//! Obtaining tokens (application default credentials, service account keys, metadata server)
//! is the job of a [`TokenProvider`]; this module only exchanges and caches the result.
use super::SecurityMode;
use crate::{BoxError, error::DispatchError};
use futures_util::future::BoxFuture;
use std::{fmt::Debug, sync::Arc};
use tokio::sync::RwLock;
use tonic::{metadata::AsciiMetadataValue, transport::ClientTlsConfig};
use tracing::debug;

/// Source of OAuth2 access tokens.
pub trait TokenProvider: Send + Sync {
    /// Returns a fresh access token.
    fn access_token(&self) -> BoxFuture<'_, Result<String, BoxError>>;
}

/// A provider handing out a token minted elsewhere.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider").finish_non_exhaustive()
    }
}

impl TokenProvider for StaticTokenProvider {
    fn access_token(&self) -> BoxFuture<'_, Result<String, BoxError>> {
        Box::pin(async move { Ok(self.token.clone()) })
    }
}

/// Transport credentials shared by every call of a client.
#[derive(Clone, Default)]
pub struct CredentialHandle {
    authorization: Option<AsciiMetadataValue>,
    tls: Option<ClientTlsConfig>,
}

impl CredentialHandle {
    /// Credentials for plaintext, unauthenticated channels.
    pub fn insecure() -> Self {
        Self::default()
    }

    /// TLS with the webpki roots plus a bearer token.
    pub fn secure(token: &str) -> Result<Self, DispatchError> {
        let authorization = AsciiMetadataValue::try_from(format!("Bearer {token}"))
            .map_err(|e| DispatchError::Auth(e.into()))?;

        Ok(Self {
            authorization: Some(authorization),
            tls: Some(ClientTlsConfig::new().with_webpki_roots()),
        })
    }

    pub fn authorization(&self) -> Option<&AsciiMetadataValue> {
        self.authorization.as_ref()
    }

    pub fn tls(&self) -> Option<&ClientTlsConfig> {
        self.tls.as_ref()
    }
}

impl Debug for CredentialHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialHandle")
            .field("authenticated", &self.authorization.is_some())
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

/// Resolves and caches the [`CredentialHandle`] of a client.
pub struct CredentialResolver {
    security: SecurityMode,
    provider: Option<Arc<dyn TokenProvider>>,
    cached: RwLock<Option<Arc<CredentialHandle>>>,
}

impl CredentialResolver {
    pub fn new(security: SecurityMode, provider: Option<Arc<dyn TokenProvider>>) -> Self {
        Self {
            security,
            provider,
            cached: RwLock::new(None),
        }
    }

    /// Returns the cached handle, exchanging a token on first use.
    ///
    /// Once cached, callers only share a read lock. Concurrent first callers wait for a
    /// single exchange. A failed exchange is not cached, so the next call tries again.
    pub async fn get(&self) -> Result<Arc<CredentialHandle>, DispatchError> {
        if let Some(handle) = self.cached.read().await.as_ref() {
            return Ok(handle.clone());
        }

        let mut cached = self.cached.write().await;

        if let Some(handle) = cached.as_ref() {
            return Ok(handle.clone());
        }

        let handle = Arc::new(self.exchange().await?);
        *cached = Some(handle.clone());
        Ok(handle)
    }

    /// Exchanges a new token and replaces the cached handle.
    pub async fn refresh(&self) -> Result<Arc<CredentialHandle>, DispatchError> {
        let mut cached = self.cached.write().await;
        let handle = Arc::new(self.exchange().await?);
        *cached = Some(handle.clone());
        Ok(handle)
    }

    async fn exchange(&self) -> Result<CredentialHandle, DispatchError> {
        match (self.security, &self.provider) {
            (SecurityMode::Insecure, _) => Ok(CredentialHandle::insecure()),
            (SecurityMode::Secure, None) => Err(DispatchError::Auth(
                "no token provider configured for a secure service".into(),
            )),
            (SecurityMode::Secure, Some(provider)) => {
                debug!("Exchanging access token for transport credentials");
                let token = provider
                    .access_token()
                    .await
                    .map_err(DispatchError::Auth)?;
                CredentialHandle::secure(&token)
            }
        }
    }
}

impl Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("security", &self.security)
            .field("has_provider", &self.provider.is_some())
            .finish_non_exhaustive()
    }
}
