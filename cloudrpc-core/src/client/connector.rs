//! # Connectors
//!
//! A [`Connector`] opens the transport a stub talks through. [`ChannelConnector`] dials
//! real endpoints; [`SharedService`] hands out clones of an in-process `tower` service,
//! which is how emulators and tests plug in.
use super::credentials::CredentialHandle;
use crate::error::ConfigurationError;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

pub trait Connector<S>: Send + Sync {
    /// Opens a transport to `base_url` using the transport side of `credentials`.
    fn connect(
        &self,
        base_url: &str,
        credentials: &CredentialHandle,
    ) -> Result<S, ConfigurationError>;
}

/// Connects lazily over HTTP/2, with TLS when the credentials carry a TLS config.
///
/// Nothing is dialed until the first call. A refused connection surfaces as
/// `UNAVAILABLE` on that call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelConnector;

impl Connector<Channel> for ChannelConnector {
    fn connect(
        &self,
        base_url: &str,
        credentials: &CredentialHandle,
    ) -> Result<Channel, ConfigurationError> {
        let mut endpoint = Endpoint::from_shared(base_url.to_string())
            .map_err(|e| ConfigurationError::InvalidUrl(base_url.to_string(), e))?;

        if let Some(tls) = credentials.tls() {
            endpoint = endpoint
                .tls_config(tls.clone())
                .map_err(|e| ConfigurationError::InvalidTls(base_url.to_string(), e))?;
        }

        debug!(base_url, tls = credentials.tls().is_some(), "Opening lazy channel");
        Ok(endpoint.connect_lazy())
    }
}

/// Serves every stub from clones of one service, ignoring the URL.
#[derive(Debug, Clone)]
pub struct SharedService<S>(pub S);

impl<S> Connector<S> for SharedService<S>
where
    S: Clone + Send + Sync,
{
    fn connect(
        &self,
        _base_url: &str,
        _credentials: &CredentialHandle,
    ) -> Result<S, ConfigurationError> {
        Ok(self.0.clone())
    }
}
