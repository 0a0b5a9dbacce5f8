use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::{ApiRequest, ApiResponse, HttpTransport};
use crate::error::FetchError;

/// Where a single `request` call currently is.
///
/// The stages only move forward, so one call makes at most one refresh and
/// at most three round trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchStage {
    Primary,
    Refresh,
    Retry,
}

/// Authenticated API client that survives one credential-expiry cycle.
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn HttpTransport>,
    refresh: ApiRequest,
}

impl ResilientClient {
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, refresh_path: impl Into<String>) -> Self {
        Self {
            transport,
            refresh: ApiRequest::post(refresh_path),
        }
    }

    /// Send `request`; on a 401, refresh credentials once and retry once.
    ///
    /// The retry's response is returned as-is, even if it is another 401.
    /// Dropping the returned future abandons the whole call, including any
    /// refresh that has not started yet.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::AuthExpired` if the refresh endpoint answers with a
    /// non-success status, and `FetchError::Transport` unchanged from any of
    /// the three round trips.
    pub async fn request(&self, request: &ApiRequest) -> Result<ApiResponse, FetchError> {
        let mut stage = FetchStage::Primary;
        loop {
            match stage {
                FetchStage::Primary => {
                    let response = self.transport.send(request).await?;
                    if !response.is_unauthorized() {
                        return Ok(response);
                    }
                    debug!(path = %request.path, "credentials rejected, refreshing");
                    stage = FetchStage::Refresh;
                }
                FetchStage::Refresh => {
                    let response = self.transport.send(&self.refresh).await?;
                    if !response.is_success() {
                        warn!(status = %response.status, "credential refresh refused");
                        return Err(FetchError::AuthExpired {
                            status: response.status,
                        });
                    }
                    stage = FetchStage::Retry;
                }
                FetchStage::Retry => {
                    let response = self.transport.send(request).await?;
                    debug!(path = %request.path, status = %response.status, "retried after refresh");
                    return Ok(response);
                }
            }
        }
    }

    /// `request` plus status check and JSON decoding.
    ///
    /// # Errors
    ///
    /// Everything `request` returns, plus `FetchError::Status` for a
    /// non-success final status and `FetchError::Json` for an undecodable body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<T, FetchError> {
        let response = self.request(request).await?;
        if !response.is_success() {
            return Err(FetchError::Status(response.status));
        }
        Ok(response.json()?)
    }
}
