// ABOUTME: Looker API access: authenticated client and wire models
// ABOUTME: Exposes the delivery seam the orchestrator drives

pub mod client;
pub mod models;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::delivery::DeliveryRequest;
use crate::error::ConnectorError;
use crate::outcome::DeliveryOutcome;

pub use client::{authenticate, Credentials, RemoteClient, Session};

/// Something that can deliver one dashboard request.
///
/// Implementations return `ConnectorError::Delivery` for failures the run
/// should record and continue past.
#[async_trait]
pub trait DashboardDelivery: Send + Sync {
    /// Timestamp stamped on every outcome of the run.
    fn session_created_at(&self) -> DateTime<Utc>;

    async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryOutcome, ConnectorError>;
}
