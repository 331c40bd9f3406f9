// ABOUTME: Library root for the Looker dashboard delivery connector
// ABOUTME: Re-exports the run entry points used by the binary and tests

pub mod config;
pub mod delivery;
pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod remote;
pub mod tables;

pub use config::{normalize_url, Config};
pub use delivery::{DeliveryRequest, FilterSet, Recipient};
pub use error::ConnectorError;
pub use orchestrator::{Orchestrator, RunObserver, TracingObserver};
pub use outcome::{DeliveryOutcome, DeliveryStatus, OutcomeLog};
pub use remote::RemoteClient;
