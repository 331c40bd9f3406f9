// ABOUTME: Drives one connector run from configuration to outcome table
// ABOUTME: Validates inputs up front, delivers each request in order and records every outcome

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, ValidatedConfig};
use crate::delivery::{
    parse_input_row, validate_input_schema, DashboardSpec, DeliveryRequest, REQUIRED_COLUMNS,
};
use crate::error::ConnectorError;
use crate::outcome::{DeliveryOutcome, DeliveryStatus, OutcomeLog};
use crate::remote::{Credentials, DashboardDelivery, RemoteClient};
use crate::tables::{self, InputTable};

/// Receives progress and outcome notifications during a run.
pub trait RunObserver: Send + Sync {
    fn on_delivery(&self, _request: &DeliveryRequest, _outcome: &DeliveryOutcome) {}

    fn on_progress(&self, _processed: usize, _total: usize) {}

    fn on_finished(&self, _log: &OutcomeLog) {}
}

/// Default observer: reports through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn on_delivery(&self, request: &DeliveryRequest, outcome: &DeliveryOutcome) {
        match outcome.status {
            DeliveryStatus::Sent => tracing::info!(
                dashboard_id = request.dashboard_id,
                recipient = %outcome.recipient,
                "Dashboard delivery scheduled"
            ),
            DeliveryStatus::Error => tracing::error!(
                dashboard_id = request.dashboard_id,
                recipient = %outcome.recipient,
                message = %outcome.message,
                "Error in processing dashboard"
            ),
        }
    }

    fn on_progress(&self, processed: usize, total: usize) {
        tracing::info!(processed, total, "Processed {} of {} dashboard requests", processed, total);
    }

    fn on_finished(&self, log: &OutcomeLog) {
        tracing::info!(
            sent = log.sent_count(),
            errors = log.error_count(),
            "Delivery run finished"
        );
    }
}

/// Where delivery requests come from, in processing order.
#[derive(Debug, Clone)]
pub enum RequestSource {
    Table(InputTable),
    Inline(Vec<DashboardSpec>),
}

/// Validates every source and parses every row. The first bad table or row
/// aborts with a [`ConnectorError::Validation`].
pub fn collect_requests(
    sources: &[RequestSource],
) -> Result<Vec<DeliveryRequest>, ConnectorError> {
    let mut requests = Vec::new();

    for source in sources {
        match source {
            RequestSource::Table(table) => {
                validate_input_schema(&table.name, table.columns.as_slice(), &REQUIRED_COLUMNS)?;
                for (index, row) in table.rows.iter().enumerate() {
                    let request = parse_input_row(row).map_err(|e| {
                        locate(e, &format!("table '{}' row {}", table.name, index + 1))
                    })?;
                    requests.push(request);
                }
            }
            RequestSource::Inline(specs) => {
                for (index, spec) in specs.iter().enumerate() {
                    let request = spec
                        .to_request()
                        .map_err(|e| locate(e, &format!("dashboards[{}]", index)))?;
                    requests.push(request);
                }
            }
        }
    }

    Ok(requests)
}

fn locate(err: ConnectorError, location: &str) -> ConnectorError {
    match err {
        ConnectorError::Validation(msg) => {
            ConnectorError::Validation(format!("{}: {}", location, msg))
        }
        other => other,
    }
}

pub struct Orchestrator {
    config: Config,
    data_dir: PathBuf,
    observer: Arc<dyn RunObserver>,
}

impl Orchestrator {
    pub fn new(config: Config, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            data_dir: data_dir.into(),
            observer: Arc::new(TracingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Runs the whole connector and returns the outcome log it wrote.
    ///
    /// Configuration, input and authentication failures abort the run.
    /// Failed deliveries are recorded as `Error` outcomes and do not.
    pub async fn run(&self) -> anyhow::Result<OutcomeLog> {
        let validated = self.config.validate()?;
        tracing::info!(base_url = %validated.base_url, "Configuration validated");

        let sources = self.load_sources(&validated)?;
        let requests = collect_requests(&sources)?;
        tracing::info!(requests = requests.len(), "Loaded dashboard requests");

        let credentials = Credentials {
            client_id: validated.client_id.clone(),
            client_secret: validated.client_secret.clone(),
        };
        let client = RemoteClient::connect(validated.base_url.clone(), &credentials).await?;

        let log = self.deliver_all(&client, &requests).await?;

        tables::write_outcomes(
            &tables::output_tables_dir(&self.data_dir),
            &validated.output_table,
            &log,
        )?;
        self.observer.on_finished(&log);

        Ok(log)
    }

    fn load_sources(
        &self,
        validated: &ValidatedConfig,
    ) -> Result<Vec<RequestSource>, ConnectorError> {
        let input_dir = tables::input_tables_dir(&self.data_dir);
        let mut sources = Vec::with_capacity(validated.input_tables.len() + 1);

        for name in &validated.input_tables {
            sources.push(RequestSource::Table(tables::read_table(&input_dir.join(name))?));
        }
        if !validated.dashboards.is_empty() {
            sources.push(RequestSource::Inline(validated.dashboards.clone()));
        }

        Ok(sources)
    }

    /// Delivers every request in order. Recoverable delivery failures become
    /// `Error` outcomes; any other error is returned.
    pub async fn deliver_all<D>(
        &self,
        delivery: &D,
        requests: &[DeliveryRequest],
    ) -> Result<OutcomeLog, ConnectorError>
    where
        D: DashboardDelivery + ?Sized,
    {
        let progress_every = self.config.parameters.progress_every.max(1);
        let total = requests.len();
        let mut log = OutcomeLog::new();

        for (index, request) in requests.iter().enumerate() {
            tracing::debug!(dashboard_id = request.dashboard_id, "Processing dashboard");

            let outcome = match delivery.deliver(request).await {
                Ok(outcome) => outcome,
                Err(err) if err.is_recoverable() => DeliveryOutcome::failed(
                    request,
                    delivery.session_created_at(),
                    failure_message(err),
                ),
                Err(err) => return Err(err),
            };

            self.observer.on_delivery(request, &outcome);
            log.push(outcome);

            let processed = index + 1;
            if processed % progress_every == 0 {
                self.observer.on_progress(processed, total);
            }
        }

        Ok(log)
    }
}

/// The remote response body, or the error text when the body is empty.
fn failure_message(err: ConnectorError) -> String {
    let fallback = err.to_string();
    match err {
        ConnectorError::Delivery { body, .. } if !body.trim().is_empty() => body,
        _ => fallback,
    }
}
