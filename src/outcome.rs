// ABOUTME: Per-request delivery outcomes and the ordered log of one run
// ABOUTME: Each outcome becomes one row of the output table

use std::fmt;

use chrono::{DateTime, Utc};

use crate::delivery::DeliveryRequest;

/// Column order of the output table.
pub const OUTCOME_COLUMNS: [&str; 6] = [
    "datetime",
    "dashboard_id",
    "recipient",
    "filters",
    "request_status",
    "request_message",
];

/// Primary key of the output table.
pub const OUTCOME_PRIMARY_KEY: [&str; 4] = ["datetime", "dashboard_id", "recipient", "filters"];

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Error,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "Sent",
            DeliveryStatus::Error => "Error",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub timestamp: DateTime<Utc>,
    pub dashboard_id: i64,
    /// Only the first recipient is credited, even for multi-recipient requests.
    pub recipient: String,
    pub filters: String,
    pub status: DeliveryStatus,
    pub message: String,
}

impl DeliveryOutcome {
    pub fn sent(request: &DeliveryRequest, timestamp: DateTime<Utc>) -> Self {
        Self::from_request(request, timestamp, DeliveryStatus::Sent, String::new())
    }

    pub fn failed(
        request: &DeliveryRequest,
        timestamp: DateTime<Utc>,
        message: impl Into<String>,
    ) -> Self {
        Self::from_request(request, timestamp, DeliveryStatus::Error, message.into())
    }

    fn from_request(
        request: &DeliveryRequest,
        timestamp: DateTime<Utc>,
        status: DeliveryStatus,
        message: String,
    ) -> Self {
        Self {
            timestamp,
            dashboard_id: request.dashboard_id,
            recipient: request.primary_recipient().to_string(),
            filters: request.filters_label(),
            status,
            message,
        }
    }

    /// Values in [`OUTCOME_COLUMNS`] order.
    pub fn to_record(&self) -> [String; 6] {
        [
            self.timestamp.format(DATETIME_FORMAT).to_string(),
            self.dashboard_id.to_string(),
            self.recipient.clone(),
            self.filters.clone(),
            self.status.to_string(),
            self.message.clone(),
        ]
    }
}

/// Outcomes of one run in request order.
#[derive(Debug, Clone, Default)]
pub struct OutcomeLog {
    outcomes: Vec<DeliveryOutcome>,
}

impl OutcomeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: DeliveryOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeliveryOutcome> {
        self.outcomes.iter()
    }

    pub fn sent_count(&self) -> usize {
        self.count(DeliveryStatus::Sent)
    }

    pub fn error_count(&self) -> usize {
        self.count(DeliveryStatus::Error)
    }

    fn count(&self, status: DeliveryStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }
}

impl IntoIterator for OutcomeLog {
    type Item = DeliveryOutcome;
    type IntoIter = std::vec::IntoIter<DeliveryOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.outcomes.into_iter()
    }
}
