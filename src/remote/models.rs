// ABOUTME: Wire structures for the Looker login and scheduled plan endpoints
// ABOUTME: These are serialized to JSON for API communication

use serde::{Deserialize, Serialize};

use crate::delivery::{DeliveryRequest, Recipient};

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
}

/// Body of `POST scheduled_plans/run_once`.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledPlanRequest {
    pub name: String,
    pub dashboard_id: i64,
    pub title: String,
    pub enable: bool,
    pub run_once: bool,
    pub scheduled_plan_destination: Vec<PlanDestination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters_string: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanDestination {
    pub format: String, // always "wysiwyg_pdf"
    pub apply_formatting: bool,
    pub apply_vis: bool,
    #[serde(rename = "type")]
    pub kind: String, // always "email"
    pub address: String,
}

impl PlanDestination {
    pub fn email_pdf(recipient: &Recipient) -> Self {
        Self {
            format: "wysiwyg_pdf".to_string(),
            apply_formatting: true,
            apply_vis: true,
            kind: "email".to_string(),
            address: recipient.address.clone(),
        }
    }
}

impl ScheduledPlanRequest {
    pub fn run_once(request: &DeliveryRequest) -> Self {
        let name = format!("run_once - {}", request.dashboard_id);
        Self {
            title: name.clone(),
            name,
            dashboard_id: request.dashboard_id,
            enable: true,
            run_once: true,
            scheduled_plan_destination: request
                .recipients
                .iter()
                .map(PlanDestination::email_pdf)
                .collect(),
            filters_string: request
                .filters
                .as_ref()
                .filter(|f| !f.is_empty())
                .map(|f| f.to_query_string()),
        }
    }
}
