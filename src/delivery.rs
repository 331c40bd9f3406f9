// ABOUTME: Typed dashboard delivery requests built from input rows or inline config
// ABOUTME: Validates dashboard ids, recipients and JSON filters at parse time

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::ConnectorError;

/// Columns every input table must carry.
pub const REQUIRED_COLUMNS: [&str; 3] = ["dashboard_id", "recipients", "filters"];

/// One input row keyed by column name.
pub type InputRow = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub address: String,
}

impl Recipient {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

/// Ordered filter-name -> filter-value overrides for one delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    entries: Vec<(String, String)>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `?`-prefixed, form-urlencoded query string in insertion order.
    pub fn to_query_string(&self) -> String {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish();
        format!("?{}", encoded)
    }

    /// Compact JSON object rendering used in the outcome log.
    pub fn to_json(&self) -> String {
        let map: serde_json::Map<String, Value> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map).to_string()
    }

    /// Parses a JSON object of filter-name -> value. Blank input or `{}` means no filters.
    pub fn parse_json(raw: &str) -> Result<Option<Self>, ConnectorError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(raw).map_err(|e| {
            ConnectorError::Validation(format!("filters is not valid JSON ({}): {}", e, raw))
        })?;
        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(ConnectorError::Validation(format!(
                    "filters must be a JSON object, got: {}",
                    other
                )))
            }
        };

        let mut filters = FilterSet::new();
        for (name, value) in object {
            let value = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(ConnectorError::Validation(format!(
                        "filter '{}' must be a scalar value",
                        name
                    )))
                }
            };
            filters.insert(name, value);
        }

        Ok(if filters.is_empty() { None } else { Some(filters) })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    pub dashboard_id: i64,
    pub recipients: Vec<Recipient>,
    pub filters: Option<FilterSet>,
    /// Filter text exactly as it appeared in the input, if any.
    pub raw_filters: Option<String>,
}

impl DeliveryRequest {
    pub fn new(
        dashboard_id: i64,
        recipients: Vec<Recipient>,
        filters: Option<FilterSet>,
    ) -> Result<Self, ConnectorError> {
        if recipients.is_empty() {
            return Err(ConnectorError::Validation(format!(
                "dashboard {} has no recipients",
                dashboard_id
            )));
        }
        let filters = filters.filter(|f| !f.is_empty());
        Ok(Self {
            dashboard_id,
            recipients,
            filters,
            raw_filters: None,
        })
    }

    /// Keeps the source text of the filters for the outcome log. Blank text is dropped.
    pub fn with_raw_filters(mut self, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        self.raw_filters = if raw.trim().is_empty() { None } else { Some(raw) };
        self
    }

    /// Address credited in the outcome log.
    pub fn primary_recipient(&self) -> &str {
        self.recipients
            .first()
            .map(|r| r.address.as_str())
            .unwrap_or_default()
    }

    /// The input's filter text, or a JSON rendering for requests built without one.
    pub fn filters_label(&self) -> String {
        match &self.raw_filters {
            Some(raw) => raw.clone(),
            None => self.filters.as_ref().map(FilterSet::to_json).unwrap_or_default(),
        }
    }
}

fn parse_dashboard_id(raw: &str) -> Result<i64, ConnectorError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConnectorError::Validation(
            "dashboard_id is missing".to_string(),
        ));
    }
    trimmed.parse::<i64>().map_err(|_| {
        ConnectorError::Validation(format!("dashboard_id '{}' is not an integer", trimmed))
    })
}

fn parse_recipient(raw: &str, dashboard_id: i64) -> Result<Recipient, ConnectorError> {
    let address = raw.trim();
    if address.is_empty() {
        return Err(ConnectorError::Validation(format!(
            "dashboard {} has an empty recipient",
            dashboard_id
        )));
    }
    Ok(Recipient::new(address))
}

/// Builds a request from one table row (one recipient per row).
pub fn parse_input_row(row: &InputRow) -> Result<DeliveryRequest, ConnectorError> {
    let field = |name: &str| row.get(name).map(String::as_str).unwrap_or("");

    let dashboard_id = parse_dashboard_id(field("dashboard_id"))?;
    let recipient = parse_recipient(field("recipients"), dashboard_id)?;
    let raw_filters = field("filters");
    let filters = FilterSet::parse_json(raw_filters)?;

    let request = DeliveryRequest::new(dashboard_id, vec![recipient], filters)?;
    Ok(request.with_raw_filters(raw_filters))
}

/// Fails naming every required column the source does not have.
pub fn validate_input_schema<S: AsRef<str>>(
    source: &str,
    columns: &[S],
    required: &[&str],
) -> Result<(), ConnectorError> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| !columns.iter().any(|c| c.as_ref() == *name))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConnectorError::Validation(format!(
            "Input table '{}' is missing required columns: {:?}",
            source, missing
        )))
    }
}

/// Dashboard ids in the inline config may be written as strings or numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DashboardId {
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct InlineRecipient {
    pub recipient: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InlineFilter {
    pub filter_property: String,
    #[serde(default)]
    pub filter_value: String,
}

/// A delivery request written directly in the `dashboards` parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardSpec {
    pub dashboard_id: DashboardId,
    #[serde(default)]
    pub recipients: Vec<InlineRecipient>,
    #[serde(default)]
    pub filters: Vec<InlineFilter>,
}

impl DashboardSpec {
    pub fn to_request(&self) -> Result<DeliveryRequest, ConnectorError> {
        let dashboard_id = match &self.dashboard_id {
            DashboardId::Number(id) => *id,
            DashboardId::Text(raw) => parse_dashboard_id(raw)?,
        };

        let recipients = self
            .recipients
            .iter()
            .map(|r| parse_recipient(&r.recipient, dashboard_id))
            .collect::<Result<Vec<_>, _>>()?;

        let mut filters = FilterSet::new();
        for filter in &self.filters {
            filters.insert(filter.filter_property.clone(), filter.filter_value.clone());
        }

        DeliveryRequest::new(dashboard_id, recipients, Some(filters))
    }
}
