// ABOUTME: HTTP client for the Looker API
// ABOUTME: Authenticates once at construction and triggers run-once dashboard deliveries

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use url::Url;

use super::models::{LoginResponse, ScheduledPlanRequest};
use super::DashboardDelivery;
use crate::config::SecretString;
use crate::delivery::DeliveryRequest;
use crate::error::ConnectorError;
use crate::outcome::DeliveryOutcome;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

/// Bearer token obtained from `login`, valid for the whole run.
#[derive(Debug, Clone)]
pub struct Session {
    bearer_token: SecretString,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn headers(&self) -> Result<HeaderMap, ConnectorError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.bearer_token.expose()))
            .map_err(|_| {
                ConnectorError::Authentication(
                    "Access token contains characters not allowed in a header".to_string(),
                )
            })?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

/// An authenticated Looker API client. The only way to get one is
/// [`RemoteClient::connect`], so every instance holds a valid session.
pub struct RemoteClient {
    client: Client,
    api_base_url: Url,
    session: Session,
    session_headers: HeaderMap,
}

impl RemoteClient {
    pub async fn connect(api_base_url: Url, credentials: &Credentials) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .context("Failed to create HTTP client")?;

        let session = authenticate(&client, &api_base_url, credentials).await?;
        let session_headers = session.headers()?;

        Ok(Self {
            client,
            api_base_url,
            session,
            session_headers,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn deliver_dashboard(
        &self,
        request: &DeliveryRequest,
    ) -> Result<DeliveryOutcome, ConnectorError> {
        let url = self.endpoint("scheduled_plans/run_once", request.dashboard_id)?;
        let payload = ScheduledPlanRequest::run_once(request);

        tracing::debug!(
            dashboard_id = request.dashboard_id,
            recipients = request.recipients.len(),
            filters = payload.filters_string.as_deref().unwrap_or(""),
            "Scheduling run-once delivery"
        );

        let response = self
            .client
            .post(url)
            .headers(self.session_headers.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| ConnectorError::Delivery {
                dashboard_id: request.dashboard_id,
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Delivery {
                dashboard_id: request.dashboard_id,
                status: Some(status.as_u16()),
                body,
            });
        }

        Ok(DeliveryOutcome::sent(request, self.session.created_at))
    }

    fn endpoint(&self, path: &str, dashboard_id: i64) -> Result<Url, ConnectorError> {
        self.api_base_url
            .join(path)
            .map_err(|e| ConnectorError::Delivery {
                dashboard_id,
                status: None,
                body: format!("Cannot build request URL: {}", e),
            })
    }
}

/// Exchanges client credentials for a bearer token via `POST login`.
///
/// Credentials travel in the query string with an empty form body. Any
/// status other than 200 is an [`ConnectorError::Authentication`].
pub async fn authenticate(
    client: &Client,
    api_base_url: &Url,
    credentials: &Credentials,
) -> anyhow::Result<Session> {
    let url = api_base_url
        .join("login")
        .context("Failed to build login URL")?;

    tracing::info!(url = %url, client_id = %credentials.client_id, "Authenticating with Looker");

    let response = client
        .post(url)
        .query(&[
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.expose()),
        ])
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .send()
        .await
        // The request URL carries the client secret.
        .map_err(|e| e.without_url())
        .context("Failed to reach the Looker login endpoint. Check the host URL and your network")?;

    if response.status() != StatusCode::OK {
        let status = response.status();
        tracing::error!(status = %status, "Authorization failed");
        return Err(ConnectorError::Authentication(format!(
            "Authorization failed with status {}. Please check your credentials",
            status
        ))
        .into());
    }

    let login: LoginResponse = response.json().await.map_err(|e| {
        ConnectorError::Authentication(format!(
            "Login response has no access token: {}",
            e.without_url()
        ))
    })?;

    Ok(Session {
        bearer_token: SecretString::new(login.access_token),
        created_at: Utc::now(),
    })
}

#[async_trait]
impl DashboardDelivery for RemoteClient {
    fn session_created_at(&self) -> DateTime<Utc> {
        self.session.created_at
    }

    async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryOutcome, ConnectorError> {
        self.deliver_dashboard(request).await
    }
}
