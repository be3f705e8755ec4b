use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use super::CatalogApi;
use crate::config::ClientConfig;
use crate::errors::ServiceError;
use crate::models::{
    ItemCodeLookup, ItemCodeMatch, StockLine, SubmissionPayload, TransferReceipt, User,
};

/// [`CatalogApi`] over HTTP/JSON with bearer authentication.
#[derive(Clone)]
pub struct HttpCatalogClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
    submit_timeout: Duration,
}

impl HttpCatalogClient {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        submit_timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            ServiceError::InvalidConfiguration(format!("invalid api base url {}: {}", base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::InvalidConfiguration(format!(
                "api base url {} cannot carry a path",
                base_url
            )));
        }

        let client = Client::builder()
            .user_agent(concat!("pyrhouse-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
            submit_timeout,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ServiceError> {
        Self::new(
            &config.api_base_url,
            config.api_token.clone(),
            config.submit_timeout(),
        )
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ServiceError::InvalidConfiguration(format!(
                    "api base url {} cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ServiceError> {
        let response = self.authorized(request).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ServiceError::from_response(status, &body);
            debug!(status = status.as_u16(), error = %err, "API call failed");
            return Err(err);
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            warn!("Failed to decode API response: {}", e);
            ServiceError::Decode(e.to_string())
        })
    }
}

#[async_trait]
impl CatalogApi for HttpCatalogClient {
    #[instrument(skip(self))]
    async fn validate_item_code(&self, code: &str) -> Result<ItemCodeLookup, ServiceError> {
        let url = self.endpoint(&["assets", "pyrcode", code])?;
        self.send(self.client.get(url)).await
    }

    #[instrument(skip(self))]
    async fn search_item_codes(
        &self,
        prefix: &str,
        location_id: i64,
    ) -> Result<Vec<ItemCodeMatch>, ServiceError> {
        let location = location_id.to_string();
        let url = self.endpoint(&["locations", &location, "search"])?;
        self.send(self.client.get(url).query(&[("q", prefix)])).await
    }

    #[instrument(skip(self))]
    async fn fetch_stock_lines(&self, location_id: i64) -> Result<Vec<StockLine>, ServiceError> {
        let url = self.endpoint(&["stocks"])?;
        self.send(self.client.get(url).query(&[("location_id", location_id)]))
            .await
    }

    #[instrument(skip(self))]
    async fn fetch_users(&self) -> Result<Vec<User>, ServiceError> {
        let url = self.endpoint(&["users"])?;
        self.send(self.client.get(url)).await
    }

    #[instrument(
        skip(self, payload),
        fields(from = payload.from_location_id, to = payload.location_id)
    )]
    async fn submit_transfer(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<TransferReceipt, ServiceError> {
        let url = self.endpoint(&["transfers"])?;
        let request = self
            .client
            .post(url)
            .json(payload)
            .timeout(self.submit_timeout);
        self.send(request).await
    }
}
