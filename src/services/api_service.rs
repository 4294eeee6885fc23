// src/services/api_service.rs
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::errors::{TrackingError, TrackingResult};
use crate::models::{Rating, Service};

/// REST boundary for trip and rating snapshots. The persistence layer
/// behind it is out of scope; only these two reads matter to tracking.
#[async_trait]
pub trait ServiceApi: Send + Sync {
    /// Full service record by id; `None` for unknown ids.
    async fn fetch_service(&self, service_id: &str) -> TrackingResult<Option<Service>>;

    /// Existing rating for the service, if the client already submitted
    /// one. Only issued once the service is observed completed.
    async fn fetch_rating(&self, service_id: &str) -> TrackingResult<Option<Rating>>;
}

pub struct HttpServiceApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpServiceApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn get_optional<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
    ) -> TrackingResult<Option<T>> {
        debug!(%url, "fetching");
        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response
            .error_for_status()
            .map_err(|e| TrackingError::Api(e.to_string()))?;
        Ok(Some(response.json().await?))
    }
}

#[async_trait]
impl ServiceApi for HttpServiceApi {
    async fn fetch_service(&self, service_id: &str) -> TrackingResult<Option<Service>> {
        self.get_optional(format!("{}/api/services/{}", self.base_url, service_id))
            .await
    }

    async fn fetch_rating(&self, service_id: &str) -> TrackingResult<Option<Rating>> {
        self.get_optional(format!(
            "{}/api/services/{}/rating",
            self.base_url, service_id
        ))
        .await
    }
}
