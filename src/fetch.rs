use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use wreq::Client;

use crate::backend::Backend;
use crate::config::StoreConfig;
use crate::error::{self, StoreError};
use crate::query::{Action, Request};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const JSON: &str = "application/json";

/// PostgREST transport. One HTTP request per [`Request`], no retries.
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    config: StoreConfig,
}

impl RestBackend {
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout));

        if let Some(ref proxy) = config.proxy {
            builder = builder.proxy(wreq::Proxy::all(proxy).map_err(error::from_http_error)?);
        }

        let client = builder.build().map_err(error::from_http_error)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn execute(&self, request: Request) -> Result<Value, StoreError> {
        let url = self.config.table_url(request.table)?;
        let params = request.to_url_params();
        let key = &self.config.service_key;

        let (method, builder) = match &request.action {
            Action::Select => ("GET", self.client.get(url.as_str())),
            Action::Insert(rows) => (
                "POST",
                self.client
                    .post(url.as_str())
                    .header("Content-Type", JSON)
                    .body(serde_json::to_vec(rows)?),
            ),
            Action::Update(patch) => (
                "PATCH",
                self.client
                    .patch(url.as_str())
                    .header("Content-Type", JSON)
                    .body(serde_json::to_vec(patch)?),
            ),
        };

        let mut builder = builder
            .header("apikey", key.as_str())
            .header("Authorization", format!("Bearer {key}"))
            .header("Accept", if request.single { SINGLE_OBJECT } else { JSON })
            .query(&params);
        if request.is_write() {
            builder = builder.header("Prefer", "return=representation");
        }

        debug!(table = %request.table, method, ?params, "sending request");

        let response = builder.send().await.map_err(error::from_http_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(error::from_http_error)?;

        if status >= 400 {
            let err = error::from_response_body(status, &body);
            warn!(table = %request.table, method, status, "request failed: {err}");
            return Err(err);
        }

        debug!(table = %request.table, method, status, bytes = body.len(), "response received");

        if body.trim().is_empty() {
            return Ok(if request.single {
                Value::Null
            } else {
                Value::Array(Vec::new())
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}
