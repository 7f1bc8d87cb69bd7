use reqwest::{RequestBuilder, StatusCode};
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::api::api_types::{list_params, ListResponse, SyncRequest, SyncResponse};
use crate::api::types::ListQuery;
use crate::config::ServerConfig;
use crate::error::{Error, Result};

/// The remote canonical store, as seen by the sync engine.
///
/// Dropping a returned future aborts the underlying request.
pub trait FeedApi: Send + Sync + 'static {
  /// Push queued statuses and pull everything newer than the high-water mark.
  fn sync(&self, request: SyncRequest) -> impl Future<Output = Result<SyncResponse>> + Send;

  /// Fetch one rendered page for a filter.
  fn list(&self, query: ListQuery) -> impl Future<Output = Result<ListResponse>> + Send;
}

/// HTTP implementation of [`FeedApi`].
#[derive(Clone)]
pub struct HttpApi {
  client: reqwest::Client,
  base: Url,
  credentials: Option<(String, String)>,
}

impl HttpApi {
  pub fn new(server: &ServerConfig, password: Option<String>) -> Result<Self> {
    let mut base = Url::parse(&server.url)
      .map_err(|e| Error::Protocol(format!("invalid server url {}: {}", server.url, e)))?;
    // Relative joins drop the last path segment unless it ends with a slash
    if !base.path().ends_with('/') {
      base.set_path(&format!("{}/", base.path()));
    }

    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(server.timeout_secs))
      .build()
      .map_err(|e| Error::Network(format!("failed to build http client: {}", e)))?;

    let credentials = match (&server.username, password) {
      (Some(user), Some(password)) => Some((user.clone(), password)),
      _ => None,
    };

    Ok(Self {
      client,
      base,
      credentials,
    })
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .base
      .join(path)
      .map_err(|e| Error::Protocol(format!("invalid endpoint {}: {}", path, e)))
  }

  fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
    match &self.credentials {
      Some((user, password)) => builder.basic_auth(user, Some(password)),
      None => builder,
    }
  }

  async fn send<T: serde::de::DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
    let response = self.authorize(builder).send().await?;
    match response.status() {
      StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Authentication),
      status if !status.is_success() => Err(Error::Network(format!("server returned {}", status))),
      _ => Ok(response.json::<T>().await?),
    }
  }
}

impl FeedApi for HttpApi {
  async fn sync(&self, request: SyncRequest) -> Result<SyncResponse> {
    let url = self.endpoint("items/sync")?;
    debug!(
      since = %request.since,
      since_id = request.items_since_id,
      pushing = request.updated_statuses.len(),
      "POST items/sync"
    );
    self.send(self.client.post(url).json(&request)).await
  }

  async fn list(&self, query: ListQuery) -> Result<ListResponse> {
    let url = self.base.clone();
    let params = list_params(&query);
    debug!(?params, "GET list");
    self
      .send(
        self
          .client
          .get(url)
          .header(reqwest::header::ACCEPT, "application/json")
          .query(&params),
      )
      .await
  }
}
