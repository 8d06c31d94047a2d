//! Panel API session client

pub mod auth;
pub mod error;
pub mod retry;

use error::{ClientError, UnauthorizedReason};
use panel_core::storage::ACCESS_TOKEN_KEY;
use panel_core::{
    ClientConfig, FileStore, LogNavigator, Navigator, SessionContext, SessionState,
    SessionStores,
};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use retry::RetryPolicy;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};
use url::Url;

/// Options for an authenticated request
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post(body: Value) -> Self {
        Self::new(Method::POST).json(body)
    }

    /// Send `body` as JSON
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header. `Authorization` is always set by the client and any
    /// value given here for it is ignored.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }
}

/// Session-aware API client.
///
/// Cloning is cheap; clones share storage, state and the navigator.
#[derive(Clone)]
pub struct SessionClient {
    http: Client,
    api_root: Url,
    stores: Arc<SessionStores>,
    context: Arc<SessionContext>,
    navigator: Arc<dyn Navigator>,
}

impl SessionClient {
    /// Create a client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    pub fn builder() -> SessionClientBuilder {
        SessionClientBuilder::default()
    }

    /// Root URL endpoint paths are resolved against
    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn stores(&self) -> &SessionStores {
        &self.stores
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.context.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.context.subscribe()
    }

    /// Resolve a relative endpoint path against the API root
    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.api_root
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::Configuration(format!("invalid path {path:?}: {e}")))
    }

    async fn access_token(&self) -> Result<Option<String>, ClientError> {
        let token = self.stores.active().get(ACCESS_TOKEN_KEY).await?;
        Ok(token.filter(|t| !t.is_empty()))
    }

    /// Issue an authenticated request.
    ///
    /// A 401 triggers one token refresh and one retry with the new token.
    /// If the refresh fails, or the retry is rejected again, the session is
    /// ended and [`ClientError::Unauthorized`] returned.
    pub async fn request(&self, path: &str, options: RequestOptions) -> Result<Value, ClientError> {
        let url = self.endpoint(path)?;
        let mut policy = RetryPolicy::new();

        loop {
            let access = self.access_token().await?.ok_or(ClientError::NoCredential)?;

            debug!(
                method = %options.method,
                url = %url,
                retry = policy.attempted(),
                "Sending authenticated request"
            );
            let response = self.send_authorized(&url, &options, &access).await?;
            let status = response.status();

            if status != StatusCode::UNAUTHORIZED {
                return read_json(response).await;
            }

            if policy.should_retry(status) {
                policy.mark_attempted();
                if self.refresh().await {
                    continue;
                }
                warn!(url = %url, "Token refresh failed, ending session");
                self.end_session().await;
                return Err(ClientError::Unauthorized(UnauthorizedReason::RefreshFailed));
            }

            warn!(url = %url, "Request rejected after token refresh, ending session");
            self.end_session().await;
            return Err(ClientError::Unauthorized(UnauthorizedReason::RetryRejected));
        }
    }

    /// Issue an authenticated request and deserialize the response
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ClientError> {
        let value = self.request(path, options).await?;
        serde_json::from_value(value).map_err(ClientError::MalformedResponse)
    }

    pub async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.request(path, RequestOptions::get()).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value, ClientError> {
        self.request(path, RequestOptions::post(body)).await
    }

    async fn send_authorized(
        &self,
        url: &Url,
        options: &RequestOptions,
        access: &str,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let mut headers = options.headers.clone();
        headers.remove(AUTHORIZATION);

        let mut request = self
            .http
            .request(options.method.clone(), url.clone())
            .headers(headers)
            .bearer_auth(access);

        if let Some(body) = &options.body {
            request = request.json(body);
        }

        request.send().await
    }
}

/// Turn a response into JSON, mapping failures onto the client taxonomy.
///
/// An empty success body becomes `null`.
pub(crate) async fn read_json(response: reqwest::Response) -> Result<Value, ClientError> {
    let status = response.status();

    if status.is_success() {
        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(ClientError::MalformedResponse)
    } else {
        let text = response.text().await.unwrap_or_else(|_| status.to_string());
        Err(ClientError::from_status(status, &text))
    }
}

/// Builder for [`SessionClient`]
#[derive(Default)]
pub struct SessionClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    stores: Option<SessionStores>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl SessionClientBuilder {
    /// Apply every setting from a loaded configuration
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut builder = Self::default()
            .base_url(config.base_url.clone())
            .user_agent(config.user_agent.clone())
            .stores(SessionStores::with_file(config.session_file()));
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        builder
    }

    /// Set the base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the transport timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Set the storage strategies; defaults to a session file in the
    /// platform data directory
    #[must_use]
    pub fn stores(mut self, stores: SessionStores) -> Self {
        self.stores = Some(stores);
        self
    }

    /// Set the navigation collaborator; defaults to logging transitions
    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<SessionClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;
        let api_root = panel_core::config::parse_api_root(&base_url)?;

        let mut client_builder = ClientBuilder::new();
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| ClientConfig::default().user_agent);
        let http = client_builder.user_agent(user_agent).build()?;

        let stores = self
            .stores
            .unwrap_or_else(|| SessionStores::with_file(FileStore::default_path()));
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(LogNavigator));

        Ok(SessionClient {
            http,
            api_root,
            stores: Arc::new(stores),
            context: Arc::new(SessionContext::new()),
            navigator,
        })
    }
}
