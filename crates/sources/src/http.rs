use crate::extract::extract;
use chrono::{SecondsFormat, Utc};
use futures::future::BoxFuture;
use isahc::{
    auth::{Authentication, Credentials},
    config::Configurable,
    AsyncReadResponseExt, HttpClient, Request,
};
use std::sync::Arc;
use stirling_config::{AuthConfig, Extract, ResolvedSink, ResolvedSource};
use stirling_control::{DataSource, Sink};
use stirling_core::{Measurement, Result, StirlingError};
use tracing::debug;

fn build_client() -> Result<HttpClient> {
    HttpClient::builder()
        .default_headers(&[("User-Agent", concat!("stirling/", env!("CARGO_PKG_VERSION")))])
        .build()
        .map_err(|e| StirlingError::Config(format!("HTTP client: {e}")))
}

/// GETs a JSON document and extracts one number from it.
pub struct HttpSource {
    id:      String,
    url:     String,
    auth:    Option<AuthConfig>,
    extract: Extract,
    client:  HttpClient,
    sink:    Option<Arc<dyn Sink>>,
}

impl HttpSource {
    /// Build the source, and its append sink if one is configured.
    pub fn new(source: &ResolvedSource) -> Result<Self> {
        let client = build_client()?;
        let sink = source
            .sink
            .as_ref()
            .map(|s| Arc::new(HttpAppendSink::with_client(s, client.clone())) as Arc<dyn Sink>);

        Ok(Self {
            id: source.id.clone(),
            url: source.url.clone(),
            auth: source.auth.clone(),
            extract: source.extract.clone(),
            client,
            sink,
        })
    }

    async fn get_json(&self) -> Result<serde_json::Value> {
        let mut builder = Request::get(&self.url);
        match &self.auth {
            Some(AuthConfig::Basic { username, password }) => {
                builder = builder
                    .authentication(Authentication::basic())
                    .credentials(Credentials::new(username.as_str(), password.as_str()));
            }
            Some(AuthConfig::Bearer { token }) => {
                builder = builder.header("Authorization", format!("Bearer {token}"));
            }
            None => {}
        }
        let request = builder
            .body(())
            .map_err(|e| StirlingError::Fetch(format!("request: {e}")))?;

        let mut response = self
            .client
            .send_async(request)
            .await
            .map_err(|e| StirlingError::Fetch(format!("{}: {e}", self.id)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StirlingError::Fetch(format!("{}: HTTP {status}", self.id)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| StirlingError::Fetch(format!("{}: read body: {e}", self.id)))?;
        serde_json::from_str(&body)
            .map_err(|e| StirlingError::Fetch(format!("{}: parse body: {e}", self.id)))
    }
}

impl DataSource for HttpSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch(&self) -> BoxFuture<'_, Result<Measurement>> {
        Box::pin(async move {
            let doc = self.get_json().await?;
            let value = extract(&self.extract, &doc)?;
            debug!("{} fetched {value}", self.id);
            Ok(value)
        })
    }

    fn sink(&self) -> Option<Arc<dyn Sink>> {
        self.sink.clone()
    }
}

/// PUTs each sample as a `timestamp,value` CSV line to an append endpoint,
/// e.g. an Azure append blob with `comp=appendblock`.
pub struct HttpAppendSink {
    url:          String,
    content_type: String,
    client:       HttpClient,
}

impl HttpAppendSink {
    pub fn new(sink: &ResolvedSink) -> Result<Self> {
        Ok(Self::with_client(sink, build_client()?))
    }

    fn with_client(sink: &ResolvedSink, client: HttpClient) -> Self {
        Self {
            url: sink.url.clone(),
            content_type: sink.content_type.clone(),
            client,
        }
    }
}

/// One appended line: leading newline, RFC 3339 UTC timestamp, value.
pub fn csv_line(at: chrono::DateTime<Utc>, value: Measurement) -> String {
    format!("\n{},{value}", at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

impl Sink for HttpAppendSink {
    fn send(&self, value: Measurement) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let request = Request::put(&self.url)
                .header("Content-Type", self.content_type.as_str())
                .body(csv_line(Utc::now(), value))
                .map_err(|e| StirlingError::Sink(format!("request: {e}")))?;

            let response = self
                .client
                .send_async(request)
                .await
                .map_err(|e| StirlingError::Sink(e.to_string()))?;

            let status = response.status();
            if status.is_success() {
                Ok(())
            } else {
                Err(StirlingError::Sink(format!(
                    "HTTP {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("")
                )))
            }
        })
    }
}
