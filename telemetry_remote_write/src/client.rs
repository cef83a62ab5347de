use anyhow::Context;
use prost::Message;
use std::sync::Arc;
use surf::http::headers;

use telemetry_metrics::debug::DEBUG;
use telemetry_metrics::proto::{TimeSeries, WriteRequest};
use telemetry_metrics::{Collector, Counter, Gauge};

use crate::config::ClientConfig;
use crate::error::{debug_error, debug_error_enabled, WriteError};

/// Sent as the `User-Agent` of every request
pub const USER_AGENT: &str = concat!("telemetry-remote-write/", env!("CARGO_PKG_VERSION"));

/// Sent as `X-Prometheus-Remote-Write-Version`
pub const REMOTE_WRITE_VERSION: &str = "0.1.0";

/// A long-lived remote write client; reuse it so connections are kept alive.
///
/// Each `write` makes exactly one attempt. Retrying a failed batch is up to the caller.
pub struct RemoteWriteClient {
    url: String,
    config: ClientConfig,
    client: surf::Client,
    metrics: Arc<ClientMetrics>,
}

impl RemoteWriteClient {
    pub fn new(url: impl Into<String>, config: ClientConfig) -> anyhow::Result<Self> {
        let url = url.into();
        let client: surf::Client = surf::Config::new()
            .set_http_keep_alive(true)
            .set_max_connections_per_host(config.max_connections_per_host)
            .set_timeout(Some(config.timeout))
            .try_into()
            .map_err(|err| anyhow::format_err!("failed to build http client: {}", err))?;
        let metrics = ClientMetrics::new(&url, &config).context("registering client metrics")?;
        Ok(RemoteWriteClient {
            url,
            config,
            client,
            metrics: Arc::new(metrics),
        })
    }

    /// Configures a client from `REMOTE_WRITE_URL` and `ClientConfig::from_env`.
    ///
    /// `ERROR_LOGGER=false` silences the warning logged for each failed write.
    pub fn from_env() -> anyhow::Result<Self> {
        debug_error_enabled(match dotenv::var("ERROR_LOGGER").ok() {
            Some(val) => val.parse().context("invalid ERROR_LOGGER")?,
            None => true,
        });
        let url = dotenv::var("REMOTE_WRITE_URL").context("missing REMOTE_WRITE_URL")?;
        let config = ClientConfig::from_env()?;
        Self::new(url, config)
    }

    pub fn name(&self) -> &'static str {
        "RemoteWrite Client"
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The client's own request metrics; register them to push them alongside everything else.
    pub fn metrics(&self) -> Arc<ClientMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Write a batch of time series, blocking until the remote responds or the attempt fails.
    ///
    /// An empty batch succeeds without making a request.
    pub fn write(&self, series: Vec<TimeSeries>) -> Result<(), WriteError> {
        async_std::task::block_on(self.write_async(series))
    }

    pub async fn write_async(&self, series: Vec<TimeSeries>) -> Result<(), WriteError> {
        if series.is_empty() {
            return Ok(());
        }

        let count = series.len();
        let request = WriteRequest { timeseries: series };
        let result = match encode(&request) {
            Ok(body) => self.send(body).await,
            Err(err) => Err(err),
        };
        match &result {
            Ok(()) => self.metrics.series_written(&self.url, count),
            Err(err) => {
                DEBUG.write_failed();
                tracing::debug!(url = %self.url, series = count, "remote write failed");
                debug_error(err);
            }
        }
        result
    }

    async fn send(&self, body: Vec<u8>) -> Result<(), WriteError> {
        let bytes = body.len();
        let request = self
            .client
            .post(&self.url)
            .body_bytes(body)
            .header(headers::CONTENT_ENCODING, "snappy")
            .header(headers::CONTENT_TYPE, "application/x-protobuf")
            .header(headers::USER_AGENT, USER_AGENT)
            .header("X-Prometheus-Remote-Write-Version", REMOTE_WRITE_VERSION);

        // The pool connects lazily, so connecting shares the outer deadline
        let deadline = self.config.dial_timeout + self.config.timeout;
        let mut response = async_std::future::timeout(deadline, request)
            .await
            .map_err(|_| WriteError::Timeout(deadline))?
            .map_err(|err| {
                if err
                    .downcast_ref::<async_std::future::TimeoutError>()
                    .is_some()
                {
                    WriteError::Timeout(self.config.timeout)
                } else {
                    WriteError::Transport(err)
                }
            })?;
        self.metrics.request_sent(&self.url, bytes);

        // Read the body either way so the connection can be reused
        let status = response.status();
        let read = async_std::future::timeout(self.config.timeout, response.body_bytes());
        let body = match read.await {
            Ok(Ok(body)) => String::from_utf8_lossy(&body).into_owned(),
            Ok(Err(err)) => {
                tracing::warn!(url = %self.url, status = %status, "failed to read response body: {}", err);
                String::new()
            }
            Err(_) => return Err(WriteError::Timeout(self.config.timeout)),
        };
        if status.is_client_error() || status.is_server_error() {
            return Err(WriteError::Rejected {
                status: status.into(),
                body,
            });
        }

        tracing::debug!(url = %self.url, status = %status, bytes, "remote write succeeded");
        DEBUG.write_succeeded(bytes);
        Ok(())
    }
}

/// Serialize and snappy-compress a write request.
pub fn encode(request: &WriteRequest) -> Result<Vec<u8>, WriteError> {
    let mut bytes: Vec<u8> = Vec::with_capacity(request.encoded_len());
    request.encode(&mut bytes)?;
    let mut encoder = snap::raw::Encoder::new();
    Ok(encoder.compress_vec(&bytes)?)
}

/// Metrics describing the requests made by a `RemoteWriteClient`.
pub struct ClientMetrics {
    requests: Counter,
    request_bytes: Counter,
    write_timeseries: Counter,
    flags: Gauge,
    endpoint: String,
}

impl ClientMetrics {
    fn new(url: &str, config: &ClientConfig) -> telemetry_metrics::Result<Self> {
        let flags = Gauge::new(
            "remotewrite_client_flag",
            "Flag of remote write client",
            &["name", "value"],
        )?;
        let dial_timeout = format!("{:?}", config.dial_timeout);
        let timeout = format!("{:?}", config.timeout);
        flags.set(&["dial_timeout", dial_timeout.as_str()], 1.0)?;
        flags.set(&["timeout", timeout.as_str()], 1.0)?;
        flags.set(&["url", url], 1.0)?;

        Ok(ClientMetrics {
            requests: Counter::new(
                "remotewrite_client_request_total",
                "Total number of remote write requests sent to the remote storage",
                &["endpoint"],
            )?,
            request_bytes: Counter::new(
                "remotewrite_client_write_bytes_total",
                "Total number of bytes sent to the remote storage after snappy compression",
                &["endpoint"],
            )?,
            write_timeseries: Counter::new(
                "remotewrite_client_write_timeseries_total",
                "Total number of time series sent to the remote storage",
                &["endpoint"],
            )?,
            flags,
            endpoint: url.to_string(),
        })
    }

    fn request_sent(&self, url: &str, bytes: usize) {
        for result in [
            self.requests.inc(&[url]),
            self.request_bytes.add(&[url], bytes as f64),
        ] {
            if let Err(err) = result {
                debug_error(&err);
            }
        }
    }

    fn series_written(&self, url: &str, n: usize) {
        if let Err(err) = self.write_timeseries.add(&[url], n as f64) {
            debug_error(&err);
        }
    }

    /// Requests that received a response, whatever its status.
    pub fn requests_total(&self) -> f64 {
        self.requests.value(&[self.endpoint.as_str()]).unwrap_or(0.0)
    }

    /// Compressed bytes sent in requests that received a response.
    pub fn bytes_total(&self) -> f64 {
        self.request_bytes.value(&[self.endpoint.as_str()]).unwrap_or(0.0)
    }

    /// Time series in batches the remote accepted.
    pub fn series_total(&self) -> f64 {
        self.write_timeseries.value(&[self.endpoint.as_str()]).unwrap_or(0.0)
    }
}

impl Collector for ClientMetrics {
    fn time_series(&self, timestamp: i64) -> Vec<TimeSeries> {
        let mut out = self.requests.time_series(timestamp);
        out.extend(self.request_bytes.time_series(timestamp));
        out.extend(self.write_timeseries.time_series(timestamp));
        out.extend(self.flags.time_series(timestamp));
        out
    }
}
