//! Production host: reqwest for provider calls, the filesystem for assets,
//! the system clock and OS randomness.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use onesdk_primitives::{HttpRequest, HttpResponse, LogLevel, MultiMap};
use rand::RngCore;
use tracing::{debug, warn};

use crate::assets::resolve_asset_path;
use crate::error::HostError;
use crate::traits::HostApi;
use crate::types::HostConfig;

/// Log target used for lines emitted by the core.
pub const CORE_LOG_TARGET: &str = "onesdk_core";

/// [`HostApi`] backed by real I/O.
pub struct StdHost {
    client: reqwest::blocking::Client,
    assets_root: PathBuf,
    config: HostConfig,
}

impl StdHost {
    /// Create a host serving assets from `assets_root`.
    ///
    /// Does not touch the network; the HTTP client connects lazily.
    pub fn new(assets_root: impl Into<PathBuf>, config: HostConfig) -> Result<Self, HostError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| HostError::Internal(format!("http client: {e}")))?;

        Ok(Self {
            client,
            assets_root: assets_root.into(),
            config,
        })
    }

    pub fn assets_root(&self) -> &Path {
        &self.assets_root
    }

    fn map_send_error(&self, err: reqwest::Error) -> HostError {
        if err.is_timeout() {
            HostError::Timeout(self.config.http_timeout.as_millis() as u64)
        } else if err.is_builder() {
            HostError::InvalidRequest(err.to_string())
        } else {
            HostError::Network(err.to_string())
        }
    }
}

impl HostApi for StdHost {
    fn http_call(&mut self, request: &HttpRequest) -> Result<HttpResponse, HostError> {
        let method = reqwest::Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| HostError::InvalidRequest(format!("invalid method {:?}", request.method)))?;

        let mut builder = self.client.request(method, request.url.as_str());

        let query: Vec<(&str, &str)> = request
            .query
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |v| (key.as_str(), v.as_str())))
            .collect();
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        for (name, values) in &request.headers {
            for value in values {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        debug!(method = %request.method, url = %request.url, "provider request");
        let response = builder.send().map_err(|e| self.map_send_error(e))?;

        let limit = self.config.max_response_bytes;
        if let Some(declared) = response.content_length() {
            check_body_len(declared, limit)?;
        }

        let status = response.status().as_u16();
        let mut headers = MultiMap::new();
        for (name, value) in response.headers() {
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        // Content-Length may be absent or wrong; read one byte past the limit
        let mut bytes = Vec::new();
        response
            .take(limit.saturating_add(1))
            .read_to_end(&mut bytes)
            .map_err(|e| HostError::Network(format!("reading response body: {e}")))?;
        check_body_len(bytes.len() as u64, limit)?;
        debug!(status, body_len = bytes.len(), "provider response");

        Ok(HttpResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    fn unix_time_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn random_bytes(&mut self, len: usize) -> Result<Vec<u8>, HostError> {
        if len > self.config.max_random_bytes {
            return Err(HostError::InvalidRequest(format!(
                "requested {} random bytes, limit is {}",
                len, self.config.max_random_bytes
            )));
        }
        let mut buf = vec![0u8; len];
        rand::rngs::OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| HostError::Internal(format!("os randomness: {e}")))?;
        Ok(buf)
    }

    fn log(&mut self, level: LogLevel, message: &str) {
        let message = truncate_line(message, self.config.max_log_line_len);
        match level {
            LogLevel::Trace => tracing::trace!(target: CORE_LOG_TARGET, "{}", message),
            LogLevel::Debug => tracing::debug!(target: CORE_LOG_TARGET, "{}", message),
            LogLevel::Info => tracing::info!(target: CORE_LOG_TARGET, "{}", message),
            LogLevel::Warn => tracing::warn!(target: CORE_LOG_TARGET, "{}", message),
            LogLevel::Error => tracing::error!(target: CORE_LOG_TARGET, "{}", message),
        }
    }

    fn read_asset(&self, path: &str) -> Result<Vec<u8>, HostError> {
        let resolved = resolve_asset_path(&self.assets_root, path)?;
        let metadata = fs::metadata(&resolved).map_err(|e| io_to_host_error(path, e))?;
        if metadata.len() > self.config.max_asset_bytes {
            warn!(path, size = metadata.len(), "asset exceeds size limit");
            return Err(HostError::InvalidRequest(format!(
                "asset {} is {} bytes, limit is {}",
                path,
                metadata.len(),
                self.config.max_asset_bytes
            )));
        }
        fs::read(&resolved).map_err(|e| io_to_host_error(path, e))
    }
}

fn check_body_len(len: u64, limit: u64) -> Result<(), HostError> {
    if len > limit {
        warn!(len, limit, "provider response exceeds size limit");
        return Err(HostError::ResponseTooLarge(len));
    }
    Ok(())
}

fn io_to_host_error(path: &str, err: io::Error) -> HostError {
    match err.kind() {
        io::ErrorKind::NotFound => HostError::AssetNotFound(path.to_string()),
        _ => HostError::Internal(format!("reading {}: {}", path, err)),
    }
}

/// Cut `line` to at most `max` bytes on a char boundary.
fn truncate_line(line: &str, max: usize) -> &str {
    if line.len() <= max {
        return line;
    }
    let mut end = max;
    while !line.is_char_boundary(end) {
        end -= 1;
    }
    &line[..end]
}
