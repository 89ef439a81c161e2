//! Purpose: Provide an HTTP client for the `kvitd` read surface.
//! Exports: `RemoteClient`, `DEFAULT_PORT`.
//! Role: Mirrors local `get`/`list_keys` against a daemon selected by a CLI context.
//! Invariants: `/get/` carries `bucket[/subkey]` as one percent-encoded path segment.
//! Invariants: Non-2xx responses surface the status and the plain-text body.
#![allow(clippy::result_large_err)]

use super::ApiResult;
use crate::core::error::{Error, ErrorKind};
use crate::core::key::key_path;
use serde::de::DeserializeOwned;
use std::net::Ipv6Addr;
use std::sync::Arc;
use url::Url;

pub const DEFAULT_PORT: u16 = 14250;

#[derive(Clone)]
pub struct RemoteClient {
    inner: Arc<RemoteClientInner>,
}

struct RemoteClientInner {
    base_url: Url,
    agent: ureq::Agent,
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let agent = ureq::AgentBuilder::new().build();
        Ok(Self {
            inner: Arc::new(RemoteClientInner { base_url, agent }),
        })
    }

    /// Builds a client from a context address such as `10.0.0.2`,
    /// `10.0.0.2:9000`, `::1`, or `http://host:9000`.
    pub fn for_address(address: &str) -> ApiResult<Self> {
        Self::new(base_url_for_address(address))
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn list_keys(&self) -> ApiResult<Vec<String>> {
        let url = build_url(&self.inner.base_url, &["list-keys"])?;
        self.get_json(&url)
    }

    pub fn get(&self, bucket: &str, subkey: &str) -> ApiResult<Vec<String>> {
        let key = key_path(bucket, subkey);
        let url = build_url(&self.inner.base_url, &["get", &key])?;
        self.get_json(&url).map_err(|err| err.with_key(key))
    }

    fn get_json<R>(&self, url: &Url) -> ApiResult<R>
    where
        R: DeserializeOwned,
    {
        let response = self
            .inner
            .agent
            .request("GET", url.as_str())
            .set("Accept", "application/json")
            .call();
        match response {
            Ok(resp) => read_json_response(resp),
            Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
                .with_message("request failed")
                .with_source(err)),
        }
    }
}

fn base_url_for_address(address: &str) -> String {
    if address.contains("://") {
        return address.to_string();
    }
    if let Ok(ip) = address.parse::<Ipv6Addr>() {
        return format!("http://[{ip}]:{DEFAULT_PORT}");
    }
    if address.starts_with('[') {
        if address.contains("]:") {
            return format!("http://{address}");
        }
        return format!("http://{address}:{DEFAULT_PORT}");
    }
    match address.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => format!("http://{address}"),
        _ => format!("http://{address}:{DEFAULT_PORT}"),
    }
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid remote base url")
            .with_source(err)
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("remote base url must use http or https scheme"));
    }
    if url.path() != "/" && !url.path().is_empty() {
        return Err(
            Error::new(ErrorKind::Usage).with_message("remote base url must not include a path")
        );
    }
    url.set_path("/");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

fn build_url(base_url: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            Error::new(ErrorKind::Usage).with_message("remote base url cannot be a base")
        })?;
        path.clear();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

fn read_json_response<R>(response: ureq::Response) -> ApiResult<R>
where
    R: DeserializeOwned,
{
    let body = response.into_string().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read response body")
            .with_source(err)
    })?;
    serde_json::from_str(&body).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("invalid response json")
            .with_source(err)
    })
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    let body = body.trim();
    let message = if body.is_empty() {
        format!("remote error: status {status}")
    } else {
        format!("remote error: status {status}: {body}")
    };
    Error::new(error_kind_from_status(status)).with_message(message)
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        400 | 405 => ErrorKind::Usage,
        404 => ErrorKind::NotFound,
        500..=599 => ErrorKind::Internal,
        _ => ErrorKind::Io,
    }
}
