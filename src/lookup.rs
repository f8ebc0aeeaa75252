use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

/// Result of asking an external provider about one title.
///
/// `NotFound` covers every "reachable but nothing usable" case (404, 401, empty or
/// undecodable payloads). `TransportFailure` is reserved for network-level errors and
/// halts the current run.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    TransportFailure(String),
}

impl<T> Lookup<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(v) => Lookup::Found(f(v)),
            Lookup::NotFound => Lookup::NotFound,
            Lookup::TransportFailure(reason) => Lookup::TransportFailure(reason),
        }
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Lookup::TransportFailure(_))
    }
}

/// DNS, connect, timeout and other send-level failures.
pub fn is_transport_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || err.is_request()
}

/// Walk an `anyhow` chain looking for a transport-level `reqwest::Error`.
pub fn is_transport(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<reqwest::Error>())
        .any(is_transport_error)
}

pub(crate) async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder, source: &str) -> Lookup<T> {
    // Request URLs can carry API keys; keep them out of logs and halt reasons.
    let res = match request.send().await.map_err(reqwest::Error::without_url) {
        Ok(res) => res,
        Err(e) if is_transport_error(&e) => {
            error!("Cannot connect to {}: {}", source, e);
            return Lookup::TransportFailure(format!("{}: {}", source, e));
        }
        Err(e) => {
            warn!("{} request failed: {}", source, e);
            return Lookup::NotFound;
        }
    };

    let status = res.status();
    if status == StatusCode::NOT_FOUND {
        info!("{} has no entry for this title", source);
        return Lookup::NotFound;
    }
    if status == StatusCode::UNAUTHORIZED {
        error!("Invalid {} API key (401)", source);
        return Lookup::NotFound;
    }
    if !status.is_success() {
        warn!("{} returned status {}", source, status);
        return Lookup::NotFound;
    }

    let bytes = match res.bytes().await.map_err(reqwest::Error::without_url) {
        Ok(b) => b,
        Err(e) if is_transport_error(&e) => {
            error!("Connection to {} dropped while reading: {}", source, e);
            return Lookup::TransportFailure(format!("{}: {}", source, e));
        }
        Err(e) => {
            warn!("Failed to read {} response: {}", source, e);
            return Lookup::NotFound;
        }
    };

    match serde_json::from_slice::<T>(&bytes) {
        Ok(parsed) => Lookup::Found(parsed),
        Err(e) => {
            warn!("Unexpected {} response shape: {}", source, e);
            Lookup::NotFound
        }
    }
}
