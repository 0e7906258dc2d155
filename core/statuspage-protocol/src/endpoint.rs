//! Live endpoint derivation.
//!
//! The live-update socket lives on the same host as the REST API, with the
//! scheme swapped (`http`→`ws`, `https`→`wss`) and `/ws` appended to the path.

use url::Url;

pub const LIVE_PATH: &str = "ws";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid base address {address:?}: {details}")]
    InvalidBase { address: String, details: String },

    #[error("base address must be http or https, got {0:?}")]
    UnsupportedScheme(String),
}

pub fn live_endpoint(base: &Url) -> Result<Url, EndpointError> {
    let scheme = match base.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
    };

    let mut endpoint = base.clone();
    endpoint
        .set_scheme(scheme)
        .map_err(|_| EndpointError::UnsupportedScheme(base.scheme().to_string()))?;

    let path = base.path().trim_end_matches('/');
    endpoint.set_path(&format!("{}/{}", path, LIVE_PATH));
    endpoint.set_query(None);
    endpoint.set_fragment(None);
    Ok(endpoint)
}

pub fn live_endpoint_str(base: &str) -> Result<Url, EndpointError> {
    let parsed = Url::parse(base.trim()).map_err(|err| EndpointError::InvalidBase {
        address: base.to_string(),
        details: err.to_string(),
    })?;
    live_endpoint(&parsed)
}
