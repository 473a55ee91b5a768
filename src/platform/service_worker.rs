//! Service worker metadata (client version and visitor id)

use crate::error::RytError;
use crate::platform::client::Fetch;
use crate::platform::variant::{ClientVariant, Endpoints};
use serde_json::Value;

/// Anti-XSSI guard some documents start with
pub const XSSI_PREFIX: &str = ")]}'";

/// Position of the client version in the metadata array
pub const CLIENT_VERSION_INDEX: usize = 16;
/// Position of the visitor id in the metadata array
pub const VISITOR_ID_INDEX: usize = 13;

/// Parse a service worker document and return the array at `[0][2][0][0]`
pub fn parse_service_worker_payload(payload: &str) -> Result<Vec<Value>, RytError> {
    let payload = payload.strip_prefix(XSSI_PREFIX).unwrap_or(payload);
    let document: Value = serde_json::from_str(payload)?;

    let metadata = [0usize, 2, 0, 0]
        .iter()
        .try_fold(&document, |node, &index| node.get(index))
        .ok_or_else(|| RytError::MetadataError("no array at [0][2][0][0]".to_string()))?;

    match metadata {
        Value::Array(values) => Ok(values.clone()),
        _ => Err(RytError::MetadataError(
            "[0][2][0][0] is not an array".to_string(),
        )),
    }
}

/// String value at a fixed position of the metadata array
pub fn string_field(metadata: &[Value], index: usize) -> Result<String, RytError> {
    metadata
        .get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RytError::MetadataError(format!("no string at index {}", index)))
}

/// Fetch and parse the service worker document of a variant
pub async fn fetch_service_worker_metadata(
    fetcher: &dyn Fetch,
    endpoints: &Endpoints,
    variant: ClientVariant,
) -> Result<Vec<Value>, RytError> {
    let payload = fetcher
        .fetch(&endpoints.variant(variant).service_worker_url, variant)
        .await
        .ok_or_else(|| RytError::Generic("service worker document not available".to_string()))?;
    parse_service_worker_payload(&payload)
}
