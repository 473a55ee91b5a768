//! Player script location and signature timestamp

use crate::error::RytError;
use crate::platform::client::Fetch;
use crate::platform::variant::{ClientVariant, Endpoints};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Escaped player path in the bootstrap page, `player\/0004de42\/`
static PLAYER_JS_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"player\\/([a-z0-9]{8})\\/").expect("valid player identifier pattern")
});

static SIGNATURE_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"signatureTimestamp[=:](\d+)").expect("valid signature timestamp pattern")
});

/// Where the player script url comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptSource {
    /// Fixed identifier, no network access
    Hardcoded,
    /// Identifier extracted from the bootstrap page
    Bootstrap,
}

/// Extract the 8 character player identifier from the bootstrap page
pub fn extract_player_id(page: &str) -> Option<&str> {
    PLAYER_JS_IDENTIFIER
        .captures(page)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// Resolve the player script url of a variant
pub async fn resolve_player_js_url(
    fetcher: &dyn Fetch,
    endpoints: &Endpoints,
    variant: ClientVariant,
    source: ScriptSource,
) -> Result<String, RytError> {
    let variant_endpoints = endpoints.variant(variant);
    if source == ScriptSource::Hardcoded {
        return Ok(variant_endpoints.hardcoded_player_js_url());
    }

    let page = fetcher
        .fetch(&endpoints.iframe_api_url, variant)
        .await
        .ok_or_else(|| RytError::Generic("bootstrap page not available".to_string()))?;
    let player_id = extract_player_id(&page)
        .ok_or_else(|| RytError::PatternNotFound("player identifier".to_string()))?;

    debug!("player identifier: {}, variant: {}", player_id, variant);
    Ok(variant_endpoints.player_js_url(player_id))
}

/// Extract the signature timestamp the player script was built with
pub fn extract_signature_timestamp(player_js: &str) -> Result<u32, RytError> {
    let captures = SIGNATURE_TIMESTAMP
        .captures(player_js)
        .ok_or_else(|| RytError::PatternNotFound("signatureTimestamp".to_string()))?;
    let value = captures
        .get(1)
        .map(|m| m.as_str())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| RytError::PatternNotFound("signatureTimestamp".to_string()))?;
    Ok(value.parse()?)
}
