//! Streaming data of a player response

use crate::error::RytError;
use crate::platform::deobfuscator::Deobfuscator;
use crate::platform::variant::ClientVariant;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Player response, reduced to what deobfuscation needs
#[derive(Debug, Deserialize)]
pub struct PlayerResponse {
    #[serde(rename = "streamingData")]
    pub streaming_data: Option<StreamingData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamingData {
    #[serde(default)]
    pub formats: Vec<StreamFormat>,
    #[serde(rename = "adaptiveFormats", default)]
    pub adaptive_formats: Vec<StreamFormat>,
    #[serde(rename = "serverAbrStreamingUrl")]
    pub server_abr_streaming_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamFormat {
    pub itag: Option<u32>,
    pub url: Option<String>,
    #[serde(rename = "signatureCipher")]
    pub signature_cipher: Option<String>,
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
}

/// Playable urls, in the order of the input formats
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeobfuscatedStreamingData {
    #[serde(rename = "adaptiveFormats")]
    pub adaptive_formats: Vec<String>,
    pub formats: Vec<String>,
    #[serde(rename = "serverAbrStreamingUrl", skip_serializing_if = "Option::is_none")]
    pub server_abr_streaming_url: Option<String>,
}

/// Parse either a full player response or a bare `streamingData` object
pub fn parse_streaming_data(json: &str) -> Result<StreamingData, RytError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if value.get("streamingData").is_some() {
        let response: PlayerResponse = serde_json::from_value(value)?;
        return response
            .streaming_data
            .ok_or_else(|| RytError::PatternNotFound("streamingData".to_string()));
    }
    Ok(serde_json::from_value(value)?)
}

impl Deobfuscator {
    /// Deobfuscate every format of a streaming data object.
    ///
    /// Adaptive formats are required: the result is `None` when there are
    /// none or one of them fails. A failing progressive format only drops
    /// the progressive list.
    pub async fn deobfuscate_streaming_data(
        &self,
        video_id: &str,
        cpn: &str,
        data: &StreamingData,
        po_token: Option<&str>,
        variant: ClientVariant,
    ) -> Option<DeobfuscatedStreamingData> {
        if data.adaptive_formats.is_empty() {
            debug!("AdaptiveFormats is empty, videoId: {}", video_id);
            return None;
        }

        let mut adaptive_formats = Vec::with_capacity(data.adaptive_formats.len());
        for format in &data.adaptive_formats {
            let Some(url) = self.deobfuscate_format(video_id, cpn, format, po_token, variant).await
            else {
                debug!(
                    "Failed to deobfuscate adaptive format, videoId: {}, itag: {:?}",
                    video_id, format.itag
                );
                return None;
            };
            adaptive_formats.push(url);
        }

        let mut formats = Vec::with_capacity(data.formats.len());
        for format in &data.formats {
            match self.deobfuscate_format(video_id, cpn, format, po_token, variant).await {
                Some(url) => formats.push(url),
                None => {
                    debug!(
                        "Failed to deobfuscate format, videoId: {}, itag: {:?}",
                        video_id, format.itag
                    );
                    formats.clear();
                    break;
                }
            }
        }

        let server_abr_streaming_url = match data.server_abr_streaming_url.as_deref() {
            Some(url) if !url.is_empty() => {
                self.deobfuscate_streaming_url(video_id, cpn, Some(url), None, po_token, variant)
                    .await
            }
            _ => None,
        };

        Some(DeobfuscatedStreamingData {
            adaptive_formats,
            formats,
            server_abr_streaming_url,
        })
    }

    async fn deobfuscate_format(
        &self,
        video_id: &str,
        cpn: &str,
        format: &StreamFormat,
        po_token: Option<&str>,
        variant: ClientVariant,
    ) -> Option<String> {
        self.deobfuscate_streaming_url(
            video_id,
            cpn,
            format.url.as_deref(),
            format.signature_cipher.as_deref(),
            po_token,
            variant,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::deobfuscator::tests::{
        deobfuscator, tv_player_url, StaticFetcher, StubEvaluator, PLAYER_JS,
    };
    use crate::platform::deobfuscator::DeobfuscatorConfig;
    use std::sync::atomic::Ordering;

    fn format(url: Option<&str>, cipher: Option<&str>) -> StreamFormat {
        StreamFormat {
            url: url.map(str::to_string),
            signature_cipher: cipher.map(str::to_string),
            ..StreamFormat::default()
        }
    }

    fn setup() -> (Deobfuscator, std::sync::Arc<crate::platform::deobfuscator::tests::StubFactory>) {
        let fetcher = StaticFetcher::default().with(&tv_player_url(), PLAYER_JS);
        let evaluator = StubEvaluator::default()
            .sig("ABC", "sig1")
            .n_sig("obf123", "deobf1");
        let (deobfuscator, _, factory) =
            deobfuscator(DeobfuscatorConfig::default(), fetcher, evaluator);
        (deobfuscator, factory)
    }

    #[test]
    fn test_parse_streaming_data() {
        let json = r#"{
            "streamingData": {
                "adaptiveFormats": [
                    {"itag": 137, "mimeType": "video/mp4", "url": "https://x.test/v?n=obf123"},
                    {"itag": 140, "signatureCipher": "s=ABC&url=https%3A%2F%2Fx.test%2Fa"}
                ],
                "serverAbrStreamingUrl": "https://x.test/abr?n=obf123"
            }
        }"#;
        let data = parse_streaming_data(json).unwrap();
        assert_eq!(data.adaptive_formats.len(), 2);
        assert!(data.formats.is_empty());
        assert_eq!(data.adaptive_formats[0].itag, Some(137));
        assert!(data.adaptive_formats[1].signature_cipher.is_some());

        let bare = parse_streaming_data(r#"{"formats":[{"itag":18,"url":"u"}]}"#).unwrap();
        assert_eq!(bare.formats.len(), 1);

        assert!(parse_streaming_data(r#"{"streamingData": null}"#).is_err());
        assert!(parse_streaming_data("not json").is_err());
    }

    #[tokio::test]
    async fn test_deobfuscate_streaming_data() {
        let (deobfuscator, factory) = setup();
        let data = StreamingData {
            adaptive_formats: vec![
                format(Some("https://x.test/v?itag=137&n=obf123"), None),
                format(None, Some("s=ABC&url=https%3A%2F%2Fx.test%2Fa%3Fn%3Dobf123")),
            ],
            formats: vec![format(Some("https://x.test/v?itag=18&n=obf123"), None)],
            server_abr_streaming_url: Some("https://x.test/abr?n=obf123".to_string()),
        };

        let result = deobfuscator
            .deobfuscate_streaming_data("video1", "cpn1", &data, Some("pot1"), ClientVariant::Tv)
            .await
            .unwrap();

        assert_eq!(
            result.adaptive_formats,
            vec![
                "https://x.test/v?itag=137&n=deobf1&cpn=cpn1&pot=pot1".to_string(),
                "https://x.test/a?n=deobf1&sig=sig1&cpn=cpn1&pot=pot1".to_string(),
            ]
        );
        assert_eq!(
            result.formats,
            vec!["https://x.test/v?itag=18&n=deobf1&cpn=cpn1&pot=pot1".to_string()]
        );
        assert_eq!(
            result.server_abr_streaming_url.as_deref(),
            Some("https://x.test/abr?n=deobf1&cpn=cpn1&pot=pot1")
        );
        assert_eq!(factory.evaluator.n_sig_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_or_failing_adaptive_formats() {
        let (deobfuscator, _) = setup();

        let empty = StreamingData::default();
        assert!(deobfuscator
            .deobfuscate_streaming_data("video1", "cpn1", &empty, None, ClientVariant::Tv)
            .await
            .is_none());

        let failing = StreamingData {
            adaptive_formats: vec![
                format(Some("https://x.test/v?n=obf123"), None),
                format(None, Some("s=UNKNOWN&url=https%3A%2F%2Fx.test%2Fa")),
            ],
            ..StreamingData::default()
        };
        assert!(deobfuscator
            .deobfuscate_streaming_data("video1", "cpn1", &failing, None, ClientVariant::Tv)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_failing_progressive_format_clears_list() {
        let (deobfuscator, _) = setup();
        let data = StreamingData {
            adaptive_formats: vec![format(Some("https://x.test/v?n=obf123"), None)],
            formats: vec![
                format(Some("https://x.test/p?n=obf123"), None),
                format(None, None),
            ],
            server_abr_streaming_url: None,
        };

        let result = deobfuscator
            .deobfuscate_streaming_data("video1", "", &data, None, ClientVariant::Tv)
            .await
            .unwrap();

        assert_eq!(result.adaptive_formats, vec!["https://x.test/v?n=deobf1".to_string()]);
        assert!(result.formats.is_empty());
        assert_eq!(result.server_abr_streaming_url, None);
    }
}
