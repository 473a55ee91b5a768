//! Query parameter helpers for streaming urls and signature ciphers

use crate::error::RytError;
use rand::Rng;
use regex::Regex;
use std::sync::LazyLock;

/// The 'n' parameter in a streaming url
static THROTTLING_PARAM_N: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[&?]n=([^&]+)").expect("valid 'n' pattern"));

/// The 's' parameter in a signatureCipher
static CIPHER_PARAM_S: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|&)s=([^&]+)").expect("valid 's' pattern"));

/// The 'url' parameter in a signatureCipher
static CIPHER_PARAM_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|&)url=([^&]+)").expect("valid 'url' pattern"));

const CPN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
const CPN_LENGTH: usize = 16;

/// Raw (still percent-encoded) parts of a signatureCipher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherParams<'a> {
    pub signature: &'a str,
    pub url: &'a str,
}

/// Extract the obfuscated 'n' parameter from a streaming url
pub fn extract_n_param(streaming_url: &str) -> Option<&str> {
    if !streaming_url.contains("&n=") && !streaming_url.contains("?n=") {
        return None;
    }
    THROTTLING_PARAM_N
        .captures(streaming_url)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
        .filter(|n| !n.is_empty())
}

/// Extract the 's' and 'url' parameters from a signatureCipher
pub fn extract_cipher_params(signature_cipher: &str) -> Option<CipherParams<'_>> {
    let signature = CIPHER_PARAM_S.captures(signature_cipher)?.get(1)?.as_str();
    let url = CIPHER_PARAM_URL.captures(signature_cipher)?.get(1)?.as_str();
    if signature.is_empty() || url.is_empty() {
        return None;
    }
    Some(CipherParams { signature, url })
}

/// Replace the first `n=<obfuscated>` with `n=<deobfuscated>`
pub fn replace_n_param(streaming_url: &str, obfuscated: &str, deobfuscated: &str) -> String {
    streaming_url.replacen(
        &format!("n={}", obfuscated),
        &format!("n={}", deobfuscated),
        1,
    )
}

/// Decode an `application/x-www-form-urlencoded` component
pub fn decode_component(value: &str) -> Result<String, RytError> {
    let plus_decoded = value.replace('+', " ");
    urlencoding::decode(&plus_decoded)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| RytError::DecodeError(e.to_string()))
}

/// Append `&key=value` unless the value is empty
pub fn append_param(url: &mut String, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        url.push('&');
        url.push_str(key);
        url.push('=');
        url.push_str(value);
    }
}

/// Generate a random content playback nonce
pub fn generate_cpn() -> String {
    let mut rng = rand::thread_rng();
    (0..CPN_LENGTH)
        .map(|_| CPN_ALPHABET[rng.gen_range(0..CPN_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_n_param() {
        assert_eq!(
            extract_n_param("https://x.test/v?n=obf123&itag=18"),
            Some("obf123")
        );
        assert_eq!(
            extract_n_param("https://x.test/v?itag=18&n=abc"),
            Some("abc")
        );
        assert_eq!(extract_n_param("https://x.test/v?itag=18"), None);
        // "sn=" is not an 'n' parameter
        assert_eq!(extract_n_param("https://x.test/v?sn=abc"), None);
        assert_eq!(extract_n_param("https://x.test/v?n=&itag=1"), None);
    }

    #[test]
    fn test_extract_cipher_params() {
        let params = extract_cipher_params("s=ABC&url=https%3A%2F%2Fx.test%2Fv").unwrap();
        assert_eq!(params.signature, "ABC");
        assert_eq!(params.url, "https%3A%2F%2Fx.test%2Fv");

        let params = extract_cipher_params("url=https%3A%2F%2Fx.test&sp=sig&s=XYZ").unwrap();
        assert_eq!(params.signature, "XYZ");
        assert_eq!(params.url, "https%3A%2F%2Fx.test");
    }

    #[test]
    fn test_extract_cipher_params_missing() {
        assert_eq!(extract_cipher_params("s=ABC"), None);
        assert_eq!(extract_cipher_params("url=https%3A%2F%2Fx.test"), None);
        assert_eq!(extract_cipher_params("sp=sig&url=https%3A%2F%2Fx.test"), None);
        assert_eq!(extract_cipher_params(""), None);
    }

    #[test]
    fn test_replace_n_param_first_match_only() {
        let url = "https://x.test/v?n=abc&other=1&n=abc";
        assert_eq!(
            replace_n_param(url, "abc", "xyz"),
            "https://x.test/v?n=xyz&other=1&n=abc"
        );
    }

    #[test]
    fn test_decode_component() {
        assert_eq!(
            decode_component("https%3A%2F%2Fx.test%2Fv%3Fn%3Dobf123").unwrap(),
            "https://x.test/v?n=obf123"
        );
        assert_eq!(decode_component("a+b%2Bc").unwrap(), "a b+c");
        assert!(decode_component("%FF%FE").is_err());
    }

    #[test]
    fn test_append_param() {
        let mut url = "https://x.test/v?itag=18".to_string();
        append_param(&mut url, "cpn", Some("cpn1"));
        append_param(&mut url, "pot", Some(""));
        append_param(&mut url, "pot", None);
        assert_eq!(url, "https://x.test/v?itag=18&cpn=cpn1");
    }

    #[test]
    fn test_generate_cpn() {
        let cpn = generate_cpn();
        assert_eq!(cpn.len(), 16);
        assert!(cpn
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
        assert_ne!(generate_cpn(), generate_cpn());
    }
}
