//! Client variants and their fixed endpoints

use std::fmt;

/// User-agent (Mobile Web)
pub const USER_AGENT_MOBILE_WEB: &str =
    "Mozilla/5.0 (Android 16; Mobile; rv:140.0) Gecko/140.0 Firefox/140.0";
/// User-agent (TV)
pub const USER_AGENT_TV: &str =
    "Mozilla/5.0 (compatible; MSIE 9.0; Windows NT 6.1; Trident/5.0; Xbox)";

/// Accept-Language sent with every request
pub const ACCEPT_LANGUAGE: &str = "en-US,en";

/// Page used to find the current player identifier
pub const IFRAME_API_URL: &str = "https://www.youtube.com/iframe_api";

/// Player identifier used when the bootstrap page is not consulted
pub const HARDCODED_PLAYER_ID: &str = "0004de42";

/// Simulated device persona. Each variant owns an independent copy of the
/// player script and service worker metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientVariant {
    MobileWeb,
    Tv,
}

impl ClientVariant {
    pub fn all() -> [ClientVariant; 2] {
        [ClientVariant::Tv, ClientVariant::MobileWeb]
    }

    pub fn user_agent(&self) -> &'static str {
        match self {
            ClientVariant::MobileWeb => USER_AGENT_MOBILE_WEB,
            ClientVariant::Tv => USER_AGENT_TV,
        }
    }

    pub fn is_tv(&self) -> bool {
        matches!(self, ClientVariant::Tv)
    }

    /// Short identifier used in logs and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientVariant::MobileWeb => "mobile-web",
            ClientVariant::Tv => "tv",
        }
    }
}

impl fmt::Display for ClientVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoints of one client variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantEndpoints {
    /// Scheme and host the player script is served from
    pub player_host: String,
    /// Script path below `/s/player/<id>/`
    pub player_path: String,
    /// Identifier used in hardcoded mode
    pub hardcoded_player_id: String,
    /// Service worker metadata document
    pub service_worker_url: String,
}

impl VariantEndpoints {
    pub fn for_variant(variant: ClientVariant) -> Self {
        match variant {
            ClientVariant::MobileWeb => Self {
                player_host: "https://m.youtube.com".to_string(),
                player_path: "player-plasma-ias-phone-en_US.vflset/base.js".to_string(),
                hardcoded_player_id: HARDCODED_PLAYER_ID.to_string(),
                service_worker_url: "https://m.youtube.com/sw.js_data".to_string(),
            },
            ClientVariant::Tv => Self {
                player_host: "https://www.youtube.com".to_string(),
                player_path: "tv-player-ias.vflset/tv-player-ias.js".to_string(),
                hardcoded_player_id: HARDCODED_PLAYER_ID.to_string(),
                service_worker_url: "https://www.youtube.com/tv/sw.js_data".to_string(),
            },
        }
    }

    /// Player script url for a given player identifier
    pub fn player_js_url(&self, player_id: &str) -> String {
        format!(
            "{}/s/player/{}/{}",
            self.player_host.trim_end_matches('/'),
            player_id,
            self.player_path
        )
    }

    pub fn hardcoded_player_js_url(&self) -> String {
        self.player_js_url(&self.hardcoded_player_id)
    }
}

/// All endpoints the deobfuscator talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub iframe_api_url: String,
    pub mobile_web: VariantEndpoints,
    pub tv: VariantEndpoints,
}

impl Endpoints {
    pub fn variant(&self, variant: ClientVariant) -> &VariantEndpoints {
        match variant {
            ClientVariant::MobileWeb => &self.mobile_web,
            ClientVariant::Tv => &self.tv,
        }
    }

    /// Point every endpoint at a single base url (mock servers)
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let mut endpoints = Self::default();
        endpoints.iframe_api_url = format!("{}/iframe_api", base);
        endpoints.mobile_web.player_host = base.to_string();
        endpoints.mobile_web.service_worker_url = format!("{}/sw.js_data", base);
        endpoints.tv.player_host = base.to_string();
        endpoints.tv.service_worker_url = format!("{}/tv/sw.js_data", base);
        endpoints
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            iframe_api_url: IFRAME_API_URL.to_string(),
            mobile_web: VariantEndpoints::for_variant(ClientVariant::MobileWeb),
            tv: VariantEndpoints::for_variant(ClientVariant::Tv),
        }
    }
}
