//! Streaming url deobfuscation
//!
//! [`Deobfuscator`] turns the `url` / `signatureCipher` of a streaming format
//! into a playable url: it reconstructs ciphered urls, rewrites the 'n'
//! throttling parameter and appends the playback nonce and PoToken.
//!
//! All per-variant state (player script, rule evaluator, signature timestamp,
//! service worker metadata) is resolved lazily and memoized; the 'n'
//! parameter cache is shared by both variants.

use crate::error::RytError;
use crate::platform::cipher::{DenoEvaluatorFactory, EvaluatorFactory, EvaluatorMode, RuleEvaluator};
use crate::platform::client::{Fetch, HttpClientConfig, HttpFetcher};
use crate::platform::player::{self, ScriptSource};
use crate::platform::service_worker::{self, CLIENT_VERSION_INDEX, VISITOR_ID_INDEX};
use crate::platform::state::{VariantSlots, VariantState};
use crate::platform::variant::{ClientVariant, Endpoints};
use crate::utils::cache::{ThrottlingParameterCache, DEFAULT_CAPACITY};
use crate::utils::url::{append_param, decode_component, extract_cipher_params, extract_n_param, replace_n_param};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Deobfuscator configuration
#[derive(Debug, Clone)]
pub struct DeobfuscatorConfig {
    /// Evaluate the full player script and read client version / visitor id
    /// from the service worker metadata
    pub use_ejs: bool,
    /// Enable the mobile web variant
    pub use_mobile_web: bool,
    /// Build the player url from the hardcoded identifier instead of the
    /// bootstrap page
    pub use_hardcoded_player: bool,
    /// Capacity of the 'n' parameter cache
    pub cache_capacity: usize,
    /// HTTP client settings
    pub http: HttpClientConfig,
    /// Remote endpoints
    pub endpoints: Endpoints,
}

impl DeobfuscatorConfig {
    /// Configuration where the hardcoded player path is used exactly when EJS
    /// is disabled
    pub fn new(use_ejs: bool, use_mobile_web: bool) -> Self {
        Self {
            use_ejs,
            use_mobile_web,
            use_hardcoded_player: !use_ejs,
            ..Self::default()
        }
    }

    pub fn script_source(&self) -> ScriptSource {
        if self.use_hardcoded_player {
            ScriptSource::Hardcoded
        } else {
            ScriptSource::Bootstrap
        }
    }

    pub fn evaluator_mode(&self) -> EvaluatorMode {
        EvaluatorMode::from_ejs(self.use_ejs)
    }
}

impl Default for DeobfuscatorConfig {
    fn default() -> Self {
        Self {
            use_ejs: false,
            use_mobile_web: true,
            use_hardcoded_player: true,
            cache_capacity: DEFAULT_CAPACITY,
            http: HttpClientConfig::default(),
            endpoints: Endpoints::default(),
        }
    }
}

/// Process-wide deobfuscation service
pub struct Deobfuscator {
    config: DeobfuscatorConfig,
    fetcher: Arc<dyn Fetch>,
    factory: Arc<dyn EvaluatorFactory>,
    states: VariantSlots,
    n_params: ThrottlingParameterCache,
    initialized: AtomicBool,
}

impl Deobfuscator {
    /// Create a deobfuscator backed by reqwest and V8
    pub fn new(config: DeobfuscatorConfig) -> Result<Self, RytError> {
        let fetcher = HttpFetcher::with_config(config.http.clone())?;
        Ok(Self::with_parts(
            config,
            Arc::new(fetcher),
            Arc::new(DenoEvaluatorFactory),
        ))
    }

    /// Create a deobfuscator from explicit collaborators
    pub fn with_parts(
        config: DeobfuscatorConfig,
        fetcher: Arc<dyn Fetch>,
        factory: Arc<dyn EvaluatorFactory>,
    ) -> Self {
        let n_params = ThrottlingParameterCache::with_capacity(config.cache_capacity);
        Self {
            config,
            fetcher,
            factory,
            states: VariantSlots::default(),
            n_params,
            initialized: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &DeobfuscatorConfig {
        &self.config
    }

    /// Memoized state of a variant
    pub fn state(&self, variant: ClientVariant) -> &VariantState {
        self.states.get(variant)
    }

    /// Shared 'n' parameter cache
    pub fn n_param_cache(&self) -> &ThrottlingParameterCache {
        &self.n_params
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn is_enabled(&self, variant: ClientVariant) -> bool {
        variant.is_tv() || self.config.use_mobile_web
    }

    /// Clear every memoized field of both variants, forcing a full re-fetch
    pub fn reset_all(&self) {
        self.initialized.store(false, Ordering::Release);
        self.states.reset_all();
        debug!("Deobfuscator state reset");
    }

    /// Download the player scripts and build the rule evaluators ahead of
    /// the first playback.
    ///
    /// Runs once; a later reset re-arms it.
    pub async fn initialize(&self) {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return;
        }

        let tv = self.warm_up(ClientVariant::Tv);
        let mobile_web = async {
            if self.config.use_mobile_web {
                self.warm_up(ClientVariant::MobileWeb).await;
            }
        };
        futures::join!(tv, mobile_web);
        info!("Deobfuscator initialized");
    }

    async fn warm_up(&self, variant: ClientVariant) {
        self.evaluator(variant).await;
        self.signature_timestamp(variant).await;
        if self.config.use_ejs {
            self.client_version(variant).await;
        }
        if !variant.is_tv() {
            self.visitor_id(variant).await;
        }
    }

    /// Player script url of a variant.
    ///
    /// A failure resets all state so the next call retries the whole chain.
    pub async fn player_script_url(&self, variant: ClientVariant) -> Option<String> {
        if !self.is_enabled(variant) {
            return None;
        }
        let state = self.state(variant);
        if let Some(url) = state.script_url.get() {
            return Some(url);
        }

        let epoch = state.epoch();
        match player::resolve_player_js_url(
            self.fetcher.as_ref(),
            &self.config.endpoints,
            variant,
            self.config.script_source(),
        )
        .await
        {
            Ok(url) => Some(state.commit(&state.script_url, epoch, url)),
            Err(e) => {
                warn!("player script url not found ({}): {}", variant, e);
                self.reset_all();
                None
            }
        }
    }

    /// Player script content of a variant
    pub async fn player_script(&self, variant: ClientVariant) -> Option<Arc<str>> {
        let state = self.state(variant);
        if let Some(script) = state.script.get() {
            return Some(script);
        }

        let epoch = state.epoch();
        let url = self.player_script_url(variant).await?;
        let content = self.fetcher.fetch(&url, variant).await?;
        Some(state.commit(&state.script, epoch, Arc::from(content)))
    }

    /// Rule evaluator built from the variant's player script
    pub async fn evaluator(&self, variant: ClientVariant) -> Option<Arc<dyn RuleEvaluator>> {
        let state = self.state(variant);
        if let Some(evaluator) = state.evaluator.get() {
            return Some(evaluator);
        }

        let epoch = state.epoch();
        let script = self.player_script(variant).await?;
        match self.factory.create(script, self.config.evaluator_mode()).await {
            Ok(evaluator) => Some(state.commit(&state.evaluator, epoch, evaluator)),
            Err(e) => {
                warn!("rule evaluator construction failed ({}): {}", variant, e);
                None
            }
        }
    }

    /// Signature timestamp of the variant's player script
    pub async fn signature_timestamp(&self, variant: ClientVariant) -> Option<u32> {
        let state = self.state(variant);
        if let Some(timestamp) = state.signature_timestamp.get() {
            return Some(timestamp);
        }

        let epoch = state.epoch();
        let script = self.player_script(variant).await?;
        match player::extract_signature_timestamp(&script) {
            Ok(timestamp) => {
                debug!("signatureTimestamp: {}, variant: {}", timestamp, variant);
                Some(state.commit(&state.signature_timestamp, epoch, timestamp))
            }
            Err(e) => {
                debug!("signatureTimestamp not found ({}): {}", variant, e);
                None
            }
        }
    }

    /// Service worker metadata array of a variant
    pub async fn service_worker_metadata(&self, variant: ClientVariant) -> Option<Arc<Vec<Value>>> {
        if !self.is_enabled(variant) {
            return None;
        }
        let state = self.state(variant);
        if let Some(metadata) = state.service_worker.get() {
            return Some(metadata);
        }

        let epoch = state.epoch();
        match service_worker::fetch_service_worker_metadata(
            self.fetcher.as_ref(),
            &self.config.endpoints,
            variant,
        )
        .await
        {
            Ok(metadata) => Some(state.commit(&state.service_worker, epoch, Arc::new(metadata))),
            Err(e) => {
                warn!("service worker metadata unavailable ({}): {}", variant, e);
                None
            }
        }
    }

    /// Client version from the service worker metadata
    pub async fn client_version(&self, variant: ClientVariant) -> Option<String> {
        let state = self.state(variant);
        if let Some(version) = state.client_version.get() {
            return Some(version);
        }
        let epoch = state.epoch();
        let version = self.metadata_field(variant, CLIENT_VERSION_INDEX).await?;
        debug!("clientVersion: {}, variant: {}", version, variant);
        Some(state.commit(&state.client_version, epoch, version))
    }

    /// Visitor id from the service worker metadata
    pub async fn visitor_id(&self, variant: ClientVariant) -> Option<String> {
        let state = self.state(variant);
        if let Some(visitor_id) = state.visitor_id.get() {
            return Some(visitor_id);
        }
        let epoch = state.epoch();
        let visitor_id = self.metadata_field(variant, VISITOR_ID_INDEX).await?;
        debug!("visitorId: {}, variant: {}", visitor_id, variant);
        Some(state.commit(&state.visitor_id, epoch, visitor_id))
    }

    async fn metadata_field(&self, variant: ClientVariant, index: usize) -> Option<String> {
        let metadata = self.service_worker_metadata(variant).await?;
        match service_worker::string_field(&metadata, index) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("service worker field unavailable ({}): {}", variant, e);
                None
            }
        }
    }

    /// Client version to send for a variant: the service worker value when
    /// EJS is enabled and it is known, `fallback` otherwise
    pub async fn client_version_or(&self, variant: ClientVariant, fallback: &str) -> String {
        if self.config.use_ejs {
            if let Some(version) = self.client_version(variant).await {
                return version;
            }
        }
        fallback.to_string()
    }

    /// Build the final streaming url of a format.
    ///
    /// Returns `None` only when no base url can be obtained; a failed 'n'
    /// deobfuscation leaves the parameter obfuscated.
    pub async fn deobfuscate_streaming_url(
        &self,
        video_id: &str,
        cpn: &str,
        url: Option<&str>,
        signature_cipher: Option<&str>,
        po_token: Option<&str>,
        variant: ClientVariant,
    ) -> Option<String> {
        let stream_url = match (url, signature_cipher) {
            (Some(url), _) if !url.is_empty() => url.to_string(),
            (_, Some(cipher)) if !cipher.is_empty() => {
                self.url_from_signature_cipher(video_id, cipher, variant).await?
            }
            _ => {
                debug!("Neither url nor signatureCipher present, videoId: {}", video_id);
                return None;
            }
        };

        let mut deobfuscated = self.deobfuscate_n_param(video_id, stream_url, variant).await;
        append_param(&mut deobfuscated, "cpn", Some(cpn));
        append_param(&mut deobfuscated, "pot", po_token);
        Some(deobfuscated)
    }

    /// Convert a signatureCipher to a streaming url with the 'n' parameter
    /// still obfuscated
    async fn url_from_signature_cipher(
        &self,
        video_id: &str,
        signature_cipher: &str,
        variant: ClientVariant,
    ) -> Option<String> {
        match self.decipher_url(signature_cipher, variant).await {
            Ok(url) => {
                debug!("Converted signatureCipher to obfuscatedUrl, videoId: {}", video_id);
                Some(url)
            }
            Err(e) => {
                warn!("Failed to convert signatureCipher, videoId: {}: {}", video_id, e);
                None
            }
        }
    }

    async fn decipher_url(
        &self,
        signature_cipher: &str,
        variant: ClientVariant,
    ) -> Result<String, RytError> {
        let params = extract_cipher_params(signature_cipher)
            .ok_or_else(|| RytError::PatternNotFound("'s' or 'url' in signatureCipher".to_string()))?;
        let evaluator = self
            .evaluator(variant)
            .await
            .ok_or_else(|| RytError::EvaluatorError("rule evaluator unavailable".to_string()))?;

        let signature = evaluator
            .extract_sig(&decode_component(params.signature)?)
            .await?;
        if signature.is_empty() {
            return Err(RytError::CipherError("empty signature".to_string()));
        }

        let url = decode_component(params.url)?;
        Ok(format!("{}&sig={}", url, signature))
    }

    /// Rewrite the 'n' parameter of a streaming url, returning the url
    /// unchanged when that is not possible
    async fn deobfuscate_n_param(
        &self,
        video_id: &str,
        obfuscated_url: String,
        variant: ClientVariant,
    ) -> String {
        let Some(obfuscated) = extract_n_param(&obfuscated_url) else {
            debug!("'n' parameter not found in streaming url, videoId: {}", video_id);
            return obfuscated_url;
        };

        if let Some(deobfuscated) = self.n_params.get(obfuscated) {
            debug!(
                "Cached 'n' parameter found, videoId: {}, deobfuscated: {}",
                video_id, deobfuscated
            );
            return replace_n_param(&obfuscated_url, obfuscated, &deobfuscated);
        }

        match self.decode_n_param(obfuscated, variant).await {
            Ok(deobfuscated) => {
                self.n_params.put(obfuscated, deobfuscated.as_str());
                debug!(
                    "Deobfuscated the 'n' parameter, videoId: {}, obfuscated: {}, deobfuscated: {}",
                    video_id, obfuscated, deobfuscated
                );
                replace_n_param(&obfuscated_url, obfuscated, &deobfuscated)
            }
            Err(e) => {
                warn!("Failed to deobfuscate 'n' parameter, videoId: {}: {}", video_id, e);
                obfuscated_url
            }
        }
    }

    async fn decode_n_param(&self, obfuscated: &str, variant: ClientVariant) -> Result<String, RytError> {
        let evaluator = self
            .evaluator(variant)
            .await
            .ok_or_else(|| RytError::EvaluatorError("rule evaluator unavailable".to_string()))?;
        let deobfuscated = evaluator.extract_n_sig(obfuscated).await?;
        if deobfuscated.is_empty() {
            return Err(RytError::CipherError("empty 'n' parameter".to_string()));
        }
        Ok(deobfuscated)
    }
}
