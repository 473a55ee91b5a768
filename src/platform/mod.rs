//! Player script, service worker and streaming url handling

pub mod cipher;
pub mod client;
pub mod deobfuscator;
pub mod player;
pub mod service_worker;
pub mod state;
pub mod streaming;
pub mod variant;

pub use cipher::{DenoEvaluator, DenoEvaluatorFactory, EvaluatorFactory, EvaluatorMode, RuleEvaluator};
pub use client::{Fetch, HttpClientConfig, HttpFetcher};
pub use deobfuscator::{Deobfuscator, DeobfuscatorConfig};
pub use player::ScriptSource;
pub use streaming::{DeobfuscatedStreamingData, StreamFormat, StreamingData};
pub use variant::{ClientVariant, Endpoints, VariantEndpoints};
