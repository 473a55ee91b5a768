//! # ryt-nsig - streaming url deobfuscation
//!
//! Turns the `url` / `signatureCipher` fields of video platform streaming
//! formats into playable urls.
//!
//! ## Features
//!
//! - Signature cipher reconstruction
//! - 'n' throttling parameter deobfuscation with a bounded FIFO cache
//! - Player script location per client variant (TV, mobile web)
//! - Service worker metadata (client version, visitor id)
//! - Whole `streamingData` batches
//!
//! ## Example
//!
//! ```rust,no_run
//! use ryt_nsig::{ClientVariant, Deobfuscator, DeobfuscatorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let deobfuscator = Deobfuscator::new(DeobfuscatorConfig::default())?;
//!     deobfuscator.initialize().await;
//!
//!     let url = deobfuscator
//!         .deobfuscate_streaming_url(
//!             "VIDEO_ID",
//!             &ryt_nsig::utils::generate_cpn(),
//!             Some("https://example.com/videoplayback?n=abc"),
//!             None,
//!             None,
//!             ClientVariant::Tv,
//!         )
//!         .await;
//!     println!("{:?}", url);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod platform;
pub mod utils;

// Re-export main types
pub use error::{ErrorCategory, RytError};
pub use platform::{
    ClientVariant, DeobfuscatedStreamingData, Deobfuscator, DeobfuscatorConfig, Endpoints,
    RuleEvaluator, StreamingData,
};

/// Result type alias for ryt-nsig operations
pub type Result<T> = std::result::Result<T, RytError>;
