//! Command line argument parsing

use crate::platform::client::HttpClientConfig;
use crate::platform::deobfuscator::DeobfuscatorConfig;
use crate::platform::variant::ClientVariant;
use crate::utils::cache::DEFAULT_CAPACITY;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// RYT nsig - deobfuscate video platform streaming urls
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Video id, used for logging
    #[arg(long, value_name = "ID", default_value = "")]
    pub video_id: String,

    /// Streaming url with an obfuscated 'n' parameter
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,

    /// signatureCipher of a streaming format
    #[arg(long, value_name = "CIPHER")]
    pub signature_cipher: Option<String>,

    /// Content playback nonce (generated when absent)
    #[arg(long, value_name = "CPN")]
    pub cpn: Option<String>,

    /// PoToken to append as 'pot'
    #[arg(long, value_name = "TOKEN")]
    pub po_token: Option<String>,

    /// Client variant whose player script is used
    #[arg(long, value_enum, default_value = "tv")]
    pub client: ClientArg,

    /// JSON file with a player response or its streamingData
    #[arg(long, value_name = "FILE")]
    pub streaming_data: Option<PathBuf>,

    /// Print signature timestamp, client version and visitor id
    #[arg(long)]
    pub metadata: bool,

    /// Evaluate the full player script (EJS)
    #[arg(long)]
    pub ejs: bool,

    /// Disable the mobile web variant
    #[arg(long)]
    pub no_mobile_web: bool,

    /// Resolve the player script through the bootstrap page
    #[arg(long)]
    pub bootstrap: bool,

    /// HTTP timeout (e.g., 30s, 1m)
    #[arg(long, value_name = "DURATION", default_value = "30s")]
    pub timeout: humantime::Duration,

    /// HTTP connect timeout
    #[arg(long, value_name = "DURATION", default_value = "10s")]
    pub connect_timeout: humantime::Duration,

    /// Proxy URL (http/https/socks)
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Capacity of the 'n' parameter cache
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    pub cache_capacity: usize,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (only errors)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Client variant argument
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ClientArg {
    /// TV client
    Tv,
    /// Mobile web client
    MobileWeb,
}

impl From<ClientArg> for ClientVariant {
    fn from(arg: ClientArg) -> Self {
        match arg {
            ClientArg::Tv => ClientVariant::Tv,
            ClientArg::MobileWeb => ClientVariant::MobileWeb,
        }
    }
}

impl Args {
    pub fn timeout_duration(&self) -> Duration {
        self.timeout.into()
    }

    pub fn connect_timeout_duration(&self) -> Duration {
        self.connect_timeout.into()
    }

    pub fn variant(&self) -> ClientVariant {
        self.client.into()
    }

    /// Build the deobfuscator configuration from the flags
    pub fn deobfuscator_config(&self) -> DeobfuscatorConfig {
        let mut config = DeobfuscatorConfig::new(self.ejs, !self.no_mobile_web);
        if self.bootstrap {
            config.use_hardcoded_player = false;
        }
        config.cache_capacity = self.cache_capacity;
        config.http = HttpClientConfig {
            timeout: self.timeout_duration(),
            connect_timeout: self.connect_timeout_duration(),
            proxy_url: self.proxy.clone(),
        };
        config
    }

    /// True when there is nothing to deobfuscate or print
    pub fn has_no_input(&self) -> bool {
        self.url.is_none()
            && self.signature_cipher.is_none()
            && self.streaming_data.is_none()
            && !self.metadata
    }

    /// Get output verbosity level
    pub fn verbosity_level(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    /// Default log filter for the verbosity level
    pub fn log_filter(&self) -> &'static str {
        match self.verbosity_level() {
            VerbosityLevel::Quiet => "error",
            VerbosityLevel::Normal => "info",
            VerbosityLevel::Verbose => "debug",
        }
    }
}

/// Output verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbosityLevel {
    /// Quiet (only errors)
    Quiet,
    /// Normal
    Normal,
    /// Verbose (debug info)
    Verbose,
}
