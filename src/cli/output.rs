//! Output formatting
//!
//! Status messages go to stderr, results to stdout.

use crate::cli::args::VerbosityLevel;
use crate::platform::streaming::DeobfuscatedStreamingData;
use crate::platform::variant::ClientVariant;
use colored::Colorize;

/// Output formatter for ryt-nsig
pub struct OutputFormatter {
    verbosity: VerbosityLevel,
}

impl OutputFormatter {
    /// Create a new output formatter
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self { verbosity }
    }

    /// Print info message
    pub fn info(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("{} {}", "info:".cyan().bold(), message);
        }
    }

    /// Print success message
    pub fn success(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("{} {}", "ok:".green().bold(), message);
        }
    }

    /// Print warning message
    pub fn warning(&self, message: &str) {
        if self.verbosity != VerbosityLevel::Quiet {
            eprintln!("{} {}", "warning:".yellow().bold(), message);
        }
    }

    /// Print error message
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "error:".red().bold(), message);
    }

    /// Print debug message
    pub fn debug(&self, message: &str) {
        if self.verbosity == VerbosityLevel::Verbose {
            eprintln!("{} {}", "debug:".dimmed(), message);
        }
    }

    /// Print a deobfuscated url
    pub fn print_url(&self, url: &str) {
        println!("{}", url);
    }

    /// Print variant metadata as `key: value` lines
    pub fn print_metadata(
        &self,
        variant: ClientVariant,
        signature_timestamp: Option<u32>,
        client_version: Option<&str>,
        visitor_id: Option<&str>,
    ) {
        println!("{}", metadata_line("variant", Some(variant.as_str())));
        println!(
            "{}",
            metadata_line(
                "signatureTimestamp",
                signature_timestamp.map(|t| t.to_string()).as_deref()
            )
        );
        println!("{}", metadata_line("clientVersion", client_version));
        println!("{}", metadata_line("visitorId", visitor_id));
    }

    /// Print deobfuscated streaming data as pretty JSON
    pub fn print_streaming_data(&self, data: &DeobfuscatedStreamingData) -> serde_json::Result<()> {
        println!("{}", serde_json::to_string_pretty(data)?);
        Ok(())
    }
}

fn metadata_line(key: &str, value: Option<&str>) -> String {
    format!("{}: {}", key, value.unwrap_or("-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_formatter_creation() {
        let formatter = OutputFormatter::new(VerbosityLevel::Normal);
        assert_eq!(formatter.verbosity, VerbosityLevel::Normal);
    }

    #[test]
    fn test_metadata_line() {
        assert_eq!(metadata_line("visitorId", Some("abc")), "visitorId: abc");
        assert_eq!(metadata_line("clientVersion", None), "clientVersion: -");
    }

    #[test]
    fn test_verbosity_levels() {
        let formatter = OutputFormatter::new(VerbosityLevel::Quiet);
        // These should not print anything in quiet mode
        formatter.info("test");
        formatter.success("test");
        formatter.warning("test");
        formatter.debug("test");

        // Error should always print
        formatter.error("test");
    }

    #[test]
    fn test_print_streaming_data() {
        let formatter = OutputFormatter::new(VerbosityLevel::Normal);
        let data = DeobfuscatedStreamingData {
            adaptive_formats: vec!["https://x.test/v?n=deobf1".to_string()],
            formats: Vec::new(),
            server_abr_streaming_url: None,
        };
        assert!(formatter.print_streaming_data(&data).is_ok());
    }
}
