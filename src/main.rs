//! Main entry point for ryt-nsig CLI

use anyhow::{bail, Context};
use clap::Parser;
use ryt_nsig::cli::{Args, OutputFormatter};
use ryt_nsig::platform::streaming::parse_streaming_data;
use ryt_nsig::utils::generate_cpn;
use ryt_nsig::{ClientVariant, Deobfuscator};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.log_filter());
    debug!("Starting ryt-nsig with args: {:?}", args);

    let formatter = OutputFormatter::new(args.verbosity_level());
    if let Err(e) = run(&args, &formatter).await {
        formatter.error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

async fn run(args: &Args, formatter: &OutputFormatter) -> anyhow::Result<()> {
    if args.has_no_input() {
        bail!("nothing to do: pass --url, --signature-cipher, --streaming-data or --metadata");
    }

    let start_time = Instant::now();
    let deobfuscator = Deobfuscator::new(args.deobfuscator_config())
        .context("failed to create deobfuscator")?;
    let variant = args.variant();
    let cpn = args.cpn.clone().unwrap_or_else(generate_cpn);
    formatter.debug(&format!("cpn: {}", cpn));

    if args.metadata {
        print_metadata(&deobfuscator, variant, formatter).await;
    }

    if let Some(path) = &args.streaming_data {
        let data = load_streaming_data(path)?;
        let result = deobfuscator
            .deobfuscate_streaming_data(&args.video_id, &cpn, &data, args.po_token.as_deref(), variant)
            .await
            .context("failed to deobfuscate streaming data")?;
        formatter.print_streaming_data(&result)?;
        formatter.success(&format!(
            "{} adaptive and {} progressive formats",
            result.adaptive_formats.len(),
            result.formats.len()
        ));
    }

    if args.url.is_some() || args.signature_cipher.is_some() {
        let url = deobfuscator
            .deobfuscate_streaming_url(
                &args.video_id,
                &cpn,
                args.url.as_deref(),
                args.signature_cipher.as_deref(),
                args.po_token.as_deref(),
                variant,
            )
            .await
            .context("failed to obtain a streaming url")?;
        formatter.print_url(&url);
    }

    info!("Done in {}", humantime::format_duration(start_time.elapsed()));
    Ok(())
}

async fn print_metadata(deobfuscator: &Deobfuscator, variant: ClientVariant, formatter: &OutputFormatter) {
    let signature_timestamp = deobfuscator.signature_timestamp(variant).await;
    let client_version = deobfuscator.client_version(variant).await;
    let visitor_id = deobfuscator.visitor_id(variant).await;
    if signature_timestamp.is_none() {
        formatter.warning("signature timestamp not found");
    }
    formatter.print_metadata(
        variant,
        signature_timestamp,
        client_version.as_deref(),
        visitor_id.as_deref(),
    );
}

/// Read a player response or streamingData JSON file
fn load_streaming_data(path: &Path) -> anyhow::Result<ryt_nsig::StreamingData> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_streaming_data(&json).with_context(|| format!("invalid streaming data in {}", path.display()))
}

/// Initialize logging system
fn init_logging(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_streaming_data() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"streamingData":{{"adaptiveFormats":[{{"itag":140,"url":"https://x.test/a?n=abc"}}]}}}}"#
        )
        .unwrap();

        let data = load_streaming_data(file.path()).unwrap();
        assert_eq!(data.adaptive_formats.len(), 1);
        assert_eq!(data.adaptive_formats[0].itag, Some(140));
    }

    #[test]
    fn test_load_streaming_data_errors() {
        assert!(load_streaming_data(Path::new("/nonexistent/streaming.json")).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{").unwrap();
        assert!(load_streaming_data(file.path()).is_err());
    }
}
