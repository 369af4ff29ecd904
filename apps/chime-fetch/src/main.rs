//! Chime Fetch - headless HTTP(S) audio fetcher.
//!
//! Fetches a URL with the chime-core HTTP engine and either writes the body
//! verbatim or, with `--frame-aac`, runs it through the AAC framer on a
//! producer thread while a consumer thread drains the central audio buffer.

mod config;
mod pipeline;

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, bail, Context, Result};
use chime_core::{
    track_hash, CentralAudioBuffer, NetConnector, RandomIdentity, RangeHeader, Response, SessionIdentity,
};
use clap::Parser;

use crate::config::FetchConfig;

/// Chime Fetch - Fetch audio over HTTP(S) and frame it into chunks.
#[derive(Parser, Debug)]
#[command(name = "chime-fetch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL to fetch (http or https).
    url: String,

    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "CHIME_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// First byte of a ranged request.
    #[arg(long)]
    range_from: Option<u64>,

    /// Last byte (inclusive) of a ranged request. Requires --range-from.
    #[arg(long, requires = "range_from")]
    range_to: Option<u64>,

    /// Run the body through the AAC framer and central audio buffer.
    #[arg(long)]
    frame_aac: bool,

    /// Output file. Data is discarded when omitted.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Skip TLS certificate verification (overrides config file).
    #[arg(long, env = "CHIME_INSECURE")]
    insecure: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Chime Fetch v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = FetchConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if args.insecure {
        config.http.verify_tls = false;
    }
    let core_config = config.to_core_config();

    let mut headers = Vec::new();
    match (args.range_from, args.range_to) {
        (Some(from), Some(to)) => headers.push(RangeHeader::range(from, to)),
        (Some(from), None) => headers.push(RangeHeader::from(from)),
        _ => {}
    }

    let connector = NetConnector::arc(&core_config.http);
    let mut response = Response::new(core_config.http.clone(), connector);
    response
        .connect(&args.url, core_config.http.max_headers)
        .with_context(|| format!("Failed to connect to {}", args.url))?;
    response
        .get(&args.url, &headers)
        .with_context(|| format!("Request to {} failed", args.url))?;

    log::info!(
        "HTTP {} (content length {}, total length {}, type '{}')",
        response.status(),
        response.content_length(),
        response.total_length(),
        response.header("content-type")
    );
    if response.status() >= 400 {
        bail!("Server answered with status {}", response.status());
    }

    let mut out: Box<dyn Write + Send> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => Box::new(io::sink()),
    };

    // Stop at the declared body length so keep-alive connections terminate.
    let limit = match response.content_length() {
        0 => u64::MAX,
        n => n as u64,
    };
    let body = response.stream().take(limit);

    if !args.frame_aac {
        let copied = pipeline::copy_body(body, &mut out).context("Failed to copy body")?;
        log::info!("Wrote {} body bytes", copied);
        return Ok(());
    }

    let identity = RandomIdentity::new();
    let hash = track_hash(&identity, &args.url);
    log::info!("Session {} framing track {:016x}", identity.session_id(), hash);

    let buffer = CentralAudioBuffer::from_config(&core_config.buffer);
    let session = buffer.begin_session();
    let done = AtomicBool::new(false);

    let (produced, consumed) = std::thread::scope(|scope| {
        let producer = scope.spawn(|| {
            let stats = pipeline::produce(body, &buffer, hash);
            done.store(true, Ordering::Release);
            stats
        });

        let consumed = pipeline::consume(&session, &done, &mut out);
        if consumed.is_err() {
            // Keep draining so the producer is never stuck on backpressure.
            let _ = pipeline::consume(&session, &done, &mut io::sink());
        }
        let produced = producer.join().map_err(|_| anyhow!("Producer thread panicked"))?;
        Ok::<_, anyhow::Error>((produced, consumed.context("Failed to write output")?))
    })?;
    drop(session);

    log::info!(
        "Framed {} frames ({} bytes, {} resyncs); wrote {} chunks ({} bytes)",
        produced.frames,
        produced.bytes,
        produced.resyncs,
        consumed.chunks,
        consumed.bytes
    );
    if produced.stalled {
        bail!("Source stalled before end of stream");
    }
    Ok(())
}
