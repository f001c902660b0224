//! DIAG Log Decoder CLI Application
//!
//! Command-line front end for the diag-log-decoder library. It owns
//! everything outside the decoding pipeline: argument parsing, optional
//! TOML configuration, byte-source construction (dump files, stdin, or
//! a live TCP forwarder), sink wiring, and the completion summary.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::File;
use std::path::PathBuf;

use diag_log_decoder::sinks::json::JsonSink;
use diag_log_decoder::sinks::pcap::PcapSink;
use diag_log_decoder::sinks::text::TextSink;
use diag_log_decoder::{DecoderConfig, DiagSession, RadioLayer};

mod config;
mod source;

use config::AppConfig;
use source::ByteSource;

/// DIAG Log Decoder - Decode baseband diagnostic dumps and live streams
#[derive(Parser, Debug)]
#[command(name = "diag-log-cli")]
#[command(about = "Decode baseband diagnostic logs (QMDL dumps, live streams)", long_about = None)]
#[command(version)]
struct Args {
    /// Dump file(s) to decode in order (can be repeated)
    #[arg(short = 'd', long = "dump", value_name = "FILE")]
    dump: Vec<PathBuf>,

    /// Read the live stream from stdin
    #[arg(long)]
    live_stdin: bool,

    /// Connect to a live TCP forwarder on this port
    #[arg(long, value_name = "PORT")]
    live_tcp: Option<u16>,

    /// Host for --live-tcp
    #[arg(long, value_name = "HOST", default_value = "127.0.0.1")]
    live_host: String,

    /// Write the human-readable text report here
    #[arg(long, value_name = "FILE")]
    txt_file: Option<PathBuf>,

    /// Write the JSON session document here
    #[arg(long, value_name = "FILE")]
    json_file: Option<PathBuf>,

    /// Write a GSMTAP packet capture here
    #[arg(long, value_name = "FILE")]
    pcap_file: Option<PathBuf>,

    /// Decode generic event reports
    #[arg(long, value_name = "BOOL", default_value_t = true, action = clap::ArgAction::Set)]
    events: bool,

    /// Decode extended message types (QMI, APDU, phone state, policy)
    #[arg(long, value_name = "BOOL", default_value_t = true, action = clap::ArgAction::Set)]
    msgs: bool,

    /// Only emit radio-layer messages from these layers
    /// (rrc, nas, mac, ml1, other; can be repeated)
    #[arg(short = 'L', long = "layer", value_name = "LAYER", value_parser = parse_layer)]
    layers: Vec<RadioLayer>,

    /// Path to a TOML configuration file; command-line options override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn parse_layer(value: &str) -> std::result::Result<RadioLayer, String> {
    match value.to_ascii_lowercase().as_str() {
        "rrc" => Ok(RadioLayer::Rrc),
        "nas" => Ok(RadioLayer::Nas),
        "mac" => Ok(RadioLayer::Mac),
        "ml1" => Ok(RadioLayer::Ml1),
        "other" => Ok(RadioLayer::Other),
        other => Err(format!(
            "unknown layer '{}' (expected rrc, nas, mac, ml1, other)",
            other
        )),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("DIAG Log Decoder CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using decoder library v{}", diag_log_decoder::VERSION);

    let file_config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => AppConfig::default(),
    };

    let source = resolve_source(&args, &file_config)?;
    let decoder_config = resolve_decoder_config(&args, &file_config);

    let mut session = DiagSession::new(decoder_config, &source.name());
    let sinks = wire_sinks(&args, &file_config, &mut session)?;
    if sinks == 0 {
        log::warn!("No output sinks configured; only the completion summary will be produced");
    }

    let started = chrono::Local::now();
    let bytes_fed = source.stream_into(&mut session)?;
    let report = session.finish();

    if !args.quiet {
        let s = &report.summary;
        println!("Session:   {}", report.metadata.source_name);
        println!("Started:   {}", started.format("%Y-%m-%d %H:%M:%S"));
        println!("Bytes fed: {}", bytes_fed);
        println!(
            "Frames:    {} valid, {} invalid",
            s.valid_frames, s.invalid_frames
        );
        println!("Messages:  {} total", s.total_messages);
        println!(
            "           {} events, {} QMI, {} APDU, {} phone, {} policy",
            s.events, s.service_packets, s.apdu_exchanges, s.phone_events, s.policy_stats
        );
        println!(
            "           {} radio, {} unknown",
            s.radio_messages, s.unknown_messages
        );
        println!(
            "Cells:     {} observed, {} measurements",
            report.cells.len(),
            report.measurements.len()
        );
    }

    Ok(())
}

/// Pick the byte source: exactly one of dump files, stdin, or TCP
fn resolve_source(args: &Args, file_config: &AppConfig) -> Result<ByteSource> {
    let files = if args.dump.is_empty() {
        file_config.input.files.clone()
    } else {
        args.dump.clone()
    };
    let live_stdin = args.live_stdin || file_config.input.live_stdin;
    let live_tcp = args.live_tcp.or(file_config.input.live_tcp);

    let selected =
        usize::from(!files.is_empty()) + usize::from(live_stdin) + usize::from(live_tcp.is_some());
    match selected {
        0 => bail!("No input specified; use --dump, --live-stdin, or --live-tcp (see --help)"),
        1 => {}
        _ => bail!("Multiple inputs specified; pick one of --dump, --live-stdin, --live-tcp"),
    }

    Ok(if let Some(port) = live_tcp {
        let host = if args.live_tcp.is_some() {
            args.live_host.clone()
        } else {
            file_config.input.live_host.clone()
        };
        ByteSource::Tcp { host, port }
    } else if live_stdin {
        ByteSource::Stdin
    } else {
        ByteSource::Files(files)
    })
}

/// Fold the config file and command line into a pipeline configuration
fn resolve_decoder_config(args: &Args, file_config: &AppConfig) -> DecoderConfig {
    let mut config = DecoderConfig::new()
        .with_events(args.events && file_config.decode.events)
        .with_extended(args.msgs && file_config.decode.msgs);

    if !args.layers.is_empty() {
        config = config.with_layer_filter(args.layers.clone());
    } else if let Some(layers) = &file_config.decode.layers {
        config = config.with_layer_filter(layers.clone());
    }
    if let Some(bytes) = file_config.decode.max_frame_buffer {
        config = config.with_max_frame_buffer(bytes);
    }
    config
}

/// Attach every requested sink; returns how many were wired
fn wire_sinks(args: &Args, file_config: &AppConfig, session: &mut DiagSession) -> Result<usize> {
    let txt = args.txt_file.as_ref().or(file_config.output.txt_file.as_ref());
    let json = args.json_file.as_ref().or(file_config.output.json_file.as_ref());
    let pcap = args.pcap_file.as_ref().or(file_config.output.pcap_file.as_ref());
    let mut wired = 0;

    if let Some(path) = txt {
        let file = File::create(path)
            .with_context(|| format!("Failed to create text report: {:?}", path))?;
        session.add_sink(Box::new(TextSink::new(file)?));
        wired += 1;
    }
    if let Some(path) = json {
        let file = File::create(path)
            .with_context(|| format!("Failed to create JSON document: {:?}", path))?;
        session.add_sink(Box::new(JsonSink::new(file)));
        wired += 1;
    }
    if let Some(path) = pcap {
        let file = File::create(path)
            .with_context(|| format!("Failed to create packet capture: {:?}", path))?;
        session.add_sink(Box::new(PcapSink::new(file)?));
        wired += 1;
    }
    Ok(wired)
}

fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
