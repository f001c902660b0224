//! Byte sources feeding the decoding session
//!
//! The session consumes raw transport bytes in chunks and does not care
//! where they come from; this module owns the three ways to get them:
//! recorded dump files, a live stream on stdin, or a TCP connection to a
//! device forwarder.

use anyhow::{Context, Result};
use diag_log_decoder::DiagSession;
use std::fs::File;
use std::io::Read;
use std::net::TcpStream;
use std::path::PathBuf;

/// Read size per feed call
const CHUNK_SIZE: usize = 4096;

/// Where the session's bytes come from
#[derive(Debug, Clone)]
pub enum ByteSource {
    /// Recorded dump files, decoded in order as one session
    Files(Vec<PathBuf>),
    /// Live stream piped to stdin
    Stdin,
    /// Live TCP forwarder
    Tcp { host: String, port: u16 },
}

impl ByteSource {
    /// Session label used in reports and log lines
    pub fn name(&self) -> String {
        match self {
            ByteSource::Files(files) => files
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            ByteSource::Stdin => "stdin".to_string(),
            ByteSource::Tcp { host, port } => format!("tcp://{}:{}", host, port),
        }
    }

    /// Pump the whole source through the session in fixed-size chunks.
    /// Returns the number of bytes fed. EOF and peer disconnect both end
    /// the stream normally; read errors are session-fatal.
    pub fn stream_into(&self, session: &mut DiagSession) -> Result<u64> {
        match self {
            ByteSource::Files(files) => {
                let mut total = 0u64;
                for path in files {
                    let file = File::open(path)
                        .with_context(|| format!("Failed to open dump file: {:?}", path))?;
                    total += pump(file, session)
                        .with_context(|| format!("Failed reading dump file: {:?}", path))?;
                }
                Ok(total)
            }
            ByteSource::Stdin => {
                pump(std::io::stdin().lock(), session).context("Failed reading stdin")
            }
            ByteSource::Tcp { host, port } => {
                let addr = format!("{}:{}", host, port);
                let stream = TcpStream::connect(&addr)
                    .with_context(|| format!("Failed to connect to {}", addr))?;
                log::info!("Connected to {}", addr);
                pump(stream, session).with_context(|| format!("Connection to {} failed", addr))
            }
        }
    }
}

fn pump<R: Read>(mut reader: R, session: &mut DiagSession) -> Result<u64> {
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        session.feed(&chunk[..n]);
        total += n as u64;
    }
    Ok(total)
}
