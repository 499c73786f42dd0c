use anyhow::{Context, Result};
use crossterm::terminal;
use log::{info, LevelFilter};
use mdstream::{
    strip_end_of_turn, FormatOptions, MarkdownFormatter, MarkdownStream, StreamConfig,
    TerminalDisplay,
};
use simplelog::{Config, WriteLogger};
use std::borrow::Cow;
use std::env;
use std::fs::File;
use tokio::io::AsyncReadExt;

const LOG_ENV: &str = "MDSTREAM_LOG";
const LOG_LEVEL_ENV: &str = "MDSTREAM_LOG_LEVEL";

/// Pipe markdown into stdin; it is rendered as it arrives.
#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let width = terminal::size()
        .map(|(columns, _)| usize::from(columns))
        .unwrap_or(80);
    let formatter = MarkdownFormatter::new(FormatOptions::default().width(width));
    let mut stream = MarkdownStream::with_config(
        formatter,
        TerminalDisplay::stdout(),
        StreamConfig::from_env(),
    );

    let mut stdin = tokio::io::stdin();
    let mut chunk = vec![0u8; 4096];
    let mut received = Vec::new();
    loop {
        let read = tokio::select! {
            read = stdin.read(&mut chunk) => read.context("reading stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted after {} bytes", received.len());
                stream.abort();
                return Ok(());
            }
        };
        if read == 0 {
            break;
        }
        received.extend_from_slice(&chunk[..read]);
        stream.update(strip_end_of_turn(&decoded(&received), false), false)?;
    }

    info!("input closed after {} bytes", received.len());
    stream
        .finish(strip_end_of_turn(&decoded(&received), true))
        .context("flushing final output")?;
    Ok(())
}

/// The text received so far, minus a trailing partial UTF-8 sequence.
fn decoded(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(err) if err.error_len().is_none() => {
            String::from_utf8_lossy(&bytes[..err.valid_up_to()])
        }
        Err(_) => String::from_utf8_lossy(bytes),
    }
}

fn init_logging() -> Result<()> {
    // The terminal is the output, so logs only ever go to a file
    let Some(path) = env::var_os(LOG_ENV) else {
        return Ok(());
    };
    let level = env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(LevelFilter::Info);
    let file = File::create(&path)
        .with_context(|| format!("creating log file {}", path.to_string_lossy()))?;
    WriteLogger::init(level, Config::default(), file).context("installing logger")?;
    Ok(())
}
