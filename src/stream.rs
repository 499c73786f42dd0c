use crate::config::StreamConfig;
use crate::display::Display;
use crate::error::{Result, StreamError};
use crate::format::Formatter;
use crate::line::StyledLine;
use log::{debug, trace, warn};
use std::io;
use std::time::Duration;

#[cfg(test)]
use mock_instant::thread_local::Instant;
#[cfg(not(test))]
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No update yet; the live region has not been opened.
    Uninitialized,
    /// The live region is open and owned by this stream.
    Active,
    /// Everything is flushed and the live region is released. Terminal state.
    Finalized,
}

/// Renders one streamed markdown response.
///
/// Every [MarkdownStream::update] re-renders the whole text. All but the last
/// `live_window` lines are written permanently above the live region; the rest
/// are painted into it and repainted next time. Lines already written are
/// never touched again, so only lines far enough from the growing edge of the
/// text are committed.
///
/// The live region is released when the final update arrives, on
/// [MarkdownStream::abort], or when the stream is dropped.
pub struct MarkdownStream<F: Formatter, D: Display> {
    formatter: F,
    display: D,
    config: StreamConfig,
    phase: Phase,
    printed: Vec<StyledLine>,
    live: Vec<StyledLine>,
    last_update: Option<Instant>,
    min_interval: Duration,
}

impl<F: Formatter, D: Display> MarkdownStream<F, D> {
    pub fn new(formatter: F, display: D) -> Self {
        Self::with_config(formatter, display, StreamConfig::default())
    }

    pub fn with_config(formatter: F, display: D, config: StreamConfig) -> Self {
        Self {
            formatter,
            display,
            min_interval: config.min_interval,
            config,
            phase: Phase::Uninitialized,
            printed: Vec::new(),
            live: Vec::new(),
            last_update: None,
        }
    }

    /// Show `text`, the full response received so far.
    ///
    /// Calls arriving sooner than [MarkdownStream::min_interval] after the last
    /// accepted one are dropped unless `last` is set; the next call renders the
    /// larger text anyway. With `last` set everything is committed and the live
    /// region is released.
    pub fn update(&mut self, text: &str, last: bool) -> Result<()> {
        match self.phase {
            Phase::Finalized => {
                warn!("update after the stream was finalized, ignoring");
                return Ok(());
            }
            Phase::Uninitialized => {
                if let Err(err) = self.display.open_live() {
                    return Err(self.fail(err));
                }
                self.phase = Phase::Active;
            }
            Phase::Active => {}
        }

        let now = Instant::now();
        if !last {
            if let Some(previous) = self.last_update {
                if now.duration_since(previous) < self.min_interval {
                    trace!("throttled update ({} bytes)", text.len());
                    return Ok(());
                }
            }
        }
        self.last_update = Some(now);

        let started = Instant::now();
        let lines = self.formatter.render(text)?;
        let cost = started.elapsed();
        self.min_interval = self.config.interval_for(cost);
        debug!(
            "rendered {} bytes into {} lines in {:?}, next interval {:?}",
            text.len(),
            lines.len(),
            cost,
            self.min_interval
        );

        if !lines.starts_with(&self.printed) {
            warn!(
                "markdown changed more than {} lines from the end; committed output no longer matches",
                self.config.live_window
            );
        }

        let stable = if last {
            lines.len()
        } else {
            lines.len().saturating_sub(self.config.live_window)
        };
        let printed = self.printed.len();
        if stable > printed {
            let fresh = &lines[printed..stable];
            if let Err(err) = self.display.print_above(fresh) {
                return Err(self.fail(err));
            }
            debug!("committed {} lines", fresh.len());
            self.printed.extend_from_slice(fresh);
        } else if !last && printed > 0 {
            // Boundary didn't move (or the render shrank behind it): leave the
            // live region as painted rather than repeat committed lines in it
            return Ok(());
        }

        if last {
            self.release();
            return Ok(());
        }

        let live = &lines[stable..];
        if let Err(err) = self.display.set_live(live) {
            return Err(self.fail(err));
        }
        self.live = live.to_vec();
        Ok(())
    }

    /// Final update: commit all of `text` and release the live region.
    pub fn finish(&mut self, text: &str) -> Result<()> {
        self.update(text, true)
    }

    /// Stop without committing whatever is in the live region.
    pub fn abort(&mut self) {
        if self.phase != Phase::Finalized {
            self.release();
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Lines written permanently so far.
    pub fn printed_lines(&self) -> &[StyledLine] {
        &self.printed
    }

    /// Lines last painted into the live region.
    pub fn live_lines(&self) -> &[StyledLine] {
        &self.live
    }

    /// Updates closer together than this are throttled.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    fn release(&mut self) {
        if let Err(err) = self.display.release_live() {
            warn!("failed to release live region: {err}");
        }
        self.live.clear();
        self.phase = Phase::Finalized;
    }

    fn fail(&mut self, err: io::Error) -> StreamError {
        warn!(
            "display failed after {} committed lines: {err}",
            self.printed.len()
        );
        self.release();
        StreamError::Display(err)
    }
}

impl<F: Formatter, D: Display> Drop for MarkdownStream<F, D> {
    fn drop(&mut self) {
        if self.phase == Phase::Active {
            self.release();
        }
    }
}
