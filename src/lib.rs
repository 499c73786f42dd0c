/*
Streams markdown from a language model into a terminal without flicker.

    caller ──(full text so far)──▶ MarkdownStream::update
                                     │
                                     ├─ Formatter: text ─▶ lines (whole text, every time)
                                     │
                                     └─ Display
                                          ├─ print_above: lines that can no longer change
                                          └─ set_live:    the last few lines, repainted each update

Terminal scrollback can't be edited, so a line is only printed once it is
`live_window` lines away from the end of the text (or the response is done).
Updates are throttled to about ten times the cost of the last render.
*/
mod config;
mod display;
mod error;
mod format;
mod line;
mod sanitize;
mod stream;

pub use config::{FormatOptions, StreamConfig};
pub use display::{Display, TerminalDisplay};
pub use error::{Result, StreamError};
pub use format::{Formatter, MarkdownFormatter};
pub use line::{Span, StyledLine};
pub use sanitize::{strip_end_of_turn, END_OF_TURN_MARKERS};
pub use stream::{MarkdownStream, Phase};
