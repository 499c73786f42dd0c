use crossterm::style::{Attribute, Color, ContentStyle};
use log::warn;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const LIVE_WINDOW_ENV: &str = "MDSTREAM_LIVE_WINDOW";
pub const MIN_INTERVAL_ENV: &str = "MDSTREAM_MIN_INTERVAL_MS";
pub const MAX_INTERVAL_ENV: &str = "MDSTREAM_MAX_INTERVAL_MS";

/// Tuning for [crate::MarkdownStream].
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Trailing rendered lines held back from scrollback while streaming.
    pub live_window: usize,
    /// Lower bound for the adaptive update interval (20 updates/s by default).
    pub min_interval: Duration,
    /// Upper bound for the adaptive update interval.
    pub max_interval: Duration,
    /// The update interval is this many times the last render's cost.
    pub cost_multiplier: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            live_window: 6,
            min_interval: Duration::from_millis(50),
            max_interval: Duration::from_secs(2),
            cost_multiplier: 10,
        }
    }
}

impl StreamConfig {
    pub fn live_window(mut self, lines: usize) -> Self {
        self.live_window = lines;
        self
    }

    pub fn min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    pub fn cost_multiplier(mut self, multiplier: u32) -> Self {
        self.cost_multiplier = multiplier;
        self
    }

    /// Defaults, overridden by any `MDSTREAM_*` variables that parse.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(lines) = parse_var::<usize>(&lookup, LIVE_WINDOW_ENV) {
            config.live_window = lines;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, MIN_INTERVAL_ENV) {
            config.min_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, MAX_INTERVAL_ENV) {
            config.max_interval = Duration::from_millis(ms);
        }
        if config.max_interval < config.min_interval {
            warn!(
                "max interval {:?} is below min interval {:?}, raising it",
                config.max_interval, config.min_interval
            );
            config.max_interval = config.min_interval;
        }
        config
    }

    /// The interval to wait after a render that took `cost`.
    pub fn interval_for(&self, cost: Duration) -> Duration {
        cost.saturating_mul(self.cost_multiplier)
            .clamp(self.min_interval, self.max_interval.max(self.min_interval))
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring {key}={raw:?}: not a valid number");
            None
        }
    }
}

/// Fixed styling for [crate::MarkdownFormatter], chosen once per stream.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatOptions {
    /// Column at which paragraphs wrap and code blocks are padded to.
    pub width: usize,
    /// Styles for heading levels 1, 2 and 3+.
    pub heading_styles: [ContentStyle; 3],
    pub code_block_style: ContentStyle,
    pub inline_code_style: ContentStyle,
    pub quote_style: ContentStyle,
    pub link_url_style: ContentStyle,
    pub bullet: String,
    pub rule: char,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            width: 80,
            heading_styles: [
                style(Some(Color::Magenta), &[Attribute::Bold, Attribute::Underlined]),
                style(Some(Color::Magenta), &[Attribute::Bold]),
                style(None, &[Attribute::Bold]),
            ],
            code_block_style: ContentStyle {
                background_color: Some(Color::AnsiValue(236)),
                ..style(Some(Color::Grey), &[])
            },
            inline_code_style: style(Some(Color::Cyan), &[]),
            quote_style: style(Some(Color::DarkGrey), &[Attribute::Italic]),
            link_url_style: style(Some(Color::Blue), &[Attribute::Dim]),
            bullet: "•".to_string(),
            rule: '─',
        }
    }
}

impl FormatOptions {
    pub fn width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }
}

pub(crate) fn style(foreground: Option<Color>, attributes: &[Attribute]) -> ContentStyle {
    let mut style = ContentStyle::new();
    style.foreground_color = foreground;
    for attribute in attributes {
        style.attributes.set(*attribute);
    }
    style
}

#[cfg(test)]
mod test {
    use super::{StreamConfig, LIVE_WINDOW_ENV, MAX_INTERVAL_ENV, MIN_INTERVAL_ENV};
    use std::collections::HashMap;
    use std::time::Duration;

    fn config_from(vars: &[(&str, &str)]) -> StreamConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        StreamConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_overrides() {
        assert_eq!(config_from(&[]), StreamConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            (LIVE_WINDOW_ENV, "3"),
            (MIN_INTERVAL_ENV, "10"),
            (MAX_INTERVAL_ENV, "500"),
        ]);
        assert_eq!(config.live_window, 3);
        assert_eq!(config.min_interval, Duration::from_millis(10));
        assert_eq!(config.max_interval, Duration::from_millis(500));
    }

    #[test]
    fn ignores_garbage() {
        let config = config_from(&[(LIVE_WINDOW_ENV, "lots")]);
        assert_eq!(config.live_window, 6);
    }

    #[test]
    fn keeps_bounds_ordered() {
        let config = config_from(&[(MIN_INTERVAL_ENV, "300"), (MAX_INTERVAL_ENV, "100")]);
        assert_eq!(config.max_interval, Duration::from_millis(300));
    }

    #[test]
    fn clamps_interval_to_bounds() {
        let config = StreamConfig::default();
        assert_eq!(config.interval_for(Duration::ZERO), Duration::from_millis(50));
        assert_eq!(
            config.interval_for(Duration::from_millis(20)),
            Duration::from_millis(200)
        );
        assert_eq!(config.interval_for(Duration::from_secs(1)), Duration::from_secs(2));
    }
}
