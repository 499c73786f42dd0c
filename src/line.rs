use crossterm::style::{ContentStyle, StyledContent};
use unicode_width::UnicodeWidthStr;

/// A run of text sharing one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: ContentStyle,
}

impl Span {
    pub fn raw(text: impl Into<String>) -> Self {
        Self::styled(text, ContentStyle::new())
    }

    pub fn styled(text: impl Into<String>, style: ContentStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn width(&self) -> usize {
        self.text.width()
    }

    pub fn to_styled_content(&self) -> StyledContent<&str> {
        StyledContent::new(self.style, self.text.as_str())
    }
}

/// One rendered output line. Never contains a newline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyledLine {
    pub spans: Vec<Span>,
}

impl StyledLine {
    pub fn new(spans: Vec<Span>) -> Self {
        Self { spans }
    }

    pub fn blank() -> Self {
        Self::default()
    }

    pub fn push(&mut self, span: Span) {
        if span.text.is_empty() {
            return;
        }
        // Merge adjacent runs with the same style so equal text renders equal lines
        if let Some(last) = self.spans.last_mut() {
            if last.style == span.style {
                last.text.push_str(&span.text);
                return;
            }
        }
        self.spans.push(span);
    }

    pub fn is_empty(&self) -> bool {
        self.spans.iter().all(|s| s.text.is_empty())
    }

    /// Terminal columns the line occupies before wrapping.
    pub fn width(&self) -> usize {
        self.spans.iter().map(Span::width).sum()
    }

    /// Physical terminal rows this line takes up on a terminal `cols` wide.
    pub fn rows(&self, cols: u16) -> usize {
        let cols = usize::from(cols.max(1));
        self.width().div_ceil(cols).max(1)
    }

    /// The text with all styling dropped.
    pub fn plain(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

impl From<&str> for StyledLine {
    fn from(text: &str) -> Self {
        let mut line = Self::blank();
        line.push(Span::raw(text));
        line
    }
}
