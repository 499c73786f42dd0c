use crate::config::FormatOptions;
use crate::error::Result;
use crate::line::{Span, StyledLine};
use crossterm::style::{Attribute, ContentStyle};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use unicode_width::UnicodeWidthStr;

/// Turns the full markdown text into terminal lines.
///
/// Implementations must be deterministic: the same text always yields the same
/// lines. The streaming logic depends on this to know which lines are settled.
pub trait Formatter {
    fn render(&self, text: &str) -> Result<Vec<StyledLine>>;
}

impl<F: Fn(&str) -> Result<Vec<StyledLine>>> Formatter for F {
    fn render(&self, text: &str) -> Result<Vec<StyledLine>> {
        self(text)
    }
}

/// [Formatter] backed by `pulldown-cmark`, wrapping prose at a fixed width.
#[derive(Debug, Clone, Default)]
pub struct MarkdownFormatter {
    options: FormatOptions,
}

impl MarkdownFormatter {
    pub fn new(options: FormatOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FormatOptions {
        &self.options
    }
}

impl Formatter for MarkdownFormatter {
    fn render(&self, text: &str) -> Result<Vec<StyledLine>> {
        let mut extensions = Options::empty();
        extensions.insert(Options::ENABLE_TABLES);
        extensions.insert(Options::ENABLE_STRIKETHROUGH);
        extensions.insert(Options::ENABLE_TASKLISTS);

        let mut writer = Writer::new(&self.options);
        for event in Parser::new_ext(text, extensions) {
            writer.handle(event);
        }
        Ok(writer.finish())
    }
}

struct List {
    // Next ordinal for ordered lists
    next: Option<u64>,
    // Width of the item marker, which continuation lines are indented by
    indent: usize,
}

#[derive(Default)]
struct Table {
    rows: Vec<Vec<String>>,
    header_rows: usize,
}

struct Writer<'o> {
    options: &'o FormatOptions,
    lines: Vec<StyledLine>,
    inline: Vec<Span>,
    bold: usize,
    italic: usize,
    strike: usize,
    heading: Option<HeadingLevel>,
    links: Vec<String>,
    code_block: Option<String>,
    lists: Vec<List>,
    item_marker: Option<String>,
    quote_depth: usize,
    table: Option<Table>,
    separate: bool,
}

impl<'o> Writer<'o> {
    fn new(options: &'o FormatOptions) -> Self {
        Self {
            options,
            lines: Vec::new(),
            inline: Vec::new(),
            bold: 0,
            italic: 0,
            strike: 0,
            heading: None,
            links: Vec::new(),
            code_block: None,
            lists: Vec::new(),
            item_marker: None,
            quote_depth: 0,
            table: None,
            separate: false,
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                if let Some(table) = &mut self.table {
                    push_cell_text(table, &code);
                } else {
                    self.inline
                        .push(Span::styled(code.to_string(), self.options.inline_code_style));
                }
            }
            Event::Html(html) | Event::InlineHtml(html) => self.text(&html),
            Event::SoftBreak => self.text(" "),
            Event::HardBreak => self.flush_inline(),
            Event::Rule => {
                self.start_block();
                let width = self.available_width();
                let mut line = self.prefix(false);
                line.push(Span::styled(
                    self.options.rule.to_string().repeat(width),
                    self.options.quote_style,
                ));
                self.lines.push(line);
                self.separate = true;
            }
            Event::TaskListMarker(checked) => {
                self.inline
                    .push(Span::raw(if checked { "[x] " } else { "[ ] " }));
            }
            Event::FootnoteReference(name) => self.text(&format!("[^{name}]")),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Paragraph => self.start_block(),
            Tag::Heading { level, .. } => {
                self.start_block();
                self.heading = Some(level);
            }
            Tag::BlockQuote { .. } => {
                self.start_block();
                self.quote_depth += 1;
            }
            Tag::CodeBlock(_) => {
                self.start_block();
                self.code_block = Some(String::new());
            }
            Tag::List(first) => {
                self.start_block();
                self.lists.push(List {
                    next: first,
                    indent: 0,
                });
            }
            Tag::Item => {
                self.flush_inline();
                self.separate = false;
                let bullet = &self.options.bullet;
                if let Some(list) = self.lists.last_mut() {
                    let marker = match &mut list.next {
                        Some(ordinal) => {
                            let marker = format!("{ordinal}. ");
                            *ordinal += 1;
                            marker
                        }
                        None => format!("{bullet} "),
                    };
                    list.indent = marker.width();
                    self.item_marker = Some(marker);
                }
            }
            Tag::Emphasis => self.italic += 1,
            Tag::Strong => self.bold += 1,
            Tag::Strikethrough => self.strike += 1,
            Tag::Link { dest_url, .. } => self.links.push(dest_url.to_string()),
            Tag::Table(_) => {
                self.start_block();
                self.table = Some(Table::default());
            }
            Tag::TableHead | Tag::TableRow => {
                if let Some(table) = &mut self.table {
                    table.rows.push(Vec::new());
                }
            }
            Tag::TableCell => {
                if let Some(row) = self.table.as_mut().and_then(|t| t.rows.last_mut()) {
                    row.push(String::new());
                }
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.end_block(),
            TagEnd::Heading(level) => {
                let style = self.options.heading_styles[match level {
                    HeadingLevel::H1 => 0,
                    HeadingLevel::H2 => 1,
                    _ => 2,
                }];
                for span in &mut self.inline {
                    span.style = style;
                }
                self.heading = None;
                self.end_block();
            }
            TagEnd::BlockQuote { .. } => {
                self.flush_inline();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.separate = true;
            }
            TagEnd::CodeBlock => {
                if let Some(code) = self.code_block.take() {
                    self.code_lines(&code);
                }
                self.separate = true;
            }
            TagEnd::List(_) => {
                self.flush_inline();
                self.lists.pop();
                self.item_marker = None;
                self.separate = true;
            }
            TagEnd::Item => self.flush_inline(),
            TagEnd::Emphasis => self.italic = self.italic.saturating_sub(1),
            TagEnd::Strong => self.bold = self.bold.saturating_sub(1),
            TagEnd::Strikethrough => self.strike = self.strike.saturating_sub(1),
            TagEnd::Link => {
                if let Some(url) = self.links.pop() {
                    let label: String = self.inline.iter().map(|s| s.text.as_str()).collect();
                    if !label.ends_with(url.as_str()) {
                        self.inline.push(Span::styled(
                            format!(" ({url})"),
                            self.options.link_url_style,
                        ));
                    }
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = &mut self.table {
                    table.header_rows = table.rows.len();
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.table_lines(&table);
                }
                self.separate = true;
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(code) = &mut self.code_block {
            code.push_str(text);
        } else if let Some(table) = &mut self.table {
            push_cell_text(table, text);
        } else {
            let style = self.inline_style();
            self.inline.push(Span::styled(text.to_string(), style));
        }
    }

    fn inline_style(&self) -> ContentStyle {
        let mut style = ContentStyle::new();
        if self.bold > 0 || self.heading.is_some() {
            style.attributes.set(Attribute::Bold);
        }
        if self.italic > 0 {
            style.attributes.set(Attribute::Italic);
        }
        if self.strike > 0 {
            style.attributes.set(Attribute::CrossedOut);
        }
        if !self.links.is_empty() {
            style.attributes.set(Attribute::Underlined);
        }
        if self.quote_depth > 0 {
            style.foreground_color = self.options.quote_style.foreground_color;
        }
        style
    }

    fn start_block(&mut self) {
        self.flush_inline();
        if self.separate && !self.lines.is_empty() {
            let blank = self.prefix(false);
            self.lines.push(blank);
        }
        self.separate = false;
    }

    fn end_block(&mut self) {
        self.flush_inline();
        self.separate = true;
    }

    /// Leading quote bars and list indentation. `first` takes the pending item marker.
    fn prefix(&mut self, first: bool) -> StyledLine {
        let mut line = StyledLine::blank();
        for _ in 0..self.quote_depth {
            line.push(Span::styled("▌ ", self.options.quote_style));
        }
        if let Some((current, parents)) = self.lists.split_last() {
            let outer: usize = parents.iter().map(|l| l.indent).sum();
            line.push(Span::raw(" ".repeat(outer)));
            match self.item_marker.take_if(|_| first) {
                Some(marker) => line.push(Span::raw(marker)),
                None => line.push(Span::raw(" ".repeat(current.indent))),
            }
        }
        line
    }

    fn prefix_width(&self) -> usize {
        2 * self.quote_depth + self.lists.iter().map(|l| l.indent).sum::<usize>()
    }

    fn available_width(&self) -> usize {
        self.options.width.saturating_sub(self.prefix_width()).max(1)
    }

    fn flush_inline(&mut self) {
        if self.inline.is_empty() {
            return;
        }
        let spans = std::mem::take(&mut self.inline);
        let width = self.available_width();
        for (i, wrapped) in wrap(&spans, width).into_iter().enumerate() {
            let mut line = self.prefix(i == 0);
            for span in wrapped.spans {
                line.push(span);
            }
            self.lines.push(line);
        }
    }

    fn code_lines(&mut self, code: &str) {
        let width = self.available_width();
        let code = code.strip_suffix('\n').unwrap_or(code);
        for text in code.split('\n') {
            let body = format!(" {text}");
            let pad = width.saturating_sub(body.width());
            let mut line = self.prefix(true);
            line.push(Span::styled(
                format!("{body}{}", " ".repeat(pad)),
                self.options.code_block_style,
            ));
            self.lines.push(line);
        }
    }

    fn table_lines(&mut self, table: &Table) {
        let columns = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut widths = vec![0; columns];
        for row in &table.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.trim().width());
            }
        }

        let mut header = ContentStyle::new();
        header.attributes.set(Attribute::Bold);

        for (index, row) in table.rows.iter().enumerate() {
            let style = if index < table.header_rows {
                header
            } else {
                ContentStyle::new()
            };
            let cells: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(column, width)| {
                    let cell = row.get(column).map(|c| c.trim()).unwrap_or_default();
                    format!("{cell}{}", " ".repeat(width - cell.width()))
                })
                .collect();
            let mut line = self.prefix(true);
            line.push(Span::styled(cells.join(" │ ").trim_end().to_string(), style));
            self.lines.push(line);

            if index + 1 == table.header_rows {
                let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
                let mut line = self.prefix(false);
                line.push(Span::styled(rule.join("─┼─"), self.options.quote_style));
                self.lines.push(line);
            }
        }
    }

    fn finish(mut self) -> Vec<StyledLine> {
        self.flush_inline();
        while self.lines.last().is_some_and(StyledLine::is_empty) {
            self.lines.pop();
        }
        self.lines
    }
}

fn push_cell_text(table: &mut Table, text: &str) {
    if let Some(cell) = table.rows.last_mut().and_then(|r| r.last_mut()) {
        cell.push_str(text);
    }
}

/// Greedy word wrap over styled spans. Words wider than `width` overflow.
fn wrap(spans: &[Span], width: usize) -> Vec<StyledLine> {
    let mut lines = vec![StyledLine::blank()];
    let mut used = 0;
    for span in spans {
        for piece in span.text.split_inclusive(' ') {
            let word = piece.trim_end_matches(' ');
            let word_width = word.width();
            if used > 0 && used + word_width > width {
                if let Some(line) = lines.last_mut() {
                    trim_trailing_spaces(line);
                }
                lines.push(StyledLine::blank());
                used = 0;
            }
            let piece = if used == 0 {
                piece.trim_start_matches(' ')
            } else {
                piece
            };
            if let Some(line) = lines.last_mut() {
                line.push(Span::styled(piece, span.style));
            }
            used += piece.width();
        }
    }
    if let Some(line) = lines.last_mut() {
        trim_trailing_spaces(line);
    }
    lines
}

fn trim_trailing_spaces(line: &mut StyledLine) {
    while let Some(last) = line.spans.last_mut() {
        let trimmed = last.text.trim_end_matches(' ').len();
        last.text.truncate(trimmed);
        if !last.text.is_empty() {
            break;
        }
        line.spans.pop();
    }
}
