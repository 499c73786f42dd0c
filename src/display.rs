use crate::line::StyledLine;
use crossterm::cursor::{Hide, MoveToColumn, MoveUp, Show};
use crossterm::style::{Print, PrintStyledContent};
use crossterm::queue;
use crossterm::terminal::{self, Clear, ClearType};
use std::io::{self, Stdout, Write};

/// Where a [crate::MarkdownStream] puts its output.
///
/// Lines handed to [Display::print_above] are permanent. The live region sits
/// below them and is replaced wholesale by each [Display::set_live] call.
/// A [Display::print_above] is always followed by [Display::set_live] or
/// [Display::release_live], which paint and flush the whole update at once.
pub trait Display {
    /// Prepare the live region. Called once, before anything else.
    fn open_live(&mut self) -> io::Result<()>;
    /// Append lines to the permanent output, above the live region. Leaves the
    /// live region empty until the next [Display::set_live].
    fn print_above(&mut self, lines: &[StyledLine]) -> io::Result<()>;
    /// Replace the contents of the live region.
    fn set_live(&mut self, lines: &[StyledLine]) -> io::Result<()>;
    /// Erase the live region and give the terminal back. Safe to call twice.
    fn release_live(&mut self) -> io::Result<()>;
}

/// [Display] that paints with ANSI sequences into any writer, normally stdout.
///
/// The live region is the block of rows directly under the cursor's starting
/// point. Repainting moves back up over the rows painted last time and clears
/// to the end of the screen, so nothing above the region is ever touched.
pub struct TerminalDisplay<W: Write> {
    output: W,
    width: Option<u16>,
    live: Vec<StyledLine>,
    live_rows: usize,
    open: bool,
}

impl TerminalDisplay<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalDisplay<W> {
    pub fn new(output: W) -> Self {
        Self {
            output,
            width: None,
            live: Vec::new(),
            live_rows: 0,
            open: false,
        }
    }

    /// Use a fixed column count instead of asking the terminal.
    pub fn with_width(mut self, columns: u16) -> Self {
        self.width = Some(columns);
        self
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    fn columns(&self) -> u16 {
        self.width
            .or_else(|| terminal::size().ok().map(|(columns, _)| columns))
            .unwrap_or(80)
    }

    fn erase_live(&mut self) -> io::Result<()> {
        if self.live_rows > 0 {
            let rows = u16::try_from(self.live_rows).unwrap_or(u16::MAX);
            queue!(
                self.output,
                MoveUp(rows),
                MoveToColumn(0),
                Clear(ClearType::FromCursorDown)
            )?;
            self.live_rows = 0;
        }
        Ok(())
    }

    fn write_lines(&mut self, lines: &[StyledLine]) -> io::Result<usize> {
        let columns = self.columns();
        let mut rows = 0;
        for line in lines {
            for span in &line.spans {
                queue!(self.output, PrintStyledContent(span.to_styled_content()))?;
            }
            queue!(self.output, Print("\r\n"))?;
            rows += line.rows(columns);
        }
        Ok(rows)
    }

    fn paint_live(&mut self) -> io::Result<()> {
        let live = std::mem::take(&mut self.live);
        let painted = self.write_lines(&live);
        self.live = live;
        self.live_rows = painted?;
        Ok(())
    }
}

impl<W: Write> Display for TerminalDisplay<W> {
    fn open_live(&mut self) -> io::Result<()> {
        queue!(self.output, Hide)?;
        self.open = true;
        self.output.flush()
    }

    fn print_above(&mut self, lines: &[StyledLine]) -> io::Result<()> {
        self.erase_live()?;
        self.live.clear();
        self.write_lines(lines)?;
        Ok(())
    }

    fn set_live(&mut self, lines: &[StyledLine]) -> io::Result<()> {
        self.erase_live()?;
        self.live = lines.to_vec();
        self.paint_live()?;
        self.output.flush()
    }

    fn release_live(&mut self) -> io::Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.live.clear();
        self.erase_live()?;
        queue!(self.output, Show)?;
        self.output.flush()
    }
}

#[cfg(test)]
mod test {
    use super::{Display, TerminalDisplay};
    use crate::line::StyledLine;

    fn lines(text: &[&str]) -> Vec<StyledLine> {
        text.iter().map(|t| StyledLine::from(*t)).collect()
    }

    fn screen(bytes: &[u8], columns: u16) -> vt100::Parser {
        let mut parser = vt100::Parser::new(10, columns, 0);
        parser.process(bytes);
        parser
    }

    fn rows(parser: &vt100::Parser) -> Vec<String> {
        let mut rows: Vec<String> = parser
            .screen()
            .rows(0, parser.screen().size().1)
            .map(|row| row.trim_end().to_string())
            .collect();
        while rows.last().is_some_and(String::is_empty) {
            rows.pop();
        }
        rows
    }

    #[test]
    fn replaces_live_region() {
        let mut output: Vec<u8> = Vec::new();
        {
            let mut display = TerminalDisplay::new(&mut output).with_width(20);
            display.open_live().unwrap();
            display.set_live(&lines(&["one", "two", "three"])).unwrap();
            display.set_live(&lines(&["four"])).unwrap();
        }
        let parser = screen(&output, 20);
        assert_eq!(rows(&parser), vec!["four"]);
        assert!(parser.screen().hide_cursor());
    }

    #[test]
    fn prints_above_live_region() {
        let mut output: Vec<u8> = Vec::new();
        {
            let mut display = TerminalDisplay::new(&mut output).with_width(20);
            display.open_live().unwrap();
            display.set_live(&lines(&["live a", "live b"])).unwrap();
            display.print_above(&lines(&["done 1"])).unwrap();
            display.set_live(&lines(&["live b", "live c"])).unwrap();
            display.print_above(&lines(&["done 2"])).unwrap();
            display.set_live(&lines(&["live c", "live d"])).unwrap();
        }
        insta::assert_snapshot!(rows(&screen(&output, 20)).join("\n"), @r"
        done 1
        done 2
        live c
        live d
        ");
    }

    #[test]
    fn commit_does_not_repaint_old_live_lines() {
        let mut output: Vec<u8> = Vec::new();
        let before;
        {
            let mut display = TerminalDisplay::new(&mut output).with_width(20);
            display.open_live().unwrap();
            display.set_live(&lines(&["stale one", "stale two"])).unwrap();
            before = display.output().len();
            display.print_above(&lines(&["done"])).unwrap();
            display.set_live(&lines(&["fresh"])).unwrap();
        }
        let emitted = String::from_utf8_lossy(&output[before..]).into_owned();
        assert_eq!(emitted.matches("stale").count(), 0);
        assert_eq!(emitted.matches("done").count(), 1);
        assert_eq!(rows(&screen(&output, 20)), vec!["done", "fresh"]);
    }

    #[test]
    fn accounts_for_wrapped_rows() {
        let mut output: Vec<u8> = Vec::new();
        {
            let mut display = TerminalDisplay::new(&mut output).with_width(5);
            display.open_live().unwrap();
            display.set_live(&lines(&["abcdefgh", "ij"])).unwrap();
            display.set_live(&lines(&["k"])).unwrap();
        }
        assert_eq!(rows(&screen(&output, 5)), vec!["k"]);
    }

    #[test]
    fn release_clears_live_region_and_shows_cursor() {
        let mut output: Vec<u8> = Vec::new();
        {
            let mut display = TerminalDisplay::new(&mut output).with_width(20);
            display.open_live().unwrap();
            display.set_live(&lines(&["gone"])).unwrap();
            display.print_above(&lines(&["kept"])).unwrap();
            display.release_live().unwrap();
            display.release_live().unwrap();
        }
        let parser = screen(&output, 20);
        assert_eq!(rows(&parser), vec!["kept"]);
        assert!(!parser.screen().hide_cursor());
    }

    #[test]
    fn release_before_open_writes_nothing() {
        let mut output: Vec<u8> = Vec::new();
        TerminalDisplay::new(&mut output).release_live().unwrap();
        assert!(output.is_empty());
    }
}
