//! Status display for the readiness poller

use crossterm::{
    cursor::MoveToPreviousLine,
    queue,
    terminal::{Clear, ClearType},
};
use std::io::{self, IsTerminal, Write};

/// Receives the per-service status lines of each poll cycle.
///
/// Every call replaces what the previous call rendered.
pub trait StatusSink: Send {
    /// Show the current status lines
    fn render(&mut self, lines: &[String]);
}

/// Renders status lines to a terminal, rewriting the previous block in place.
///
/// When the writer is not a terminal the block is appended instead, and only
/// when it differs from the last one.
pub struct TerminalSink<W: Write + Send> {
    out: W,
    in_place: bool,
    last: Vec<String>,
}

impl TerminalSink<io::Stdout> {
    /// Sink on stdout, rewriting in place when stdout is a terminal
    pub fn stdout() -> Self {
        let out = io::stdout();
        let in_place = out.is_terminal();
        Self::new(out, in_place)
    }
}

impl<W: Write + Send> TerminalSink<W> {
    /// Create a sink over any writer
    pub fn new(out: W, in_place: bool) -> Self {
        Self {
            out,
            in_place,
            last: Vec::new(),
        }
    }

    /// Consume the sink and return the writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, lines: &[String]) -> io::Result<()> {
        if self.in_place {
            let previous = u16::try_from(self.last.len()).unwrap_or(u16::MAX);
            if previous > 0 {
                queue!(self.out, MoveToPreviousLine(previous))?;
            }
            queue!(self.out, Clear(ClearType::FromCursorDown))?;
        } else if self.last == lines {
            return Ok(());
        }

        for line in lines {
            writeln!(self.out, "{}", line)?;
        }
        self.out.flush()
    }
}

impl<W: Write + Send> StatusSink for TerminalSink<W> {
    fn render(&mut self, lines: &[String]) {
        if let Err(e) = self.draw(lines) {
            tracing::debug!("Failed to render status: {}", e);
        }
        self.last = lines.to_vec();
    }
}

/// Keeps every rendered block, newest last
#[derive(Debug, Default)]
pub struct RecordingSink {
    /// Rendered blocks in order
    pub frames: Vec<Vec<String>>,
}

impl RecordingSink {
    /// Create an empty recording sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent block, if anything was rendered
    pub fn last(&self) -> Option<&[String]> {
        self.frames.last().map(Vec::as_slice)
    }
}

impl StatusSink for RecordingSink {
    fn render(&mut self, lines: &[String]) {
        self.frames.push(lines.to_vec());
    }
}
