//! Single-line console display.
//!
//! Rewrites one terminal line in place with a carriage return. Output is only
//! produced when the shown speed or colour changes.

use std::io::{self, Write};

use crossterm::{
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use speedsign_runtime::collaborators::Display;
use tracing::debug;

use crate::sign_view::speed_text;

/// Console display writing to any [`Write`] sink.
pub struct ConsoleDisplay<W: Write + Send> {
    out: W,
    last: Option<(u32, bool)>,
}

impl ConsoleDisplay<io::Stdout> {
    /// Display on standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out, last: None }
    }

    /// Consume the display and return its sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, speed: u32, over_limit: bool) -> io::Result<()> {
        queue!(self.out, Print("\r"), Clear(ClearType::CurrentLine))?;
        let figure = speed_text(speed);
        if !figure.is_empty() {
            let colour = if over_limit { Color::Red } else { Color::Green };
            queue!(
                self.out,
                Print("Speed: "),
                SetForegroundColor(colour),
                Print(format!("{figure:>3} km/h")),
                ResetColor
            )?;
        }
        self.out.flush()
    }
}

impl<W: Write + Send> Display for ConsoleDisplay<W> {
    fn render(&mut self, speed: u32, over_limit: bool) {
        if self.last == Some((speed, over_limit)) {
            return;
        }
        self.last = Some((speed, over_limit));
        if let Err(e) = self.draw(speed, over_limit) {
            debug!(error = %e, "console display write failed");
        }
    }
}
