//! Full-screen terminal front ends.
//!
//! [`TuiDisplay`] is the live sign: the control loop calls it every cycle
//! through the [`Display`] trait and it redraws the sign view, then checks
//! the keyboard for `q` / `Ctrl+C`. [`App`] runs the static report viewer.

use std::io::{self, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use speedsign_data::report::SessionReport;
use speedsign_runtime::collaborators::Display;
use speedsign_runtime::status::StatusHandle;
use tracing::debug;

use crate::report_view;
use crate::sign_view::{render_sign, SignViewData};
use crate::themes::Theme;

/// `true` for the keys that close a full-screen view.
fn is_quit_key(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => true,
        _ => false,
    }
}

// ── TuiDisplay ────────────────────────────────────────────────────────────────

/// Live sign view drawn on a ratatui terminal.
pub struct TuiDisplay<B: Backend> {
    terminal: Terminal<B>,
    theme: Theme,
    status: StatusHandle,
    quit: Arc<AtomicBool>,
    /// Set when this display put the real terminal into raw mode.
    owns_screen: bool,
}

impl TuiDisplay<CrosstermBackend<Stdout>> {
    /// Switch the terminal to the alternate screen and take it over.
    pub fn enter(status: StatusHandle, theme: Theme) -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self {
            terminal,
            theme,
            status,
            quit: Arc::new(AtomicBool::new(false)),
            owns_screen: true,
        })
    }
}

impl<B: Backend> TuiDisplay<B> {
    /// Wrap an existing terminal. Keyboard input is not read.
    pub fn with_terminal(terminal: Terminal<B>, status: StatusHandle, theme: Theme) -> Self {
        Self {
            terminal,
            theme,
            status,
            quit: Arc::new(AtomicBool::new(false)),
            owns_screen: false,
        }
    }

    /// Flag raised when the user asks to quit.
    ///
    /// Raw mode swallows `Ctrl+C` as a key press, so the caller must watch
    /// this instead of relying on SIGINT.
    pub fn quit_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.quit)
    }

    fn poll_keys(&mut self) {
        loop {
            match event::poll(Duration::ZERO) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    debug!(error = %e, "keyboard poll failed");
                    break;
                }
            }
            if let Ok(Event::Key(key)) = event::read() {
                if is_quit_key(&key) {
                    self.quit.store(true, Ordering::SeqCst);
                }
            }
        }
    }
}

impl<B: Backend + Send> Display for TuiDisplay<B> {
    fn render(&mut self, speed: u32, over_limit: bool) {
        let data = SignViewData {
            speed,
            over_limit,
            status: self.status.snapshot(),
        };
        let theme = &self.theme;
        if let Err(e) = self
            .terminal
            .draw(|frame| {
                let area = frame.area();
                render_sign(frame, area, &data, theme);
            })
        {
            debug!(error = %e, "sign redraw failed");
        }
        if self.owns_screen {
            self.poll_keys();
        }
    }
}

impl<B: Backend> Drop for TuiDisplay<B> {
    fn drop(&mut self) {
        if self.owns_screen {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            let _ = self.terminal.show_cursor();
        }
    }
}

// ── App ───────────────────────────────────────────────────────────────────────

/// Interactive report viewer.
pub struct App {
    pub theme: Theme,
}

impl App {
    pub fn new(theme_name: &str) -> Self {
        Self {
            theme: Theme::from_name(theme_name),
        }
    }

    /// Show `report` full-screen until `q` / `Ctrl+C`.
    pub fn run_report(self, report: &SessionReport) -> io::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        let tick_rate = Duration::from_millis(250);
        let result = loop {
            if let Err(e) = terminal.draw(|frame| {
                let area = frame.area();
                if report.rows.is_empty() {
                    report_view::render_no_data(frame, area, &self.theme);
                } else {
                    report_view::render_report_view(frame, area, report, &self.theme);
                }
            }) {
                break Err(e);
            }

            match event::poll(tick_rate) {
                Ok(true) => {
                    if let Event::Key(key) = event::read()? {
                        if is_quit_key(&key) {
                            break Ok(());
                        }
                    }
                }
                Ok(false) => {}
                Err(e) => break Err(e),
            }
        };

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        result
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
