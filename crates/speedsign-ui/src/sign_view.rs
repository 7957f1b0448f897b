//! Full-screen sign view.
//!
//! Shows the current speed as the sign would (red at or above the limit,
//! green below, blank at zero) followed by the policy in effect and the
//! recording status.

use ratatui::{
    layout::{Alignment, Rect},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph},
    Frame,
};
use speedsign_runtime::status::StatusSnapshot;

use crate::themes::Theme;

/// Width of the separator under the title.
const SEPARATOR_WIDTH: usize = 40;

/// Everything the sign view needs for one frame.
#[derive(Debug, Clone)]
pub struct SignViewData {
    pub speed: u32,
    pub over_limit: bool,
    pub status: StatusSnapshot,
}

/// Text shown for `speed`; empty at zero so the sign goes dark.
pub fn speed_text(speed: u32) -> String {
    if speed == 0 {
        String::new()
    } else {
        speed.to_string()
    }
}

/// Build the sign's lines.
pub fn build_sign_lines<'a>(data: &SignViewData, theme: &Theme) -> Vec<Line<'a>> {
    let status = &data.status;
    let mut lines = vec![
        Line::from(Span::styled("SPEED SIGN", theme.header)),
        Line::from(Span::styled("=".repeat(SEPARATOR_WIDTH), theme.separator)),
        Line::from(""),
    ];

    let figure = speed_text(data.speed);
    if figure.is_empty() {
        lines.push(Line::from(""));
    } else {
        lines.push(Line::from(vec![
            Span::styled(figure, theme.speed_style(data.over_limit)),
            Span::styled(" km/h", theme.dim),
        ]));
    }
    lines.push(Line::from(""));

    lines.push(Line::from(vec![
        Span::styled("[ limit ", theme.label),
        Span::styled(status.speed_limit.to_string(), theme.value),
        Span::styled(" | cooldown ", theme.label),
        Span::styled(format!("{}s", status.cooldown_seconds), theme.value),
        Span::styled(" ]", theme.label),
    ]));

    match (&status.active_session_id, status.session_expires_at) {
        (Some(id), expires) => {
            let mut spans = vec![
                Span::styled(" REC ", theme.recording),
                Span::raw(" "),
                Span::styled(id.clone(), theme.value),
            ];
            if let Some(at) = expires {
                spans.push(Span::styled(
                    format!(" until {}", at.format("%H:%M:%S")),
                    theme.label,
                ));
            }
            lines.push(Line::from(spans));
        }
        (None, _) => lines.push(Line::from(Span::styled("idle", theme.idle))),
    }

    lines.push(Line::from(Span::styled(
        format!("sessions since start: {}", status.sessions_started),
        theme.dim,
    )));
    lines
}

/// Render the sign into `area`.
pub fn render_sign(frame: &mut Frame, area: Rect, data: &SignViewData, theme: &Theme) {
    let lines = build_sign_lines(data, theme);
    let paragraph = Paragraph::new(Text::from(lines))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" speedsign "),
        );
    frame.render_widget(paragraph, area);
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use ratatui::backend::TestBackend;
    use ratatui::style::Color;
    use ratatui::Terminal;
    use speedsign_core::models::Policy;

    fn make_data(speed: u32, recording: bool) -> SignViewData {
        let mut status = StatusSnapshot::initial(Policy::default());
        status.current_speed = speed;
        if recording {
            status.active_session_id = Some("SAM01_record_20240301_120000.mp4".to_string());
            status.session_expires_at = Some(Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 10).unwrap());
            status.sessions_started = 1;
        }
        SignViewData {
            speed,
            over_limit: speed >= 60,
            status,
        }
    }

    fn text_of(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    // ── speed figure ──────────────────────────────────────────────────────────

    #[test]
    fn test_speed_text_blank_at_zero() {
        assert_eq!(speed_text(0), "");
        assert_eq!(speed_text(72), "72");
    }

    #[test]
    fn test_over_limit_speed_is_red() {
        let lines = build_sign_lines(&make_data(72, true), &Theme::dark());
        let speed_span = &lines[3].spans[0];
        assert_eq!(speed_span.content, "72");
        assert_eq!(speed_span.style.fg, Some(Color::Red));
    }

    #[test]
    fn test_under_limit_speed_is_green() {
        let lines = build_sign_lines(&make_data(45, false), &Theme::dark());
        assert_eq!(lines[3].spans[0].style.fg, Some(Color::Green));
    }

    #[test]
    fn test_zero_speed_line_is_empty() {
        let lines = build_sign_lines(&make_data(0, false), &Theme::dark());
        assert!(text_of(&lines[3]).is_empty());
    }

    // ── status lines ──────────────────────────────────────────────────────────

    #[test]
    fn test_policy_line() {
        let lines = build_sign_lines(&make_data(45, false), &Theme::dark());
        assert_eq!(text_of(&lines[5]), "[ limit 60 | cooldown 10s ]");
    }

    #[test]
    fn test_recording_badge() {
        let lines = build_sign_lines(&make_data(72, true), &Theme::dark());
        let rec = text_of(&lines[6]);
        assert!(rec.contains("REC"), "{rec}");
        assert!(rec.contains("SAM01_record_20240301_120000.mp4"), "{rec}");
        assert!(rec.contains("until 12:00:10"), "{rec}");
    }

    #[test]
    fn test_idle_badge() {
        let lines = build_sign_lines(&make_data(10, false), &Theme::dark());
        assert_eq!(text_of(&lines[6]), "idle");
    }

    // ── render ────────────────────────────────────────────────────────────────

    #[test]
    fn test_render_sign_does_not_panic() {
        let backend = TestBackend::new(60, 12);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::dark();
        let data = make_data(88, true);

        terminal
            .draw(|frame| {
                let area = frame.area();
                render_sign(frame, area, &data, &theme);
            })
            .unwrap();
    }
}
