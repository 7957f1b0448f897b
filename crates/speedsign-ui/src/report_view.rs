//! Session report view.
//!
//! Renders a [`SessionReport`] either as a bordered [`ratatui::widgets::Table`]
//! with a totals row, or as plain text for non-interactive output.

use ratatui::{
    layout::{Constraint, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};
use speedsign_data::report::{ReportRow, ReportTotals, SessionReport};

use crate::themes::Theme;

const HEADERS: [&str; 5] = ["Video", "Started", "Logged at", "Speed", "File"];

/// Cell texts for one report row.
pub fn row_cells(row: &ReportRow) -> [String; 5] {
    [
        row.session_ref.as_str().to_string(),
        row.started_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string()),
        row.timestamp.clone().unwrap_or_else(|| "-".to_string()),
        row.speed
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string()),
        if row.artifact.is_some() { "yes" } else { "missing" }.to_string(),
    ]
}

/// One-line summary of the totals.
pub fn totals_summary(totals: &ReportTotals) -> String {
    let max = totals
        .max_speed
        .map(|s| format!("{s} km/h"))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} entries | {} sessions | {} unrecorded | {} without log | {} missing video | max {}",
        totals.entries,
        totals.sessions,
        totals.unrecorded_entries,
        totals.orphan_artifacts,
        totals.missing_artifacts,
        max
    )
}

/// Plain-text rendering: a header, one tab-separated line per row, and the
/// totals.
pub fn format_plain(report: &SessionReport) -> String {
    let mut out = HEADERS.join("\t");
    out.push('\n');
    for row in &report.rows {
        out.push_str(&row_cells(row).join("\t"));
        out.push('\n');
    }
    out.push_str(&totals_summary(&report.totals));
    out.push('\n');
    out
}

/// Render the report table into `area`.
pub fn render_report_view(frame: &mut Frame, area: Rect, report: &SessionReport, theme: &Theme) {
    let header = Row::new(HEADERS.iter().map(|h| Cell::from(*h).style(theme.table_header))).height(1);

    let mut rows: Vec<Row> = report
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let style = if i % 2 == 0 {
                theme.table_row
            } else {
                theme.table_row_alt
            };
            Row::new(row_cells(row).map(Cell::from)).style(style)
        })
        .collect();

    rows.push(
        Row::new(vec![
            Cell::from("TOTAL"),
            Cell::from(format!("{} sessions", report.totals.sessions)),
            Cell::from(format!("{} entries", report.totals.entries)),
            Cell::from(
                report
                    .totals
                    .max_speed
                    .map(|s| format!("max {s}"))
                    .unwrap_or_default(),
            ),
            Cell::from(format!("{} missing", report.totals.missing_artifacts)),
        ])
        .style(theme.table_total),
    );

    let widths = [
        Constraint::Length(36),
        Constraint::Length(21),
        Constraint::Length(21),
        Constraint::Length(10),
        Constraint::Length(10),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Speed log report "),
        )
        .style(theme.text);

    frame.render_widget(table, area);
}

/// Placeholder shown when the log and the data directory are both empty.
pub fn render_no_data(frame: &mut Frame, area: Rect, theme: &Theme) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled("No speed log entries or videos found", theme.warning)),
        Line::from(""),
        Line::from(Span::styled("Press 'q' or Ctrl+C to exit", theme.dim)),
    ];
    frame.render_widget(
        Paragraph::new(ratatui::text::Text::from(text)).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" speedsign "),
        ),
        area,
    );
}

// ── Tests ──────────────────────────────────────────────────────────────────────
