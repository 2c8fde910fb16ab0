use crate::{
    action::Action,
    components::{Component, ViewContext},
    model::DisplayModel,
};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use std::fmt::Write;

/// Top line: name, host, tick and run state.
pub struct Header {
    host: String,
}

impl Header {
    pub fn new(host: String) -> Self {
        Self { host }
    }
}

impl Component for Header {
    fn update(&mut self, _action: Action, _model: &DisplayModel) -> Option<Action> {
        None
    }

    fn render(&self, f: &mut Frame, area: Rect, view: &ViewContext<'_>) {
        let theme = view.theme;
        let state = if view.schedule.paused {
            Span::styled(" PAUSED ", theme.stale())
        } else {
            Span::styled(" RUNNING ", theme.title)
        };

        let mut spans = vec![
            Span::styled(" sensetop ", theme.title),
            Span::styled("│", theme.symbol),
            Span::styled(format!(" {} ", self.host), theme.chip),
            Span::styled("│", theme.symbol),
            Span::styled(format!(" tick {} ", view.tick), theme.sensor),
            Span::styled("│", theme.symbol),
            state,
            Span::styled("│", theme.symbol),
            Span::styled(
                format!(
                    " sample {}ms / render {}ms ",
                    view.schedule.sample_interval.as_millis(),
                    view.schedule.render_interval.as_millis()
                ),
                theme.symbol,
            ),
        ];

        let stale = view.model.stale_count();
        if stale > 0 {
            spans.push(Span::styled("│", theme.symbol));
            spans.push(Span::styled(format!(" {} stale ", stale), theme.stale()));
        }

        f.render_widget(Paragraph::new(Line::from(spans)).style(theme.background), area);
    }
}

/// Bottom line: key hints on the left, date and quit hint on the right.
pub struct Footer {
    date_format: String,
    quit_hint: String,
}

impl Footer {
    pub fn new(date_format: String, quit_hint: String) -> Self {
        Self {
            date_format,
            quit_hint,
        }
    }

    /// Current local time in the configured format. A format chrono cannot
    /// render falls back to RFC 3339.
    pub fn date(&self) -> String {
        let now = chrono::Local::now();
        let mut out = String::new();
        if write!(out, "{}", now.format(&self.date_format)).is_err() {
            return now.to_rfc3339();
        }
        out
    }
}

impl Component for Footer {
    fn update(&mut self, _action: Action, _model: &DisplayModel) -> Option<Action> {
        None
    }

    fn render(&self, f: &mut Frame, area: Rect, view: &ViewContext<'_>) {
        let theme = view.theme;
        let date = self.date();
        let right_width = (date.chars().count() + self.quit_hint.chars().count() + 4) as u16;

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(right_width)])
            .split(area);

        let hints = Line::from(vec![
            Span::styled(" [p] pause ", theme.sensor),
            Span::styled(" [tab/←→] panel ", theme.sensor),
            Span::styled(" [↑↓/jk] series ", theme.sensor),
        ]);
        f.render_widget(Paragraph::new(hints).style(theme.background), chunks[0]);

        let right = Line::from(vec![
            Span::styled(date, theme.date),
            Span::styled("  ", theme.symbol),
            Span::styled(format!("{} ", self.quit_hint), theme.quit_hint),
        ]);
        f.render_widget(
            Paragraph::new(right)
                .alignment(Alignment::Right)
                .style(theme.background),
            chunks[1],
        );
    }
}
