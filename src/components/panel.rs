use crate::{
    action::Action,
    components::{grid_layout, Component, ViewContext},
    config::Thresholds,
    data::snapshot::Unit,
    model::{DisplayModel, PanelState},
    theme::{Band, Theme},
    utils::{format_opt, format_value, truncate},
    widgets::braille_graph::BrailleGraph,
};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
    Frame,
};
use std::collections::BTreeMap;

const VALUE_WIDTH: usize = 11;

/// All sensor panels, laid out as a grid, with focus and per-panel series
/// selection.
pub struct PanelGrid {
    focused: usize,
    /// Selected series index per panel, by position.
    selected: Vec<usize>,
    thresholds: BTreeMap<String, Thresholds>,
}

impl PanelGrid {
    pub fn new(panel_count: usize, thresholds: BTreeMap<String, Thresholds>) -> Self {
        Self {
            focused: 0,
            selected: vec![0; panel_count],
            thresholds,
        }
    }

    pub fn focused(&self) -> usize {
        self.focused
    }

    pub fn selected(&self, panel: usize) -> usize {
        self.selected.get(panel).copied().unwrap_or(0)
    }

    fn move_focus(&mut self, count: usize, forward: bool) -> bool {
        if count < 2 {
            return false;
        }
        self.focused = if forward {
            (self.focused + 1) % count
        } else {
            (self.focused + count - 1) % count
        };
        true
    }

    fn move_selection(&mut self, series_count: usize, forward: bool) -> bool {
        let Some(current) = self.selected.get_mut(self.focused) else {
            return false;
        };
        if series_count == 0 {
            return false;
        }
        let next = if forward {
            (*current + 1).min(series_count - 1)
        } else {
            current.saturating_sub(1)
        };
        let changed = next != *current;
        *current = next;
        changed
    }
}

impl Component for PanelGrid {
    fn update(&mut self, action: Action, model: &DisplayModel) -> Option<Action> {
        let changed = match action {
            Action::FocusNext => self.move_focus(model.len(), true),
            Action::FocusPrev => self.move_focus(model.len(), false),
            Action::SelectNext | Action::SelectPrev => {
                let series = model
                    .panels()
                    .get(self.focused)
                    .map_or(0, |p| p.history().len());
                self.move_selection(series, action == Action::SelectNext)
            }
            _ => false,
        };
        changed.then_some(Action::Redraw)
    }

    fn render(&self, f: &mut Frame, area: Rect, view: &ViewContext<'_>) {
        let panels = view.model.panels();
        for (index, (panel, cell)) in panels
            .iter()
            .zip(grid_layout(area, panels.len()))
            .enumerate()
        {
            let state = PanelView {
                focused: index == self.focused,
                selected: self.selected(index),
                thresholds: self.thresholds.get(&panel.source_id),
            };
            render_panel(f, cell, panel, &state, view.theme);
        }
    }
}

struct PanelView<'a> {
    focused: bool,
    selected: usize,
    thresholds: Option<&'a Thresholds>,
}

fn render_panel(f: &mut Frame, area: Rect, panel: &PanelState, view: &PanelView<'_>, theme: &Theme) {
    let mut title = vec![Span::styled(format!(" {} ", panel.title), theme.title)];
    if panel.is_stale() {
        title.push(Span::styled("[stale] ", theme.stale()));
    }

    let border_style = if view.focused {
        theme.focused_border()
    } else {
        theme.symbol
    };
    let block = Block::default()
        .title(Line::from(title))
        .borders(Borders::ALL)
        .border_type(if view.focused {
            BorderType::Thick
        } else {
            BorderType::Rounded
        })
        .border_style(border_style)
        .style(theme.background);
    let inner = block.inner(area);
    f.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let notice = panel.status_text();
    if panel.history().is_empty() {
        let text = notice.unwrap_or_else(|| "no readings".to_string());
        f.render_widget(
            Paragraph::new(Line::from(Span::styled(text, theme.symbol))),
            inner,
        );
        return;
    }

    let notice_height = u16::from(notice.is_some());
    let rows_wanted = panel.history().len() as u16 + 1;
    let graph_height = if inner.height >= rows_wanted.min(6) + notice_height + 4 {
        (inner.height / 3).max(3)
    } else {
        0
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(notice_height),
            Constraint::Min(1),
            Constraint::Length(graph_height),
        ])
        .split(inner);

    if let Some(text) = notice {
        f.render_widget(
            Paragraph::new(Line::from(Span::styled(text, theme.stale()))),
            chunks[0],
        );
    }

    render_rows(f, chunks[1], panel, view, theme);

    if graph_height > 0 {
        if let Some(series) = panel.history().get(view.selected) {
            let values: Vec<f64> = series.values().iter().copied().collect();
            let mut graph = BrailleGraph::new(&values).style(theme.chip).block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(theme.symbol)
                    .title(Span::styled(truncate(&series.label, 24), theme.sensor)),
            );
            // Utilization is plotted on its full scale.
            if series.unit == Unit::Percent {
                graph = graph.value_range(0.0, 100.0);
            }
            f.render_widget(graph, chunks[2]);
        }
    }
}

fn render_rows(f: &mut Frame, area: Rect, panel: &PanelState, view: &PanelView<'_>, theme: &Theme) {
    if area.height == 0 {
        return;
    }
    let label_width = (area.width as usize)
        .saturating_sub(VALUE_WIDTH * 4 + 2)
        .clamp(6, 24);

    let header = Line::from(vec![
        Span::styled(format!("{:<label_width$} ", "sensor"), theme.symbol),
        Span::styled(
            format!(
                "{:>w$}{:>w$}{:>w$}{:>w$}",
                "cur",
                "min",
                "max",
                "avg",
                w = VALUE_WIDTH
            ),
            theme.symbol,
        ),
    ]);

    // Keep the selected row visible when the list is taller than the area.
    let visible = (area.height as usize).saturating_sub(1).max(1);
    let offset = view.selected.saturating_sub(visible - 1);

    let mut lines = vec![header];
    for (index, series) in panel.history().iter().enumerate().skip(offset).take(visible) {
        let marker = if view.focused && index == view.selected {
            "›"
        } else {
            " "
        };
        let band_style = |value: Option<f64>| -> Style {
            value.map_or(theme.symbol, |v| {
                theme.band_style(Band::classify(v, series.unit, view.thresholds))
            })
        };
        let cell = |value: Option<f64>| format!("{:>w$}", format_opt(value, series.unit), w = VALUE_WIDTH);

        let label = truncate(&series.label, label_width.saturating_sub(1));
        let current = series.latest();
        lines.push(Line::from(vec![
            Span::styled(marker, theme.chip),
            Span::styled(format!("{:<w$} ", label, w = label_width - 1), theme.chip),
            Span::styled(
                format!(
                    "{:>w$}",
                    current.map_or_else(|| "-".to_string(), |v| format_value(v, series.unit)),
                    w = VALUE_WIDTH
                ),
                band_style(current),
            ),
            Span::styled(cell(series.min()), band_style(series.min())),
            Span::styled(cell(series.max()), band_style(series.max())),
            Span::styled(cell(series.average()), band_style(series.average())),
        ]));
    }

    f.render_widget(Paragraph::new(lines), area);
}
