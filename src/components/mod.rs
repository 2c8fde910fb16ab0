use crate::{action::Action, model::DisplayModel, scheduler::ScheduleState, theme::Theme};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    Frame,
};

pub mod panel;
pub mod status;

/// Read-only state handed to every component for one frame.
pub struct ViewContext<'a> {
    pub model: &'a DisplayModel,
    pub schedule: ScheduleState,
    pub tick: u64,
    pub theme: &'a Theme,
}

/// The Component trait defines the interface that all UI components must implement
pub trait Component {
    /// Update component state from an action; may request a follow-up action.
    fn update(&mut self, action: Action, model: &DisplayModel) -> Option<Action>;

    /// Render the component into `area`
    fn render(&self, f: &mut Frame, area: Rect, view: &ViewContext<'_>);
}

/// Splits `area` into `count` cells laid out row-major. Columns are chosen
/// so cells stay roughly three times wider than tall; the last row may hold
/// fewer cells, which then share its full width.
pub fn grid_layout(area: Rect, count: usize) -> Vec<Rect> {
    if count == 0 || area.width == 0 || area.height == 0 {
        return Vec::new();
    }

    let aspect = area.width as f64 / (area.height as f64 * 3.0);
    let columns = ((count as f64 * aspect).sqrt().ceil() as usize).clamp(1, count);
    let rows = count.div_ceil(columns);

    let row_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, rows as u32); rows])
        .split(area);

    let mut cells = Vec::with_capacity(count);
    for (row, row_area) in row_areas.iter().enumerate() {
        let in_row = (count - row * columns).min(columns);
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, in_row as u32); in_row])
            .split(*row_area);
        cells.extend(cols.iter().copied());
    }
    cells
}
