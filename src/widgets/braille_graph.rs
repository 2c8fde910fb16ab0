use ratatui::widgets::canvas::{Canvas, Context, Points};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::{Block, Widget},
};

/// Trend line drawn with Braille sub-cells, newest sample on the right.
pub struct BrailleGraph<'a> {
    data: &'a [f64],
    block: Option<Block<'a>>,
    style: Style,
    /// Fixed `(min, max)`; `None` fits the visible samples.
    value_range: Option<(f64, f64)>,
}

impl<'a> BrailleGraph<'a> {
    pub fn new(data: &'a [f64]) -> Self {
        Self {
            data,
            block: None,
            style: Style::default(),
            value_range: None,
        }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn value_range(mut self, min: f64, max: f64) -> Self {
        self.value_range = Some((min, max));
        self
    }

    /// The last `columns` samples, one per braille column pair.
    fn visible(&self, columns: usize) -> &'a [f64] {
        let start = self.data.len().saturating_sub(columns);
        &self.data[start..]
    }

    fn bounds(&self, values: &[f64]) -> (f64, f64) {
        if let Some(range) = self.value_range {
            return range;
        }
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        if !min.is_finite() || !max.is_finite() {
            return (0.0, 1.0);
        }
        // Flat series sit mid-height instead of vanishing.
        if (max - min).abs() < f64::EPSILON {
            let pad = (max.abs() * 0.05).max(1.0);
            return (min - pad, max + pad);
        }
        (min, max)
    }
}

impl<'a> Widget for BrailleGraph<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let inner_area = match &self.block {
            Some(b) => {
                b.clone().render(area, buf);
                b.inner(area)
            }
            None => area,
        };

        if inner_area.width < 2 || inner_area.height < 2 || self.data.is_empty() {
            return;
        }

        let values = self.visible(inner_area.width as usize * 2);
        let (min_val, max_val) = self.bounds(values);
        let range = max_val - min_val;
        let base_color = self.style.fg.unwrap_or(Color::White);
        let width = (inner_area.width - 1) as f64;
        let bottom_y = (inner_area.height - 1) as f64;

        let canvas = Canvas::default()
            .marker(ratatui::symbols::Marker::Braille)
            .background_color(self.style.bg.unwrap_or_default())
            .x_bounds([0.0, width])
            .y_bounds([0.0, bottom_y])
            .paint(|ctx| {
                let baseline_color = dim_color(base_color);
                for x in 0..inner_area.width {
                    draw_point(ctx, x as f64, 0.0, baseline_color);
                }

                // Right-align so a short history grows leftwards.
                let step = 0.5;
                let offset = width - (values.len().saturating_sub(1)) as f64 * step;
                let mut prev: Option<(f64, f64)> = None;
                for (i, value) in values.iter().enumerate() {
                    let x = (offset + i as f64 * step).max(0.0);
                    let y = ((*value - min_val) / range).clamp(0.0, 1.0) * bottom_y;
                    match prev {
                        Some((px, py)) => draw_line(ctx, px, py, x, y, base_color),
                        None => draw_point(ctx, x, y, base_color),
                    }
                    prev = Some((x, y));
                }
            });

        canvas.render(inner_area, buf);
    }
}

fn draw_point(ctx: &mut Context<'_>, x: f64, y: f64, color: Color) {
    ctx.draw(&Points {
        coords: &[(x, y)],
        color,
    });
}

fn draw_line(ctx: &mut Context<'_>, x0: f64, y0: f64, x1: f64, y1: f64, color: Color) {
    let dx = x1 - x0;
    let dy = y1 - y0;
    let steps = ((dx.abs().max(dy.abs()) * 2.0).ceil() as usize).max(1);
    for step in 0..=steps {
        let t = step as f64 / steps as f64;
        draw_point(ctx, x0 + dx * t, y0 + dy * t, color);
    }
}

fn dim_color(color: Color) -> Color {
    match color {
        Color::Rgb(r, g, b) => Color::Rgb(
            (r as f32 * 0.3) as u8,
            (g as f32 * 0.3) as u8,
            (b as f32 * 0.3) as u8,
        ),
        _ => Color::DarkGray,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_tail_is_visible() {
        let data: Vec<f64> = (0..100).map(f64::from).collect();
        let graph = BrailleGraph::new(&data);
        assert_eq!(graph.visible(10), &data[90..]);
        assert_eq!(graph.visible(500).len(), 100);
    }

    #[test]
    fn test_flat_series_gets_padded_bounds() {
        let data = [50.0, 50.0, 50.0];
        let (lo, hi) = BrailleGraph::new(&data).bounds(&data);
        assert!(lo < 50.0 && hi > 50.0);
    }

    #[test]
    fn test_fixed_range_overrides_fit() {
        let data = [40.0, 45.0];
        let graph = BrailleGraph::new(&data).value_range(0.0, 100.0);
        assert_eq!(graph.bounds(&data), (0.0, 100.0));
    }

    #[test]
    fn test_render_into_small_area_does_not_panic() {
        let data = [1.0, 3.0, 2.0];
        let area = Rect::new(0, 0, 8, 3);
        let mut buf = Buffer::empty(area);
        BrailleGraph::new(&data).render(area, &mut buf);

        let tiny = Rect::new(0, 0, 1, 1);
        let mut buf = Buffer::empty(tiny);
        BrailleGraph::new(&data).render(tiny, &mut buf);
    }
}
