use crate::{
    action::Action,
    components::{
        panel::PanelGrid,
        status::{Footer, Header},
        Component, ViewContext,
    },
    config::AppConfig,
    sampler::{SamplingLoop, TickOutcome},
    scheduler::SchedulerState,
    theme::Theme,
    tui::Tui,
};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::Line,
    widgets::Paragraph,
};
use std::io::Stdout;
use tracing::{debug, info, warn};

/// Smallest terminal the grid is drawn into.
pub const MIN_WIDTH: u16 = 40;
pub const MIN_HEIGHT: u16 = 10;

/// Frame counters since startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub drawn: u64,
    /// Draw errors and undersized terminals.
    pub skipped: u64,
}

pub struct App<B: Backend = CrosstermBackend<Stdout>> {
    tui: Tui<B>,
    sampling: SamplingLoop,
    theme: Theme,
    grid: PanelGrid,
    header: Header,
    footer: Footer,
    /// The view changed while paused; drawn on resume.
    redraw_pending: bool,
    too_small: bool,
    frames: FrameStats,
}

impl<B: Backend> App<B> {
    pub fn new(tui: Tui<B>, sampling: SamplingLoop, config: &AppConfig, host: String) -> Self {
        let grid = PanelGrid::new(sampling.model().len(), config.thresholds.clone());
        Self {
            tui,
            sampling,
            theme: Theme::from_palette(&config.palette),
            grid,
            header: Header::new(host),
            footer: Footer::new(config.date_format.clone(), config.quit_hint.clone()),
            redraw_pending: false,
            too_small: false,
            frames: FrameStats::default(),
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.sampling.scheduler_mut().start()?;
        info!(
            panels = self.sampling.model().len(),
            render_every = self.sampling.scheduler().render_every(),
            "starting main loop"
        );

        let mut ticker = self.sampling.scheduler().interval();
        let mut events = EventStream::new();

        loop {
            tokio::select! {
                biased;

                event = events.next() => match event {
                    Some(Ok(event)) => self.handle_event(event),
                    Some(Err(err)) => warn!("failed to read terminal input: {}", err),
                    None => {
                        info!("input stream closed");
                        self.sampling.scheduler_mut().stop();
                    }
                },
                _ = ticker.tick() => {
                    self.on_tick();
                }
            }

            // Checked before the ticker is polled again, so a quit never
            // lets another sample start.
            if self.is_stopped() {
                break;
            }
        }

        info!(
            tick = self.sampling.scheduler().last_tick(),
            drawn = self.frames.drawn,
            skipped = self.frames.skipped,
            "shutting down"
        );
        self.tui.exit()?;
        Ok(())
    }

    /// One interval boundary: sample, and draw when the scheduler says so.
    pub fn on_tick(&mut self) -> TickOutcome {
        let outcome = self.sampling.on_interval();
        if outcome.should_render() {
            self.draw_frame();
        }
        outcome
    }

    pub fn is_stopped(&self) -> bool {
        self.sampling.scheduler().is_stopped()
    }

    pub fn frames(&self) -> FrameStats {
        self.frames
    }

    pub fn sampling(&self) -> &SamplingLoop {
        &self.sampling
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => {
                // Ignore key release events to avoid double-handling keys like Esc.
                if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                    if let Some(action) = map_key(key) {
                        self.handle_action(action);
                    }
                }
            }
            Event::Resize(width, height) => {
                debug!(width, height, "terminal resized");
                if let Err(err) = self.tui.resize(width, height) {
                    warn!("failed to resize terminal: {}", err);
                }
                self.request_redraw();
            }
            Event::FocusGained | Event::FocusLost | Event::Mouse(_) | Event::Paste(_) => {}
        }
    }

    fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => {
                info!("quit requested");
                self.sampling.scheduler_mut().stop();
            }
            Action::TogglePause => match self.sampling.scheduler_mut().toggle_pause() {
                Ok(state) => {
                    info!(?state, "sampling toggled");
                    if state == SchedulerState::Running {
                        self.redraw_pending = false;
                    }
                    // One frame so the header shows the new state.
                    self.draw_frame();
                }
                Err(err) => warn!("{}", err),
            },
            Action::Redraw => self.request_redraw(),
            Action::FocusNext | Action::FocusPrev | Action::SelectNext | Action::SelectPrev => {
                if let Some(next) = self.grid.update(action, self.sampling.model()) {
                    self.handle_action(next);
                }
            }
        }
    }

    /// Nothing is drawn while paused; the change shows up on resume.
    fn request_redraw(&mut self) {
        if self.sampling.scheduler().state() == SchedulerState::Paused {
            self.redraw_pending = true;
        } else {
            self.draw_frame();
        }
    }

    /// Draws one frame. Failures and undersized terminals skip the frame.
    fn draw_frame(&mut self) {
        let Self {
            tui,
            sampling,
            theme,
            grid,
            header,
            footer,
            ..
        } = self;

        let view = ViewContext {
            model: sampling.model(),
            schedule: sampling.scheduler().schedule_state(),
            tick: sampling.scheduler().last_tick(),
            theme: &*theme,
        };

        let mut too_small = None;
        let result = tui.draw(|f| {
            let size = f.area();
            if size.width < MIN_WIDTH || size.height < MIN_HEIGHT {
                too_small = Some((size.width, size.height));
                render_too_small(f, size);
                return;
            }

            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(1), // header
                    Constraint::Min(0),    // panels
                    Constraint::Length(1), // footer
                ])
                .split(size);

            header.render(f, chunks[0], &view);
            grid.render(f, chunks[1], &view);
            footer.render(f, chunks[2], &view);
        });

        if let Err(err) = result {
            self.frames.skipped += 1;
            warn!("skipping frame: {}", err);
            return;
        }

        match (too_small, self.too_small) {
            (Some((width, height)), false) => {
                warn!(width, height, "terminal too small, skipping frames until resized");
            }
            (None, true) => info!("terminal large enough again"),
            _ => {}
        }
        self.too_small = too_small.is_some();
        if self.too_small {
            self.frames.skipped += 1;
        } else {
            self.frames.drawn += 1;
        }
    }
}

fn render_too_small(f: &mut ratatui::Frame, area: Rect) {
    let text = vec![
        Line::from("terminal too small"),
        Line::from(format!("need {}x{}", MIN_WIDTH, MIN_HEIGHT)),
    ];
    let top = area.height.saturating_sub(2) / 2;
    let area = Rect::new(area.x, area.y + top, area.width, area.height - top);
    f.render_widget(Paragraph::new(text).alignment(Alignment::Center), area);
}

/// Key bindings.
pub fn map_key(key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Action::Quit),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char('p') | KeyCode::Char(' ') => Some(Action::TogglePause),
        KeyCode::Tab | KeyCode::Right => Some(Action::FocusNext),
        KeyCode::BackTab | KeyCode::Left => Some(Action::FocusPrev),
        KeyCode::Down | KeyCode::Char('j') => Some(Action::SelectNext),
        KeyCode::Up | KeyCode::Char('k') => Some(Action::SelectPrev),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ProbeResult, Reading, SampleAggregator, Unit};
    use crate::probes::SensorProbe;
    use crate::scheduler::Scheduler;
    use ratatui::{
        backend::{TestBackend, WindowSize},
        buffer::Cell,
        layout::{Position, Size},
    };
    use std::io;
    use std::time::Duration;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    struct Thermometer(&'static str);

    impl SensorProbe for Thermometer {
        fn source_id(&self) -> &str {
            self.0
        }
        fn title(&self) -> &str {
            self.0
        }
        fn read(&mut self) -> ProbeResult {
            ProbeResult::Ok(vec![Reading::new(self.0, "Core 0", 48.0, Unit::Celsius).unwrap()])
        }
    }

    /// TestBackend whose draws can be made to fail.
    struct FlakyBackend {
        inner: TestBackend,
        fail_draws: bool,
    }

    impl Backend for FlakyBackend {
        fn draw<'a, I>(&mut self, content: I) -> io::Result<()>
        where
            I: Iterator<Item = (u16, u16, &'a Cell)>,
        {
            if self.fail_draws {
                return Err(io::Error::new(io::ErrorKind::Other, "terminal went away"));
            }
            self.inner.draw(content)
        }
        fn hide_cursor(&mut self) -> io::Result<()> {
            self.inner.hide_cursor()
        }
        fn show_cursor(&mut self) -> io::Result<()> {
            self.inner.show_cursor()
        }
        fn get_cursor_position(&mut self) -> io::Result<Position> {
            self.inner.get_cursor_position()
        }
        fn set_cursor_position<P: Into<Position>>(&mut self, position: P) -> io::Result<()> {
            self.inner.set_cursor_position(position)
        }
        fn clear(&mut self) -> io::Result<()> {
            self.inner.clear()
        }
        fn size(&self) -> io::Result<Size> {
            self.inner.size()
        }
        fn window_size(&mut self) -> io::Result<WindowSize> {
            self.inner.window_size()
        }
        fn flush(&mut self) -> io::Result<()> {
            Backend::flush(&mut self.inner)
        }
    }

    fn app_with<B: Backend>(backend: B, sample_secs: u64, render_secs: u64) -> App<B> {
        let mut aggregator = SampleAggregator::new(Duration::from_secs(1));
        aggregator.register(Box::new(Thermometer("cpu_thermal"))).unwrap();
        aggregator.register(Box::new(Thermometer("system_thermal"))).unwrap();
        let scheduler = Scheduler::new(
            Duration::from_secs(sample_secs),
            Duration::from_secs(render_secs),
        );
        let sampling = SamplingLoop::new(aggregator, scheduler, 16, 3);
        let tui = Tui::with_backend(backend).unwrap();
        let mut app = App::new(tui, sampling, &AppConfig::default(), "bench".to_string());
        app.sampling.scheduler_mut().start().unwrap();
        app
    }

    fn app(width: u16, height: u16) -> App<TestBackend> {
        app_with(TestBackend::new(width, height), 1, 1)
    }

    fn screen(app: &App<TestBackend>) -> String {
        app.tui
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_ticks_draw_only_when_scheduled() {
        let mut app = app_with(TestBackend::new(100, 30), 1, 3);
        let drawn: Vec<u64> = (0..10)
            .map(|_| {
                app.on_tick();
                app.frames().drawn
            })
            .collect();
        // Ticks 1, 4, 7 and 10.
        assert_eq!(drawn, vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4]);
        assert!(screen(&app).contains("sensetop"));
    }

    #[test]
    fn test_quit_stops_before_next_tick() {
        let mut app = app(100, 30);
        app.on_tick();
        app.handle_event(Event::Key(press(KeyCode::Char('q'))));
        assert!(app.is_stopped());

        assert_eq!(app.on_tick(), TickOutcome::Skipped);
        assert_eq!(app.sampling().model().last_tick(), Some(1));
        assert_eq!(
            app.sampling().aggregator().health("cpu_thermal").unwrap().reads,
            1
        );
    }

    #[test]
    fn test_nothing_is_drawn_while_paused() {
        let mut app = app(100, 30);
        app.on_tick();
        assert_eq!(app.frames().drawn, 1);

        app.handle_event(Event::Key(press(KeyCode::Char('p'))));
        // The pause itself is acknowledged with one frame.
        assert_eq!(app.frames().drawn, 2);
        assert!(screen(&app).contains("PAUSED"));

        for _ in 0..5 {
            assert_eq!(app.on_tick(), TickOutcome::Skipped);
        }
        app.handle_event(Event::Key(press(KeyCode::Tab)));
        app.handle_event(Event::Resize(100, 30));
        assert_eq!(app.frames().drawn, 2);
        assert!(app.redraw_pending);

        app.handle_event(Event::Key(press(KeyCode::Char('p'))));
        assert_eq!(app.frames().drawn, 3);
        assert!(!app.redraw_pending);
        assert!(screen(&app).contains("RUNNING"));
    }

    #[test]
    fn test_resize_reflows_and_small_terminal_skips() {
        let mut app = app(100, 30);
        app.on_tick();
        assert_eq!(app.frames(), FrameStats { drawn: 1, skipped: 0 });

        app.tui.backend_mut().resize(30, 8);
        app.handle_event(Event::Resize(30, 8));
        assert_eq!(app.frames(), FrameStats { drawn: 1, skipped: 1 });
        assert!(app.too_small);
        assert!(screen(&app).contains("terminal too small"));

        app.tui.backend_mut().resize(120, 40);
        app.handle_event(Event::Resize(120, 40));
        assert_eq!(app.frames(), FrameStats { drawn: 2, skipped: 1 });
        assert!(!app.too_small);
        assert_eq!(app.tui.backend().buffer().area, Rect::new(0, 0, 120, 40));
        let text = screen(&app);
        assert!(text.contains("cpu_thermal"));
        assert!(text.contains("system_thermal"));
    }

    #[test]
    fn test_draw_error_skips_frame_and_keeps_running() {
        let backend = FlakyBackend {
            inner: TestBackend::new(100, 30),
            fail_draws: true,
        };
        let mut app = app_with(backend, 1, 1);

        app.on_tick();
        app.on_tick();
        assert_eq!(app.frames(), FrameStats { drawn: 0, skipped: 2 });
        assert!(!app.is_stopped());
        assert_eq!(app.sampling().model().last_tick(), Some(2));

        app.tui.backend_mut().fail_draws = false;
        app.on_tick();
        assert_eq!(app.frames(), FrameStats { drawn: 1, skipped: 2 });
    }

    #[test]
    fn test_quit_keys() {
        assert_eq!(map_key(press(KeyCode::Char('q'))), Some(Action::Quit));
        assert_eq!(map_key(press(KeyCode::Esc)), Some(Action::Quit));
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Action::Quit)
        );
        assert_eq!(map_key(press(KeyCode::Char('c'))), None);
    }

    #[test]
    fn test_navigation_keys() {
        assert_eq!(map_key(press(KeyCode::Char(' '))), Some(Action::TogglePause));
        assert_eq!(map_key(press(KeyCode::Tab)), Some(Action::FocusNext));
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::BackTab, KeyModifiers::SHIFT)),
            Some(Action::FocusPrev)
        );
        assert_eq!(map_key(press(KeyCode::Char('j'))), Some(Action::SelectNext));
        assert_eq!(map_key(press(KeyCode::Up)), Some(Action::SelectPrev));
    }
}
