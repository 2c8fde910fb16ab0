//! Tick cadence and run state.
//!
//! The scheduler owns no I/O. The app loop feeds it interval boundaries and
//! input-driven transitions, and it answers whether a boundary should sample
//! and whether that sample should also be drawn.

use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval, Interval, MissedTickBehavior};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Paused,
    Stopped,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("cannot {action} a scheduler that is {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: SchedulerState,
    },
}

/// Process-wide run state as seen by the UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScheduleState {
    pub running: bool,
    pub paused: bool,
    pub sample_interval: Duration,
    pub render_interval: Duration,
}

/// What to do at one interval boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickPlan {
    /// Paused, idle or stopped: nothing happens and the tick does not advance.
    Skip,
    Sample { tick: u64, render: bool },
}

#[derive(Debug)]
pub struct Scheduler {
    state: SchedulerState,
    sample_interval: Duration,
    render_interval: Duration,
    /// Sample ticks per rendered frame.
    render_every: u64,
    /// Sampled ticks since the last render; 0 means the next tick renders.
    since_render: u64,
    last_tick: u64,
}

impl Scheduler {
    /// `render_interval` is raised to `sample_interval` when shorter.
    pub fn new(sample_interval: Duration, render_interval: Duration) -> Self {
        let render_interval = render_interval.max(sample_interval);
        let ratio = render_interval.as_secs_f64() / sample_interval.as_secs_f64().max(f64::EPSILON);
        Self {
            state: SchedulerState::Idle,
            sample_interval,
            render_interval,
            render_every: (ratio.round() as u64).max(1),
            since_render: 0,
            last_tick: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_stopped(&self) -> bool {
        self.state == SchedulerState::Stopped
    }

    pub fn render_every(&self) -> u64 {
        self.render_every
    }

    /// Number of the most recent sampled tick, 0 before the first.
    pub fn last_tick(&self) -> u64 {
        self.last_tick
    }

    pub fn schedule_state(&self) -> ScheduleState {
        ScheduleState {
            running: matches!(self.state, SchedulerState::Running | SchedulerState::Paused),
            paused: self.state == SchedulerState::Paused,
            sample_interval: self.sample_interval,
            render_interval: self.render_interval,
        }
    }

    pub fn start(&mut self) -> Result<(), SchedulerError> {
        self.transition("start", SchedulerState::Idle, SchedulerState::Running)
    }

    pub fn pause(&mut self) -> Result<(), SchedulerError> {
        self.transition("pause", SchedulerState::Running, SchedulerState::Paused)
    }

    pub fn resume(&mut self) -> Result<(), SchedulerError> {
        self.transition("resume", SchedulerState::Paused, SchedulerState::Running)
    }

    pub fn toggle_pause(&mut self) -> Result<SchedulerState, SchedulerError> {
        match self.state {
            SchedulerState::Running => self.pause()?,
            _ => self.resume()?,
        }
        Ok(self.state)
    }

    /// Terminal; valid from any state.
    pub fn stop(&mut self) {
        self.state = SchedulerState::Stopped;
    }

    pub fn on_interval(&mut self) -> TickPlan {
        if self.state != SchedulerState::Running {
            return TickPlan::Skip;
        }

        // Ticks 1, 1 + n, 1 + 2n, ... render, so the first sample is drawn.
        self.last_tick += 1;
        let render = self.since_render == 0;
        self.since_render = (self.since_render + 1) % self.render_every;
        TickPlan::Sample {
            tick: self.last_tick,
            render,
        }
    }

    /// Interval that fires at `sample_interval` boundaries. An overrunning
    /// tick yields one immediate boundary, then the grid realigns; missed
    /// boundaries are not replayed.
    pub fn interval(&self) -> Interval {
        let mut ticker = interval(self.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    fn transition(
        &mut self,
        action: &'static str,
        from: SchedulerState,
        to: SchedulerState,
    ) -> Result<(), SchedulerError> {
        if self.state != from {
            return Err(SchedulerError::InvalidTransition {
                action,
                state: self.state,
            });
        }
        self.state = to;
        Ok(())
    }
}
