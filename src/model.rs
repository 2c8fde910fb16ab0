//! Panel state derived from snapshots.
//!
//! The model keeps per-panel history and health across ticks. It never holds
//! on to a [`Snapshot`]; each one is folded in and dropped.

use crate::data::snapshot::{ProbeResult, Reading, Snapshot, Unit, UnavailableReason};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Bounded history of one labeled reading within a panel.
#[derive(Clone, Debug)]
pub struct Series {
    pub label: String,
    pub unit: Unit,
    values: VecDeque<f64>,
    capacity: usize,
    min: f64,
    max: f64,
}

impl Series {
    fn new(label: String, unit: Unit, capacity: usize) -> Self {
        Self {
            label,
            unit,
            values: VecDeque::with_capacity(capacity.min(256)),
            capacity,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn push(&mut self, value: f64) {
        self.values.push_back(value);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Oldest first.
    pub fn values(&self) -> &VecDeque<f64> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Lowest value seen this session, including evicted ones.
    pub fn min(&self) -> Option<f64> {
        self.min.is_finite().then_some(self.min)
    }

    /// Highest value seen this session, including evicted ones.
    pub fn max(&self) -> Option<f64> {
        self.max.is_finite().then_some(self.max)
    }

    /// Mean over the retained window.
    pub fn average(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }
}

/// Coarse status used by the renderer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelStatus {
    /// No snapshot folded yet.
    Waiting,
    Live,
    /// Permanently absent hardware; informational, never stale.
    NotPresent,
    Unavailable(UnavailableReason),
}

#[derive(Clone, Debug)]
pub struct PanelState {
    pub source_id: String,
    pub title: String,
    latest: ProbeResult,
    history: Vec<Series>,
    consecutive_failures: u32,
    stale: bool,
    last_tick: Option<u64>,
    capacity: usize,
    failure_threshold: u32,
}

impl PanelState {
    fn new(source_id: String, title: String, capacity: usize, failure_threshold: u32) -> Self {
        Self {
            source_id,
            title,
            latest: ProbeResult::Ok(Vec::new()),
            history: Vec::new(),
            consecutive_failures: 0,
            stale: false,
            last_tick: None,
            capacity,
            failure_threshold,
        }
    }

    fn fold(&mut self, tick: u64, result: ProbeResult) {
        match &result {
            ProbeResult::Ok(readings) => {
                for reading in readings {
                    self.record(reading);
                }
                if self.stale {
                    info!(panel = %self.source_id, tick, "panel recovered");
                }
                self.consecutive_failures = 0;
                self.stale = false;
            }
            ProbeResult::Unavailable(UnavailableReason::NotPresent) => {
                self.consecutive_failures = 0;
                self.stale = false;
            }
            ProbeResult::Unavailable(reason) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                if !self.stale && self.consecutive_failures >= self.failure_threshold {
                    self.stale = true;
                    warn!(
                        panel = %self.source_id,
                        tick,
                        failures = self.consecutive_failures,
                        %reason,
                        "panel is stale"
                    );
                }
            }
        }
        self.latest = result;
        self.last_tick = Some(tick);
    }

    fn record(&mut self, reading: &Reading) {
        match self.history.iter_mut().find(|s| s.label == reading.label) {
            Some(series) => series.push(reading.value),
            None => {
                let mut series = Series::new(reading.label.clone(), reading.unit, self.capacity);
                series.push(reading.value);
                self.history.push(series);
            }
        }
    }

    pub fn latest(&self) -> &ProbeResult {
        &self.latest
    }

    /// Series in first-seen order.
    pub fn history(&self) -> &[Series] {
        &self.history
    }

    pub fn series(&self, label: &str) -> Option<&Series> {
        self.history.iter().find(|s| s.label == label)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }

    pub fn status(&self) -> PanelStatus {
        if self.last_tick.is_none() {
            return PanelStatus::Waiting;
        }
        match self.latest {
            ProbeResult::Ok(_) => PanelStatus::Live,
            ProbeResult::Unavailable(UnavailableReason::NotPresent) => PanelStatus::NotPresent,
            ProbeResult::Unavailable(reason) => PanelStatus::Unavailable(reason),
        }
    }

    /// Text shown in place of data, if any.
    pub fn status_text(&self) -> Option<String> {
        match self.status() {
            PanelStatus::Waiting => Some("waiting for first sample".to_string()),
            PanelStatus::Live => None,
            PanelStatus::NotPresent => Some("not present".to_string()),
            PanelStatus::Unavailable(UnavailableReason::PermissionDenied) => {
                Some("unavailable: permission denied (run as root)".to_string())
            }
            PanelStatus::Unavailable(reason) => Some(format!("unavailable: {}", reason)),
        }
    }
}

/// Every registered panel, in registration order. Panels are never removed.
#[derive(Clone, Debug)]
pub struct DisplayModel {
    panels: Vec<PanelState>,
    last_tick: Option<u64>,
}

impl DisplayModel {
    /// `descriptors` are `(source_id, title)` pairs in registration order.
    pub fn new(descriptors: Vec<(String, String)>, capacity: usize, failure_threshold: u32) -> Self {
        let capacity = capacity.max(1);
        let failure_threshold = failure_threshold.max(1);
        Self {
            panels: descriptors
                .into_iter()
                .map(|(id, title)| PanelState::new(id, title, capacity, failure_threshold))
                .collect(),
            last_tick: None,
        }
    }

    /// Folds one snapshot into the panels. A snapshot that is not newer than
    /// the last folded one is ignored.
    pub fn update(&mut self, snapshot: Snapshot) {
        let tick = snapshot.tick();
        if self.last_tick.is_some_and(|last| tick <= last) {
            warn!(tick, last = ?self.last_tick, "ignoring out-of-order snapshot");
            return;
        }

        for (source_id, result) in snapshot.into_results() {
            match self.panels.iter_mut().find(|p| p.source_id == source_id) {
                Some(panel) => panel.fold(tick, result),
                None => debug!(probe = %source_id, "snapshot entry without a panel"),
            }
        }
        self.last_tick = Some(tick);
    }

    pub fn panels(&self) -> &[PanelState] {
        &self.panels
    }

    pub fn panel(&self, source_id: &str) -> Option<&PanelState> {
        self.panels.iter().find(|p| p.source_id == source_id)
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }

    pub fn stale_count(&self) -> usize {
        self.panels.iter().filter(|p| p.is_stale()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(capacity: usize, threshold: u32) -> DisplayModel {
        DisplayModel::new(
            vec![("cpu_temp".to_string(), "CPU Temperature".to_string())],
            capacity,
            threshold,
        )
    }

    fn temp(value: f64) -> ProbeResult {
        ProbeResult::Ok(vec![
            Reading::new("cpu_temp", "Core0", value, Unit::Celsius).unwrap()
        ])
    }

    fn snapshot(tick: u64, result: ProbeResult) -> Snapshot {
        Snapshot::new(tick, vec![("cpu_temp".to_string(), result)])
    }

    #[test]
    fn test_repeated_ok_keeps_panel_healthy() {
        let mut model = model(10, 2);
        for tick in 1..=5 {
            model.update(snapshot(tick, temp(50.0)));
            let panel = model.panel("cpu_temp").unwrap();
            assert_eq!(panel.consecutive_failures(), 0);
            assert!(!panel.is_stale());
        }
    }

    #[test]
    fn test_stale_after_threshold_keeps_last_good_value() {
        let mut model = model(10, 2);
        for tick in 1..=3 {
            model.update(snapshot(tick, temp(55.0)));
        }
        let transient = ProbeResult::Unavailable(UnavailableReason::TransientError);

        model.update(snapshot(4, transient.clone()));
        assert!(!model.panel("cpu_temp").unwrap().is_stale());

        model.update(snapshot(5, transient));
        let panel = model.panel("cpu_temp").unwrap();
        assert!(panel.is_stale());
        assert_eq!(panel.consecutive_failures(), 2);
        assert_eq!(panel.series("Core0").unwrap().latest(), Some(55.0));
        assert_eq!(panel.status_text().as_deref(), Some("unavailable: read error"));

        model.update(snapshot(6, temp(56.0)));
        assert!(!model.panel("cpu_temp").unwrap().is_stale());
    }

    #[test]
    fn test_history_keeps_most_recent_values() {
        let mut model = model(3, 2);
        for tick in 1..=7 {
            model.update(snapshot(tick, temp(tick as f64)));
        }
        let series = model.panel("cpu_temp").unwrap().series("Core0").unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.values().iter().copied().collect::<Vec<_>>(), vec![5.0, 6.0, 7.0]);
        assert_eq!(series.min(), Some(1.0));
        assert_eq!(series.max(), Some(7.0));
        assert_eq!(series.average(), Some(6.0));
    }

    #[test]
    fn test_not_present_is_never_stale() {
        let mut model = model(10, 1);
        for tick in 1..=5 {
            model.update(snapshot(
                tick,
                ProbeResult::Unavailable(UnavailableReason::NotPresent),
            ));
        }
        let panel = model.panel("cpu_temp").unwrap();
        assert!(!panel.is_stale());
        assert_eq!(panel.status(), PanelStatus::NotPresent);
        assert_eq!(panel.status_text().as_deref(), Some("not present"));
    }

    #[test]
    fn test_out_of_order_snapshot_is_ignored() {
        let mut model = model(10, 2);
        model.update(snapshot(2, temp(40.0)));
        model.update(snapshot(1, temp(99.0)));
        model.update(snapshot(2, temp(98.0)));

        let series = model.panel("cpu_temp").unwrap().series("Core0").unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series.latest(), Some(40.0));
        assert_eq!(model.last_tick(), Some(2));
    }

    #[test]
    fn test_waiting_before_first_snapshot() {
        let model = model(10, 2);
        assert_eq!(model.panels()[0].status(), PanelStatus::Waiting);
    }

    #[test]
    fn test_permission_denied_counts_as_failure() {
        let mut model = model(10, 2);
        let denied = ProbeResult::Unavailable(UnavailableReason::PermissionDenied);
        model.update(snapshot(1, denied.clone()));
        model.update(snapshot(2, denied));

        let panel = model.panel("cpu_temp").unwrap();
        assert!(panel.is_stale());
        assert!(panel.status_text().unwrap().contains("permission denied"));
    }
}
