use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical unit of a reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Hz,
    Celsius,
    Volt,
    Percent,
    Rpm,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Hz => "Hz",
            Unit::Celsius => "°C",
            Unit::Volt => "V",
            Unit::Percent => "%",
            Unit::Rpm => "RPM",
        }
    }
}

/// One scalar telemetry value.
#[derive(Clone, Debug, PartialEq)]
pub struct Reading {
    pub source_id: String,
    pub label: String,
    pub value: f64,
    pub unit: Unit,
    /// Tick sequence number, stamped by the aggregator.
    pub timestamp: u64,
}

impl Reading {
    /// Builds a reading, or `None` when `value` is NaN or infinite.
    pub fn new(
        source_id: impl Into<String>,
        label: impl Into<String>,
        value: f64,
        unit: Unit,
    ) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        Some(Self {
            source_id: source_id.into(),
            label: label.into(),
            value,
            unit,
            timestamp: 0,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnavailableReason {
    NotPresent,
    PermissionDenied,
    TransientError,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnavailableReason::NotPresent => "not present",
            UnavailableReason::PermissionDenied => "permission denied",
            UnavailableReason::TransientError => "read error",
        };
        f.write_str(text)
    }
}

/// Outcome of one probe invocation in one tick.
#[derive(Clone, Debug, PartialEq)]
pub enum ProbeResult {
    /// May legitimately carry zero readings.
    Ok(Vec<Reading>),
    Unavailable(UnavailableReason),
}

impl ProbeResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, ProbeResult::Ok(_))
    }

    pub fn readings(&self) -> &[Reading] {
        match self {
            ProbeResult::Ok(readings) => readings,
            ProbeResult::Unavailable(_) => &[],
        }
    }

    pub fn reason(&self) -> Option<UnavailableReason> {
        match self {
            ProbeResult::Ok(_) => None,
            ProbeResult::Unavailable(reason) => Some(*reason),
        }
    }
}

/// Immutable aggregate of all probe results for one tick, in registration order.
#[derive(Clone, Debug)]
pub struct Snapshot {
    tick: u64,
    results: Vec<(String, ProbeResult)>,
}

impl Snapshot {
    pub(crate) fn new(tick: u64, results: Vec<(String, ProbeResult)>) -> Self {
        Self { tick, results }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn get(&self, source_id: &str) -> Option<&ProbeResult> {
        self.results
            .iter()
            .find(|(id, _)| id == source_id)
            .map(|(_, result)| result)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProbeResult)> {
        self.results
            .iter()
            .map(|(id, result)| (id.as_str(), result))
    }

    pub fn into_results(self) -> Vec<(String, ProbeResult)> {
        self.results
    }
}
