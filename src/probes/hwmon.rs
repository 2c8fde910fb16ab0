//! Probes backed by the Linux hwmon class (`/sys/class/hwmon`).
//!
//! One adapter serves four families; they differ only in which input files
//! they read (`temp*`, `in*`, `fan*`) and which chips they accept.

use super::{
    numbered_entries, read_number, read_trimmed, ProbeContext, ProbeError, ProbeKind, SensorProbe,
};
use crate::data::snapshot::{ProbeResult, Reading, Unit, UnavailableReason};
use std::path::{Path, PathBuf};
use tracing::debug;

/// hwmon driver names that report CPU die/package temperatures.
const CPU_CHIPS: &[&str] = &["coretemp", "k10temp", "zenpower", "cpu_thermal"];

/// Thermal zone types used when no CPU hwmon chip is loaded.
const CPU_ZONES: &[&str] = &["x86_pkg_temp", "tdie", "tctl", "tcpu", "cpu-thermal", "cpu"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    Temperature,
    Voltage,
    Fan,
}

impl InputKind {
    fn prefix(self) -> &'static str {
        match self {
            InputKind::Temperature => "temp",
            InputKind::Voltage => "in",
            InputKind::Fan => "fan",
        }
    }

    /// Converts the raw sysfs integer into the reading unit.
    fn scale(self, raw: f64) -> f64 {
        match self {
            // millidegree Celsius / millivolt
            InputKind::Temperature | InputKind::Voltage => raw / 1000.0,
            InputKind::Fan => raw,
        }
    }

    fn unit(self) -> Unit {
        match self {
            InputKind::Temperature => Unit::Celsius,
            InputKind::Voltage => Unit::Volt,
            InputKind::Fan => Unit::Rpm,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChipFilter {
    Cpu,
    NonCpu,
    Any,
}

impl ChipFilter {
    fn accepts(self, chip_name: &str) -> bool {
        let is_cpu = CPU_CHIPS.contains(&chip_name);
        match self {
            ChipFilter::Cpu => is_cpu,
            ChipFilter::NonCpu => !is_cpu,
            ChipFilter::Any => true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct HwmonChip {
    pub name: String,
    pub path: PathBuf,
}

/// Lists hwmon chips under `class_dir` in index order. A missing class
/// directory means no chips.
pub fn scan_chips(class_dir: &Path) -> Result<Vec<HwmonChip>, ProbeError> {
    let entries = match numbered_entries(class_dir, "hwmon") {
        Ok(entries) => entries,
        Err(ProbeError::NotFound(_)) => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    Ok(entries
        .into_iter()
        .map(|(index, path)| {
            let name = read_trimmed(&path.join("name")).unwrap_or_else(|_| format!("hwmon{}", index));
            HwmonChip { name, path }
        })
        .collect())
}

/// Values read from one chip for one input kind.
#[derive(Debug, Default)]
pub struct ChipReadout {
    pub values: Vec<(String, f64)>,
    /// Number of `<prefix>N_input` files found, readable or not.
    pub inputs_seen: usize,
    pub last_error: Option<ProbeError>,
}

pub fn read_chip(chip: &HwmonChip, input: InputKind, ctx_blacklist: &[String]) -> ChipReadout {
    let mut readout = ChipReadout::default();
    let prefix = input.prefix();

    let Ok(entries) = std::fs::read_dir(&chip.path) else {
        return readout;
    };
    let mut indices: Vec<usize> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.strip_suffix("_input")?
                .strip_prefix(prefix)?
                .parse::<usize>()
                .ok()
        })
        .collect();
    indices.sort_unstable();

    for index in indices {
        readout.inputs_seen += 1;
        let label = read_trimmed(&chip.path.join(format!("{}{}_label", prefix, index)))
            .unwrap_or_else(|_| format!("{}{}", prefix, index));
        if ctx_blacklist.iter().any(|entry| entry == &label) {
            continue;
        }

        match read_number(&chip.path.join(format!("{}{}_input", prefix, index))) {
            Ok(raw) => readout.values.push((label, input.scale(raw))),
            Err(err) => readout.last_error = Some(err),
        }
    }

    readout
}

pub struct HwmonProbe {
    kind: ProbeKind,
    input: InputKind,
    filter: ChipFilter,
    hwmon_dir: PathBuf,
    thermal_dir: PathBuf,
    blacklist: Vec<String>,
}

impl HwmonProbe {
    pub fn new(kind: ProbeKind, ctx: &ProbeContext) -> Self {
        let (input, filter) = match kind {
            ProbeKind::CpuThermal => (InputKind::Temperature, ChipFilter::Cpu),
            ProbeKind::SystemThermal => (InputKind::Temperature, ChipFilter::NonCpu),
            ProbeKind::Fan => (InputKind::Fan, ChipFilter::Any),
            _ => (InputKind::Voltage, ChipFilter::Any),
        };
        let class_dir = ctx.sysfs_root.join("class");
        Self {
            kind,
            input,
            filter,
            hwmon_dir: class_dir.join("hwmon"),
            thermal_dir: class_dir.join("thermal"),
            blacklist: ctx.blacklist.clone(),
        }
    }

    fn reading(&self, label: String, value: f64) -> Option<Reading> {
        Reading::new(self.kind.id(), label, value, self.input.unit())
    }

    /// CPU temperature from `/sys/class/thermal` when no CPU hwmon chip exists.
    fn read_thermal_zones(&self) -> Result<Vec<Reading>, ProbeError> {
        let zones = match numbered_entries(&self.thermal_dir, "thermal_zone") {
            Ok(zones) => zones,
            Err(ProbeError::NotFound(_)) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut readings = Vec::new();
        let mut last_error = None;
        for (_, zone) in zones {
            let Ok(zone_type) = read_trimmed(&zone.join("type")) else {
                continue;
            };
            let lower = zone_type.to_lowercase();
            if !CPU_ZONES.iter().any(|candidate| lower.contains(candidate)) {
                continue;
            }
            let raw = match read_number(&zone.join("temp")) {
                Ok(raw) => raw,
                Err(err) => {
                    debug!(zone = %zone.display(), "skipping thermal zone: {}", err);
                    last_error = Some(err);
                    continue;
                }
            };
            readings.extend(self.reading(zone_type, InputKind::Temperature.scale(raw)));
        }

        match last_error {
            Some(err) if readings.is_empty() => Err(err),
            _ => Ok(readings),
        }
    }
}

impl SensorProbe for HwmonProbe {
    fn source_id(&self) -> &str {
        self.kind.id()
    }

    fn title(&self) -> &str {
        self.kind.title()
    }

    fn read(&mut self) -> ProbeResult {
        let chips: Vec<HwmonChip> = match scan_chips(&self.hwmon_dir) {
            Ok(chips) => chips
                .into_iter()
                .filter(|chip| self.filter.accepts(&chip.name))
                .collect(),
            Err(err) => return err.into_result(self.kind.id()),
        };

        let prefix_chip = chips.len() > 1;
        let mut readings = Vec::new();
        let mut inputs_seen = 0;
        let mut last_error = None;

        for chip in &chips {
            let readout = read_chip(chip, self.input, &self.blacklist);
            inputs_seen += readout.inputs_seen;
            if readout.last_error.is_some() {
                last_error = readout.last_error;
            }
            for (label, value) in readout.values {
                let label = if prefix_chip {
                    format!("{} {}", chip.name, label)
                } else {
                    label
                };
                readings.extend(self.reading(label, value));
            }
        }

        if inputs_seen == 0 && self.kind == ProbeKind::CpuThermal {
            return match self.read_thermal_zones() {
                Ok(zones) if zones.is_empty() => {
                    ProbeResult::Unavailable(UnavailableReason::NotPresent)
                }
                Ok(zones) => ProbeResult::Ok(zones),
                Err(err) => err.into_result(self.kind.id()),
            };
        }

        if inputs_seen == 0 {
            return ProbeResult::Unavailable(UnavailableReason::NotPresent);
        }

        match last_error {
            // Nothing readable at all: surface why.
            Some(err) if readings.is_empty() => err.into_result(self.kind.id()),
            _ => ProbeResult::Ok(readings),
        }
    }
}
