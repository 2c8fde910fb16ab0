use super::{ProbeKind, SensorProbe};
use crate::data::snapshot::{ProbeResult, Reading, Unit, UnavailableReason};
use sysinfo::{CpuExt, System, SystemExt};

/// Global and per-core utilization via `sysinfo`.
pub struct CpuUsageProbe {
    system: System,
}

impl CpuUsageProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        // Usage is a delta between refreshes; prime the first sample.
        system.refresh_cpu();
        Self { system }
    }
}

impl Default for CpuUsageProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorProbe for CpuUsageProbe {
    fn source_id(&self) -> &str {
        ProbeKind::CpuUsage.id()
    }

    fn title(&self) -> &str {
        ProbeKind::CpuUsage.title()
    }

    fn read(&mut self) -> ProbeResult {
        self.system.refresh_cpu();
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return ProbeResult::Unavailable(UnavailableReason::NotPresent);
        }

        let id = ProbeKind::CpuUsage.id();
        let total = self.system.global_cpu_info().cpu_usage();
        let mut readings = Vec::with_capacity(cpus.len() + 1);
        readings.extend(Reading::new(id, "Total", f64::from(total), Unit::Percent));
        for (index, cpu) in cpus.iter().enumerate() {
            readings.extend(Reading::new(
                id,
                format!("Core {}", index),
                f64::from(cpu.cpu_usage()),
                Unit::Percent,
            ));
        }
        ProbeResult::Ok(readings)
    }
}
