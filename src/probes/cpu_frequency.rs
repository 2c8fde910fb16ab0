use super::{numbered_entries, read_number, ProbeContext, ProbeError, ProbeKind, SensorProbe};
use crate::data::snapshot::{ProbeResult, Reading, Unit, UnavailableReason};
use std::path::PathBuf;

/// Per-core clock from cpufreq, falling back to `/proc/cpuinfo`.
pub struct CpuFrequencyProbe {
    cpu_dir: PathBuf,
    cpuinfo: PathBuf,
}

impl CpuFrequencyProbe {
    pub fn new(ctx: &ProbeContext) -> Self {
        Self {
            cpu_dir: ctx.sysfs_root.join("devices/system/cpu"),
            cpuinfo: ctx.procfs_root.join("cpuinfo"),
        }
    }

    /// Frequencies in Hz indexed by logical cpu; `None` where cpufreq is absent.
    fn read_cpufreq(&self) -> Result<Vec<(usize, Option<f64>)>, ProbeError> {
        let cpus = match numbered_entries(&self.cpu_dir, "cpu") {
            Ok(cpus) => cpus,
            Err(ProbeError::NotFound(_)) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut out = Vec::with_capacity(cpus.len());
        for (index, cpu_path) in cpus {
            let mut value = None;
            for file in ["scaling_cur_freq", "cpuinfo_cur_freq"] {
                match read_number(&cpu_path.join("cpufreq").join(file)) {
                    // cpufreq exports kHz
                    Ok(khz) if khz > 0.0 => {
                        value = Some(khz * 1000.0);
                        break;
                    }
                    Ok(_) | Err(ProbeError::NotFound(_)) => continue,
                    // cpuinfo_cur_freq is root-only on most kernels
                    Err(ProbeError::PermissionDenied(_)) => continue,
                    Err(err) => return Err(err),
                }
            }
            out.push((index, value));
        }
        Ok(out)
    }

    /// `cpu MHz` lines from `/proc/cpuinfo`, keyed by `processor`.
    fn read_cpuinfo(&self) -> Result<Vec<(usize, f64)>, ProbeError> {
        let content = std::fs::read_to_string(&self.cpuinfo)
            .map_err(|err| ProbeError::from_io(&self.cpuinfo, err))?;

        let mut out = Vec::new();
        let mut current: Option<usize> = None;
        for line in content.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            match key.trim() {
                "processor" => current = value.trim().parse().ok(),
                "cpu MHz" => {
                    if let (Some(index), Ok(mhz)) = (current, value.trim().parse::<f64>()) {
                        out.push((index, mhz * 1_000_000.0));
                    }
                }
                _ => {}
            }
        }
        Ok(out)
    }

    fn reading(index: usize, hz: f64) -> Option<Reading> {
        Reading::new(
            ProbeKind::CpuFrequency.id(),
            format!("Core {}", index),
            hz,
            Unit::Hz,
        )
    }
}

impl SensorProbe for CpuFrequencyProbe {
    fn source_id(&self) -> &str {
        ProbeKind::CpuFrequency.id()
    }

    fn title(&self) -> &str {
        ProbeKind::CpuFrequency.title()
    }

    fn read(&mut self) -> ProbeResult {
        let cpufreq = match self.read_cpufreq() {
            Ok(values) => values,
            Err(err) => return err.into_result(self.source_id()),
        };

        if cpufreq.iter().any(|(_, value)| value.is_some()) {
            let readings = cpufreq
                .into_iter()
                .filter_map(|(index, value)| Self::reading(index, value?))
                .collect();
            return ProbeResult::Ok(readings);
        }

        match self.read_cpuinfo() {
            Ok(values) if values.is_empty() => {
                ProbeResult::Unavailable(UnavailableReason::NotPresent)
            }
            Ok(values) => ProbeResult::Ok(
                values
                    .into_iter()
                    .filter_map(|(index, hz)| Self::reading(index, hz))
                    .collect(),
            ),
            Err(err) => err.into_result(self.source_id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn context(root: &Path) -> ProbeContext {
        ProbeContext {
            can_elevate: false,
            blacklist: Vec::new(),
            sysfs_root: root.join("sys"),
            procfs_root: root.join("proc"),
            devfs_root: root.join("dev"),
        }
    }

    #[test]
    fn test_reads_cpufreq_khz_as_hz() {
        let dir = tempfile::tempdir().unwrap();
        let cpu_dir = dir.path().join("sys/devices/system/cpu");
        for (cpu, khz) in [(0, "3400000"), (1, "800000")] {
            let freq_dir = cpu_dir.join(format!("cpu{}/cpufreq", cpu));
            fs::create_dir_all(&freq_dir).unwrap();
            fs::write(freq_dir.join("scaling_cur_freq"), khz).unwrap();
        }

        let mut probe = CpuFrequencyProbe::new(&context(dir.path()));
        let result = probe.read();
        let readings = result.readings();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].label, "Core 0");
        assert_eq!(readings[0].value, 3.4e9);
        assert_eq!(readings[1].value, 8.0e8);
    }

    #[test]
    fn test_falls_back_to_proc_cpuinfo() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sys/devices/system/cpu/cpu0")).unwrap();
        fs::create_dir_all(dir.path().join("proc")).unwrap();
        fs::write(
            dir.path().join("proc/cpuinfo"),
            "processor\t: 0\ncpu MHz\t\t: 2100.000\n\nprocessor\t: 1\ncpu MHz\t\t: 1800.500\n",
        )
        .unwrap();

        let mut probe = CpuFrequencyProbe::new(&context(dir.path()));
        let result = probe.read();
        let readings = result.readings();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[1].label, "Core 1");
        assert_eq!(readings[1].value, 1_800_500_000.0);
    }

    #[test]
    fn test_nothing_available_is_not_present() {
        let dir = tempfile::tempdir().unwrap();
        let mut probe = CpuFrequencyProbe::new(&context(dir.path()));
        assert_eq!(
            probe.read(),
            ProbeResult::Unavailable(UnavailableReason::NotPresent)
        );
    }
}
