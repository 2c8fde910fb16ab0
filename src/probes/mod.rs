//! Sensor probes, one per telemetry family.
//!
//! Every probe implements [`SensorProbe`]. A probe owns whatever cached state
//! its backend needs (an NVML handle, a `sysinfo::System`, the result of a
//! one-time presence check) and turns every failure into
//! [`ProbeResult::Unavailable`] instead of returning an error.

use crate::data::snapshot::{ProbeResult, UnavailableReason};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub mod cpu_frequency;
pub mod cpu_usage;
pub mod cpu_voltage;
pub mod gpu;
pub mod hwmon;

/// Synchronous "read now" capability shared by every telemetry family.
///
/// Reads run on a worker thread so a hung backend can be abandoned at its
/// time budget, hence the `Send` bound.
pub trait SensorProbe: Send {
    /// Stable identifier; one panel and one snapshot entry per id.
    fn source_id(&self) -> &str;

    /// Human title of the panel fed by this probe.
    fn title(&self) -> &str;

    /// Whether the backend needs root (e.g. MSR registers).
    fn requires_privilege(&self) -> bool {
        false
    }

    fn read(&mut self) -> ProbeResult;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    CpuFrequency,
    CpuThermal,
    CpuVoltage,
    SystemVoltage,
    SystemThermal,
    Fan,
    CpuUsage,
    Gpu,
}

impl ProbeKind {
    pub const ALL: [ProbeKind; 8] = [
        ProbeKind::CpuFrequency,
        ProbeKind::CpuThermal,
        ProbeKind::CpuVoltage,
        ProbeKind::SystemVoltage,
        ProbeKind::SystemThermal,
        ProbeKind::Fan,
        ProbeKind::CpuUsage,
        ProbeKind::Gpu,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ProbeKind::CpuFrequency => "cpu_frequency",
            ProbeKind::CpuThermal => "cpu_thermal",
            ProbeKind::CpuVoltage => "cpu_voltage",
            ProbeKind::SystemVoltage => "system_voltage",
            ProbeKind::SystemThermal => "system_thermal",
            ProbeKind::Fan => "fan",
            ProbeKind::CpuUsage => "cpu_usage",
            ProbeKind::Gpu => "gpu",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ProbeKind::CpuFrequency => "CPU Frequency",
            ProbeKind::CpuThermal => "CPU Temperature",
            ProbeKind::CpuVoltage => "CPU Voltage",
            ProbeKind::SystemVoltage => "System Voltages",
            ProbeKind::SystemThermal => "System Temperatures",
            ProbeKind::Fan => "Fans",
            ProbeKind::CpuUsage => "CPU Usage",
            ProbeKind::Gpu => "GPU",
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Facts fixed at registration time that probes adapt to.
#[derive(Clone, Debug)]
pub struct ProbeContext {
    /// Effective uid is root, so privileged registers may be opened.
    pub can_elevate: bool,
    /// Sensor labels dropped by the hwmon-backed probes.
    pub blacklist: Vec<String>,
    pub sysfs_root: PathBuf,
    pub procfs_root: PathBuf,
    pub devfs_root: PathBuf,
}

impl ProbeContext {
    pub fn detect(blacklist: Vec<String>) -> Self {
        Self {
            can_elevate: effective_root(),
            blacklist,
            sysfs_root: PathBuf::from("/sys"),
            procfs_root: PathBuf::from("/proc"),
            devfs_root: PathBuf::from("/dev"),
        }
    }

    pub fn is_blacklisted(&self, label: &str) -> bool {
        self.blacklist.iter().any(|entry| entry == label)
    }
}

#[cfg(unix)]
fn effective_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn effective_root() -> bool {
    false
}

/// Failures inside a probe backend. Never crosses the probe boundary; it is
/// logged and folded into an [`UnavailableReason`].
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{0} is not supported on this platform")]
    Unsupported(ProbeKind),

    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("permission denied opening {}", .0.display())]
    PermissionDenied(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unexpected value {value:?} in {}", path.display())]
    Parse { path: PathBuf, value: String },

    #[error("NVML: {0}")]
    Nvml(#[from] nvml_wrapper::error::NvmlError),
}

impl ProbeError {
    pub(crate) fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ProbeError::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => ProbeError::PermissionDenied(path.to_path_buf()),
            _ => ProbeError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    pub fn reason(&self) -> UnavailableReason {
        match self {
            ProbeError::Unsupported(_) | ProbeError::NotFound(_) => UnavailableReason::NotPresent,
            ProbeError::PermissionDenied(_) => UnavailableReason::PermissionDenied,
            ProbeError::Nvml(nvml_wrapper::error::NvmlError::NoPermission) => {
                UnavailableReason::PermissionDenied
            }
            ProbeError::Io { .. } | ProbeError::Parse { .. } | ProbeError::Nvml(_) => {
                UnavailableReason::TransientError
            }
        }
    }

    /// Logs the failure and converts it into a probe outcome.
    pub(crate) fn into_result(self, source_id: &str) -> ProbeResult {
        let reason = self.reason();
        match reason {
            UnavailableReason::TransientError => warn!(probe = source_id, "{}", self),
            _ => tracing::debug!(probe = source_id, "{}", self),
        }
        ProbeResult::Unavailable(reason)
    }
}

pub(crate) fn read_trimmed(path: &Path) -> Result<String, ProbeError> {
    std::fs::read_to_string(path)
        .map(|raw| raw.trim().to_string())
        .map_err(|err| ProbeError::from_io(path, err))
}

pub(crate) fn read_number(path: &Path) -> Result<f64, ProbeError> {
    let raw = read_trimmed(path)?;
    raw.parse::<f64>().map_err(|_| ProbeError::Parse {
        path: path.to_path_buf(),
        value: raw,
    })
}

/// Numeric suffix of names like `cpu12`, `hwmon3`, `thermal_zone0`.
pub(crate) fn numeric_suffix(name: &str, prefix: &str) -> Option<usize> {
    name.strip_prefix(prefix)?.parse().ok()
}

/// Children of `dir` named `<prefix><N>`, sorted by `N`.
pub(crate) fn numbered_entries(dir: &Path, prefix: &str) -> Result<Vec<(usize, PathBuf)>, ProbeError> {
    let entries = std::fs::read_dir(dir).map_err(|err| ProbeError::from_io(dir, err))?;
    let mut out: Vec<(usize, PathBuf)> = entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let index = numeric_suffix(&name.to_string_lossy(), prefix)?;
            Some((index, entry.path()))
        })
        .collect();
    out.sort_by_key(|(index, _)| *index);
    Ok(out)
}

pub fn build(kind: ProbeKind, ctx: &ProbeContext) -> Result<Box<dyn SensorProbe>, ProbeError> {
    match kind {
        ProbeKind::CpuUsage => Ok(Box::new(cpu_usage::CpuUsageProbe::new())),
        ProbeKind::Gpu => Ok(Box::new(gpu::GpuProbe::new())),
        _ if !cfg!(target_os = "linux") => Err(ProbeError::Unsupported(kind)),
        ProbeKind::CpuFrequency => Ok(Box::new(cpu_frequency::CpuFrequencyProbe::new(ctx))),
        ProbeKind::CpuVoltage => Ok(Box::new(cpu_voltage::CpuVoltageProbe::new(ctx))),
        ProbeKind::CpuThermal
        | ProbeKind::SystemThermal
        | ProbeKind::SystemVoltage
        | ProbeKind::Fan => Ok(Box::new(hwmon::HwmonProbe::new(kind, ctx))),
    }
}

/// Builds every configured probe, skipping (and logging) the ones that
/// cannot exist on this platform.
pub fn register_all(kinds: &[ProbeKind], ctx: &ProbeContext) -> Vec<Box<dyn SensorProbe>> {
    let mut probes = Vec::with_capacity(kinds.len());
    for &kind in kinds {
        match build(kind, ctx) {
            Ok(probe) => {
                if probe.requires_privilege() && !ctx.can_elevate {
                    warn!(
                        probe = kind.id(),
                        "running without root, panel will show a permission notice"
                    );
                }
                info!(probe = kind.id(), "registered probe");
                probes.push(probe);
            }
            Err(err) => warn!(probe = kind.id(), "not registered: {}", err),
        }
    }
    probes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_kind_ids_are_unique() {
        let mut ids: Vec<&str> = ProbeKind::ALL.iter().map(|kind| kind.id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), ProbeKind::ALL.len());
    }

    #[test]
    fn test_io_errors_map_to_reasons() {
        let path = Path::new("/sys/class/hwmon/hwmon0/in0_input");
        let denied = ProbeError::from_io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(denied.reason(), UnavailableReason::PermissionDenied);

        let missing = ProbeError::from_io(path, io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(missing.reason(), UnavailableReason::NotPresent);

        let other = ProbeError::from_io(path, io::Error::from(io::ErrorKind::TimedOut));
        assert_eq!(other.reason(), UnavailableReason::TransientError);
    }

    #[test]
    fn test_numbered_entries_sorts_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["cpu10", "cpu2", "cpu0", "cpufreq", "online"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        let indices: Vec<usize> = numbered_entries(dir.path(), "cpu")
            .unwrap()
            .into_iter()
            .map(|(index, _)| index)
            .collect();
        assert_eq!(indices, vec![0, 2, 10]);
    }
}
