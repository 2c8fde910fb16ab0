//! VCCIN from the CPU voltage regulator via the MSR pseudo-device.
//!
//! Needs `modprobe msr` and root. The value approximates the core voltage the
//! board supplies.

use super::{numbered_entries, ProbeContext, ProbeError, ProbeKind, SensorProbe};
use crate::data::snapshot::{ProbeResult, Reading, Unit, UnavailableReason};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::info;

/// IA32_PERF_STATUS
const PERF_STATUS_MSR: u64 = 0x198;

/// Decodes VCCIN volts from a raw IA32_PERF_STATUS value (bits 47:32, 1/8192 V).
pub fn vccin_from_register(raw: u64) -> f64 {
    (raw >> 32) as f64 / f64::from(1u32 << 13)
}

pub struct CpuVoltageProbe {
    /// `/dev/cpu/N/msr` per logical cpu; empty once absence is established.
    devices: Vec<(usize, PathBuf)>,
    can_elevate: bool,
    /// Set after the register has been read once.
    supported: bool,
}

/// EIO from the msr driver or a short read means the register does not exist
/// on this CPU (e.g. AMD parts).
fn is_unsupported_register(err: &ProbeError) -> bool {
    match err {
        ProbeError::Io { source, .. } => {
            source.kind() == io::ErrorKind::UnexpectedEof
                || source.raw_os_error() == Some(libc::EIO)
        }
        _ => false,
    }
}

impl CpuVoltageProbe {
    pub fn new(ctx: &ProbeContext) -> Self {
        let devices = Self::discover(&ctx.devfs_root.join("cpu"));
        if devices.is_empty() {
            info!("no MSR devices found, CPU voltage is not present (try `modprobe msr`)");
        }
        Self {
            devices,
            can_elevate: ctx.can_elevate,
            supported: false,
        }
    }

    fn discover(cpu_dev_dir: &Path) -> Vec<(usize, PathBuf)> {
        numbered_entries(cpu_dev_dir, "")
            .unwrap_or_default()
            .into_iter()
            .map(|(index, path)| (index, path.join("msr")))
            .filter(|(_, msr)| msr.exists())
            .collect()
    }

    fn read_register(path: &Path, register: u64) -> Result<u64, ProbeError> {
        let mut file = File::open(path).map_err(|err| ProbeError::from_io(path, err))?;
        file.seek(SeekFrom::Start(register))
            .map_err(|err| ProbeError::from_io(path, err))?;
        let mut buf = [0u8; 8];
        file.read_exact(&mut buf)
            .map_err(|err| ProbeError::from_io(path, err))?;
        Ok(u64::from_le_bytes(buf))
    }
}

impl SensorProbe for CpuVoltageProbe {
    fn source_id(&self) -> &str {
        ProbeKind::CpuVoltage.id()
    }

    fn title(&self) -> &str {
        ProbeKind::CpuVoltage.title()
    }

    fn requires_privilege(&self) -> bool {
        true
    }

    fn read(&mut self) -> ProbeResult {
        if self.devices.is_empty() {
            return ProbeResult::Unavailable(UnavailableReason::NotPresent);
        }
        if !self.can_elevate {
            return ProbeResult::Unavailable(UnavailableReason::PermissionDenied);
        }

        let mut readings = Vec::with_capacity(self.devices.len());
        let mut failure = None;
        for (index, path) in &self.devices {
            match Self::read_register(path, PERF_STATUS_MSR) {
                Ok(raw) => readings.extend(Reading::new(
                    self.source_id(),
                    format!("Core {} VCCIN", index),
                    vccin_from_register(raw),
                    Unit::Volt,
                )),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        if let Some(err) = failure {
            if !self.supported && is_unsupported_register(&err) {
                info!("CPU does not expose IA32_PERF_STATUS, CPU voltage is not present: {}", err);
                self.devices.clear();
                return ProbeResult::Unavailable(UnavailableReason::NotPresent);
            }
            return err.into_result(self.source_id());
        }
        self.supported = true;
        ProbeResult::Ok(readings)
    }
}
