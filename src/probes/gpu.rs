use super::{ProbeError, ProbeKind, SensorProbe};
use crate::data::snapshot::{ProbeResult, Reading, Unit, UnavailableReason};
use nvml_wrapper::enum_wrappers::device::{Clock, TemperatureSensor};
use nvml_wrapper::error::NvmlError;
use nvml_wrapper::{Device, Nvml};
use tracing::info;

/// Max devices polled per tick.
const MAX_GPUS: u32 = 4;

enum Backend {
    /// NVML not loaded yet; first read decides.
    Pending,
    Ready(Nvml),
    /// Permanent outcome of the one-time detection.
    Unavailable(UnavailableReason),
}

/// Discrete NVIDIA GPU clocks, thermals and load through NVML.
pub struct GpuProbe {
    backend: Backend,
}

impl GpuProbe {
    pub fn new() -> Self {
        Self {
            backend: Backend::Pending,
        }
    }

    fn detect() -> Backend {
        match Nvml::init() {
            Ok(nvml) => match nvml.device_count() {
                Ok(count) if count > 0 => {
                    info!(devices = count, "NVML initialized");
                    Backend::Ready(nvml)
                }
                Ok(_) => {
                    info!("NVML loaded but reports no devices");
                    Backend::Unavailable(UnavailableReason::NotPresent)
                }
                Err(err) => Self::detection_failure(err),
            },
            Err(err) => Self::detection_failure(err),
        }
    }

    fn detection_failure(err: NvmlError) -> Backend {
        let reason = match err {
            NvmlError::NoPermission => UnavailableReason::PermissionDenied,
            _ => UnavailableReason::NotPresent,
        };
        info!("no usable NVIDIA GPU: {}", err);
        Backend::Unavailable(reason)
    }

    fn device_readings(index: u32, device: &Device<'_>, out: &mut Vec<Reading>) {
        let utilization = device.utilization_rates().ok();
        let fields = GpuFields {
            temp: device.temperature(TemperatureSensor::Gpu).ok(),
            load: utilization.as_ref().map(|u| u.gpu),
            memory_controller: utilization.as_ref().map(|u| u.memory),
            encoder: device.encoder_utilization().ok().map(|u| u.utilization),
            decoder: device.decoder_utilization().ok().map(|u| u.utilization),
            fan: device.fan_speed(0).ok(),
            core_clock: device.clock_info(Clock::Graphics).ok(),
            sm_clock: device.clock_info(Clock::SM).ok(),
            memory_clock: device.clock_info(Clock::Memory).ok(),
            video_clock: device.clock_info(Clock::Video).ok(),
        };
        fields.push_readings(index, out);
    }
}

/// Raw NVML values for one device. A field the device does not support is
/// `None` and produces no reading.
#[derive(Debug, Default)]
struct GpuFields {
    temp: Option<u32>,
    load: Option<u32>,
    memory_controller: Option<u32>,
    encoder: Option<u32>,
    decoder: Option<u32>,
    fan: Option<u32>,
    /// Clocks are MHz.
    core_clock: Option<u32>,
    sm_clock: Option<u32>,
    memory_clock: Option<u32>,
    video_clock: Option<u32>,
}

impl GpuFields {
    fn push_readings(&self, index: u32, out: &mut Vec<Reading>) {
        let id = ProbeKind::Gpu.id();
        let mut push = |name: &str, value: Option<u32>, unit: Unit, scale: f64| {
            if let Some(value) = value {
                out.extend(Reading::new(
                    id,
                    format!("GPU{} {}", index, name),
                    f64::from(value) * scale,
                    unit,
                ));
            }
        };

        push("Temp", self.temp, Unit::Celsius, 1.0);
        push("Load", self.load, Unit::Percent, 1.0);
        push("Mem ctl", self.memory_controller, Unit::Percent, 1.0);
        push("Encoder", self.encoder, Unit::Percent, 1.0);
        push("Decoder", self.decoder, Unit::Percent, 1.0);
        push("Fan", self.fan, Unit::Percent, 1.0);
        push("Core clk", self.core_clock, Unit::Hz, 1_000_000.0);
        push("SM clk", self.sm_clock, Unit::Hz, 1_000_000.0);
        push("Mem clk", self.memory_clock, Unit::Hz, 1_000_000.0);
        push("Video clk", self.video_clock, Unit::Hz, 1_000_000.0);
    }
}

impl Default for GpuProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorProbe for GpuProbe {
    fn source_id(&self) -> &str {
        ProbeKind::Gpu.id()
    }

    fn title(&self) -> &str {
        ProbeKind::Gpu.title()
    }

    fn read(&mut self) -> ProbeResult {
        if matches!(self.backend, Backend::Pending) {
            self.backend = Self::detect();
        }

        let nvml = match &self.backend {
            Backend::Ready(nvml) => nvml,
            Backend::Unavailable(reason) => return ProbeResult::Unavailable(*reason),
            Backend::Pending => return ProbeResult::Unavailable(UnavailableReason::NotPresent),
        };

        let count = match nvml.device_count() {
            Ok(count) => count,
            Err(err) => return ProbeError::from(err).into_result(ProbeKind::Gpu.id()),
        };

        let mut readings = Vec::new();
        for index in 0..count.min(MAX_GPUS) {
            match nvml.device_by_index(index) {
                Ok(device) => Self::device_readings(index, &device, &mut readings),
                Err(err) => return ProbeError::from(err).into_result(ProbeKind::Gpu.id()),
            }
        }
        ProbeResult::Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_become_labeled_readings() {
        let fields = GpuFields {
            temp: Some(64),
            load: Some(37),
            encoder: Some(12),
            decoder: Some(3),
            core_clock: Some(1815),
            ..GpuFields::default()
        };
        let mut readings = Vec::new();
        fields.push_readings(1, &mut readings);

        let labels: Vec<&str> = readings.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["GPU1 Temp", "GPU1 Load", "GPU1 Encoder", "GPU1 Decoder", "GPU1 Core clk"]
        );
        assert_eq!(readings[2].unit, Unit::Percent);
        assert_eq!(readings[2].value, 12.0);
        assert_eq!(readings[3].unit, Unit::Percent);
        assert_eq!(readings[4].value, 1_815_000_000.0);
        assert_eq!(readings[4].unit, Unit::Hz);
    }
}
