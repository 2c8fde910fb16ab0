use crate::data::snapshot::Unit;
use crate::probes::ProbeKind;
use anyhow::Context;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Value bands for one panel. Readings at or above `warn` / `critical` are
/// highlighted; `unit` limits the bands to readings of that unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub warn: f64,
    pub critical: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
}

impl Thresholds {
    pub fn applies_to(&self, unit: Unit) -> bool {
        self.unit.map_or(true, |u| u == unit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorPair {
    pub fg: String,
    #[serde(default = "default_color")]
    pub bg: String,
}

fn default_color() -> String {
    "default".to_string()
}

impl ColorPair {
    fn new(fg: &str) -> Self {
        Self {
            fg: fg.to_string(),
            bg: default_color(),
        }
    }
}

/// Named color roles used by the renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteConfig {
    pub background: ColorPair,
    pub symbol: ColorPair,
    pub chip: ColorPair,
    pub title: ColorPair,
    pub date: ColorPair,
    pub quit_hint: ColorPair,
    pub sensor: ColorPair,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            background: ColorPair::new("default"),
            symbol: ColorPair::new("dark gray"),
            chip: ColorPair::new("dark cyan"),
            title: ColorPair::new("light green"),
            date: ColorPair::new("yellow"),
            quit_hint: ColorPair::new("dark gray"),
            sensor: ColorPair::new("light cyan"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sample_interval_ms: u64,
    pub render_interval_ms: u64,
    /// Samples kept per series. 3600 is one hour at the default cadence.
    pub history_capacity: usize,
    /// Consecutive failed reads before a panel is marked stale.
    pub failure_threshold: u32,
    pub probe_timeout_ms: u64,
    pub date_format: String,
    pub quit_hint: String,
    /// Panels in display order.
    pub probes: Vec<ProbeKind>,
    /// Sensor labels hidden from every panel.
    pub blacklist: Vec<String>,
    /// Keyed by probe id.
    pub thresholds: BTreeMap<String, Thresholds>,
    pub palette: PaletteConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let blacklist = [
            "PCH_CHIP_CPU_MAX_TEMP",
            "PCH_CHIP_TEMP",
            "PCH_CPU_TEMP",
            "AUXTIN1",
            "AUXTIN2",
            "AUXTIN3",
            "intrusion0",
            "intrusion1",
            "intrusion2",
            "fan3",
            "fan5",
            "beep_enable",
        ];

        let mut thresholds = BTreeMap::new();
        thresholds.insert(
            ProbeKind::CpuThermal.id().to_string(),
            Thresholds {
                warn: 70.0,
                critical: 85.0,
                unit: None,
            },
        );
        thresholds.insert(
            ProbeKind::SystemThermal.id().to_string(),
            Thresholds {
                warn: 60.0,
                critical: 80.0,
                unit: None,
            },
        );
        thresholds.insert(
            ProbeKind::Gpu.id().to_string(),
            Thresholds {
                warn: 75.0,
                critical: 90.0,
                unit: Some(Unit::Celsius),
            },
        );
        thresholds.insert(
            ProbeKind::CpuUsage.id().to_string(),
            Thresholds {
                warn: 75.0,
                critical: 95.0,
                unit: None,
            },
        );

        Self {
            sample_interval_ms: 1000,
            render_interval_ms: 1000,
            history_capacity: 3600,
            failure_threshold: 3,
            probe_timeout_ms: 250,
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
            quit_hint: "Press \"q\" to quit".to_string(),
            probes: ProbeKind::ALL.to_vec(),
            blacklist: blacklist.iter().map(|s| s.to_string()).collect(),
            thresholds,
            palette: PaletteConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the configuration.
    ///
    /// An explicit `path` must exist. Without one, the per-user default file
    /// is used, and written with defaults if it does not exist yet.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            return Self::load_file(path);
        }

        let Some(path) = Self::default_path() else {
            warn!("no config directory available, using defaults");
            return Ok(Self::default());
        };
        if path.exists() {
            return Self::load_file(&path);
        }

        let config = Self::default();
        match config.save(&path) {
            Ok(()) => info!(path = %path.display(), "wrote default config"),
            Err(err) => warn!(path = %path.display(), "could not write default config: {:#}", err),
        }
        Ok(config)
    }

    fn load_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::load_from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parse and validate config from a string.
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.sample_interval_ms > 0,
            "sample_interval_ms must be > 0, got {}",
            self.sample_interval_ms
        );
        anyhow::ensure!(
            self.render_interval_ms > 0,
            "render_interval_ms must be > 0, got {}",
            self.render_interval_ms
        );
        anyhow::ensure!(
            self.render_interval_ms >= self.sample_interval_ms,
            "render_interval_ms ({}) must be >= sample_interval_ms ({})",
            self.render_interval_ms,
            self.sample_interval_ms
        );
        anyhow::ensure!(
            self.history_capacity > 0,
            "history_capacity must be > 0, got {}",
            self.history_capacity
        );
        anyhow::ensure!(
            self.failure_threshold >= 1,
            "failure_threshold must be >= 1, got {}",
            self.failure_threshold
        );
        anyhow::ensure!(
            self.probe_timeout_ms > 0,
            "probe_timeout_ms must be > 0, got {}",
            self.probe_timeout_ms
        );
        anyhow::ensure!(
            !StrftimeItems::new(&self.date_format).any(|item| matches!(item, Item::Error)),
            "date_format `{}` is not a valid strftime format",
            self.date_format
        );
        anyhow::ensure!(!self.probes.is_empty(), "probes must list at least one probe");

        let mut seen = HashSet::new();
        for kind in &self.probes {
            anyhow::ensure!(seen.insert(*kind), "probes lists `{}` more than once", kind);
        }

        for (id, bands) in &self.thresholds {
            anyhow::ensure!(
                bands.warn <= bands.critical,
                "thresholds.{}: warn ({}) must be <= critical ({})",
                id,
                bands.warn,
                bands.critical
            );
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(path, self.to_toml()?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sensetop").join("config.toml"))
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn thresholds_for(&self, source_id: &str) -> Option<&Thresholds> {
        self.thresholds.get(source_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.history_capacity, 3600);
        assert_eq!(config.probes.len(), ProbeKind::ALL.len());
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = AppConfig::load_from_str("").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file_overrides_only_given_keys() {
        let config = AppConfig::load_from_str(
            r#"
sample_interval_ms = 500
probes = ["cpu_thermal", "gpu"]

[thresholds.cpu_thermal]
warn = 60.0
critical = 80.0
"#,
        )
        .unwrap();
        assert_eq!(config.sample_interval_ms, 500);
        assert_eq!(config.render_interval_ms, 1000);
        assert_eq!(config.probes, vec![ProbeKind::CpuThermal, ProbeKind::Gpu]);
        assert_eq!(config.thresholds_for("cpu_thermal").unwrap().warn, 60.0);
        assert!(config.thresholds_for("gpu").is_none());
    }

    #[test]
    fn test_rejects_render_faster_than_sample() {
        let err = AppConfig::load_from_str("sample_interval_ms = 2000\nrender_interval_ms = 1000")
            .unwrap_err();
        assert!(err.to_string().contains("render_interval_ms"));
    }

    #[test]
    fn test_rejects_duplicate_probe() {
        let err = AppConfig::load_from_str(r#"probes = ["fan", "fan"]"#).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_rejects_bad_date_format() {
        let err = AppConfig::load_from_str(r#"date_format = "%Y %Q""#).unwrap_err();
        assert!(err.to_string().contains("date_format"));
    }

    #[test]
    fn test_rejects_unknown_probe() {
        assert!(AppConfig::load_from_str(r#"probes = ["disk"]"#).is_err());
    }

    #[test]
    fn test_toml_output_parses_back() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(AppConfig::load_from_str(&text).unwrap(), config);
    }

    #[test]
    fn test_thresholds_unit_filter() {
        let config = AppConfig::default();
        let gpu = config.thresholds_for("gpu").unwrap();
        assert!(gpu.applies_to(Unit::Celsius));
        assert!(!gpu.applies_to(Unit::Hz));
    }
}
