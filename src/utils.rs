use crate::data::snapshot::Unit;

/// Format a reading for display, scaled to a readable magnitude.
pub fn format_value(value: f64, unit: Unit) -> String {
    match unit {
        Unit::Hz if value >= 1e9 => format!("{:.2} GHz", value / 1e9),
        Unit::Hz if value >= 1e6 => format!("{:.0} MHz", value / 1e6),
        Unit::Hz => format!("{:.0} Hz", value),
        Unit::Celsius => format!("{:.1}°C", value),
        Unit::Volt => format!("{:.3} V", value),
        Unit::Percent => format!("{:.1}%", value),
        Unit::Rpm => format!("{:.0} RPM", value),
    }
}

/// Like [`format_value`], or a dash when there is nothing to show.
pub fn format_opt(value: Option<f64>, unit: Unit) -> String {
    value.map_or_else(|| "-".to_string(), |v| format_value(v, unit))
}

/// Truncate `s` to `width` characters, marking the cut with `…`.
pub fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut out: String = s.chars().take(width - 1).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_frequency() {
        assert_eq!(format_value(3_400_000_000.0, Unit::Hz), "3.40 GHz");
        assert_eq!(format_value(800_000_000.0, Unit::Hz), "800 MHz");
        assert_eq!(format_value(50.0, Unit::Hz), "50 Hz");
    }

    #[test]
    fn test_format_other_units() {
        assert_eq!(format_value(55.04, Unit::Celsius), "55.0°C");
        assert_eq!(format_value(1.2, Unit::Volt), "1.200 V");
        assert_eq!(format_value(12.345, Unit::Percent), "12.3%");
        assert_eq!(format_value(1200.4, Unit::Rpm), "1200 RPM");
        assert_eq!(format_opt(None, Unit::Rpm), "-");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Core 10", 10), "Core 10");
        assert_eq!(truncate("coretemp Package id 0", 8), "coretem…");
        assert_eq!(truncate("abc", 0), "");
    }
}
