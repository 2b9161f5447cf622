//! Host telemetry - CPU temperature, utilisation, clock and root disk usage

use chrono::{DateTime, Local};
use std::path::Path;
use sysinfo::{Components, CpuRefreshKind, Disks, RefreshKind, System};

use crate::datalog::Record;
use crate::shared::format_optional;

#[derive(Debug, Clone, PartialEq)]
pub struct HostTelemetry {
    pub taken_at: DateTime<Local>,
    pub cpu_temp_c: Option<f32>,
    pub cpu_usage_percent: Option<f32>,
    pub cpu_clock_hz: Option<u64>,
    pub disk_usage_percent: Option<f64>,
}

impl Record for HostTelemetry {
    fn taken_at(&self) -> DateTime<Local> {
        self.taken_at
    }

    fn fields(&self) -> Vec<String> {
        vec![
            format_optional(self.cpu_temp_c.map(f64::from), 1),
            format_optional(self.cpu_usage_percent.map(f64::from), 2),
            self.cpu_clock_hz.map(|hz| hz.to_string()).unwrap_or_default(),
            format_optional(self.disk_usage_percent, 1),
        ]
    }
}

/// Keeps a `System` across samples so CPU usage covers the time since the
/// previous sample.
pub struct HostMonitor {
    sys: System,
}

impl HostMonitor {
    pub fn new() -> Self {
        let mut sys = System::new_with_specifics(
            RefreshKind::nothing().with_cpu(CpuRefreshKind::everything()),
        );
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_all();
        Self { sys }
    }

    pub fn sample(&mut self, taken_at: DateTime<Local>) -> HostTelemetry {
        self.sys.refresh_cpu_all();

        let cpu_usage_percent = if self.sys.cpus().is_empty() {
            None
        } else {
            Some(self.sys.global_cpu_usage())
        };
        let cpu_clock_hz = self
            .sys
            .cpus()
            .first()
            .map(|c| c.frequency())
            .filter(|mhz| *mhz > 0)
            .map(|mhz| mhz * 1_000_000);

        HostTelemetry {
            taken_at,
            cpu_temp_c: cpu_temperature(),
            cpu_usage_percent,
            cpu_clock_hz,
            disk_usage_percent: root_disk_usage(),
        }
    }
}

impl Default for HostMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// First thermal zone labelled as CPU, otherwise any zone with a reading
fn cpu_temperature() -> Option<f32> {
    let components = Components::new_with_refreshed_list();
    let readings: Vec<(String, f32)> = components
        .iter()
        .filter_map(|c| c.temperature().map(|t| (c.label().to_lowercase(), t)))
        .collect();

    readings
        .iter()
        .find(|(label, _)| label.contains("cpu"))
        .or_else(|| readings.first())
        .map(|(_, t)| *t)
}

fn root_disk_usage() -> Option<f64> {
    let disks = Disks::new_with_refreshed_list();
    let root = disks
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))?;
    usage_percent(root.total_space(), root.available_space())
}

fn usage_percent(total: u64, available: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(available);
    Some(used as f64 / total as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_usage_percent() {
        assert_eq!(usage_percent(0, 0), None);
        assert_eq!(usage_percent(200, 50), Some(75.0));
        assert_eq!(usage_percent(100, 150), Some(0.0));
    }

    #[test]
    fn test_fields_layout() {
        let taken_at = Local.with_ymd_and_hms(2022, 7, 1, 12, 0, 0).unwrap();
        let full = HostTelemetry {
            taken_at,
            cpu_temp_c: Some(48.3),
            cpu_usage_percent: Some(12.345),
            cpu_clock_hz: Some(1_500_000_000),
            disk_usage_percent: Some(41.26),
        };
        assert_eq!(full.fields(), vec!["48.3", "12.35", "1500000000", "41.3"]);

        let empty = HostTelemetry {
            taken_at,
            cpu_temp_c: None,
            cpu_usage_percent: None,
            cpu_clock_hz: None,
            disk_usage_percent: None,
        };
        assert_eq!(empty.fields(), vec!["", "", "", ""]);
    }
}
