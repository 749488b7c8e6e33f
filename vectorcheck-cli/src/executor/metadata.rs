//! System Metadata Collection
//!
//! Report metadata: tool version, UTC timestamp, host and run settings.

use chrono::Utc;
use vectorcheck_report::{REPORT_SCHEMA_VERSION, ReportConfig, ReportMeta, SystemInfo};

/// Build report metadata for a run with the given settings
pub fn build_report_meta(config: ReportConfig) -> ReportMeta {
    ReportMeta {
        schema_version: REPORT_SCHEMA_VERSION,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
        system: system_info(),
        config,
    }
}

fn system_info() -> SystemInfo {
    SystemInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        hostname: hostname().unwrap_or_else(|| "unknown".to_string()),
        cpu_cores: num_cpus(),
    }
}

/// Hostname from the environment or /etc/hostname
fn hostname() -> Option<String> {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}
