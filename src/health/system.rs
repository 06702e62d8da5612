//! Host and process information attached to health reports.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::observability::recorder::format_uptime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadAverage {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryInfo {
    /// Resident set size of this process, e.g. `"42MB"`.
    pub rss: String,
    pub system_used: String,
    pub system_total: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub version: String,
    pub os: String,
    pub os_version: Option<String>,
    pub architecture: String,
    pub pid: u32,
    pub memory: MemoryInfo,
    pub load_average: LoadAverage,
    pub uptime: String,
}

impl SystemInfo {
    /// Sample the host. `uptime` is the service uptime, not the host's.
    pub fn collect(uptime: Duration) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();

        let rss_bytes = sysinfo::get_current_pid()
            .ok()
            .and_then(|pid| {
                sys.refresh_process(pid);
                sys.process(pid).map(|p| p.memory())
            })
            .unwrap_or(0);

        let load = System::load_average();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            os: std::env::consts::OS.to_string(),
            os_version: System::os_version(),
            architecture: std::env::consts::ARCH.to_string(),
            pid: std::process::id(),
            memory: MemoryInfo {
                rss: megabytes(rss_bytes),
                system_used: megabytes(sys.used_memory()),
                system_total: megabytes(sys.total_memory()),
            },
            load_average: LoadAverage {
                one: load.one,
                five: load.five,
                fifteen: load.fifteen,
            },
            uptime: format_uptime(uptime),
        }
    }
}

fn megabytes(bytes: u64) -> String {
    format!("{}MB", (bytes as f64 / 1024.0 / 1024.0).round() as u64)
}
