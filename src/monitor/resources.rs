//! Process resource counters.

use std::fmt::Debug;

use serde::Serialize;

/// Resource readings for the current process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResourceUsage {
    /// Resident memory as a percentage of total system memory
    pub memory_usage_pct: f64,
    /// User plus system CPU time consumed so far
    pub cpu_seconds: f64,
    pub resident_bytes: u64,
}

/// Source of process resource readings.
pub trait ResourceProbe: Send + Sync + Debug {
    fn read(&self) -> ResourceUsage;
}

// == Procfs Probe ==
/// Reads `/proc` on Linux. Elsewhere, or when a file is unreadable, the
/// affected fields read as zero.
#[derive(Debug, Clone)]
pub struct ProcfsProbe {
    page_size: u64,
    clock_ticks: f64,
}

impl Default for ProcfsProbe {
    fn default() -> Self {
        Self {
            page_size: 4096,
            clock_ticks: 100.0,
        }
    }
}

impl ProcfsProbe {
    fn resident_bytes(&self) -> Option<u64> {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        parse_statm_resident_pages(&statm).map(|pages| pages * self.page_size)
    }

    fn total_memory_bytes(&self) -> Option<u64> {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_meminfo_total_kb(&meminfo).map(|kb| kb * 1024)
    }

    fn cpu_seconds(&self) -> Option<f64> {
        let stat = std::fs::read_to_string("/proc/self/stat").ok()?;
        parse_stat_cpu_ticks(&stat).map(|ticks| ticks as f64 / self.clock_ticks)
    }
}

impl ResourceProbe for ProcfsProbe {
    fn read(&self) -> ResourceUsage {
        let resident_bytes = self.resident_bytes().unwrap_or(0);
        let memory_usage_pct = match self.total_memory_bytes() {
            Some(total) if total > 0 => resident_bytes as f64 / total as f64 * 100.0,
            _ => 0.0,
        };
        ResourceUsage {
            memory_usage_pct,
            cpu_seconds: self.cpu_seconds().unwrap_or(0.0),
            resident_bytes,
        }
    }
}

/// Fixed readings, for tests and for hosts without a usable probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticProbe(pub ResourceUsage);

impl ResourceProbe for StaticProbe {
    fn read(&self) -> ResourceUsage {
        self.0
    }
}

fn parse_statm_resident_pages(statm: &str) -> Option<u64> {
    statm.split_whitespace().nth(1)?.parse().ok()
}

fn parse_meminfo_total_kb(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find(|line| line.starts_with("MemTotal:"))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()
}

/// utime + stime from `/proc/<pid>/stat`. The command name may contain
/// spaces, so fields are counted from the closing parenthesis.
fn parse_stat_cpu_ticks(stat: &str) -> Option<u64> {
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // After the name: state is field 3, utime is 14 and stime 15.
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(utime + stime)
}
