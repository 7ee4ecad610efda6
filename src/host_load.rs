//! Host-load sampling for the adaptive backpressure policy (§4.5, §5).
//!
//! The Python source called `psutil.cpu_percent` directly inline in the
//! processing loop. This port pulls it behind a trait so the
//! backpressure decision table can be tested without depending on actual
//! host load.

/// A point-in-time sample of host resource usage, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// A source of [`LoadSample`]s. Implementations may block briefly to
/// take a real measurement (sampling CPU utilization typically requires
/// observing it over a short interval).
pub trait HostLoad: Send + Sync {
    fn sample(&self) -> LoadSample;
}

/// Samples `/proc/stat` twice across a short interval to compute CPU
/// utilization, and `/proc/meminfo` for memory pressure. Falls back to a
/// conservative idle reading if either file is unreadable (a host that
/// cannot be measured should not block progress).
pub struct ProcStatHostLoad {
    pub sample_interval_ms: u64,
}

impl Default for ProcStatHostLoad {
    fn default() -> Self {
        ProcStatHostLoad { sample_interval_ms: 100 }
    }
}

impl HostLoad for ProcStatHostLoad {
    fn sample(&self) -> LoadSample {
        let cpu_percent = read_cpu_percent(self.sample_interval_ms).unwrap_or(0.0);
        let memory_percent = read_memory_percent().unwrap_or(0.0);
        LoadSample { cpu_percent, memory_percent }
    }
}

fn read_proc_stat_totals() -> Option<(u64, u64)> {
    let contents = std::fs::read_to_string("/proc/stat").ok()?;
    let line = contents.lines().next()?;
    let mut fields = line.split_whitespace();
    if fields.next()? != "cpu" {
        return None;
    }
    let values: Vec<u64> = fields.filter_map(|f| f.parse().ok()).collect();
    if values.len() < 4 {
        return None;
    }
    let idle = values[3] + values.get(4).copied().unwrap_or(0);
    let total: u64 = values.iter().sum();
    Some((total, idle))
}

fn read_cpu_percent(interval_ms: u64) -> Option<f64> {
    let (total_a, idle_a) = read_proc_stat_totals()?;
    std::thread::sleep(std::time::Duration::from_millis(interval_ms));
    let (total_b, idle_b) = read_proc_stat_totals()?;

    let total_delta = total_b.saturating_sub(total_a);
    let idle_delta = idle_b.saturating_sub(idle_a);
    if total_delta == 0 {
        return Some(0.0);
    }
    Some(100.0 * (1.0 - idle_delta as f64 / total_delta as f64))
}

fn read_memory_percent() -> Option<f64> {
    let contents = std::fs::read_to_string("/proc/meminfo").ok()?;
    let mut total = None;
    let mut available = None;
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total = parse_kb(rest);
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available = parse_kb(rest);
        }
    }
    let (total, available) = (total?, available?);
    if total == 0.0 {
        return Some(0.0);
    }
    Some(100.0 * (1.0 - available / total))
}

fn parse_kb(s: &str) -> Option<f64> {
    s.trim().trim_end_matches(" kB").trim().parse().ok()
}

/// A fixed-reading test double.
#[derive(Debug, Clone, Copy)]
pub struct FixedHostLoad(pub LoadSample);

impl HostLoad for FixedHostLoad {
    fn sample(&self) -> LoadSample {
        self.0
    }
}
