use crate::observability::metrics::Metrics;
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::time::sleep;

const SCRAPE_INTERVAL: Duration = Duration::from_secs(5);

/// Samples this process's cpu, memory and fd usage into `metrics` forever.
pub async fn collect_process_metrics(metrics: Arc<Metrics>, is_metrics_enabled: bool) -> Result<()> {
    if !is_metrics_enabled {
        return Ok(());
    }
    let mut sys = System::new();
    let pid = sysinfo::get_current_pid().map_err(|e| anyhow!("cannot resolve own pid: {}", e))?;

    let start_time_unix = Utc::now().timestamp();
    metrics.process_start_time.set(start_time_unix);

    loop {
        // Refresh just our process
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            false,
            ProcessRefreshKind::nothing().with_cpu().with_memory(),
        );

        if let Some(proc) = sys.process(pid) {
            metrics.process_cpu_usage.set(proc.cpu_usage().into());
            metrics.process_memory_usage.set(proc.memory() as i64);

            #[cfg(target_family = "unix")]
            {
                if let Ok(entries) = std::fs::read_dir(format!("/proc/{}/fd", pid.as_u32())) {
                    metrics.process_open_fds.set(entries.count() as i64);
                }
            }

            metrics.process_uptime.set(Utc::now().timestamp() - start_time_unix);
        }

        sleep(SCRAPE_INTERVAL).await;
    }
}
