use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use log::{debug, info};

use crate::hal::PerfSink;

/// Aggregates per-VM run timings and instruction throughput.
///
/// Plugs into the core as a [`PerfSink`]; every completed run contributes
/// its wall-clock duration and instruction count. All counters reset
/// together via [`reset`](PerformanceMonitor::reset).
pub struct PerformanceMonitor {
    inner: Mutex<MonitorInner>,
}

struct MonitorInner {
    started_at: Instant,
    /// Open runs: VM id to the instant its start event arrived.
    open_runs: HashMap<u32, Instant>,
    /// Accumulated run time per VM, in milliseconds.
    exec_ms: HashMap<u32, u64>,
    completed_runs: u64,
    total_instructions: u64,
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MonitorInner {
                started_at: Instant::now(),
                open_runs: HashMap::new(),
                exec_ms: HashMap::new(),
                completed_runs: 0,
                total_instructions: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of VMs with an open run (started, not yet stopped).
    pub fn active_vm_count(&self) -> usize {
        self.lock().open_runs.len()
    }

    /// Instructions retired across all completed runs.
    pub fn total_instructions(&self) -> u64 {
        self.lock().total_instructions
    }

    /// Mean wall-clock duration of a completed run, in milliseconds.
    /// Zero when no run has completed.
    pub fn average_execution_time_ms(&self) -> u64 {
        let inner = self.lock();
        if inner.completed_runs == 0 {
            return 0;
        }
        inner.exec_ms.values().sum::<u64>() / inner.completed_runs
    }

    /// Overall throughput since construction (or the last reset).
    pub fn instructions_per_second(&self) -> f64 {
        let inner = self.lock();
        let elapsed = inner.started_at.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        inner.total_instructions as f64 / elapsed
    }

    /// Total accumulated run time of one VM, in milliseconds.
    pub fn vm_execution_time_ms(&self, vm_id: u32) -> u64 {
        self.lock().exec_ms.get(&vm_id).copied().unwrap_or(0)
    }

    /// Drop all samples and restart the throughput clock.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.started_at = Instant::now();
        inner.open_runs.clear();
        inner.exec_ms.clear();
        inner.completed_runs = 0;
        inner.total_instructions = 0;
    }

    /// Log a summary of everything collected so far.
    pub fn report(&self) {
        let inner = self.lock();
        info!("=== Performance Report ===");
        info!("Active VMs: {}", inner.open_runs.len());
        info!("Completed runs: {}", inner.completed_runs);
        info!("Total instructions: {}", inner.total_instructions);
        let mut vms: Vec<_> = inner.exec_ms.iter().collect();
        vms.sort_by_key(|(id, _)| **id);
        for (vm_id, ms) in vms {
            info!("VM {}: {} ms total execution time", vm_id, ms);
        }
    }
}

impl PerfSink for PerformanceMonitor {
    fn record_vm_start(&self, vm_id: u32) {
        let mut inner = self.lock();
        inner.open_runs.insert(vm_id, Instant::now());
        debug!("VM {} run started", vm_id);
    }

    fn record_vm_stop(&self, vm_id: u32, instructions: u64) {
        let mut inner = self.lock();
        // a stop without a matching start is dropped
        let Some(started) = inner.open_runs.remove(&vm_id) else {
            return;
        };
        let ms = started.elapsed().as_millis() as u64;
        *inner.exec_ms.entry(vm_id).or_insert(0) += ms;
        inner.completed_runs += 1;
        inner.total_instructions += instructions;
        debug!("VM {} run stopped after {} ms, {} instructions", vm_id, ms, instructions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_open_and_completed_runs() {
        let monitor = PerformanceMonitor::new();
        monitor.record_vm_start(1);
        monitor.record_vm_start(2);
        assert_eq!(monitor.active_vm_count(), 2);

        monitor.record_vm_stop(1, 500);
        assert_eq!(monitor.active_vm_count(), 1);
        assert_eq!(monitor.total_instructions(), 500);

        monitor.record_vm_stop(2, 250);
        assert_eq!(monitor.active_vm_count(), 0);
        assert_eq!(monitor.total_instructions(), 750);
    }

    #[test]
    fn unmatched_stop_is_ignored() {
        let monitor = PerformanceMonitor::new();
        monitor.record_vm_stop(9, 1_000_000);
        assert_eq!(monitor.total_instructions(), 0);
        assert_eq!(monitor.average_execution_time_ms(), 0);
    }

    #[test]
    fn repeated_runs_accumulate_per_vm_time() {
        let monitor = PerformanceMonitor::new();
        monitor.record_vm_start(1);
        monitor.record_vm_stop(1, 10);
        monitor.record_vm_start(1);
        monitor.record_vm_stop(1, 20);
        assert_eq!(monitor.total_instructions(), 30);
        // both runs were effectively instantaneous
        assert_eq!(monitor.vm_execution_time_ms(1), 0);
    }

    #[test]
    fn reset_clears_everything() {
        let monitor = PerformanceMonitor::new();
        monitor.record_vm_start(1);
        monitor.record_vm_stop(1, 42);
        monitor.record_vm_start(2);
        monitor.reset();
        assert_eq!(monitor.active_vm_count(), 0);
        assert_eq!(monitor.total_instructions(), 0);
        assert_eq!(monitor.vm_execution_time_ms(1), 0);
    }

    #[test]
    fn throughput_reflects_recorded_instructions() {
        let monitor = PerformanceMonitor::new();
        assert_eq!(monitor.instructions_per_second(), 0.0);
        monitor.record_vm_start(1);
        monitor.record_vm_stop(1, 1000);
        assert!(monitor.instructions_per_second() > 0.0);
    }
}
