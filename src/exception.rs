use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use log::{error, warn};

use crate::exit::VmFault;
use crate::hal::FaultSink;

/// Central fault collector.
///
/// Receives [`VmFault`]s from the core and the scheduler, logs each one by
/// category, and keeps per-VM counts for inspection. Handling stops there:
/// the manager never pauses or terminates a VM on its own.
#[derive(Default)]
pub struct ExceptionManager {
    counts: Mutex<HashMap<u32, u64>>,
}

impl ExceptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, u64>> {
        self.counts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of faults recorded for one VM.
    pub fn exception_count(&self, vm_id: u32) -> u64 {
        self.lock().get(&vm_id).copied().unwrap_or(0)
    }

    /// Number of faults recorded across all VMs.
    pub fn total_exceptions(&self) -> u64 {
        self.lock().values().sum()
    }

    /// Forget all recorded faults.
    pub fn reset(&self) {
        self.lock().clear();
    }
}

impl FaultSink for ExceptionManager {
    fn handle_vm_exception(&self, vm_id: u32, fault: VmFault) {
        match fault {
            VmFault::MemoryViolation => {
                error!("VM {}: {}", vm_id, fault.name());
            }
            VmFault::ResourceTimeout => {
                warn!("VM {}: {}", vm_id, fault.name());
            }
            VmFault::InvalidInstruction { opcode } => {
                warn!("VM {}: {} (opcode {:#04x})", vm_id, fault.name(), opcode);
            }
        }
        *self.lock().entry(vm_id).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_faults_per_vm() {
        let manager = ExceptionManager::new();
        assert_eq!(manager.exception_count(1), 0);

        manager.handle_vm_exception(1, VmFault::ResourceTimeout);
        manager.handle_vm_exception(1, VmFault::InvalidInstruction { opcode: 0xCC });
        manager.handle_vm_exception(2, VmFault::MemoryViolation);

        assert_eq!(manager.exception_count(1), 2);
        assert_eq!(manager.exception_count(2), 1);
        assert_eq!(manager.total_exceptions(), 3);
    }

    #[test]
    fn reset_forgets_history() {
        let manager = ExceptionManager::new();
        manager.handle_vm_exception(1, VmFault::ResourceTimeout);
        manager.reset();
        assert_eq!(manager.exception_count(1), 0);
        assert_eq!(manager.total_exceptions(), 0);
    }
}
