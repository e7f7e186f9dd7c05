use crate::exit::VmFault;

/// Consumer of performance events emitted by the core.
///
/// The core emits exactly one start/stop pair per observed run: `start`
/// opens a run, pauses and resumes inside it do not re-emit, and the stop
/// reports the number of instructions the VM's own counter observed.
pub trait PerfSink: Send + Sync {
    /// A VM entered the Running state for a new run.
    fn record_vm_start(&self, vm_id: u32);
    /// A VM left its run, having executed `instructions` instructions.
    fn record_vm_stop(&self, vm_id: u32, instructions: u64);
}

/// Consumer of fault events emitted by the core.
///
/// The core reports faults at the point of detection; whatever the sink does
/// with them (log, pause, terminate) is outside the core's scope.
pub trait FaultSink: Send + Sync {
    /// A fault was detected on the given VM.
    fn handle_vm_exception(&self, vm_id: u32, fault: VmFault);
}
