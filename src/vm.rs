use std::cell::Cell;
use std::sync::{Arc, Mutex, MutexGuard};

use axerrno::{ax_err, AxResult};
use log::{debug, info, warn};

use crate::arch_vm::AxArchVm;
use crate::context::VmContext;
use crate::exit::{StepExit, VmFault};
use crate::hal::{FaultSink, PerfSink};

/// Number of instructions executed back-to-back in one time slice.
pub const SLICE_INSTRUCTIONS: u32 = 10;

/// Default resource limit: maximum instruction count before auto-pause.
pub const DEFAULT_RESOURCE_LIMIT: u32 = 10_000;

/// The lifecycle state of a virtual machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VmState {
    /// The VM is created but has never run.
    Created = 0,
    /// The VM is executing (or eligible to execute) instructions.
    Running = 1,
    /// The VM is paused; its state lives in its saved context.
    Paused = 2,
    /// The VM is stopped, either normally or by a supervisor.
    Stopped = 3,
}

/// What to do when decode meets an opcode outside the modeled subset.
///
/// The instruction retires as a no-op either way; `Report` additionally
/// surfaces an [`VmFault::InvalidInstruction`] to the fault sink.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OpcodePolicy {
    /// Silently skip unknown opcodes.
    #[default]
    Ignore,
    /// Skip, but report the opcode to the fault sink.
    Report,
}

/// The constant part of [`AxVm`].
struct AxVmInnerConst {
    /// Process-unique VM id, immutable after construction.
    id: u32,
}

/// The mutable part of [`AxVm`], guarded by the VM's own lock.
struct AxVmInnerMut<A: AxArchVm> {
    state: VmState,
    context: VmContext,
    /// Shared immutable view of the instruction payload. Never copied or
    /// mutated; the engine never reads past its length.
    payload: Option<Arc<[u8]>>,
    instruction_count: u32,
    resource_limit: u32,
    policy: OpcodePolicy,
    /// True between a start event and its matching stop event.
    run_open: bool,
    perf: Option<Arc<dyn PerfSink>>,
    faults: Option<Arc<dyn FaultSink>>,
    /// The architecture-specific engine: register file plus decode/execute.
    arch: A,
}

/// A virtual machine with an architecture-independent interface.
///
/// By delegating the architecture-specific operations to a struct
/// implementing [`AxArchVm`], this struct provides a unified lifecycle and
/// context management model for machines of different architectures.
///
/// All mutable state sits behind one lock intrinsic to the VM object, so a
/// scheduler thread and a direct caller can both hold a handle; almost all
/// methods take `&self`. Note that the lock does not stop two callers from
/// interleaving whole operations on the same VM — drive a scheduler-managed
/// VM directly at your own risk.
pub struct AxVm<A: AxArchVm> {
    inner_const: AxVmInnerConst,
    inner_mut: Mutex<AxVmInnerMut<A>>,
}

impl<A: AxArchVm> AxVm<A> {
    /// Create a new VM with a zeroed register file and context.
    pub fn new(id: u32, arch_config: A::CreateConfig) -> AxResult<Self> {
        Ok(Self {
            inner_const: AxVmInnerConst { id },
            inner_mut: Mutex::new(AxVmInnerMut {
                state: VmState::Created,
                context: VmContext::new(),
                payload: None,
                instruction_count: 0,
                resource_limit: DEFAULT_RESOURCE_LIMIT,
                policy: OpcodePolicy::Ignore,
                run_open: false,
                perf: None,
                faults: None,
                arch: A::new(arch_config)?,
            }),
        })
    }

    /// Get the id of the VM.
    pub const fn id(&self) -> u32 {
        self.inner_const.id
    }

    fn lock(&self) -> MutexGuard<'_, AxVmInnerMut<A>> {
        // A poisoned lock means a panic mid-step; the register state is still
        // consistent at instruction granularity, so keep going.
        self.inner_mut.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get the lifecycle state of the VM.
    pub fn state(&self) -> VmState {
        self.lock().state
    }

    /// Install the performance event sink.
    pub fn set_perf_sink(&self, sink: Arc<dyn PerfSink>) {
        self.lock().perf = Some(sink);
    }

    /// Install the fault event sink.
    pub fn set_fault_sink(&self, sink: Arc<dyn FaultSink>) {
        self.lock().faults = Some(sink);
    }

    /// Set the unknown-opcode policy (default: ignore).
    pub fn set_opcode_policy(&self, policy: OpcodePolicy) {
        self.lock().policy = policy;
    }

    /// Install the instruction stream.
    ///
    /// The VM keeps a shared view of the buffer, not a copy, and never reads
    /// past its length. Must be called before `start()`'s first step for
    /// deterministic behavior.
    pub fn set_payload(&self, payload: Arc<[u8]>) {
        self.lock().payload = Some(payload);
    }

    /// Start the VM. Fails if it is already running.
    pub fn start(&self) -> AxResult {
        let mut inner = self.lock();
        if inner.state == VmState::Running {
            return ax_err!(BadState, "VM already running");
        }
        inner.state = VmState::Running;
        if !inner.run_open {
            inner.run_open = true;
            if let Some(perf) = inner.perf.clone() {
                perf.record_vm_start(self.inner_const.id);
            }
        }
        info!("[{}] VM {} started", inner.arch.arch_name(), self.id());
        Ok(())
    }

    /// Pause the VM, saving its context. Fails unless it is running.
    pub fn pause(&self) -> AxResult {
        let mut inner = self.lock();
        if inner.state != VmState::Running {
            return ax_err!(BadState, "VM not running");
        }
        inner.save_context();
        inner.state = VmState::Paused;
        info!("[{}] VM {} paused", inner.arch.arch_name(), self.id());
        Ok(())
    }

    /// Resume the VM, restoring its context. Fails if it is already running.
    pub fn resume(&self) -> AxResult {
        let mut inner = self.lock();
        if inner.state == VmState::Running {
            return ax_err!(BadState, "VM already running");
        }
        inner.load_context();
        inner.state = VmState::Running;
        info!("[{}] VM {} resumed", inner.arch.arch_name(), self.id());
        Ok(())
    }

    /// Stop the VM unconditionally.
    pub fn stop(&self) {
        let mut inner = self.lock();
        inner.stop_vm(self.inner_const.id);
        info!("[{}] VM {} stopped", inner.arch.arch_name(), self.id());
    }

    /// Stop the VM unconditionally, on behalf of a supervisor.
    ///
    /// Steps hold the VM lock, so the stop takes effect at the next
    /// instruction boundary regardless of what the VM is doing.
    pub fn force_stop(&self) {
        let mut inner = self.lock();
        inner.stop_vm(self.inner_const.id);
        warn!("[{}] VM {} force stopped", inner.arch.arch_name(), self.id());
    }

    /// Execute one decode/execute cycle.
    ///
    /// Returns `false` when no further instruction will be executed in this
    /// state: the VM is not running, has no payload, has hit its resource
    /// limit (auto-pausing with a context save), or its instruction pointer
    /// has left the payload (auto-stopping).
    pub fn run_one_instruction(&self) -> bool {
        let mut inner = self.lock();
        with_current_vm(self.inner_const.id, || inner.step_vm(self.inner_const.id))
    }

    /// Execute up to one time slice ([`SLICE_INSTRUCTIONS`] instructions)
    /// back-to-back, stopping early on any failure.
    ///
    /// Returns `true` iff at least one instruction executed.
    pub fn run_one_slice(&self) -> bool {
        let mut inner = self.lock();
        let executed = with_current_vm(self.inner_const.id, || {
            let mut executed = 0u32;
            for _ in 0..SLICE_INSTRUCTIONS {
                if !inner.step_vm(self.inner_const.id) {
                    break;
                }
                executed += 1;
            }
            executed
        });
        debug!(
            "[{}] VM {} executed {} instructions in slice",
            inner.arch.arch_name(),
            self.id(),
            executed
        );
        executed > 0
    }

    /// Instructions executed so far.
    pub fn resource_usage(&self) -> u32 {
        self.lock().instruction_count
    }

    /// Set the maximum instruction count before auto-pause.
    pub fn set_resource_limit(&self, limit: u32) {
        let mut inner = self.lock();
        inner.resource_limit = limit;
        debug!("VM {} resource limit set to {}", self.id(), limit);
    }

    /// Save the register file into the VM's context.
    ///
    /// Atomic with respect to the VM's own fields; `pause()` calls this
    /// implicitly.
    pub fn save_context(&self) {
        self.lock().save_context();
    }

    /// Restore the register file from the VM's context.
    pub fn load_context(&self) {
        self.lock().load_context();
    }

    /// Snapshot of the VM's context.
    pub fn context(&self) -> VmContext {
        self.lock().context.clone()
    }

    /// Read a general-purpose register by architecture-specific index.
    pub fn gpr(&self, reg: usize) -> u64 {
        self.lock().arch.gpr(reg)
    }

    /// Write a general-purpose register by architecture-specific index.
    pub fn set_gpr(&self, reg: usize, val: u64) {
        self.lock().arch.set_gpr(reg, val);
    }
}

impl<A: AxArchVm> AxVmInnerMut<A> {
    fn save_context(&mut self) {
        self.arch.save_context(&mut self.context);
    }

    fn load_context(&mut self) {
        self.arch.load_context(&self.context);
    }

    fn stop_vm(&mut self, id: u32) {
        self.state = VmState::Stopped;
        if self.run_open {
            self.run_open = false;
            if let Some(perf) = self.perf.clone() {
                perf.record_vm_stop(id, self.instruction_count as u64);
            }
        }
    }

    /// Auto-pause on resource exhaustion: recoverable, reported via state and
    /// counters, not an error.
    fn pause_at_limit(&mut self, id: u32) {
        warn!(
            "[{}] VM {} reached resource limit ({})",
            self.arch.arch_name(),
            id,
            self.resource_limit
        );
        self.save_context();
        self.state = VmState::Paused;
    }

    fn step_vm(&mut self, id: u32) -> bool {
        if self.state != VmState::Running {
            return false;
        }
        let Some(payload) = self.payload.clone() else {
            return false;
        };
        if self.instruction_count >= self.resource_limit {
            // Stays Paused under repeated calls until the limit is raised
            // and the VM resumed.
            self.pause_at_limit(id);
            return false;
        }

        match self.arch.step(&payload) {
            StepExit::OutOfPayload => {
                // Normal termination, not a fault.
                debug!(
                    "[{}] VM {} instruction pointer left payload at {:#x}",
                    self.arch.arch_name(),
                    id,
                    self.arch.instruction_pointer()
                );
                self.stop_vm(id);
                false
            }
            StepExit::UnknownOpcode { opcode } => {
                if self.policy == OpcodePolicy::Report {
                    if let Some(faults) = self.faults.clone() {
                        faults.handle_vm_exception(id, VmFault::InvalidInstruction { opcode });
                    }
                }
                self.retire(id)
            }
            StepExit::Executed => self.retire(id),
        }
    }

    fn retire(&mut self, id: u32) -> bool {
        self.instruction_count += 1;
        if self.instruction_count >= self.resource_limit {
            self.pause_at_limit(id);
            return false;
        }
        true
    }
}

/// Object-safe rendition of the shared VM contract, so heterogeneous
/// machines can live in one scheduler.
pub trait VmInterface: Send + Sync {
    /// The VM's process-unique id.
    fn id(&self) -> u32;
    /// The VM's lifecycle state.
    fn state(&self) -> VmState;
    /// See [`AxVm::start`].
    fn start(&self) -> AxResult;
    /// See [`AxVm::pause`].
    fn pause(&self) -> AxResult;
    /// See [`AxVm::resume`].
    fn resume(&self) -> AxResult;
    /// See [`AxVm::stop`].
    fn stop(&self);
    /// See [`AxVm::force_stop`].
    fn force_stop(&self);
    /// See [`AxVm::set_payload`].
    fn set_payload(&self, payload: Arc<[u8]>);
    /// See [`AxVm::run_one_instruction`].
    fn run_one_instruction(&self) -> bool;
    /// See [`AxVm::run_one_slice`].
    fn run_one_slice(&self) -> bool;
    /// See [`AxVm::resource_usage`].
    fn resource_usage(&self) -> u32;
    /// See [`AxVm::set_resource_limit`].
    fn set_resource_limit(&self, limit: u32);
    /// See [`AxVm::context`].
    fn context(&self) -> VmContext;
}

impl<A: AxArchVm + Send> VmInterface for AxVm<A> {
    fn id(&self) -> u32 {
        AxVm::id(self)
    }
    fn state(&self) -> VmState {
        AxVm::state(self)
    }
    fn start(&self) -> AxResult {
        AxVm::start(self)
    }
    fn pause(&self) -> AxResult {
        AxVm::pause(self)
    }
    fn resume(&self) -> AxResult {
        AxVm::resume(self)
    }
    fn stop(&self) {
        AxVm::stop(self)
    }
    fn force_stop(&self) {
        AxVm::force_stop(self)
    }
    fn set_payload(&self, payload: Arc<[u8]>) {
        AxVm::set_payload(self, payload)
    }
    fn run_one_instruction(&self) -> bool {
        AxVm::run_one_instruction(self)
    }
    fn run_one_slice(&self) -> bool {
        AxVm::run_one_slice(self)
    }
    fn resource_usage(&self) -> u32 {
        AxVm::resource_usage(self)
    }
    fn set_resource_limit(&self, limit: u32) {
        AxVm::set_resource_limit(self, limit)
    }
    fn context(&self) -> VmContext {
        AxVm::context(self)
    }
}

std::thread_local! {
    static CURRENT_VM: Cell<Option<u32>> = const { Cell::new(None) };
}

/// Get the id of the VM currently executing on this thread, if any.
///
/// It is guaranteed that while a VM is inside `run_one_instruction` or
/// `run_one_slice`, the current VM on that thread is set to it, so external
/// collaborators invoked from a step can identify the machine.
pub fn current_vm_id() -> Option<u32> {
    CURRENT_VM.with(|c| c.get())
}

fn with_current_vm<T>(id: u32, f: impl FnOnce() -> T) -> T {
    CURRENT_VM.with(|c| {
        let prev = c.replace(Some(id));
        let result = f();
        c.set(prev);
        result
    })
}
