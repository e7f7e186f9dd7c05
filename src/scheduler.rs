use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use axerrno::{ax_err, AxResult};
use log::{debug, info, warn};

use crate::affinity;
use crate::exit::VmFault;
use crate::hal::FaultSink;
use crate::vm::{VmInterface, VmState};

/// Scheduling loop wakeup interval, also the nominal time-slice pacing.
pub const TIME_SLICE_MS: u64 = 10;

/// The first host cores are reserved for non-VM use; the core pool starts
/// after them.
pub const RESERVED_CORES: u32 = 2;

/// A statically bound VM that has not executed for this long is reported as
/// stalled.
pub const TIMEOUT_THRESHOLD_MS: u64 = 5000;

/// GIL-style per-core lock state: a core is Locked iff exactly one VM is
/// currently assigned to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked,
}

/// Read-only snapshot of one core pool slot.
#[derive(Clone, Debug)]
pub struct CoreStatus {
    /// Host core id.
    pub core_id: u32,
    /// Lock state.
    pub lock: LockState,
    /// Bound VM id, 0 when none.
    pub bound_vm: u32,
}

/// The lifecycle state of the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
}

/// One admitted VM, either in the dynamic queue or statically bound.
struct ScheduleEntry {
    vm_id: u32,
    vm: Arc<dyn VmInterface>,
    /// Lower value = scheduled sooner.
    priority: u32,
    last_run: Instant,
    static_bound: bool,
    /// Valid only when `static_bound`.
    bound_core: u32,
}

/// Scheduler state shared with the loop thread, under one mutex.
struct SchedShared {
    cores: Vec<CoreStatus>,
    dynamic: VecDeque<ScheduleEntry>,
    static_bindings: Vec<ScheduleEntry>,
    faults: Option<Arc<dyn FaultSink>>,
    stopping: bool,
}

struct SchedSync {
    shared: Mutex<SchedShared>,
    cv: Condvar,
}

impl SchedSync {
    fn lock(&self) -> MutexGuard<'_, SchedShared> {
        self.shared.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Multiplexes virtual machines across a bounded pool of host cores.
///
/// VMs reach execution two ways: a dynamic priority queue serviced
/// round-robin across whichever cores are free, and static bindings that
/// pin a VM to one core until explicitly released. A background loop wakes
/// every [`TIME_SLICE_MS`] milliseconds and services all static bindings
/// before any dynamic entry.
///
/// All shared state sits under a single scheduler-wide lock; operations
/// never panic across it, and admission failures come back as errors.
pub struct Scheduler {
    sync: Arc<SchedSync>,
    worker: Option<JoinHandle<()>>,
    state: SchedulerState,
    total_cores: u32,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create an uninitialized scheduler with an empty core pool.
    pub fn new() -> Self {
        Self {
            sync: Arc::new(SchedSync {
                shared: Mutex::new(SchedShared {
                    cores: Vec::new(),
                    dynamic: VecDeque::new(),
                    static_bindings: Vec::new(),
                    faults: None,
                    stopping: false,
                }),
                cv: Condvar::new(),
            }),
            worker: None,
            state: SchedulerState::Uninitialized,
            total_cores: 0,
        }
    }

    /// Install the fault sink that receives stall reports.
    pub fn set_fault_sink(&self, sink: Arc<dyn FaultSink>) {
        self.sync.lock().faults = Some(sink);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Build the core pool from the host topology.
    ///
    /// Reserves the first [`RESERVED_CORES`] cores for non-VM use and fails
    /// if the host does not have more than that.
    pub fn initialize(&mut self) -> AxResult {
        self.initialize_with(affinity::host_core_count())
    }

    /// Build the core pool for an explicitly given core count.
    pub fn initialize_with(&mut self, total_cores: u32) -> AxResult {
        if self.state == SchedulerState::Running {
            return ax_err!(BadState, "scheduler is running");
        }
        if total_cores <= RESERVED_CORES {
            return ax_err!(ResourceBusy, "insufficient CPU cores for VM scheduling");
        }
        let vm_cores = total_cores - RESERVED_CORES;
        let mut shared = self.sync.lock();
        shared.cores = (0..vm_cores)
            .map(|i| CoreStatus {
                core_id: RESERVED_CORES + i,
                lock: LockState::Unlocked,
                bound_vm: 0,
            })
            .collect();
        shared.stopping = false;
        drop(shared);
        self.total_cores = total_cores;
        self.state = SchedulerState::Initialized;
        info!(
            "scheduler initialized: {} cores available for VM scheduling (cores {}-{})",
            vm_cores,
            RESERVED_CORES,
            RESERVED_CORES + vm_cores - 1
        );
        Ok(())
    }

    /// Spawn the scheduling loop. Fails unless the scheduler is initialized.
    pub fn start(&mut self) -> AxResult {
        match self.state {
            SchedulerState::Running => return ax_err!(BadState, "scheduler already running"),
            SchedulerState::Initialized => {}
            _ => return ax_err!(BadState, "scheduler not initialized"),
        }
        let sync = self.sync.clone();
        self.worker = Some(std::thread::spawn(move || {
            loop {
                {
                    let shared = sync.lock();
                    // re-checks the stop flag, so spurious wakeups are safe
                    let (shared, _timeout) = sync
                        .cv
                        .wait_timeout_while(
                            shared,
                            Duration::from_millis(TIME_SLICE_MS),
                            |s| !s.stopping,
                        )
                        .unwrap_or_else(|e| e.into_inner());
                    if shared.stopping {
                        break;
                    }
                }
                run_cycle(&sync);
            }
        }));
        self.state = SchedulerState::Running;
        info!("scheduler started");
        Ok(())
    }

    /// Signal the loop, join it, and force-stop every VM still owned.
    ///
    /// Safe to call at any time; a scheduler that is not running is left
    /// untouched. Bounded by the loop's wait granularity.
    pub fn stop(&mut self) {
        if self.state != SchedulerState::Running {
            return;
        }
        self.sync.lock().stopping = true;
        self.sync.cv.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }

        let mut shared = self.sync.lock();
        let shared = &mut *shared;
        for entry in shared
            .static_bindings
            .drain(..)
            .chain(shared.dynamic.drain(..))
        {
            entry.vm.force_stop();
        }
        for core in &mut shared.cores {
            core.lock = LockState::Unlocked;
            core.bound_vm = 0;
        }
        drop(shared);
        self.state = SchedulerState::Stopped;
        info!("scheduler stopped");
    }

    /// Admit a VM to the dynamic queue. Does not start the VM.
    pub fn add_vm(&self, vm: Arc<dyn VmInterface>, priority: u32) {
        let mut shared = self.sync.lock();
        let vm_id = vm.id();
        shared.dynamic.push_back(ScheduleEntry {
            vm_id,
            vm,
            priority,
            last_run: Instant::now(),
            static_bound: false,
            bound_core: 0,
        });
        drop(shared);
        debug!("VM {} added to dynamic scheduling queue", vm_id);
        self.sync.cv.notify_one();
    }

    /// Statically bind a VM to a core, locking the core for it alone.
    ///
    /// The VM is located in the static bindings first, then the dynamic
    /// queue, and removed from wherever it is found; the entry moves by
    /// value, so its execution state (instruction counter, context) travels
    /// with it. Fails for an out-of-range core, an already locked core, or
    /// an unknown VM.
    pub fn apply_static_core(&self, vm_id: u32, core_id: u32) -> AxResult {
        let mut shared = self.sync.lock();
        let pool_index = self.pool_index(core_id, &shared)?;
        if shared.cores[pool_index].lock == LockState::Locked {
            return ax_err!(ResourceBusy, "core already occupied");
        }

        let mut entry = if let Some(pos) = shared
            .static_bindings
            .iter()
            .position(|e| e.vm_id == vm_id)
        {
            let entry = shared.static_bindings.remove(pos);
            // rebinding: the old core must not stay locked to a VM the
            // scheduler no longer tracks there
            let old_index = (entry.bound_core - RESERVED_CORES) as usize;
            shared.cores[old_index].lock = LockState::Unlocked;
            shared.cores[old_index].bound_vm = 0;
            entry
        } else if let Some(pos) = shared.dynamic.iter().position(|e| e.vm_id == vm_id) {
            match shared.dynamic.remove(pos) {
                Some(entry) => entry,
                None => return ax_err!(NotFound, "VM not known to the scheduler"),
            }
        } else {
            return ax_err!(NotFound, "VM not known to the scheduler");
        };

        entry.static_bound = true;
        entry.bound_core = core_id;
        shared.static_bindings.push(entry);
        shared.cores[pool_index].lock = LockState::Locked;
        shared.cores[pool_index].bound_vm = vm_id;
        info!("VM {} statically bound to core {}", vm_id, core_id);
        Ok(())
    }

    /// Release a static binding: unlock its core, stop the VM, drop the
    /// entry. No other core's state is touched.
    pub fn release_static_core(&self, vm_id: u32) -> AxResult {
        let mut shared = self.sync.lock();
        let Some(pos) = shared
            .static_bindings
            .iter()
            .position(|e| e.vm_id == vm_id)
        else {
            return ax_err!(NotFound, "VM not found in static bindings");
        };
        let entry = shared.static_bindings.remove(pos);
        let pool_index = (entry.bound_core - RESERVED_CORES) as usize;
        shared.cores[pool_index].lock = LockState::Unlocked;
        shared.cores[pool_index].bound_vm = 0;
        entry.vm.stop();
        info!("VM {} released from core {}", vm_id, entry.bound_core);
        Ok(())
    }

    /// Snapshot of one core slot, taken under the scheduler lock.
    pub fn get_core_status(&self, core_id: u32) -> AxResult<CoreStatus> {
        let shared = self.sync.lock();
        let pool_index = self.pool_index(core_id, &shared)?;
        Ok(shared.cores[pool_index].clone())
    }

    /// Snapshot of core occupancy and queue sizes.
    pub fn statistics(&self) -> SchedulerStats {
        let shared = self.sync.lock();
        SchedulerStats {
            total_cores: self.total_cores,
            vm_cores: shared.cores.len() as u32,
            static_bindings: shared.static_bindings.len(),
            dynamic_queue: shared.dynamic.len(),
            cores: shared.cores.clone(),
        }
    }

    fn pool_index(&self, core_id: u32, shared: &SchedShared) -> AxResult<usize> {
        if core_id < RESERVED_CORES || core_id >= RESERVED_CORES + shared.cores.len() as u32 {
            return ax_err!(InvalidInput, "core id out of managed range");
        }
        Ok((core_id - RESERVED_CORES) as usize)
    }

    #[cfg(test)]
    fn cycle(&self) {
        run_cycle(&self.sync);
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One scheduling cycle: static pass, dynamic pass, timeout check.
fn run_cycle(sync: &SchedSync) {
    static_pass(sync);
    dynamic_pass(sync);
    check_timeouts(sync);
}

/// Service every static binding whose core is still correctly locked to it.
/// Static bindings are priority-guaranteed: they always run before the
/// dynamic queue within a cycle.
fn static_pass(sync: &SchedSync) {
    let mut shared = sync.lock();
    if shared.stopping {
        return;
    }
    for i in 0..shared.static_bindings.len() {
        let (vm, vm_id, core_id) = {
            let entry = &shared.static_bindings[i];
            (entry.vm.clone(), entry.vm_id, entry.bound_core)
        };
        let pool_index = (core_id - RESERVED_CORES) as usize;
        let core = &shared.cores[pool_index];
        if core.lock != LockState::Locked || core.bound_vm != vm_id {
            continue;
        }
        if !affinity::pin_current_thread(core_id) {
            debug!("failed to pin scheduler thread to core {}", core_id);
        }
        if vm.state() != VmState::Running {
            let _ = vm.start();
        }
        vm.run_one_slice();
        shared.static_bindings[i].last_run = Instant::now();
    }
}

/// Service one round of the dynamic queue, lowest priority value first,
/// FIFO among equals. Entries passed over for lack of a free core are
/// requeued unrun; the starvation risk under sustained contention is
/// accepted by this design.
fn dynamic_pass(sync: &SchedSync) {
    let mut shared = sync.lock();
    if shared.stopping || shared.dynamic.is_empty() {
        return;
    }
    let mut entries: Vec<ScheduleEntry> = shared.dynamic.drain(..).collect();
    entries.sort_by_key(|e| e.priority); // stable sort keeps queue order among ties

    for mut entry in entries {
        let Some(pool_index) = shared
            .cores
            .iter()
            .position(|c| c.lock == LockState::Unlocked)
        else {
            // no core available: requeue without running
            shared.dynamic.push_back(entry);
            continue;
        };
        let core_id = shared.cores[pool_index].core_id;
        shared.cores[pool_index].lock = LockState::Locked;
        shared.cores[pool_index].bound_vm = entry.vm_id;

        if !affinity::pin_current_thread(core_id) {
            debug!("failed to pin scheduler thread to core {}", core_id);
        }
        if entry.vm.state() != VmState::Running {
            let _ = entry.vm.start();
        }
        entry.vm.run_one_slice();
        entry.last_run = Instant::now();

        shared.cores[pool_index].lock = LockState::Unlocked;
        shared.cores[pool_index].bound_vm = 0;
        shared.dynamic.push_back(entry);
    }
}

/// Report statically bound VMs that have not executed within the threshold.
/// The scheduler surfaces the condition; it never kills the VM itself.
fn check_timeouts(sync: &SchedSync) {
    let shared = sync.lock();
    if shared.stopping {
        return;
    }
    let threshold = Duration::from_millis(TIMEOUT_THRESHOLD_MS);
    for entry in &shared.static_bindings {
        if entry.last_run.elapsed() > threshold {
            warn!(
                "VM {} on core {} may have stalled",
                entry.vm_id, entry.bound_core
            );
            if let Some(faults) = shared.faults.clone() {
                faults.handle_vm_exception(entry.vm_id, VmFault::ResourceTimeout);
            }
        }
    }
}

/// Point-in-time scheduler statistics.
#[derive(Clone, Debug)]
pub struct SchedulerStats {
    pub total_cores: u32,
    pub vm_cores: u32,
    pub static_bindings: usize,
    pub dynamic_queue: usize,
    pub cores: Vec<CoreStatus>,
}

impl fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Scheduler Statistics ===")?;
        writeln!(f, "Total Cores: {}", self.total_cores)?;
        writeln!(f, "VM Cores Available: {}", self.vm_cores)?;
        writeln!(f, "Static Bindings: {}", self.static_bindings)?;
        writeln!(f, "Dynamic Queue Size: {}", self.dynamic_queue)?;
        writeln!(f, "Core Status:")?;
        for core in &self.cores {
            write!(f, "  Core {}: ", core.core_id)?;
            match core.lock {
                LockState::Locked => writeln!(f, "LOCKED (VM {})", core.bound_vm)?,
                LockState::Unlocked => writeln!(f, "FREE")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::x86::X86Machine;
    use crate::hal::PerfSink;
    use std::sync::Mutex as StdMutex;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn x86_vm(id: u32, payload_len: usize) -> Arc<X86Machine> {
        let vm = Arc::new(X86Machine::new(id, ()).unwrap());
        vm.set_payload(vec![0u8; payload_len].into());
        vm
    }

    #[derive(Default)]
    struct Recorder {
        starts: StdMutex<Vec<u32>>,
        faults: StdMutex<Vec<(u32, VmFault)>>,
    }

    impl PerfSink for Recorder {
        fn record_vm_start(&self, vm_id: u32) {
            self.starts.lock().unwrap().push(vm_id);
        }
        fn record_vm_stop(&self, _vm_id: u32, _instructions: u64) {}
    }

    impl FaultSink for Recorder {
        fn handle_vm_exception(&self, vm_id: u32, fault: VmFault) {
            self.faults.lock().unwrap().push((vm_id, fault));
        }
    }

    #[test]
    fn initialize_requires_enough_cores() {
        let mut sched = Scheduler::new();
        assert!(sched.initialize_with(RESERVED_CORES).is_err());
        assert!(sched.initialize_with(1).is_err());
        assert_eq!(sched.state(), SchedulerState::Uninitialized);

        assert!(sched.initialize_with(RESERVED_CORES + 1).is_ok());
        assert_eq!(sched.state(), SchedulerState::Initialized);
        assert_eq!(sched.statistics().vm_cores, 1);
    }

    #[test]
    fn pool_covers_unreserved_cores_all_unlocked() {
        let mut sched = Scheduler::new();
        sched.initialize_with(6).unwrap();
        for core_id in RESERVED_CORES..6 {
            let status = sched.get_core_status(core_id).unwrap();
            assert_eq!(status.lock, LockState::Unlocked);
            assert_eq!(status.bound_vm, 0);
        }
        assert!(sched.get_core_status(0).is_err());
        assert!(sched.get_core_status(RESERVED_CORES - 1).is_err());
        assert!(sched.get_core_status(6).is_err());
    }

    #[test]
    fn static_binding_locks_and_release_restores() {
        let mut sched = Scheduler::new();
        sched.initialize_with(6).unwrap();
        sched.add_vm(x86_vm(1, 64), 10);

        sched.apply_static_core(1, 3).unwrap();
        let status = sched.get_core_status(3).unwrap();
        assert_eq!(status.lock, LockState::Locked);
        assert_eq!(status.bound_vm, 1);
        let stats = sched.statistics();
        assert_eq!(stats.static_bindings, 1);
        assert_eq!(stats.dynamic_queue, 0);

        sched.release_static_core(1).unwrap();
        assert_eq!(sched.get_core_status(3).unwrap().lock, LockState::Unlocked);
        // no other core was touched
        for core_id in [2u32, 4, 5] {
            assert_eq!(
                sched.get_core_status(core_id).unwrap().lock,
                LockState::Unlocked
            );
        }
    }

    #[test]
    fn static_binding_admission_failures() {
        let mut sched = Scheduler::new();
        sched.initialize_with(4).unwrap();
        let vm = x86_vm(1, 64);
        sched.add_vm(vm, 10);

        // out of managed range
        assert!(sched.apply_static_core(1, 0).is_err());
        assert!(sched.apply_static_core(1, 9).is_err());
        // unknown VM
        assert!(sched.apply_static_core(42, 2).is_err());
        // occupied core
        sched.apply_static_core(1, 2).unwrap();
        sched.add_vm(x86_vm(2, 64), 10);
        assert!(sched.apply_static_core(2, 2).is_err());
        // releasing an unknown VM fails
        assert!(sched.release_static_core(42).is_err());
    }

    #[test]
    fn rebinding_a_static_vm_unlocks_its_old_core() {
        let mut sched = Scheduler::new();
        sched.initialize_with(6).unwrap();
        sched.add_vm(x86_vm(1, 64), 10);

        sched.apply_static_core(1, 2).unwrap();
        sched.apply_static_core(1, 4).unwrap();
        assert_eq!(sched.get_core_status(2).unwrap().lock, LockState::Unlocked);
        assert_eq!(sched.get_core_status(4).unwrap().bound_vm, 1);
        assert_eq!(sched.statistics().static_bindings, 1);
    }

    #[test]
    fn cycle_services_statics_before_dynamics_by_priority() {
        init_logging();
        let mut sched = Scheduler::new();
        sched.initialize_with(6).unwrap();
        let recorder = Arc::new(Recorder::default());

        let static_vm = x86_vm(1, 1024);
        let low = x86_vm(2, 1024); // priority 9
        let high = x86_vm(3, 1024); // priority 1
        for vm in [&static_vm, &low, &high] {
            vm.set_perf_sink(recorder.clone());
        }
        sched.add_vm(static_vm, 10);
        sched.apply_static_core(1, 2).unwrap();
        sched.add_vm(low.clone(), 9);
        sched.add_vm(high.clone(), 1);

        sched.cycle();

        // start order: static binding first, then ascending priority
        assert_eq!(recorder.starts.lock().unwrap().as_slice(), &[1, 3, 2]);
        // each serviced VM ran one full slice
        assert_eq!(low.resource_usage(), 10);
        assert_eq!(high.resource_usage(), 10);
        // dynamic cores were unlocked again after their slices
        for core_id in [3u32, 4, 5] {
            assert_eq!(
                sched.get_core_status(core_id).unwrap().lock,
                LockState::Unlocked
            );
        }
        // both dynamic entries were requeued
        assert_eq!(sched.statistics().dynamic_queue, 2);
    }

    #[test]
    fn dynamic_vm_without_free_core_is_requeued_unrun() {
        let mut sched = Scheduler::new();
        // one managed core, taken by the static binding
        sched.initialize_with(3).unwrap();
        let pinned = x86_vm(1, 1024);
        let starved = x86_vm(2, 1024);
        sched.add_vm(pinned, 10);
        sched.apply_static_core(1, 2).unwrap();
        sched.add_vm(starved.clone(), 1);

        sched.cycle();

        assert_eq!(starved.resource_usage(), 0);
        assert_eq!(starved.state(), VmState::Created);
        assert_eq!(sched.statistics().dynamic_queue, 1);
        // the static binding still ran
        assert_eq!(sched.get_core_status(2).unwrap().bound_vm, 1);
    }

    #[test]
    fn stalled_static_binding_is_reported_not_killed() {
        let mut sched = Scheduler::new();
        sched.initialize_with(4).unwrap();
        let recorder = Arc::new(Recorder::default());
        sched.set_fault_sink(recorder.clone());
        let vm = x86_vm(7, 1024);
        sched.add_vm(vm.clone(), 10);
        sched.apply_static_core(7, 2).unwrap();

        // age the binding past the threshold
        sched.sync.lock().static_bindings[0].last_run =
            Instant::now() - Duration::from_millis(TIMEOUT_THRESHOLD_MS + 1000);
        check_timeouts(&sched.sync);

        assert_eq!(
            recorder.faults.lock().unwrap().as_slice(),
            &[(7, VmFault::ResourceTimeout)]
        );
        // the VM itself is untouched
        assert_ne!(vm.state(), VmState::Stopped);
    }

    #[test]
    fn start_requires_initialization() {
        let mut sched = Scheduler::new();
        assert!(sched.start().is_err());
    }

    #[test]
    fn loop_executes_vms_and_stop_forces_them_down() {
        init_logging();
        let mut sched = Scheduler::new();
        sched.initialize_with(4).unwrap();

        let dynamic_vm = x86_vm(1, 100_000);
        dynamic_vm.set_resource_limit(1_000_000);
        let static_vm = x86_vm(2, 100_000);
        static_vm.set_resource_limit(1_000_000);

        sched.add_vm(dynamic_vm.clone(), 5);
        sched.add_vm(static_vm.clone(), 5);
        sched.apply_static_core(2, 3).unwrap();

        sched.start().unwrap();
        assert!(sched.start().is_err()); // already running
        std::thread::sleep(Duration::from_millis(100));
        sched.stop();

        assert_eq!(sched.state(), SchedulerState::Stopped);
        assert!(dynamic_vm.resource_usage() > 0);
        assert!(static_vm.resource_usage() > 0);
        assert_eq!(dynamic_vm.state(), VmState::Stopped);
        assert_eq!(static_vm.state(), VmState::Stopped);

        // shutdown drained both lists and unlocked every core
        let stats = sched.statistics();
        assert_eq!(stats.dynamic_queue, 0);
        assert_eq!(stats.static_bindings, 0);
        assert!(stats.cores.iter().all(|c| c.lock == LockState::Unlocked));

        // stopping again is harmless
        sched.stop();
    }

    #[test]
    fn statistics_render_core_occupancy() {
        let mut sched = Scheduler::new();
        sched.initialize_with(4).unwrap();
        sched.add_vm(x86_vm(1, 64), 10);
        sched.apply_static_core(1, 2).unwrap();

        let text = sched.statistics().to_string();
        assert!(text.contains("Static Bindings: 1"));
        assert!(text.contains("Core 2: LOCKED (VM 1)"));
        assert!(text.contains("Core 3: FREE"));
    }
}
