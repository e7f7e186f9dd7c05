//! Host CPU topology queries and best-effort thread pinning.

/// Number of logical cores on the host, or 0 if it cannot be determined.
pub fn host_core_count() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(0)
}

/// Bind the current thread to the given host core.
///
/// Best effort: returns `false` when the platform does not support pinning
/// or the call is rejected. Callers treat failure as a logged warning, never
/// a fault.
#[cfg(target_os = "linux")]
pub fn pin_current_thread(core_id: u32) -> bool {
    if core_id >= host_core_count() {
        return false;
    }
    // SAFETY: cpu_set_t is plain data; pid 0 addresses the calling thread.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core_id as usize, &mut set);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) == 0
    }
}

#[cfg(not(target_os = "linux"))]
pub fn pin_current_thread(_core_id: u32) -> bool {
    false
}
