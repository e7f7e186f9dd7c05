/// The result of a single [`AxArchVm::step`] decode/execute cycle.
///
/// [`AxArchVm::step`]: crate::AxArchVm::step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepExit {
    /// An instruction was decoded and executed, and the instruction pointer
    /// advanced by one instruction's width.
    Executed,
    /// The opcode is not part of the modeled subset. The instruction retires
    /// as a no-op and the instruction pointer advances; whether the event is
    /// also reported is decided by the VM's [`OpcodePolicy`].
    ///
    /// [`OpcodePolicy`]: crate::OpcodePolicy
    UnknownOpcode {
        /// The unrecognized opcode byte (for ARM, the low byte of the word).
        opcode: u8,
    },
    /// The instruction pointer has left the payload. No instruction was
    /// executed; this is a normal termination condition, not a fault.
    OutOfPayload,
}

/// A fault condition reported to the exception manager.
///
/// Faults are emitted at the point of detection; how they are handled
/// (log/pause/terminate) is up to the receiving [`FaultSink`].
///
/// [`FaultSink`]: crate::FaultSink
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VmFault {
    /// Instruction pointer or stack access outside bounds.
    MemoryViolation,
    /// Scheduler-detected stall: a statically bound VM has not executed
    /// within the timeout threshold.
    ResourceTimeout,
    /// An unrecognized opcode, reported only under [`OpcodePolicy::Report`].
    ///
    /// [`OpcodePolicy::Report`]: crate::OpcodePolicy::Report
    InvalidInstruction {
        /// The offending opcode byte.
        opcode: u8,
    },
}

impl VmFault {
    /// Short category name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            VmFault::MemoryViolation => "memory-access violation",
            VmFault::ResourceTimeout => "resource timeout",
            VmFault::InvalidInstruction { .. } => "invalid instruction",
        }
    }
}
