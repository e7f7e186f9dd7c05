use axerrno::AxResult;

use crate::context::VmContext;
use crate::exit::StepExit;

/// Architecture-specific VM engine trait definition.
///
/// This trait isolates everything that differs between the modeled
/// architectures — register file width and layout, instruction fetch and
/// decode, and the mapping to the shared [`VmContext`] — from the common
/// lifecycle logic in [`AxVm`].
///
/// Implementations are pure state machines over an immutable instruction
/// payload: `step` performs exactly one fetch/decode/execute cycle and never
/// reads past the payload's length.
///
/// [`AxVm`]: crate::AxVm
pub trait AxArchVm: Sized {
    /// Architecture-specific configuration for engine creation.
    ///
    /// This associated type allows each architecture to define its own
    /// construction parameters (e.g. ARM's endianness, fixed for the life of
    /// the machine).
    type CreateConfig;

    /// Creates a new architecture-specific engine with a zeroed register file.
    fn new(config: Self::CreateConfig) -> AxResult<Self>;

    /// Short architecture name used in logs ("x86", "arm", "x64").
    fn arch_name(&self) -> &'static str;

    /// Executes one decode/execute cycle against `payload`.
    ///
    /// On [`StepExit::Executed`] and [`StepExit::UnknownOpcode`] the
    /// instruction pointer has advanced by one instruction's width for this
    /// architecture (fixed 4 bytes for ARM, one byte for the bytewise x86 and
    /// x64 models). On [`StepExit::OutOfPayload`] no state was changed.
    fn step(&mut self, payload: &[u8]) -> StepExit;

    /// Writes the full register file into `ctx`.
    ///
    /// The mapping must not discard live register bits the architecture will
    /// later need back; a `save_context` immediately followed by
    /// `load_context` must reproduce every preserved register bit-for-bit.
    fn save_context(&self, ctx: &mut VmContext);

    /// Restores the register file from `ctx`.
    fn load_context(&mut self, ctx: &VmContext);

    /// Reads a general-purpose register by architecture-specific index.
    ///
    /// Values narrower than 64 bits are zero-extended. Out-of-range indices
    /// read as zero.
    fn gpr(&self, reg: usize) -> u64;

    /// Writes a general-purpose register by architecture-specific index.
    ///
    /// Values wider than the register are truncated; out-of-range indices are
    /// ignored.
    fn set_gpr(&mut self, reg: usize, val: u64);

    /// Current instruction pointer, as a payload byte offset.
    fn instruction_pointer(&self) -> u64;
}
