//! Architecture-specific execution engines.
//!
//! Each module implements [`AxArchVm`](crate::AxArchVm) for one modeled
//! instruction set; decode tables are pure functions over an immutable
//! instruction word so they can be tested in isolation from the scheduler.

pub mod arm;
pub mod x64;
pub mod x86;

pub use arm::{ArmCpu, ArmMachine, Endianness};
pub use x64::{X64Cpu, X64Machine};
pub use x86::{X86Cpu, X86Machine};
