// Copyright 2025 The Axvisor Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! AxVmCore - Multi-architecture virtual machine core with core-pool scheduling.
//!
//! This crate provides a unified, architecture-independent interface for managing
//! toy virtual machines. It delegates instruction decoding and register handling
//! to implementations of the `AxArchVm` trait while providing common functionality
//! like lifecycle management, context save/restore, resource accounting, and a
//! scheduler that multiplexes VMs across a pool of host cores.
//!
//! # Features
//!
//! - Architecture-agnostic VM lifecycle (Created → Running → Paused → Stopped)
//! - Three bundled execution engines: x86, ARM and x64 instruction subsets
//! - Unified context snapshot with a lossless 64-bit extension bank
//! - Core-pool scheduler with static bindings and a priority dynamic queue
//! - Pluggable performance and fault sinks

// Core modules
mod arch_vm; // Architecture-specific execution engine trait
mod context; // Unified register/stack snapshot
mod exit; // Step results and fault categories
mod hal; // Performance and fault sink interfaces
mod vm; // Main VM implementation and state management

pub mod affinity; // Host topology queries and thread pinning
pub mod arch; // Bundled x86/ARM/x64 execution engines
pub mod exception; // Fault collection and logging
pub mod monitor; // Performance aggregation
pub mod scheduler; // Core-pool scheduling

// Public API exports
pub use arch_vm::AxArchVm; // Architecture-specific engine trait
pub use context::{VmContext, EXT_SLOTS, STACK_WORDS};
pub use exit::{StepExit, VmFault};
pub use hal::{FaultSink, PerfSink};
pub use vm::*; // Main VM types and functions

pub use exception::ExceptionManager;
pub use monitor::PerformanceMonitor;
pub use scheduler::{
    CoreStatus, LockState, Scheduler, SchedulerState, SchedulerStats, RESERVED_CORES,
    TIMEOUT_THRESHOLD_MS, TIME_SLICE_MS,
};
