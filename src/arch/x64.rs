use axerrno::AxResult;

use crate::arch_vm::AxArchVm;
use crate::context::VmContext;
use crate::exit::StepExit;
use crate::vm::AxVm;

/// Zero flag.
const FLAG_ZF: u64 = 1 << 6;
/// Sign flag.
const FLAG_SF: u64 = 1 << 7;

/// Number of 64-bit general-purpose registers.
pub const GPR_COUNT: usize = 16;

/// Register indices for [`AxArchVm::gpr`]/[`AxArchVm::set_gpr`].
pub mod reg {
    pub const RAX: usize = 0;
    pub const RBX: usize = 1;
    pub const RCX: usize = 2;
    pub const RDX: usize = 3;
    pub const RSI: usize = 4;
    pub const RDI: usize = 5;
    pub const RBP: usize = 6;
    pub const RSP: usize = 7;
    pub const R8: usize = 8;
    pub const R15: usize = 15;
}

/// x64 execution engine.
///
/// A deliberately minimal, non-ModRM-aware subset; one instruction is one
/// opcode byte:
///
/// | opcode | operation                           |
/// |--------|-------------------------------------|
/// | `0x48` | REX prefix (no-op in this model)    |
/// | `0x89` | MOV r/m64, r64 (no-op in this model)|
/// | `0x01` | ADD rax, rbx (ZF/SF)                |
/// | `0x29` | SUB rax, rbx (ZF/SF)                |
/// | `0xFF` | INC rax (ZF/SF)                     |
/// | `0xFE` | DEC rax (ZF/SF)                     |
/// | `0x50` | PUSH: rsp -= 8                      |
/// | `0x58` | POP: rsp += 8                       |
///
/// Push and pop only move the stack pointer; the stored value is not
/// materialized in this model, and no other register is touched.
pub struct X64Cpu {
    /// rax rbx rcx rdx rsi rdi rbp rsp r8..r15, in that index order.
    gpr: [u64; GPR_COUNT],
    rip: u64,
    rflags: u64,
}

/// An x64 virtual machine.
pub type X64Machine = AxVm<X64Cpu>;

impl AxArchVm for X64Cpu {
    type CreateConfig = ();

    fn new(_config: ()) -> AxResult<Self> {
        Ok(Self {
            gpr: [0; GPR_COUNT],
            rip: 0,
            rflags: 0,
        })
    }

    fn arch_name(&self) -> &'static str {
        "x64"
    }

    fn step(&mut self, payload: &[u8]) -> StepExit {
        if self.rip >= payload.len() as u64 {
            return StepExit::OutOfPayload;
        }
        let opcode = payload[self.rip as usize];
        self.rip += 1;
        self.execute(opcode)
    }

    /// Value-preserving mapping onto the 32-bit context.
    ///
    /// The low halves of rax..rdi, rbp and rsp land in the conventional
    /// slots (likewise rip and rflags); the high halves, and both halves of
    /// r8..r15, land in the extension bank. A save immediately followed by a
    /// load reproduces every register bit-for-bit; truncating to the low 32
    /// bits would silently corrupt pause/resume and core migration.
    ///
    /// Extension bank layout: words 0..10 hold the high halves of
    /// rax rbx rcx rdx rsi rdi rbp rsp rip rflags; words 10..26 hold
    /// r8..r15 as (low, high) pairs.
    fn save_context(&self, ctx: &mut VmContext) {
        ctx.eax = self.gpr[reg::RAX] as u32;
        ctx.ebx = self.gpr[reg::RBX] as u32;
        ctx.ecx = self.gpr[reg::RCX] as u32;
        ctx.edx = self.gpr[reg::RDX] as u32;
        ctx.esi = self.gpr[reg::RSI] as u32;
        ctx.edi = self.gpr[reg::RDI] as u32;
        ctx.ebp = self.gpr[reg::RBP] as u32;
        ctx.esp = self.gpr[reg::RSP] as u32;
        ctx.eip = self.rip as u32;
        ctx.eflags = self.rflags as u32;
        for i in 0..8 {
            ctx.ext[i] = (self.gpr[i] >> 32) as u32;
        }
        ctx.ext[8] = (self.rip >> 32) as u32;
        ctx.ext[9] = (self.rflags >> 32) as u32;
        for i in 0..8 {
            let r = self.gpr[reg::R8 + i];
            ctx.ext[10 + 2 * i] = r as u32;
            ctx.ext[11 + 2 * i] = (r >> 32) as u32;
        }
    }

    fn load_context(&mut self, ctx: &VmContext) {
        let lows = [
            ctx.eax, ctx.ebx, ctx.ecx, ctx.edx, ctx.esi, ctx.edi, ctx.ebp, ctx.esp,
        ];
        for i in 0..8 {
            self.gpr[i] = (ctx.ext[i] as u64) << 32 | lows[i] as u64;
        }
        self.rip = (ctx.ext[8] as u64) << 32 | ctx.eip as u64;
        self.rflags = (ctx.ext[9] as u64) << 32 | ctx.eflags as u64;
        for i in 0..8 {
            self.gpr[reg::R8 + i] =
                (ctx.ext[11 + 2 * i] as u64) << 32 | ctx.ext[10 + 2 * i] as u64;
        }
    }

    fn gpr(&self, reg: usize) -> u64 {
        self.gpr.get(reg).copied().unwrap_or(0)
    }

    fn set_gpr(&mut self, reg: usize, val: u64) {
        if let Some(r) = self.gpr.get_mut(reg) {
            *r = val;
        }
    }

    fn instruction_pointer(&self) -> u64 {
        self.rip
    }
}

impl X64Cpu {
    fn execute(&mut self, opcode: u8) -> StepExit {
        match opcode {
            0x48 => {} // REX prefix: no-op in this model
            0x89 => {} // MOV r/m64, r64: no-op without ModRM decoding
            0x01 => {
                self.gpr[reg::RAX] = self.gpr[reg::RAX].wrapping_add(self.gpr[reg::RBX]);
                self.update_flags(self.gpr[reg::RAX]);
            }
            0x29 => {
                self.gpr[reg::RAX] = self.gpr[reg::RAX].wrapping_sub(self.gpr[reg::RBX]);
                self.update_flags(self.gpr[reg::RAX]);
            }
            0xFF => {
                self.gpr[reg::RAX] = self.gpr[reg::RAX].wrapping_add(1);
                self.update_flags(self.gpr[reg::RAX]);
            }
            0xFE => {
                self.gpr[reg::RAX] = self.gpr[reg::RAX].wrapping_sub(1);
                self.update_flags(self.gpr[reg::RAX]);
            }
            0x50 => self.gpr[reg::RSP] = self.gpr[reg::RSP].wrapping_sub(8),
            0x58 => self.gpr[reg::RSP] = self.gpr[reg::RSP].wrapping_add(8),
            _ => return StepExit::UnknownOpcode { opcode },
        }
        StepExit::Executed
    }

    fn update_flags(&mut self, result: u64) {
        self.rflags &= !(FLAG_ZF | FLAG_SF);
        if result == 0 {
            self.rflags |= FLAG_ZF;
        }
        if result & 0x8000_0000_0000_0000 != 0 {
            self.rflags |= FLAG_SF;
        }
    }
}
