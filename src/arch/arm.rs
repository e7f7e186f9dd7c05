use axerrno::AxResult;

use crate::arch_vm::AxArchVm;
use crate::context::VmContext;
use crate::exit::StepExit;
use crate::vm::AxVm;

/// Negative flag (CPSR bit 31).
const FLAG_N: u32 = 1 << 31;
/// Zero flag (CPSR bit 30).
const FLAG_Z: u32 = 1 << 30;
/// Carry flag (CPSR bit 29).
const FLAG_C: u32 = 1 << 29;
/// Overflow flag (CPSR bit 28).
const FLAG_V: u32 = 1 << 28;

/// Byte order used when fetching 4-byte instruction words, fixed at
/// construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// Register indices: r0–r12 are 0–12, then sp, lr, pc.
pub mod reg {
    pub const SP: usize = 13;
    pub const LR: usize = 14;
    pub const PC: usize = 15;
}

/// ARM execution engine.
///
/// One instruction is one 4-byte word, fetched honoring the configured
/// endianness. Decode fields: bits 21–24 opcode, bits 16–19 source register,
/// bits 12–15 destination register; data-processing opcodes take the low 12
/// bits as an immediate operand.
///
/// Modeled opcodes: AND `0x0`, EOR `0x1`, SUB `0x2`, ADD `0x4`, ADC `0x5`,
/// MOV `0xD`, B `0xE`. Every data-processing result updates the N and Z
/// flags; carry/overflow tracking is out of scope for this subset.
///
/// The branch operand is the full low 24 bits of the word, sign-extended as
/// a 24-bit two's-complement value and left-shifted by 2 to a byte offset
/// added to pc. A 12-bit field reused from the data-processing encoding
/// would truncate the jump range.
pub struct ArmCpu {
    regs: [u32; 16],
    cpsr: u32,
    endianness: Endianness,
}

/// An ARM virtual machine.
pub type ArmMachine = AxVm<ArmCpu>;

impl AxArchVm for ArmCpu {
    type CreateConfig = Endianness;

    fn new(endianness: Endianness) -> AxResult<Self> {
        Ok(Self {
            regs: [0; 16],
            cpsr: 0,
            endianness,
        })
    }

    fn arch_name(&self) -> &'static str {
        "arm"
    }

    fn step(&mut self, payload: &[u8]) -> StepExit {
        let pc = self.regs[reg::PC] as usize;
        let Some(word) = payload.get(pc..pc + 4) else {
            return StepExit::OutOfPayload;
        };
        let word: [u8; 4] = word.try_into().unwrap();
        let instruction = match self.endianness {
            Endianness::Little => u32::from_le_bytes(word),
            Endianness::Big => u32::from_be_bytes(word),
        };
        let exit = self.execute(instruction);
        // fixed 4-byte instruction width; applies after a branch adjusts pc
        self.regs[reg::PC] = self.regs[reg::PC].wrapping_add(4);
        exit
    }

    /// r0–r5 map onto the six named general slots, r11 onto the base
    /// pointer, sp/pc/cpsr onto the stack pointer, instruction pointer and
    /// flags word. r6–r10, r12 and lr have no context slot and are not
    /// preserved across save/load; this is a documented scope limitation of
    /// the minimal mapping.
    fn save_context(&self, ctx: &mut VmContext) {
        ctx.eax = self.regs[0];
        ctx.ebx = self.regs[1];
        ctx.ecx = self.regs[2];
        ctx.edx = self.regs[3];
        ctx.esi = self.regs[4];
        ctx.edi = self.regs[5];
        ctx.ebp = self.regs[11];
        ctx.esp = self.regs[reg::SP];
        ctx.eip = self.regs[reg::PC];
        ctx.eflags = self.cpsr;
    }

    fn load_context(&mut self, ctx: &VmContext) {
        self.regs[0] = ctx.eax;
        self.regs[1] = ctx.ebx;
        self.regs[2] = ctx.ecx;
        self.regs[3] = ctx.edx;
        self.regs[4] = ctx.esi;
        self.regs[5] = ctx.edi;
        self.regs[11] = ctx.ebp;
        self.regs[reg::SP] = ctx.esp;
        self.regs[reg::PC] = ctx.eip;
        self.cpsr = ctx.eflags;
    }

    fn gpr(&self, reg: usize) -> u64 {
        self.regs.get(reg).copied().unwrap_or(0) as u64
    }

    fn set_gpr(&mut self, reg: usize, val: u64) {
        if let Some(r) = self.regs.get_mut(reg) {
            *r = val as u32;
        }
    }

    fn instruction_pointer(&self) -> u64 {
        self.regs[reg::PC] as u64
    }
}

impl ArmCpu {
    /// CPSR flags word (N/Z/C/V in bits 31..28).
    pub fn cpsr(&self) -> u32 {
        self.cpsr
    }

    fn execute(&mut self, instruction: u32) -> StepExit {
        let opcode = (instruction >> 21) & 0xF;
        let rn = ((instruction >> 16) & 0xF) as usize;
        let rd = ((instruction >> 12) & 0xF) as usize;
        let operand2 = instruction & 0xFFF;

        match opcode {
            0x0 => self.data_op(rd, self.regs[rn] & operand2),
            0x1 => self.data_op(rd, self.regs[rn] ^ operand2),
            0x2 => self.data_op(rd, self.regs[rn].wrapping_sub(operand2)),
            0x4 => self.data_op(rd, self.regs[rn].wrapping_add(operand2)),
            0x5 => {
                let carry = u32::from(self.cpsr & FLAG_C != 0);
                self.data_op(rd, self.regs[rn].wrapping_add(operand2).wrapping_add(carry));
            }
            0xD => self.data_op(rd, operand2),
            0xE => {
                // B: full 24-bit signed word offset, not the 12-bit
                // data-processing immediate
                let offset = ((instruction << 8) as i32) >> 8;
                let byte_offset = offset << 2;
                self.regs[reg::PC] = self.regs[reg::PC].wrapping_add(byte_offset as u32);
            }
            _ => {
                return StepExit::UnknownOpcode {
                    opcode: opcode as u8,
                }
            }
        }
        StepExit::Executed
    }

    fn data_op(&mut self, rd: usize, result: u32) {
        self.regs[rd] = result;
        self.update_cpsr(result);
    }

    fn update_cpsr(&mut self, result: u32) {
        // C and V tracking is out of scope for this subset
        self.cpsr &= !(FLAG_N | FLAG_Z | FLAG_C | FLAG_V);
        if result & 0x8000_0000 != 0 {
            self.cpsr |= FLAG_N;
        }
        if result == 0 {
            self.cpsr |= FLAG_Z;
        }
    }
}
