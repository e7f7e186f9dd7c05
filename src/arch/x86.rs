use axerrno::AxResult;

use crate::arch_vm::AxArchVm;
use crate::context::{VmContext, STACK_WORDS};
use crate::exit::StepExit;
use crate::vm::AxVm;

/// Zero flag.
const FLAG_ZF: u32 = 1 << 6;
/// Sign flag.
const FLAG_SF: u32 = 1 << 7;

/// Register indices for [`AxArchVm::gpr`]/[`AxArchVm::set_gpr`].
pub mod reg {
    pub const EAX: usize = 0;
    pub const EBX: usize = 1;
    pub const ECX: usize = 2;
    pub const EDX: usize = 3;
    pub const ESI: usize = 4;
    pub const EDI: usize = 5;
    pub const EBP: usize = 6;
    pub const ESP: usize = 7;
}

/// x86 execution engine.
///
/// One instruction is one opcode byte; the modeled subset is:
///
/// | opcode | operation                  |
/// |--------|----------------------------|
/// | `0x00` | NOP                        |
/// | `0x01` | MOV eax, ebx               |
/// | `0x02` | ADD eax, ebx (ZF/SF)       |
/// | `0x03` | SUB eax, ebx (ZF/SF)       |
/// | `0x04` | INC eax (ZF/SF)            |
/// | `0x05` | DEC eax (ZF/SF)            |
/// | `0x06` | PUSH eax                   |
/// | `0x07` | POP eax                    |
///
/// Anything else retires as an unknown opcode. Push and pop outside stack
/// bounds are silent no-ops, not faults. The stack pointer counts bytes and
/// grows downward within the 1024-word stack.
pub struct X86Cpu {
    eax: u32,
    ebx: u32,
    ecx: u32,
    edx: u32,
    esi: u32,
    edi: u32,
    ebp: u32,
    esp: u32,
    eip: u32,
    eflags: u32,
    stack: Vec<u32>,
}

/// An x86 virtual machine.
pub type X86Machine = AxVm<X86Cpu>;

impl AxArchVm for X86Cpu {
    type CreateConfig = ();

    fn new(_config: ()) -> AxResult<Self> {
        Ok(Self {
            eax: 0,
            ebx: 0,
            ecx: 0,
            edx: 0,
            esi: 0,
            edi: 0,
            ebp: 0,
            esp: 0,
            eip: 0,
            eflags: 0,
            stack: vec![0; STACK_WORDS],
        })
    }

    fn arch_name(&self) -> &'static str {
        "x86"
    }

    fn step(&mut self, payload: &[u8]) -> StepExit {
        if self.eip as usize >= payload.len() {
            return StepExit::OutOfPayload;
        }
        let opcode = payload[self.eip as usize];
        self.eip += 1;
        self.execute(opcode)
    }

    /// Context fields map 1:1 to the x86 register names; no width conversion
    /// occurs. The word stack travels with the registers.
    fn save_context(&self, ctx: &mut VmContext) {
        ctx.eax = self.eax;
        ctx.ebx = self.ebx;
        ctx.ecx = self.ecx;
        ctx.edx = self.edx;
        ctx.esi = self.esi;
        ctx.edi = self.edi;
        ctx.ebp = self.ebp;
        ctx.esp = self.esp;
        ctx.eip = self.eip;
        ctx.eflags = self.eflags;
        ctx.stack.clone_from(&self.stack);
    }

    fn load_context(&mut self, ctx: &VmContext) {
        self.eax = ctx.eax;
        self.ebx = ctx.ebx;
        self.ecx = ctx.ecx;
        self.edx = ctx.edx;
        self.esi = ctx.esi;
        self.edi = ctx.edi;
        self.ebp = ctx.ebp;
        self.esp = ctx.esp;
        self.eip = ctx.eip;
        self.eflags = ctx.eflags;
        self.stack.clone_from(&ctx.stack);
    }

    fn gpr(&self, reg: usize) -> u64 {
        let val = match reg {
            reg::EAX => self.eax,
            reg::EBX => self.ebx,
            reg::ECX => self.ecx,
            reg::EDX => self.edx,
            reg::ESI => self.esi,
            reg::EDI => self.edi,
            reg::EBP => self.ebp,
            reg::ESP => self.esp,
            _ => 0,
        };
        val as u64
    }

    fn set_gpr(&mut self, reg: usize, val: u64) {
        let val = val as u32;
        match reg {
            reg::EAX => self.eax = val,
            reg::EBX => self.ebx = val,
            reg::ECX => self.ecx = val,
            reg::EDX => self.edx = val,
            reg::ESI => self.esi = val,
            reg::EDI => self.edi = val,
            reg::EBP => self.ebp = val,
            reg::ESP => self.esp = val,
            _ => {}
        }
    }

    fn instruction_pointer(&self) -> u64 {
        self.eip as u64
    }
}

impl X86Cpu {
    fn execute(&mut self, opcode: u8) -> StepExit {
        match opcode {
            0x00 => {} // NOP
            0x01 => self.eax = self.ebx,
            0x02 => {
                self.eax = self.eax.wrapping_add(self.ebx);
                self.update_flags(self.eax);
            }
            0x03 => {
                self.eax = self.eax.wrapping_sub(self.ebx);
                self.update_flags(self.eax);
            }
            0x04 => {
                self.eax = self.eax.wrapping_add(1);
                self.update_flags(self.eax);
            }
            0x05 => {
                self.eax = self.eax.wrapping_sub(1);
                self.update_flags(self.eax);
            }
            0x06 => self.push(self.eax),
            0x07 => self.eax = self.pop().unwrap_or(self.eax),
            _ => return StepExit::UnknownOpcode { opcode },
        }
        StepExit::Executed
    }

    /// Push a word, moving esp down by 4. Out of range: silent no-op.
    fn push(&mut self, value: u32) {
        let bytes = (self.stack.len() * 4) as u32;
        if self.esp >= 4 && self.esp <= bytes {
            self.stack[(self.esp as usize - 4) / 4] = value;
            self.esp -= 4;
        }
    }

    /// Pop a word, moving esp up by 4. Out of range: `None`, state unchanged.
    fn pop(&mut self) -> Option<u32> {
        let bytes = (self.stack.len() * 4) as u32;
        if self.esp < bytes {
            let value = self.stack[self.esp as usize / 4];
            self.esp += 4;
            Some(value)
        } else {
            None
        }
    }

    fn update_flags(&mut self, result: u32) {
        self.eflags &= !(FLAG_ZF | FLAG_SF);
        if result == 0 {
            self.eflags |= FLAG_ZF;
        }
        if result & 0x8000_0000 != 0 {
            self.eflags |= FLAG_SF;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn x86(id: u32) -> X86Machine {
        X86Machine::new(id, ()).unwrap()
    }

    fn run(vm: &X86Machine, payload: &[u8], steps: usize) {
        let payload: Arc<[u8]> = payload.to_vec().into();
        vm.set_payload(payload);
        vm.start().unwrap();
        for _ in 0..steps {
            vm.run_one_instruction();
        }
    }

    #[test]
    fn mov_add_sub_semantics() {
        let vm = x86(1);
        vm.set_gpr(reg::EBX, 5);
        run(&vm, &[0x01, 0x02, 0x03, 0x03], 4);
        // mov: eax=5; add: 10; sub: 5; sub: 0
        assert_eq!(vm.gpr(reg::EAX), 0);
        let ctx_flags = {
            vm.save_context();
            vm.context().eflags
        };
        assert_ne!(ctx_flags & FLAG_ZF, 0);
        assert_eq!(ctx_flags & FLAG_SF, 0);
    }

    #[test]
    fn inc_dec_update_sign_flag() {
        let vm = x86(2);
        run(&vm, &[0x05], 1); // dec from 0 wraps to u32::MAX
        assert_eq!(vm.gpr(reg::EAX), u32::MAX as u64);
        vm.save_context();
        assert_ne!(vm.context().eflags & FLAG_SF, 0);
    }

    #[test]
    fn push_pop_round_trip() {
        let vm = x86(3);
        vm.set_gpr(reg::ESP, 64);
        vm.set_gpr(reg::EBX, 0xDEAD);
        // mov eax, ebx; push; dec; pop
        run(&vm, &[0x01, 0x06, 0x05, 0x07], 4);
        assert_eq!(vm.gpr(reg::EAX), 0xDEAD);
        assert_eq!(vm.gpr(reg::ESP), 64);
    }

    #[test]
    fn out_of_range_push_pop_is_silent_noop() {
        let vm = x86(4);
        // esp = 0: push has no room below, pop reads in range. Park esp at
        // the very top instead so both directions are out of range.
        vm.set_gpr(reg::ESP, (STACK_WORDS * 4) as u64);
        vm.set_gpr(reg::EAX, 1);
        run(&vm, &[0x07], 1); // pop at top of stack: no-op
        assert_eq!(vm.gpr(reg::EAX), 1);
        assert_eq!(vm.gpr(reg::ESP), (STACK_WORDS * 4) as u64);

        let vm = x86(5);
        // esp = 0: push would underflow, silently skipped
        run(&vm, &[0x06], 1);
        assert_eq!(vm.gpr(reg::ESP), 0);
    }

    #[test]
    fn context_round_trip_preserves_stack() {
        let vm = x86(6);
        vm.set_gpr(reg::ESP, 8);
        vm.set_gpr(reg::EAX, 42);
        run(&vm, &[0x06], 1); // push 42: stack word 1, esp 8 -> 4
        vm.save_context();
        vm.set_gpr(reg::EAX, 0);
        vm.set_gpr(reg::ESP, 0);
        vm.load_context();
        assert_eq!(vm.gpr(reg::EAX), 42);
        assert_eq!(vm.gpr(reg::ESP), 4);
        assert_eq!(vm.context().stack[1], 42);
    }

    /// End-to-end scenario: the 15-byte mixed payload, 5 steps, register
    /// values pinned from the opcode table (0xB8 is outside the modeled
    /// subset and retires as a no-op; 0x01 moves ebx into eax).
    #[test]
    fn end_to_end_mixed_payload() {
        let vm = x86(7);
        let payload = [
            0xB8, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x00, 0x00, 0x00, 0x40, 0x48, 0x90, 0xEB,
            0xFA,
        ];
        run(&vm, &payload, 5);
        // 0xB8 unknown -> no-op; 0x01 mov eax, ebx (= 0); 0x00 x3 NOP
        assert_eq!(vm.gpr(reg::EAX), 0);
        assert_eq!(vm.resource_usage(), 5);
        vm.save_context();
        assert_eq!(vm.context().eip, 5);

        // same payload, but with ebx primed the mov is observable
        let vm = x86(8);
        vm.set_gpr(reg::EBX, 0x1234);
        run(&vm, &payload, 5);
        assert_eq!(vm.gpr(reg::EAX), 0x1234);
    }
}
