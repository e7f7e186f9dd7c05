/// Number of 32-bit words in a context stack.
pub const STACK_WORDS: usize = 1024;

/// Number of 32-bit slots in the context extension bank.
///
/// The extension bank exists so that register files wider than the eight
/// conventional 32-bit slots (x64: sixteen 64-bit registers plus a 64-bit
/// instruction pointer and flags word) can be carried without losing bits.
/// Architectures that fit in the conventional slots leave it untouched.
pub const EXT_SLOTS: usize = 32;

/// Architecture-neutral snapshot of a VM's execution state.
///
/// A context is the *only* channel through which VM state crosses a
/// pause/resume or architecture-mapping boundary. It is created zeroed at VM
/// construction, written as a whole by `save_context` and consumed as a whole
/// by `load_context`; it is never partially written.
///
/// The general slots are named after the x86 register file by convention.
/// Other architectures map onto them as documented by their `save_context`
/// implementations; a mapping must not discard live register bits it will
/// later need back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmContext {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub esi: u32,
    pub edi: u32,
    /// Base pointer slot.
    pub ebp: u32,
    /// Stack pointer slot.
    pub esp: u32,
    /// Instruction pointer slot.
    pub eip: u32,
    /// Flags word slot.
    pub eflags: u32,
    /// Extension bank for register files wider than the conventional slots.
    pub ext: [u32; EXT_SLOTS],
    /// Word stack, `STACK_WORDS` entries.
    pub stack: Vec<u32>,
}

impl Default for VmContext {
    fn default() -> Self {
        Self {
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
            ext: [0; EXT_SLOTS],
            stack: vec![0; STACK_WORDS],
        }
    }
}

impl VmContext {
    /// Create a zeroed context.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_context_is_zeroed() {
        let ctx = VmContext::new();
        assert_eq!(ctx.eax, 0);
        assert_eq!(ctx.eip, 0);
        assert_eq!(ctx.eflags, 0);
        assert!(ctx.ext.iter().all(|&w| w == 0));
        assert_eq!(ctx.stack.len(), STACK_WORDS);
        assert!(ctx.stack.iter().all(|&w| w == 0));
    }
}
