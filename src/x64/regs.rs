//! x86-64 register set and value locations.
//!
//! Values are 32 bits wide, so registers print with their 32-bit names.
//! `RAX`/`RDX` are kept for division, `RCX` for shift counts and
//! `R14`/`R15` for staging spilled operands; `RSP`/`RBP` hold the frame.

use std::fmt;

/// x86-64 general purpose registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum X86Reg {
    Rax,
    Rbx,
    Rcx,
    Rdx,
    Rsi,
    Rdi,
    Rbp,
    Rsp,
    R8,
    R9,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl X86Reg {
    /// Registers handed to the allocator, in priority order.
    pub const ALLOCATABLE: &'static [X86Reg] = &[
        X86Reg::Rbx,
        X86Reg::Rsi,
        X86Reg::Rdi,
        X86Reg::R8,
        X86Reg::R9,
        X86Reg::R10,
        X86Reg::R11,
        X86Reg::R12,
        X86Reg::R13,
    ];

    /// Receives a spilled source operand before use.
    pub const SOURCE_SCRATCH: X86Reg = X86Reg::R14;
    /// Holds a result bound for a spill slot; also breaks parallel-move cycles.
    pub const DEST_SCRATCH: X86Reg = X86Reg::R15;
    /// Dividend and quotient of `idivl`.
    pub const DIVIDEND: X86Reg = X86Reg::Rax;
    /// High half of the dividend and remainder of `idivl`.
    pub const REMAINDER: X86Reg = X86Reg::Rdx;
    /// Carries the count of variable shifts as `%cl`.
    pub const SHIFT_COUNT: X86Reg = X86Reg::Rcx;

    /// 32-bit register name.
    pub fn name32(self) -> &'static str {
        match self {
            X86Reg::Rax => "%eax",
            X86Reg::Rbx => "%ebx",
            X86Reg::Rcx => "%ecx",
            X86Reg::Rdx => "%edx",
            X86Reg::Rsi => "%esi",
            X86Reg::Rdi => "%edi",
            X86Reg::Rbp => "%ebp",
            X86Reg::Rsp => "%esp",
            X86Reg::R8 => "%r8d",
            X86Reg::R9 => "%r9d",
            X86Reg::R10 => "%r10d",
            X86Reg::R11 => "%r11d",
            X86Reg::R12 => "%r12d",
            X86Reg::R13 => "%r13d",
            X86Reg::R14 => "%r14d",
            X86Reg::R15 => "%r15d",
        }
    }

    /// 64-bit register name.
    pub fn name64(self) -> &'static str {
        match self {
            X86Reg::Rax => "%rax",
            X86Reg::Rbx => "%rbx",
            X86Reg::Rcx => "%rcx",
            X86Reg::Rdx => "%rdx",
            X86Reg::Rsi => "%rsi",
            X86Reg::Rdi => "%rdi",
            X86Reg::Rbp => "%rbp",
            X86Reg::Rsp => "%rsp",
            X86Reg::R8 => "%r8",
            X86Reg::R9 => "%r9",
            X86Reg::R10 => "%r10",
            X86Reg::R11 => "%r11",
            X86Reg::R12 => "%r12",
            X86Reg::R13 => "%r13",
            X86Reg::R14 => "%r14",
            X86Reg::R15 => "%r15",
        }
    }

    /// Whether the allocator may hand this register out.
    pub fn is_allocatable(self) -> bool {
        Self::ALLOCATABLE.contains(&self)
    }
}

impl fmt::Display for X86Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name32())
    }
}

/// Where a virtual register lives after allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    Register(X86Reg),
    /// Spill slot at this byte offset from `%rsp`.
    Stack(i32),
}

impl Location {
    pub fn is_stack(self) -> bool {
        matches!(self, Location::Stack(_))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Register(reg) => write!(f, "{}", reg),
            Location::Stack(offset) => write!(f, "{}(%rsp)", offset),
        }
    }
}
