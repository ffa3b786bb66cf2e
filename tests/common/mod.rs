//! Shared helpers for the integration tests.
//!
//! `Machine` executes the subset of x86-64 AT&T assembly the code generator
//! prints, so tests can check what a compiled program returns without an
//! assembler. Execution starts at `_<function>` with a sentinel return
//! address on the stack and ends when that address is popped; the result is
//! the value left in `%eax`. Reading a stack byte that was never written is
//! treated as an error so that stale spill slots surface as failures.

#![allow(dead_code)]

use std::collections::HashMap;

use bumpalo::Bump;
use minic::ast::Program;
use minic::core::{CompilationSession, CompilerConfig};
use minic::x64::X86Reg;
use minic::Compiler;

const STACK_TOP: i64 = 0x10_0000;
const SENTINEL: i64 = -1;
const STEP_LIMIT: usize = 1_000_000;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Compile `program` with the default register set.
pub fn compile(program: &Program) -> String {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    Compiler::new(&session, CompilerConfig::default())
        .compile_program(program)
        .expect("compilation failed")
}

/// Compile `program` allocating only onto `registers`.
pub fn compile_with_registers(program: &Program, registers: &[X86Reg]) -> String {
    init_logging();
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    Compiler::new(&session, CompilerConfig::default())
        .with_registers(registers.to_vec())
        .compile_program(program)
        .expect("compilation failed")
}

/// Compile and run `main`.
pub fn compile_and_run(program: &Program) -> i32 {
    let asm = compile(program);
    run(&asm, "main").unwrap_or_else(|e| panic!("{}\n{}", e, asm))
}

/// Compile onto `registers` and run `main`.
pub fn compile_and_run_with(program: &Program, registers: &[X86Reg]) -> i32 {
    let asm = compile_with_registers(program, registers);
    run(&asm, "main").unwrap_or_else(|e| panic!("{}\n{}", e, asm))
}

/// Execute `_<function>` of `asm` and return `%eax`.
pub fn run(asm: &str, function: &str) -> Result<i32, String> {
    let program = Parsed::parse(asm)?;
    let mut machine = Machine::new(&program);
    machine.call(&format!("_{}", function))
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Imm(i64),
    Reg(&'static str, Width),
    Mem(i64, &'static str),
    Label(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Width {
    Byte,
    Long,
    Quad,
}

#[derive(Debug, Clone)]
struct Instruction {
    mnemonic: String,
    operands: Vec<Operand>,
    line: usize,
}

struct Parsed {
    instructions: Vec<Instruction>,
    labels: HashMap<String, usize>,
}

fn register(name: &str) -> Option<(&'static str, Width)> {
    const TABLE: &[(&str, &str, &str, &str)] = &[
        ("rax", "%rax", "%eax", "%al"),
        ("rbx", "%rbx", "%ebx", "%bl"),
        ("rcx", "%rcx", "%ecx", "%cl"),
        ("rdx", "%rdx", "%edx", "%dl"),
        ("rsi", "%rsi", "%esi", "%sil"),
        ("rdi", "%rdi", "%edi", "%dil"),
        ("rbp", "%rbp", "%ebp", "%bpl"),
        ("rsp", "%rsp", "%esp", "%spl"),
        ("r8", "%r8", "%r8d", "%r8b"),
        ("r9", "%r9", "%r9d", "%r9b"),
        ("r10", "%r10", "%r10d", "%r10b"),
        ("r11", "%r11", "%r11d", "%r11b"),
        ("r12", "%r12", "%r12d", "%r12b"),
        ("r13", "%r13", "%r13d", "%r13b"),
        ("r14", "%r14", "%r14d", "%r14b"),
        ("r15", "%r15", "%r15d", "%r15b"),
    ];
    TABLE.iter().find_map(|&(base, q, l, b)| {
        if name == q {
            Some((base, Width::Quad))
        } else if name == l {
            Some((base, Width::Long))
        } else if name == b {
            Some((base, Width::Byte))
        } else {
            None
        }
    })
}

fn parse_operand(text: &str) -> Result<Operand, String> {
    let text = text.trim();
    if let Some(imm) = text.strip_prefix('$') {
        let value = match imm.strip_prefix("0x") {
            Some(hex) => i64::from_str_radix(hex, 16),
            None => imm.parse::<i64>(),
        };
        return value.map(Operand::Imm).map_err(|e| format!("bad immediate {}: {}", text, e));
    }
    if text.starts_with('%') {
        let (base, width) = register(text).ok_or_else(|| format!("unknown register {}", text))?;
        return Ok(Operand::Reg(base, width));
    }
    if let Some(open) = text.find('(') {
        let offset = if open == 0 {
            0
        } else {
            text[..open]
                .parse::<i64>()
                .map_err(|e| format!("bad offset {}: {}", text, e))?
        };
        let inner = text[open + 1..].trim_end_matches(')');
        let (base, _) = register(inner).ok_or_else(|| format!("unknown base {}", text))?;
        return Ok(Operand::Mem(offset, base));
    }
    Ok(Operand::Label(text.to_string()))
}

impl Parsed {
    fn parse(asm: &str) -> Result<Self, String> {
        let mut instructions = Vec::new();
        let mut labels = HashMap::new();
        for (number, raw) in asm.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(label) = line.strip_suffix(':') {
                if labels.insert(label.to_string(), instructions.len()).is_some() {
                    return Err(format!("duplicate label {}", label));
                }
                continue;
            }
            if line.starts_with('.') {
                continue;
            }
            let (mnemonic, rest) = match line.split_once(' ') {
                Some((m, rest)) => (m, rest),
                None => (line, ""),
            };
            let operands = if rest.trim().is_empty() {
                Vec::new()
            } else {
                rest.split(',').map(parse_operand).collect::<Result<_, _>>()?
            };
            instructions.push(Instruction {
                mnemonic: mnemonic.to_string(),
                operands,
                line: number + 1,
            });
        }
        Ok(Self {
            instructions,
            labels,
        })
    }
}

struct Machine<'p> {
    program: &'p Parsed,
    registers: HashMap<&'static str, i64>,
    memory: HashMap<i64, u8>,
    /// Operands of the last `cmpl`: destination and source.
    flags: (i32, i32),
}

impl<'p> Machine<'p> {
    fn new(program: &'p Parsed) -> Self {
        let mut registers = HashMap::new();
        registers.insert("rsp", STACK_TOP);
        Self {
            program,
            registers,
            memory: HashMap::new(),
            flags: (0, 0),
        }
    }

    fn reg(&self, name: &str) -> i64 {
        self.registers.get(name).copied().unwrap_or(0)
    }

    fn set_reg(&mut self, name: &'static str, width: Width, value: i64) {
        let value = match width {
            Width::Quad => value,
            Width::Long => value as u32 as i64,
            Width::Byte => (self.reg(name) & !0xff) | (value & 0xff),
        };
        self.registers.insert(name, value);
    }

    fn load(&self, address: i64, bytes: usize) -> Result<i64, String> {
        let mut value: u64 = 0;
        for i in (0..bytes).rev() {
            let byte = self
                .memory
                .get(&(address + i as i64))
                .ok_or_else(|| format!("read of uninitialized memory at {:#x}", address + i as i64))?;
            value = (value << 8) | *byte as u64;
        }
        Ok(value as i64)
    }

    fn store(&mut self, address: i64, bytes: usize, value: i64) {
        for i in 0..bytes {
            self.memory.insert(address + i as i64, (value >> (8 * i)) as u8);
        }
    }

    fn read(&self, operand: &Operand, width: Width) -> Result<i64, String> {
        match operand {
            Operand::Imm(value) => Ok(*value),
            Operand::Reg(name, w) => {
                let raw = self.reg(name);
                Ok(match w {
                    Width::Quad => raw,
                    Width::Long => raw as i32 as i64,
                    Width::Byte => raw & 0xff,
                })
            }
            Operand::Mem(offset, base) => {
                let address = self.reg(base) + offset;
                match width {
                    Width::Quad => self.load(address, 8),
                    Width::Long => self.load(address, 4).map(|v| v as i32 as i64),
                    Width::Byte => self.load(address, 1),
                }
            }
            Operand::Label(label) => Err(format!("label {} used as a value", label)),
        }
    }

    fn write(&mut self, operand: &Operand, width: Width, value: i64) -> Result<(), String> {
        match operand {
            Operand::Reg(name, w) => {
                self.set_reg(*name, *w, value);
                Ok(())
            }
            Operand::Mem(offset, base) => {
                let address = self.reg(base) + offset;
                let bytes = match width {
                    Width::Quad => 8,
                    Width::Long => 4,
                    Width::Byte => 1,
                };
                self.store(address, bytes, value);
                Ok(())
            }
            other => Err(format!("cannot write to {:?}", other)),
        }
    }

    fn push(&mut self, value: i64) {
        let rsp = self.reg("rsp") - 8;
        self.registers.insert("rsp", rsp);
        self.store(rsp, 8, value);
    }

    fn pop(&mut self) -> Result<i64, String> {
        let rsp = self.reg("rsp");
        let value = self.load(rsp, 8)?;
        self.registers.insert("rsp", rsp + 8);
        Ok(value)
    }

    fn target(&self, operand: &Operand) -> Result<usize, String> {
        match operand {
            Operand::Label(label) => self
                .program
                .labels
                .get(label)
                .copied()
                .ok_or_else(|| format!("unknown label {}", label)),
            other => Err(format!("jump to {:?}", other)),
        }
    }

    fn call(&mut self, entry: &str) -> Result<i32, String> {
        let mut pc = self.target(&Operand::Label(entry.to_string()))?;
        self.push(SENTINEL);

        for _ in 0..STEP_LIMIT {
            let instruction = self
                .program
                .instructions
                .get(pc)
                .ok_or_else(|| format!("fell off the end at {}", pc))?
                .clone();
            let ops = &instruction.operands;
            let err = |message: String| format!("line {}: {}", instruction.line, message);
            pc += 1;

            let binary = |machine: &Self| -> Result<(i32, i32), String> {
                let src = machine.read(&ops[0], Width::Long)? as i32;
                let dst = machine.read(&ops[1], Width::Long)? as i32;
                Ok((src, dst))
            };

            match instruction.mnemonic.as_str() {
                "movl" => {
                    let value = self.read(&ops[0], Width::Long).map_err(err)?;
                    self.write(&ops[1], Width::Long, value).map_err(err)?;
                }
                "movq" => {
                    let value = self.read(&ops[0], Width::Quad).map_err(err)?;
                    self.write(&ops[1], Width::Quad, value).map_err(err)?;
                }
                "addl" | "subl" | "imull" | "andl" | "orl" | "xorl" => {
                    let (src, dst) = binary(self).map_err(err)?;
                    let value = match instruction.mnemonic.as_str() {
                        "addl" => dst.wrapping_add(src),
                        "subl" => dst.wrapping_sub(src),
                        "imull" => dst.wrapping_mul(src),
                        "andl" => dst & src,
                        "orl" => dst | src,
                        _ => dst ^ src,
                    };
                    self.write(&ops[1], Width::Long, value as i64).map_err(err)?;
                }
                "sall" | "sarl" => {
                    let (count, dst) = binary(self).map_err(err)?;
                    let count = (count & 31) as u32;
                    let value = if instruction.mnemonic == "sall" {
                        dst.wrapping_shl(count)
                    } else {
                        dst >> count
                    };
                    self.write(&ops[1], Width::Long, value as i64).map_err(err)?;
                }
                "subq" => {
                    let src = self.read(&ops[0], Width::Quad).map_err(err)?;
                    let dst = self.read(&ops[1], Width::Quad).map_err(err)?;
                    self.write(&ops[1], Width::Quad, dst - src).map_err(err)?;
                }
                "cltd" => {
                    let eax = self.reg("rax") as i32;
                    self.set_reg("rdx", Width::Long, if eax < 0 { -1 } else { 0 });
                }
                "idivl" => {
                    let divisor = self.read(&ops[0], Width::Long).map_err(err)?;
                    if divisor == 0 {
                        return Err(err("division by zero".to_string()));
                    }
                    let dividend = ((self.reg("rdx") as i32 as i64) << 32) | (self.reg("rax") as u32 as i64);
                    self.set_reg("rax", Width::Long, dividend / divisor);
                    self.set_reg("rdx", Width::Long, dividend % divisor);
                }
                "cmpl" => {
                    let (src, dst) = binary(self).map_err(err)?;
                    self.flags = (dst, src);
                }
                "jmp" | "je" | "jne" | "jl" | "jle" | "jg" | "jge" => {
                    let (lhs, rhs) = self.flags;
                    let taken = match instruction.mnemonic.as_str() {
                        "jmp" => true,
                        "je" => lhs == rhs,
                        "jne" => lhs != rhs,
                        "jl" => lhs < rhs,
                        "jle" => lhs <= rhs,
                        "jg" => lhs > rhs,
                        _ => lhs >= rhs,
                    };
                    if taken {
                        pc = self.target(&ops[0]).map_err(err)?;
                    }
                }
                "pushq" => {
                    let value = self.read(&ops[0], Width::Quad).map_err(err)?;
                    self.push(value);
                }
                "popq" => {
                    let value = self.pop().map_err(err)?;
                    self.write(&ops[0], Width::Quad, value).map_err(err)?;
                }
                "call" => {
                    let next = pc as i64;
                    pc = self.target(&ops[0]).map_err(err)?;
                    self.push(next);
                }
                "ret" => {
                    let address = self.pop().map_err(err)?;
                    if address == SENTINEL {
                        return Ok(self.reg("rax") as i32);
                    }
                    pc = address as usize;
                }
                other => return Err(err(format!("unsupported instruction {}", other))),
            }
        }
        Err(format!("no return after {} steps", STEP_LIMIT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_runs_handwritten_code() {
        let asm = "\
_f:
  pushq %rbp
  movq %rsp, %rbp
  subq $8, %rsp
  movl $7, 4(%rsp)
  movl $3, %ebx
  movl 4(%rsp), %r14d
  subl %ebx, %r14d
  cmpl $0, %r14d
  jne .Ldone
  movl $99, %r14d
.Ldone:
  movl %r14d, %eax
  movq %rbp, %rsp
  popq %rbp
  ret
";
        assert_eq!(run(asm, "f"), Ok(4));
    }

    #[test]
    fn test_machine_rejects_stale_slot() {
        let asm = "\
_f:
  subq $8, %rsp
  movl 0(%rsp), %eax
  ret
";
        assert!(run(asm, "f").is_err());
    }
}
