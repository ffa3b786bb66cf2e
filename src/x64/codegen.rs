// This module prints the x86-64 AT&T assembly of one allocated function. Every function
// gets two global symbols: `f` is a process entry trampoline that calls `_f` and passes
// its result to the exit system call, and `_f` is the function body. The body starts with
// a frame-pointer prologue that reserves the spill area, then walks the schedule block by
// block: block labels, one instruction sequence per node, and the sequentialized phi copies
// before each terminator. Block labels are emitted as local `.L` symbols so they never
// collide with another function's global names. Values are 32-bit. Operands in spill
// slots are staged through %r14d when read and results bound for a spill slot are
// computed in %r15d and stored afterwards; %eax and %edx are reserved for division and
// %ecx for shift counts. All text is written into an arena-backed buffer owned by the
// compilation session.

//! x86-64 AT&T assembly emission.

use std::fmt::{self, Write};

use bumpalo::collections::String as BumpString;

use super::moves::sequentialize;
use super::regs::{Location, X86Reg};
use crate::core::{CompilationSession, CompileError, CompileResult};
use crate::ir::{BinaryOp, CompareOp, IrGraph, NodeId, NodeKind};
use crate::regalloc::{Allocation, RegisterAssignment, Schedule, ScheduleItem};

const SOURCE_SCRATCH: Location = Location::Register(X86Reg::SOURCE_SCRATCH);
const DEST_SCRATCH: Location = Location::Register(X86Reg::DEST_SCRATCH);

/// Emits allocated functions as assembly text.
pub struct CodeGenerator<'s, 'arena> {
    session: &'s CompilationSession<'arena>,
}

/// Assembly text of one function and the number of instructions in it.
#[derive(Debug, Clone, Copy)]
pub struct EmittedFunction<'arena> {
    pub text: &'arena str,
    pub instructions: usize,
}

impl<'s, 'arena> CodeGenerator<'s, 'arena> {
    pub fn new(session: &'s CompilationSession<'arena>) -> Self {
        Self { session }
    }

    pub fn emit_function(
        &self,
        graph: &IrGraph,
        schedule: &Schedule,
        regs: &RegisterAssignment,
        allocation: &Allocation,
    ) -> CompileResult<EmittedFunction<'arena>> {
        let mut emitter = FunctionEmitter {
            session: self.session,
            graph,
            regs,
            allocation,
            name: self.session.intern_str(graph.name()),
            out: BumpString::new_in(self.session.arena()),
            instructions: 0,
        };

        emitter.header()?;
        emitter.prologue()?;
        for block in schedule.blocks() {
            if block.block != graph.start_block() {
                writeln!(emitter.out, ".L{}:", graph.label(block.block))?;
            }
            for item in &block.items {
                match *item {
                    ScheduleItem::Node(node) => emitter.node(node)?,
                    ScheduleItem::PhiMoves { target, pred_index } => {
                        emitter.phi_moves(schedule, target, pred_index)?
                    }
                }
            }
        }

        log::debug!(
            "{}: emitted {} instructions, frame {} bytes",
            emitter.name,
            emitter.instructions,
            allocation.frame_size()
        );
        Ok(EmittedFunction {
            instructions: emitter.instructions,
            text: emitter.out.into_bump_str(),
        })
    }
}

struct FunctionEmitter<'g, 's, 'arena> {
    session: &'s CompilationSession<'arena>,
    graph: &'g IrGraph,
    regs: &'g RegisterAssignment,
    allocation: &'g Allocation,
    name: &'arena str,
    out: BumpString<'arena>,
    instructions: usize,
}

impl<'g, 's, 'arena> FunctionEmitter<'g, 's, 'arena> {
    fn ins(&mut self, mnemonic: &'static str, operands: fmt::Arguments<'_>) -> CompileResult<()> {
        writeln!(self.out, "  {} {}", mnemonic, operands)?;
        self.count(mnemonic);
        Ok(())
    }

    fn ins0(&mut self, mnemonic: &'static str) -> CompileResult<()> {
        writeln!(self.out, "  {}", mnemonic)?;
        self.count(mnemonic);
        Ok(())
    }

    fn count(&mut self, mnemonic: &'static str) {
        self.instructions += 1;
        self.session.record_instruction_emitted(mnemonic);
        log::trace!("{}: {}", self.name, mnemonic);
    }

    fn movl(&mut self, src: Location, dst: Location) -> CompileResult<()> {
        if src == dst {
            return Ok(());
        }
        if src.is_stack() && dst.is_stack() {
            self.ins("movl", format_args!("{}, {}", src, SOURCE_SCRATCH))?;
            return self.ins("movl", format_args!("{}, {}", SOURCE_SCRATCH, dst));
        }
        self.ins("movl", format_args!("{}, {}", src, dst))
    }

    fn location(&self, node: NodeId) -> CompileResult<Location> {
        let register = self.regs.register(self.graph, node)?;
        self.allocation
            .location(register)
            .ok_or_else(|| CompileError::MissingLocation {
                function: self.graph.name().to_string(),
                register,
            })
    }

    /// Spilled sources are loaded into the source scratch register.
    fn source(&mut self, node: NodeId) -> CompileResult<Location> {
        let location = self.location(node)?;
        if location.is_stack() {
            self.movl(location, SOURCE_SCRATCH)?;
            return Ok(SOURCE_SCRATCH);
        }
        Ok(location)
    }

    /// Register to compute a result in: the target itself or the destination scratch.
    fn work(target: Location) -> Location {
        if target.is_stack() {
            DEST_SCRATCH
        } else {
            target
        }
    }

    fn store(&mut self, work: Location, target: Location) -> CompileResult<()> {
        if work != target {
            self.movl(work, target)?;
        }
        Ok(())
    }

    fn header(&mut self) -> CompileResult<()> {
        let name = self.name;
        writeln!(self.out, ".global {}", name)?;
        writeln!(self.out, ".global _{}", name)?;
        writeln!(self.out)?;
        writeln!(self.out, "{}:", name)?;
        self.ins("call", format_args!("_{}", name))?;
        self.ins("movq", format_args!("%rax, %rdi"))?;
        self.ins("movq", format_args!("$0x3C, %rax"))?;
        self.ins0("syscall")?;
        writeln!(self.out)?;
        writeln!(self.out, "_{}:", name)?;
        Ok(())
    }

    fn prologue(&mut self) -> CompileResult<()> {
        self.ins("pushq", format_args!("{}", X86Reg::Rbp.name64()))?;
        self.ins(
            "movq",
            format_args!("{}, {}", X86Reg::Rsp.name64(), X86Reg::Rbp.name64()),
        )?;
        let frame = self.allocation.frame_size();
        if frame > 0 {
            self.ins("subq", format_args!("${}, {}", frame, X86Reg::Rsp.name64()))?;
        }
        Ok(())
    }

    fn epilogue(&mut self) -> CompileResult<()> {
        self.ins(
            "movq",
            format_args!("{}, {}", X86Reg::Rbp.name64(), X86Reg::Rsp.name64()),
        )?;
        self.ins("popq", format_args!("{}", X86Reg::Rbp.name64()))?;
        self.ins0("ret")
    }

    fn node(&mut self, node: NodeId) -> CompileResult<()> {
        match self.graph.kind(node) {
            NodeKind::ConstInt(value) => {
                let target = self.location(node)?;
                self.ins("movl", format_args!("${}, {}", value, target))
            }
            NodeKind::ConstBool(value) => {
                let target = self.location(node)?;
                self.ins("movl", format_args!("${}, {}", i32::from(*value), target))
            }
            NodeKind::Undefined => {
                let target = self.location(node)?;
                self.ins("movl", format_args!("$0, {}", target))
            }
            NodeKind::Binary(op) => self.binary(node, *op),
            NodeKind::Compare(op) => self.compare(node, *op),
            NodeKind::Jump { target } => {
                let label = self.graph.label(*target);
                self.ins("jmp", format_args!(".L{}", label))
            }
            NodeKind::CondJump { if_true, if_false } => {
                let cond = self.location(self.graph.operand(node, 0))?;
                self.ins("cmpl", format_args!("$0, {}", cond))?;
                self.ins("jne", format_args!(".L{}", self.graph.label(*if_true)))?;
                self.ins("jmp", format_args!(".L{}", self.graph.label(*if_false)))
            }
            NodeKind::Return => {
                let result = self.location(self.graph.operand(node, 1))?;
                self.movl(result, Location::Register(X86Reg::Rax))?;
                self.epilogue()
            }
            other => Err(CompileError::UnexpectedNode {
                function: self.graph.name().to_string(),
                node,
                kind: other.to_string(),
                stage: "code generation",
            }),
        }
    }

    fn binary(&mut self, node: NodeId, op: BinaryOp) -> CompileResult<()> {
        let lhs = self.location(self.graph.operand(node, 0))?;
        let rhs_node = self.graph.operand(node, 1);
        let target = self.location(node)?;

        let mnemonic = match op {
            BinaryOp::Div | BinaryOp::Mod => return self.division(op, lhs, rhs_node, target),
            BinaryOp::Shl | BinaryOp::Shr => {
                let rhs = self.location(rhs_node)?;
                self.movl(rhs, Location::Register(X86Reg::SHIFT_COUNT))?;
                let work = Self::work(target);
                self.movl(lhs, work)?;
                let mnemonic = if op == BinaryOp::Shl { "sall" } else { "sarl" };
                self.ins(mnemonic, format_args!("%cl, {}", work))?;
                return self.store(work, target);
            }
            BinaryOp::Add => "addl",
            BinaryOp::Sub => "subl",
            BinaryOp::Mul => "imull",
            BinaryOp::BitAnd | BinaryOp::LogicAnd => "andl",
            BinaryOp::BitOr | BinaryOp::LogicOr => "orl",
            BinaryOp::BitXor => "xorl",
        };

        let rhs = self.source(rhs_node)?;
        let work = Self::work(target);
        self.movl(lhs, work)?;
        self.ins(mnemonic, format_args!("{}, {}", rhs, work))?;
        self.store(work, target)
    }

    fn division(
        &mut self,
        op: BinaryOp,
        lhs: Location,
        rhs_node: NodeId,
        target: Location,
    ) -> CompileResult<()> {
        let rhs = self.source(rhs_node)?;
        let dividend = Location::Register(X86Reg::DIVIDEND);
        let remainder = Location::Register(X86Reg::REMAINDER);
        self.ins("xorl", format_args!("{}, {}", remainder, remainder))?;
        self.movl(lhs, dividend)?;
        self.ins0("cltd")?;
        self.ins("idivl", format_args!("{}", rhs))?;
        let result = if op == BinaryOp::Div { dividend } else { remainder };
        self.movl(result, target)
    }

    fn compare(&mut self, node: NodeId, op: CompareOp) -> CompileResult<()> {
        let lhs = self.location(self.graph.operand(node, 0))?;
        let rhs = self.source(self.graph.operand(node, 1))?;
        let target = self.location(node)?;

        let jump = match op {
            CompareOp::Less => "jl",
            CompareOp::LessEq => "jle",
            CompareOp::Greater => "jg",
            CompareOp::GreaterEq => "jge",
            CompareOp::Equal => "je",
            CompareOp::NotEqual => "jne",
        };
        let true_label = format!(".L{}_cmp{}_true", self.name, node.index());
        let end_label = format!(".L{}_cmp{}_end", self.name, node.index());

        self.ins("cmpl", format_args!("{}, {}", rhs, lhs))?;
        self.ins(jump, format_args!("{}", true_label))?;
        self.ins("movl", format_args!("$0, {}", target))?;
        self.ins("jmp", format_args!("{}", end_label))?;
        writeln!(self.out, "{}:", true_label)?;
        self.ins("movl", format_args!("$1, {}", target))?;
        writeln!(self.out, "{}:", end_label)?;
        Ok(())
    }

    fn phi_moves(
        &mut self,
        schedule: &Schedule,
        target: NodeId,
        pred_index: usize,
    ) -> CompileResult<()> {
        let mut moves = Vec::new();
        for &phi in schedule.value_phis(target) {
            let source = self.location(self.graph.operand(phi, pred_index))?;
            let destination = self.location(phi)?;
            moves.push((source, destination));
        }
        for (source, destination) in sequentialize(&moves, DEST_SCRATCH) {
            self.movl(source, destination)?;
        }
        Ok(())
    }
}
