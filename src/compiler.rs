// This module is the driver that runs the full pipeline for a program. Each function is
// translated into its SSA graph, optionally dumped as GraphViz text, scheduled, given
// virtual registers, analyzed for liveness, colored onto the physical registers and
// printed as assembly. Per-function scratch lives in the session arena, and the session
// statistics are updated as each stage finishes. The assembly of all functions is
// concatenated after a single `.text` directive.

//! Program compilation driver.

use bumpalo::Bump;

use crate::ast::{Function, Program};
use crate::core::{CompilationSession, CompileResult, CompilerConfig};
use crate::ir::{dump, translate};
use crate::regalloc::{LivenessAnalysis, PhysicalRegisterAllocator, RegisterAssignment, Schedule};
use crate::x64::{CodeGenerator, EmittedFunction, X86Reg};

/// Compiles programs against one session.
pub struct Compiler<'a, 'arena> {
    session: &'a CompilationSession<'arena>,
    config: CompilerConfig,
    allocator: PhysicalRegisterAllocator,
}

impl<'a, 'arena> Compiler<'a, 'arena> {
    pub fn new(session: &'a CompilationSession<'arena>, config: CompilerConfig) -> Self {
        Self {
            session,
            config,
            allocator: PhysicalRegisterAllocator::new(),
        }
    }

    /// Restrict allocation to `registers`, in priority order.
    pub fn with_registers(mut self, registers: Vec<X86Reg>) -> Self {
        self.allocator = PhysicalRegisterAllocator::with_registers(registers);
        self
    }

    pub fn session(&self) -> &'a CompilationSession<'arena> {
        self.session
    }

    /// Compile every function of `program` into one assembly text.
    pub fn compile_program(&self, program: &Program) -> CompileResult<String> {
        let mut text = String::from(".text\n");
        for function in &program.functions {
            let emitted = self.compile_function(function).inspect_err(|err| {
                let name = self.session.current_function().unwrap_or_default();
                log::error!("{}: compilation failed: {}", name, err);
            })?;
            text.push('\n');
            text.push_str(emitted.text);
        }
        log::debug!(
            "compiled {} functions into {} bytes of assembly",
            program.functions.len(),
            text.len()
        );
        Ok(text)
    }

    pub fn compile_function(&self, function: &Function) -> CompileResult<EmittedFunction<'arena>> {
        log::debug!("compiling function {}", function.name);
        self.session.set_current_function(&function.name);

        let translated = translate(function);
        let graph = &translated.graph;
        self.session
            .record_graph_built(graph.len(), translated.phis_removed);

        if let Some(dir) = &self.config.dump_graphs {
            let path = dump::write_dot(graph, dir)?;
            log::info!("{}: graph written to {}", function.name, path.display());
        }

        let schedule = Schedule::build(graph)?;
        let regs = RegisterAssignment::allocate(graph, &schedule);
        let liveness = LivenessAnalysis::analyze(self.session.arena(), graph, &schedule, &regs)?;
        let allocation = self.allocator.allocate(&liveness);
        self.session
            .record_allocation(regs.len(), allocation.spill_slots());
        log::debug!(
            "{}: {} virtual registers, {} spill slots",
            function.name,
            regs.len(),
            allocation.spill_slots()
        );

        let emitted =
            CodeGenerator::new(self.session).emit_function(graph, &schedule, &regs, &allocation)?;
        self.session
            .record_function_compiled(&function.name, emitted.instructions);
        self.session.clear_function_state();
        Ok(emitted)
    }
}

/// Compile `program` with a fresh arena and the configuration from the environment.
pub fn compile(program: &Program) -> CompileResult<String> {
    let arena = Bump::new();
    let session = CompilationSession::new(&arena);
    Compiler::new(&session, CompilerConfig::from_env()).compile_program(program)
}
