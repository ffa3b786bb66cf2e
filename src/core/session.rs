// This module provides arena-based compilation session management using the bumpalo crate.
// CompilationSession owns a reference to the arena that backs every per-function scratch
// buffer of the back end: the liveness fact tables and the assembly text of the function
// being emitted are allocated there and dropped together with the arena. The session also
// tracks the function currently being compiled (for log context) and accumulates
// SessionStats across functions: graph sizes, phis removed by trivial-phi elimination,
// virtual registers, spill slots and emitted instructions broken down by mnemonic.

//! Arena-based compilation session management.
//!
//! All per-function scratch data is tied to the session lifetime, so a
//! driver can compile a whole program against one arena and reset it
//! afterwards.

use bumpalo::Bump;
use hashbrown::HashMap;
use std::cell::RefCell;
use std::fmt;

/// Arena-based compilation session.
pub struct CompilationSession<'arena> {
    /// Arena allocator for per-function scratch data.
    arena: &'arena Bump,

    /// Session statistics for debugging.
    stats: RefCell<SessionStats>,

    /// String interning for labels shared across passes.
    interned_strings: RefCell<HashMap<String, &'arena str>>,

    /// Current function being compiled.
    current_function: RefCell<Option<String>>,
}

impl<'arena> CompilationSession<'arena> {
    /// Create a new compilation session with the given arena.
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            stats: RefCell::new(SessionStats::default()),
            interned_strings: RefCell::new(HashMap::new()),
            current_function: RefCell::new(None),
        }
    }

    /// Get access to the arena allocator.
    pub fn arena(&self) -> &'arena Bump {
        self.arena
    }

    /// Intern a string in the arena.
    pub fn intern_str(&self, s: &str) -> &'arena str {
        let mut strings = self.interned_strings.borrow_mut();
        if let Some(&interned) = strings.get(s) {
            return interned;
        }

        let interned = self.arena.alloc_str(s);
        strings.insert(s.to_string(), interned);
        interned
    }

    /// Set current function being compiled.
    pub fn set_current_function(&self, name: &str) {
        *self.current_function.borrow_mut() = Some(name.to_string());
    }

    /// Name of the function currently being compiled.
    ///
    /// Still set after a failed compilation, so the driver can name the culprit.
    pub fn current_function(&self) -> Option<String> {
        self.current_function.borrow().clone()
    }

    /// Forget the current function once its text has been emitted.
    pub fn clear_function_state(&self) {
        *self.current_function.borrow_mut() = None;
    }

    /// Record the size of a freshly built function graph.
    pub fn record_graph_built(&self, nodes: usize, phis_removed: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.nodes_created += nodes;
        stats.phis_removed += phis_removed;
    }

    /// Record the outcome of register allocation for one function.
    pub fn record_allocation(&self, virtual_registers: usize, spill_slots: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.virtual_registers += virtual_registers;
        stats.spill_slots += spill_slots;
    }

    /// Record one emitted instruction.
    pub fn record_instruction_emitted(&self, mnemonic: &str) {
        let mut stats = self.stats.borrow_mut();
        stats.instructions_emitted += 1;
        *stats
            .instruction_counts
            .entry(mnemonic.to_string())
            .or_insert(0) += 1;
    }

    /// Record that a function was compiled.
    pub fn record_function_compiled(&self, name: &str, instructions: usize) {
        let mut stats = self.stats.borrow_mut();
        stats.functions_compiled += 1;

        if stats.largest_function_size < instructions {
            stats.largest_function_size = instructions;
            stats.largest_function_name = name.to_string();
        }
    }

    /// Get compilation statistics.
    pub fn stats(&self) -> SessionStats {
        self.stats.borrow().clone()
    }
}

/// Compilation session statistics.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    /// Number of functions compiled.
    pub functions_compiled: usize,

    /// IR nodes created across all function graphs.
    pub nodes_created: usize,

    /// Phis retired by trivial-phi elimination.
    pub phis_removed: usize,

    /// Virtual registers handed out.
    pub virtual_registers: usize,

    /// Stack slots used for spilled registers.
    pub spill_slots: usize,

    /// Number of instructions emitted.
    pub instructions_emitted: usize,

    /// Count of each mnemonic emitted.
    pub instruction_counts: HashMap<String, usize>,

    /// Instruction count of the largest function.
    pub largest_function_size: usize,

    /// Name of largest function.
    pub largest_function_name: String,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Compilation Session Statistics:")?;
        writeln!(f, "  Functions compiled: {}", self.functions_compiled)?;
        writeln!(f, "  IR nodes created: {}", self.nodes_created)?;
        writeln!(f, "  Trivial phis removed: {}", self.phis_removed)?;
        writeln!(f, "  Virtual registers: {}", self.virtual_registers)?;
        writeln!(f, "  Spill slots: {}", self.spill_slots)?;
        writeln!(f, "  Instructions emitted: {}", self.instructions_emitted)?;

        if !self.largest_function_name.is_empty() {
            writeln!(
                f,
                "  Largest function: {} ({} instructions)",
                self.largest_function_name, self.largest_function_size
            )?;
        }

        if !self.instruction_counts.is_empty() {
            writeln!(f, "  Instruction breakdown:")?;
            let mut sorted: Vec<_> = self.instruction_counts.iter().collect();
            sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

            for (mnemonic, count) in sorted.into_iter().take(10) {
                writeln!(f, "    {}: {}", mnemonic, count)?;
            }
        }

        Ok(())
    }
}
