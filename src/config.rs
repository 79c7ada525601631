//! Host-supplied resource limits (SPEC_FULL §A "Configuration").
//!
//! A plain struct constructed once and threaded into [`crate::vm::Vm::new`],
//! mirroring the teacher's `ResourceLimits`/`ResourceTracker` pattern
//! (`resource.rs`) adapted from a trait-object tracker to fixed capacities,
//! since Seni has no dynamic allocation accounting beyond "is the arena
//! full" (§4.4 heap policy).

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VmLimits {
    /// Maximum live operand-stack cells (§3 frame layout), a hard ceiling
    /// that turns unbounded recursion into [`crate::error::SeniError::StackOverflow`]
    /// rather than an OS stack overflow / OOM.
    pub stack_size: usize,
    /// Fixed heap arena capacity (§3 "heap of compound cells"): a hard
    /// ceiling on live VECTOR cells. `should_sweep` triggers well before
    /// this is reached in the common case; a native or `APPEND` chain that
    /// still can't find a free cell after the VM's last sweep fails with
    /// [`crate::error::SeniError::HeapExhausted`] (§7).
    pub heap_cells: usize,
    /// Fixed per-frame LOCAL segment size (§3 frame layout "locals (fixed)").
    pub locals_per_frame: u16,
    /// Upper bound on top-level `fn` definitions (§7 `TooManyTopLevelFunctions`).
    pub max_top_level_functions: usize,
    /// Upper bound on top-level `define`d globals (§7 `TooManyGlobals`).
    pub max_globals: usize,
    /// Code budget (instruction count) a single trait's `parameter_ast`
    /// program may compile to (§4.5 "own small code budget").
    pub trait_program_budget: usize,
    /// Depth of the matrix stack natives push/pop through `on-matrix-stack`.
    pub matrix_stack_depth: usize,
}

impl Default for VmLimits {
    fn default() -> Self {
        Self {
            stack_size: 1 << 16,
            heap_cells: 1 << 16,
            locals_per_frame: 64,
            max_top_level_functions: 1024,
            max_globals: u16::MAX as usize,
            trait_program_budget: 4096,
            matrix_stack_depth: crate::matrix::MATRIX_STACK_DEPTH,
        }
    }
}
