//! Semantic core: symbols, evaluation and the join graph.
//!
//! Data flows strictly downward:
//!
//! 1. **Symbols** - one symbol object per cube with inheritance and view
//!    composition applied; resolves references inside expressions
//! 2. **Evaluator** - normalizes fields, infers member ownership, evaluates
//!    pre-aggregation references and collects primary keys
//! 3. **Join graph** - join paths between cubes and fan-out detection
//!
//! Validation sits between 1 and 2 and lives in [`crate::validation`].
//! All stages report into one shared [`ErrorReport`].

pub mod error;
pub mod evaluator;
pub mod join_graph;
pub mod symbols;

pub use error::{
    CompileError, CompilerError, CompilerResult, Diagnostic, ErrorReport, ErrorReporter, Severity,
};
pub use evaluator::{CubeEvaluator, PreAggregationDescriptor, PreAggregationFilter};
pub use join_graph::{JoinEdge, JoinGraph, JoinHint, JoinTree};
pub use symbols::{ContextSymbol, CubeSymbols, ResolvedReference, SqlResolver};
