//! # Cubist
//!
//! A semantic schema compiler: cube and view definitions in, a resolved,
//! validated and join-aware model out.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │           Definitions (cubes, views, JSON)               │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [symbols]
//! ┌─────────────────────────────────────────────────────────┐
//! │   CubeSymbols (names, inheritance, view composition)     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [validation]
//! ┌─────────────────────────────────────────────────────────┐
//! │              CubeValidator (structural rules)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [evaluator]
//! ┌─────────────────────────────────────────────────────────┐
//! │  CubeEvaluator (ownership, pre-aggregations, policies)   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [join graph]
//! ┌─────────────────────────────────────────────────────────┐
//! │   JoinGraph (join trees, multiplication, components)     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [meta]
//! ┌─────────────────────────────────────────────────────────┐
//! │             CubeMeta (client-facing metadata)            │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! [`compile::SchemaCompiler`] drives the phases and collects diagnostics.

pub mod cache;
pub mod compile;
pub mod config;
pub mod meta;
pub mod model;
pub mod semantic;
pub mod validation;

pub use compile::{compile, CompileOptions, CompilePhase, CompiledSchema, SchemaCompiler};
pub use model::{cubes_from_json, CubeDefinition};
pub use semantic::{CompileError, CompilerError, ErrorReport};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::compile::{compile, CompileOptions, CompiledSchema, SchemaCompiler};
    pub use crate::config::{PreAggregationSettings, Settings};
    pub use crate::meta::CubeMeta;
    pub use crate::model::{
        cubes_from_json, CubeDefinition, Includes, JoinDefinition, MemberDefinition, MemberKind,
        RefPath, Relationship, SqlExpr, ViewCubeDefinition,
    };
    pub use crate::semantic::{
        CompileError, CompilerError, CubeEvaluator, CubeSymbols, ErrorReport, JoinGraph, JoinHint,
        JoinTree,
    };
    pub use crate::validation::CubeValidator;
}
