//! End-to-end compilation of cube and view definitions.
//!
//! Phases run strictly in order, each on the complete output of the last:
//!
//! ```text
//! NamesOnly → PreTranspileAndValidate → [ViewCompile] → FullCompile
//!                                         (gated)       evaluate + join graph + meta
//! ```
//!
//! Every phase reports into one [`ErrorReport`]. Problems never stop a phase
//! early; at the end the report is either turned into one [`CompileError`] or
//! handed back with the result when `omit_errors` is set.
//!
//! # Example
//!
//! ```ignore
//! use cubist::compile::{compile, CompileOptions};
//! use cubist::model::cubes_from_json;
//!
//! let cubes = cubes_from_json(source, "model.json")?;
//! let schema = compile(&cubes, CompileOptions::default())?;
//! let tree = schema.join_graph.build_join(&["Orders".into(), "Users".into()])?;
//! ```

use std::collections::BTreeSet;
use std::fmt;

use crate::config::{PreAggregationSettings, Settings};
use crate::meta::{self, CubeMeta};
use crate::model::CubeDefinition;
use crate::semantic::error::{CompileError, ErrorReport};
use crate::semantic::evaluator::CubeEvaluator;
use crate::semantic::join_graph::JoinGraph;
use crate::semantic::symbols::CubeSymbols;
use crate::validation::CubeValidator;

// ============================================================================
// Phases and options
// ============================================================================

/// Compilation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CompilePhase {
    /// Names and source files of every cube and view.
    NamesOnly,
    /// Symbol objects built, every cube and view validated.
    PreTranspileAndValidate,
    /// Views composed again once every view is known.
    ViewCompile,
    /// Evaluation, join graph and metadata export.
    FullCompile,
}

impl CompilePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompilePhase::NamesOnly => "names_only",
            CompilePhase::PreTranspileAndValidate => "pre_transpile_and_validate",
            CompilePhase::ViewCompile => "view_compile",
            CompilePhase::FullCompile => "full_compile",
        }
    }
}

impl fmt::Display for CompilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options for compilation.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Return diagnostics with the result instead of failing.
    pub omit_errors: bool,
    /// Defaults for unset pre-aggregation flags.
    pub pre_aggregations: PreAggregationSettings,
}

impl CompileOptions {
    /// Options taken from loaded settings.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            omit_errors: settings.compiler.omit_errors,
            pre_aggregations: settings.pre_aggregations.clone(),
        }
    }

    pub fn with_omit_errors(mut self, omit_errors: bool) -> Self {
        self.omit_errors = omit_errors;
        self
    }

    pub fn with_pre_aggregation_defaults(mut self, defaults: PreAggregationSettings) -> Self {
        self.pre_aggregations = defaults;
        self
    }
}

// ============================================================================
// Output
// ============================================================================

/// Everything a compile run produces.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    pub symbols: CubeSymbols,
    pub evaluator: CubeEvaluator,
    pub join_graph: JoinGraph,
    pub meta: Vec<CubeMeta>,
    /// Diagnostics of the run; only errors-free when `omit_errors` was off.
    pub report: ErrorReport,
}

// ============================================================================
// Compiler
// ============================================================================

/// Runs the phases over one set of definitions.
///
/// A compiler is single-use: every run starts from fresh state.
#[derive(Debug)]
pub struct SchemaCompiler {
    options: CompileOptions,
    phase: Option<CompilePhase>,
    report: ErrorReport,
    symbols: CubeSymbols,
    validator: CubeValidator,
    evaluator: CubeEvaluator,
    join_graph: JoinGraph,
    meta: Vec<CubeMeta>,
}

impl SchemaCompiler {
    pub fn new(options: CompileOptions) -> Self {
        let evaluator = CubeEvaluator::new(options.pre_aggregations.clone());
        Self {
            options,
            phase: None,
            report: ErrorReport::new(),
            symbols: CubeSymbols::new(),
            validator: CubeValidator::new(),
            evaluator,
            join_graph: JoinGraph::default(),
            meta: Vec::new(),
        }
    }

    /// Last phase that ran.
    pub fn phase(&self) -> Option<CompilePhase> {
        self.phase
    }

    /// Run every phase over `cubes`.
    pub fn compile(mut self, cubes: &[CubeDefinition]) -> Result<CompiledSchema, CompileError> {
        self.names_only(cubes);
        if self.pre_transpile_and_validate(cubes) {
            self.view_compile();
        }
        self.full_compile();

        tracing::debug!(
            errors = self.report.errors().len(),
            warnings = self.report.warnings().len(),
            "compilation finished"
        );
        if !self.options.omit_errors {
            self.report.throw_if_any_errors()?;
        }

        Ok(CompiledSchema {
            symbols: self.symbols,
            evaluator: self.evaluator,
            join_graph: self.join_graph,
            meta: self.meta,
            report: self.report,
        })
    }

    fn enter(&mut self, phase: CompilePhase, cubes: usize) {
        tracing::debug!(phase = %phase, cubes, "compile phase");
        self.phase = Some(phase);
    }

    fn names_only(&mut self, cubes: &[CubeDefinition]) {
        self.enter(CompilePhase::NamesOnly, cubes.len());
        self.symbols.register_names(cubes);
    }

    /// Build and validate every cube and view.
    ///
    /// Returns whether views need the extra composition pass: some view
    /// declares an access policy or is composed from another view.
    fn pre_transpile_and_validate(&mut self, cubes: &[CubeDefinition]) -> bool {
        self.enter(CompilePhase::PreTranspileAndValidate, cubes.len());

        self.symbols.compile(cubes, &mut self.report.reporter());
        for cube in self.symbols.cube_list() {
            self.validator.validate(cube, &mut self.report.reporter());
        }

        cubes.iter().filter(|c| c.is_view).any(|view| {
            !view.access_policy.is_empty()
                || view.cubes.iter().any(|entry| {
                    entry
                        .join_path
                        .as_ref()
                        .and_then(|path| self.symbols.definition(path.head()))
                        .is_some_and(|source| source.is_view)
                })
        })
    }

    fn view_compile(&mut self) {
        let views = self.symbols.cube_list().iter().filter(|c| c.is_view).count();
        self.enter(CompilePhase::ViewCompile, views);

        self.symbols.compile_views(&mut self.report.reporter());
        for view in self.symbols.cube_list() {
            if view.is_view && !view.is_split_view {
                self.validator.validate(view, &mut self.report.reporter());
            }
        }
    }

    fn full_compile(&mut self) {
        self.enter(CompilePhase::FullCompile, self.symbols.cube_list().len());

        self.evaluator
            .evaluate(&self.symbols, &self.validator, &mut self.report.reporter());
        self.join_graph = JoinGraph::new(&self.evaluator, &mut self.report.reporter());
        self.check_view_components();
        self.meta = meta::transform(
            &self.symbols,
            &self.evaluator,
            &self.join_graph,
            &mut self.report.reporter(),
        );
    }

    /// Warn about views whose cubes no join can connect.
    fn check_view_components(&mut self) {
        for view in self.evaluator.cubes() {
            if !view.is_view || view.is_split_view {
                continue;
            }
            let roots: BTreeSet<&str> = view
                .cubes
                .iter()
                .filter_map(|entry| entry.join_path.as_ref())
                .map(|path| path.head())
                .collect();
            if roots.len() < 2 {
                continue;
            }

            let components: BTreeSet<Result<usize, &str>> = roots
                .iter()
                .map(|root| self.join_graph.connected_component(root).ok_or(*root))
                .collect();
            if components.len() > 1 {
                let cubes: Vec<&str> = roots.into_iter().collect();
                self.report
                    .reporter()
                    .in_file(view.file_name.clone())
                    .in_context(format!("{} view", view.name))
                    .warning(format!(
                        "Cubes {} of view '{}' are not connected by joins",
                        cubes.join(", "),
                        view.name
                    ));
            }
        }
    }
}

/// Compile `cubes` with `options`.
pub fn compile(cubes: &[CubeDefinition], options: CompileOptions) -> Result<CompiledSchema, CompileError> {
    SchemaCompiler::new(options).compile(cubes)
}
