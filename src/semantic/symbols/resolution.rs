//! Reference resolution.
//!
//! A placeholder in an expression is classified by its first segment:
//!
//! | Head                                   | Meaning                          |
//! |----------------------------------------|----------------------------------|
//! | `CUBE`, `TABLE`                        | the cube being compiled          |
//! | `SECURITY_CONTEXT`, `FILTER_PARAMS`, ...| a context symbol                |
//! | a registered cube or view name         | that cube                        |
//! | a member of the current cube           | that member                      |
//!
//! The remaining segments walk from cube to cube (accumulating join hints)
//! until they reach a member, optionally followed by a granularity of a time
//! dimension. How a resolved reference turns into text is up to the
//! [`SqlResolver`]: the static collector records which cubes and members an
//! expression touches, [`InlineSqlResolver`] expands references into SQL.

use std::fmt;

use crate::model::{MemberKind, RefPath, SqlExpr, ExprPart};
use crate::semantic::error::{CompilerError, CompilerResult};

use super::CubeSymbols;

pub(super) const CURRENT_CUBE: &[&str] = &["CUBE", "TABLE"];

// ============================================================================
// Resolved references
// ============================================================================

/// Symbols supplied by the query context rather than the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextSymbol {
    SecurityContext,
    FilterParams,
    FilterGroup,
    SqlUtils,
}

impl ContextSymbol {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SECURITY_CONTEXT" | "security_context" | "securityContext" => {
                Some(ContextSymbol::SecurityContext)
            }
            "FILTER_PARAMS" => Some(ContextSymbol::FilterParams),
            "FILTER_GROUP" => Some(ContextSymbol::FilterGroup),
            "SQL_UTILS" => Some(ContextSymbol::SqlUtils),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextSymbol::SecurityContext => "SECURITY_CONTEXT",
            ContextSymbol::FilterParams => "FILTER_PARAMS",
            ContextSymbol::FilterGroup => "FILTER_GROUP",
            ContextSymbol::SqlUtils => "SQL_UTILS",
        }
    }
}

impl fmt::Display for ContextSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a [`RefPath`] points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedReference {
    /// A cube itself, rendered as its alias.
    Cube {
        cube: String,
        join_hints: Vec<String>,
    },
    Member {
        cube: String,
        member: String,
        kind: MemberKind,
        granularity: Option<String>,
        join_hints: Vec<String>,
    },
    Context {
        symbol: ContextSymbol,
        path: Vec<String>,
    },
}

/// A resolved member reference as handed to [`SqlResolver::member_sql`].
#[derive(Debug, Clone, Copy)]
pub struct MemberReference<'a> {
    pub cube: &'a str,
    pub member: &'a str,
    pub kind: MemberKind,
    pub granularity: Option<&'a str>,
    /// Cubes walked through to reach `cube`, `cube` included.
    pub join_hints: &'a [String],
}

impl MemberReference<'_> {
    /// `Cube.member`.
    pub fn path(&self) -> String {
        format!("{}.{}", self.cube, self.member)
    }
}

/// Renders resolved references as text.
pub trait SqlResolver {
    fn member_sql(
        &mut self,
        symbols: &CubeSymbols,
        reference: &MemberReference<'_>,
    ) -> CompilerResult<String>;

    fn cube_alias(&mut self, cube: &str, _join_hints: &[String]) -> CompilerResult<String> {
        Ok(cube.to_string())
    }

    /// Inert unless an execution context is supplied by the implementor.
    fn context_symbol(&mut self, symbol: ContextSymbol, _path: &[String]) -> CompilerResult<String> {
        Ok(match symbol {
            ContextSymbol::FilterParams | ContextSymbol::FilterGroup => "1 = 1".to_string(),
            ContextSymbol::SecurityContext | ContextSymbol::SqlUtils => String::new(),
        })
    }
}

// ============================================================================
// Resolution
// ============================================================================

enum Walk {
    Cube(String),
    Member {
        cube: String,
        member: String,
        kind: MemberKind,
    },
    Granularity {
        cube: String,
        member: String,
        granularity: String,
    },
}

fn unresolved(prefix: &str, segment: &str) -> CompilerError {
    CompilerError::user(format!(
        "{}.{} cannot be resolved. There's no such member or cube.",
        prefix, segment
    ))
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

impl CubeSymbols {
    /// Classify `path` as seen from inside `current_cube`.
    pub fn resolve_reference(
        &self,
        current_cube: &str,
        path: &RefPath,
    ) -> CompilerResult<ResolvedReference> {
        let head = path.head();
        if head == "USER_CONTEXT" {
            return Err(CompilerError::user(
                "Support for USER_CONTEXT was removed, please migrate to SECURITY_CONTEXT.",
            ));
        }
        if let Some(symbol) = ContextSymbol::from_name(head) {
            return Ok(ResolvedReference::Context {
                symbol,
                path: path.segments()[1..].to_vec(),
            });
        }

        let mut join_hints = Vec::new();
        let mut walk = if CURRENT_CUBE.contains(&head) {
            push_unique(&mut join_hints, current_cube);
            Walk::Cube(current_cube.to_string())
        } else if self.is_cube(head) {
            push_unique(&mut join_hints, head);
            Walk::Cube(head.to_string())
        } else if let Some((kind, _)) = self.member(current_cube, head) {
            push_unique(&mut join_hints, current_cube);
            Walk::Member {
                cube: current_cube.to_string(),
                member: head.to_string(),
                kind,
            }
        } else {
            return Err(CompilerError::user(format!(
                "{} cannot be resolved in {}. There's no such member or cube.",
                head, current_cube
            )));
        };

        for segment in &path.segments()[1..] {
            walk = match walk {
                Walk::Cube(cube) => {
                    if let Some((kind, _)) = self.member(&cube, segment) {
                        Walk::Member {
                            cube,
                            member: segment.clone(),
                            kind,
                        }
                    } else if self.is_cube(segment) {
                        push_unique(&mut join_hints, segment);
                        Walk::Cube(segment.clone())
                    } else {
                        return Err(unresolved(&cube, segment));
                    }
                }
                Walk::Member { cube, member, kind } => {
                    let is_granularity = kind == MemberKind::Dimension
                        && self
                            .member(&cube, &member)
                            .is_some_and(|(_, m)| m.has_granularity(segment));
                    if !is_granularity {
                        return Err(unresolved(&format!("{}.{}", cube, member), segment));
                    }
                    Walk::Granularity {
                        cube,
                        member,
                        granularity: segment.clone(),
                    }
                }
                Walk::Granularity {
                    cube,
                    member,
                    granularity,
                } => {
                    return Err(unresolved(
                        &format!("{}.{}.{}", cube, member, granularity),
                        segment,
                    ));
                }
            };
        }

        let resolved = match walk {
            Walk::Cube(cube) => ResolvedReference::Cube { cube, join_hints },
            Walk::Member { cube, member, kind } => ResolvedReference::Member {
                cube,
                member,
                kind,
                granularity: None,
                join_hints,
            },
            Walk::Granularity {
                cube,
                member,
                granularity,
            } => ResolvedReference::Member {
                cube,
                member,
                kind: MemberKind::Dimension,
                granularity: Some(granularity),
                join_hints,
            },
        };
        tracing::trace!(cube = current_cube, %path, ?resolved, "resolved reference");
        Ok(resolved)
    }

    /// Render `expr` inside `cube` through `resolver`.
    pub fn resolve_to_sql(
        &self,
        cube: &str,
        expr: &SqlExpr,
        resolver: &mut dyn SqlResolver,
    ) -> CompilerResult<String> {
        let mut sql = String::with_capacity(expr.source().len());
        for part in expr.parts() {
            match part {
                ExprPart::Text(text) => sql.push_str(text),
                ExprPart::Ref(path) => {
                    let rendered = match self.resolve_reference(cube, path)? {
                        ResolvedReference::Cube { cube, join_hints } => {
                            resolver.cube_alias(&cube, &join_hints)?
                        }
                        ResolvedReference::Member {
                            cube,
                            member,
                            kind,
                            granularity,
                            join_hints,
                        } => resolver.member_sql(
                            self,
                            &MemberReference {
                                cube: &cube,
                                member: &member,
                                kind,
                                granularity: granularity.as_deref(),
                                join_hints: &join_hints,
                            },
                        )?,
                        ResolvedReference::Context { symbol, path } => {
                            resolver.context_symbol(symbol, &path)?
                        }
                    };
                    sql.push_str(&rendered);
                }
            }
        }
        Ok(sql)
    }

    /// Which cubes and members `expr` touches, resolved statically.
    pub fn collect_referenced_cubes(&self, cube: &str, expr: &SqlExpr) -> CompilerResult<ReferenceUsage> {
        let mut collector = ReferenceCollector::default();
        let evaluated = self.resolve_to_sql(cube, expr, &mut collector)?;

        let single_member_path = match collector.member_paths.as_slice() {
            [only] if evaluated.trim() == only => Some(only.clone()),
            _ => None,
        };

        Ok(ReferenceUsage {
            cubes: collector.cubes,
            member_paths: collector.member_paths,
            single_member_path,
        })
    }

    /// Resolve `path` to `Cube.member`, or `A.B.member` when it walks a join
    /// path and `with_join_hints` is set.
    pub fn evaluate_reference(
        &self,
        cube: &str,
        path: &RefPath,
        with_join_hints: bool,
    ) -> CompilerResult<String> {
        match self.resolve_reference(cube, path)? {
            ResolvedReference::Member {
                cube,
                member,
                granularity,
                join_hints,
                ..
            } => {
                let mut parts = if with_join_hints && join_hints.len() > 1 {
                    join_hints
                } else {
                    vec![cube]
                };
                parts.push(member);
                parts.extend(granularity);
                Ok(parts.join("."))
            }
            ResolvedReference::Cube { cube, .. } => Ok(cube),
            ResolvedReference::Context { symbol, .. } => Err(CompilerError::user(format!(
                "{} can't be used as a member reference in {}",
                symbol, path
            ))),
        }
    }

    /// [`evaluate_reference`](Self::evaluate_reference) over a list.
    pub fn evaluate_references(
        &self,
        cube: &str,
        paths: &[RefPath],
        with_join_hints: bool,
    ) -> CompilerResult<Vec<String>> {
        paths
            .iter()
            .map(|path| self.evaluate_reference(cube, path, with_join_hints))
            .collect()
    }
}

/// Split `A.B.C.dim` into the member path `C.dim` and the join hint `[A, B, C]`.
pub fn join_hint_from_path(path: &str) -> (String, Vec<String>) {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.len() > 2 {
        let n = parts.len();
        (
            format!("{}.{}", parts[n - 2], parts[n - 1]),
            parts[..n - 1].iter().map(|s| s.to_string()).collect(),
        )
    } else {
        (path.to_string(), vec![parts[0].to_string()])
    }
}

// ============================================================================
// Static analysis
// ============================================================================

/// Cubes and members an expression touches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceUsage {
    /// Every cube walked through or referenced, in first-seen order.
    pub cubes: Vec<String>,
    /// `Cube.member` of every member reference.
    pub member_paths: Vec<String>,
    /// Set when the expression is nothing but one member reference.
    pub single_member_path: Option<String>,
}

impl ReferenceUsage {
    /// Referenced cubes other than `cube`.
    pub fn foreign_cubes(&self, cube: &str) -> Vec<&str> {
        self.cubes
            .iter()
            .map(String::as_str)
            .filter(|c| *c != cube)
            .collect()
    }
}

#[derive(Default)]
struct ReferenceCollector {
    cubes: Vec<String>,
    member_paths: Vec<String>,
}

impl SqlResolver for ReferenceCollector {
    fn member_sql(
        &mut self,
        _symbols: &CubeSymbols,
        reference: &MemberReference<'_>,
    ) -> CompilerResult<String> {
        for cube in reference.join_hints {
            push_unique(&mut self.cubes, cube);
        }
        let path = reference.path();
        push_unique(&mut self.member_paths, &path);
        Ok(path)
    }

    fn cube_alias(&mut self, cube: &str, join_hints: &[String]) -> CompilerResult<String> {
        for hint in join_hints {
            push_unique(&mut self.cubes, hint);
        }
        Ok(cube.to_string())
    }
}

// ============================================================================
// Inline rendering
// ============================================================================

/// Expands member references into their SQL, recursively.
///
/// Cubes render as `"Cube"`; members without SQL (plain `count`) render as
/// `*`. Circular member references are errors.
#[derive(Debug, Default)]
pub struct InlineSqlResolver {
    stack: Vec<String>,
}

impl InlineSqlResolver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SqlResolver for InlineSqlResolver {
    fn member_sql(
        &mut self,
        symbols: &CubeSymbols,
        reference: &MemberReference<'_>,
    ) -> CompilerResult<String> {
        let path = reference.path();
        if self.stack.contains(&path) {
            let mut chain = self.stack.clone();
            chain.push(path);
            return Err(CompilerError::user(format!(
                "Circular reference detected: {}",
                chain.join(" -> ")
            )));
        }

        let (_, member) = symbols
            .member(reference.cube, reference.member)
            .ok_or_else(|| CompilerError::internal(format!("Member '{}' vanished", path)))?;

        let Some(sql) = &member.sql else {
            return Ok("*".to_string());
        };

        self.stack.push(path);
        let rendered = symbols.resolve_to_sql(reference.cube, sql, self);
        self.stack.pop();
        rendered
    }

    fn cube_alias(&mut self, cube: &str, _join_hints: &[String]) -> CompilerResult<String> {
        Ok(format!("\"{}\"", cube))
    }
}
