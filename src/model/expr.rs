//! Expression templates and member references.
//!
//! Member and cube expressions are authored as SQL templates in which
//! `{...}` placeholders name other symbols:
//!
//! ```text
//! {CUBE}.amount * {Users.discount}     -- self reference + cross-cube member
//! {revenue} / NULLIF({count}, 0)       -- sibling members
//! {FILTER_PARAMS.Orders.status}        -- context symbol
//! ```
//!
//! The template is parsed once into a [`SqlExpr`]: literal text interleaved
//! with [`RefPath`] nodes. What a path refers to (the current cube, a context
//! symbol, another cube or a sibling member) is decided later by the symbol
//! table, so the same expression can be resolved statically or to real SQL.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// `{a.b.c}` or `${a.b.c}` with identifier segments.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$?\{[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*\}").unwrap()
});

static IDENTIFIER_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*$").unwrap()
});

/// Errors raised while reading references.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("Invalid member reference '{0}': expected a dotted identifier path")]
    InvalidReference(String),
}

// ============================================================================
// RefPath
// ============================================================================

/// A dotted symbolic reference such as `Orders.Users.city`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefPath {
    segments: Vec<String>,
}

impl RefPath {
    /// Build a path from already-split segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse `a.b.c`, optionally wrapped in `{}` or `${}`.
    pub fn parse(raw: &str) -> Result<Self, ExprError> {
        let trimmed = raw.trim();
        let inner = trimmed
            .strip_prefix('$')
            .unwrap_or(trimmed)
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .unwrap_or(trimmed);

        if !IDENTIFIER_PATH.is_match(inner) {
            return Err(ExprError::InvalidReference(raw.to_string()));
        }
        Ok(Self::from_dotted(inner))
    }

    fn from_dotted(dotted: &str) -> Self {
        Self::new(dotted.split('.'))
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// First segment.
    pub fn head(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or_default()
    }

    /// Last segment.
    pub fn last(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Does this path contain more than one segment?
    pub fn is_dotted(&self) -> bool {
        self.segments.len() > 1
    }

    /// A new path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }
}

impl fmt::Display for RefPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl TryFrom<String> for RefPath {
    type Error = ExprError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RefPath> for String {
    fn from(path: RefPath) -> Self {
        path.to_string()
    }
}

// ============================================================================
// SqlExpr
// ============================================================================

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprPart {
    Text(String),
    Ref(RefPath),
}

/// A parsed SQL template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct SqlExpr {
    source: String,
    parts: Vec<ExprPart>,
}

impl SqlExpr {
    pub fn parse(source: impl Into<String>) -> Self {
        let source = source.into();
        let mut parts = Vec::new();
        let mut last = 0;

        for m in PLACEHOLDER.find_iter(&source) {
            if m.start() > last {
                parts.push(ExprPart::Text(source[last..m.start()].to_string()));
            }
            let inner = m
                .as_str()
                .trim_start_matches('$')
                .trim_start_matches('{')
                .trim_end_matches('}');
            parts.push(ExprPart::Ref(RefPath::from_dotted(inner)));
            last = m.end();
        }
        if last < source.len() {
            parts.push(ExprPart::Text(source[last..].to_string()));
        }

        Self { source, parts }
    }

    /// An expression consisting of a single reference, e.g. `{Orders.count}`.
    pub fn reference(path: &RefPath) -> Self {
        Self {
            source: format!("{{{}}}", path),
            parts: vec![ExprPart::Ref(path.clone())],
        }
    }

    /// Rewrite every reference through `f`, keeping literal text.
    pub fn map_references(&self, f: impl Fn(&RefPath) -> RefPath) -> Self {
        let mut source = String::new();
        let parts: Vec<ExprPart> = self
            .parts
            .iter()
            .map(|part| match part {
                ExprPart::Text(text) => {
                    source.push_str(text);
                    ExprPart::Text(text.clone())
                }
                ExprPart::Ref(path) => {
                    let mapped = f(path);
                    source.push_str(&format!("{{{}}}", mapped));
                    ExprPart::Ref(mapped)
                }
            })
            .collect();
        Self { source, parts }
    }

    /// The template as authored.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn parts(&self) -> &[ExprPart] {
        &self.parts
    }

    /// Reference nodes in order of appearance.
    pub fn references(&self) -> impl Iterator<Item = &RefPath> {
        self.parts.iter().filter_map(|part| match part {
            ExprPart::Ref(path) => Some(path),
            ExprPart::Text(_) => None,
        })
    }

    pub fn has_references(&self) -> bool {
        self.references().next().is_some()
    }

    /// Is this a reference-free `count(*)`?
    pub fn is_count_star(&self) -> bool {
        !self.has_references() && self.source.trim().eq_ignore_ascii_case("count(*)")
    }
}

impl From<String> for SqlExpr {
    fn from(value: String) -> Self {
        Self::parse(value)
    }
}

impl From<&str> for SqlExpr {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<SqlExpr> for String {
    fn from(expr: SqlExpr) -> Self {
        expr.source
    }
}

impl fmt::Display for SqlExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}
