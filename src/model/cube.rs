//! Cube and view definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::expr::{RefPath, SqlExpr};
use super::join::JoinDefinition;
use super::member::{MemberDefinition, MemberKind};
use super::pre_aggregation::{PreAggregationDefinition, RefreshKey};

// ============================================================================
// Includes
// ============================================================================

/// `"*"` or an explicit list of members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Includes {
    /// Should be `"*"`; anything else is rejected by the validator.
    All(String),
    Members(Vec<IncludeItem>),
}

impl Includes {
    pub fn all() -> Self {
        Includes::All("*".to_string())
    }

    pub fn members<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Includes::Members(names.into_iter().map(|n| IncludeItem::Name(n.into())).collect())
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Includes::All(s) if s == "*")
    }
}

/// One entry of an include list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncludeItem {
    Name(String),
    Detailed(IncludeItemDetail),
}

/// An include entry that renames or retitles the member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludeItemDetail {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl IncludeItem {
    pub fn name(&self) -> &str {
        match self {
            IncludeItem::Name(name) => name,
            IncludeItem::Detailed(detail) => &detail.name,
        }
    }

    pub fn detail(&self) -> Option<&IncludeItemDetail> {
        match self {
            IncludeItem::Name(_) => None,
            IncludeItem::Detailed(detail) => Some(detail),
        }
    }

    pub fn alias(&self) -> Option<&str> {
        self.detail().and_then(|d| d.alias.as_deref())
    }
}

// ============================================================================
// View composition
// ============================================================================

/// An entry of a view's `cubes` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewCubeDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_path: Option<RefPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub includes: Option<Includes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excludes: Option<Vec<String>>,
}

impl ViewCubeDefinition {
    pub fn new(join_path: RefPath) -> Self {
        Self {
            join_path: Some(join_path),
            ..Default::default()
        }
    }

    pub fn with_includes(mut self, includes: Includes) -> Self {
        self.includes = Some(includes);
        self
    }

    pub fn with_excludes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_prefix(mut self) -> Self {
        self.prefix = Some(true);
        self
    }

    pub fn with_split(mut self) -> Self {
        self.split = Some(true);
        self
    }
}

/// A member a view pulled in from a cube.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludedMember {
    /// `Cube.member` in the source cube.
    pub member_path: String,
    /// Name inside the view.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MemberKind,
}

// ============================================================================
// Hierarchies and folders
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HierarchyDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub levels: Vec<RefPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
}

/// A hierarchy with levels resolved to `Cube.dimension` paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedHierarchy {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub levels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias_member: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderDefinition {
    pub name: String,
    pub includes: Includes,
}

/// A folder with members resolved to `View.member` paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedFolder {
    pub name: String,
    pub members: Vec<String>,
}

// ============================================================================
// Access policies
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccessPolicyDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_level: Option<MemberLevelPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_level: Option<RowLevelPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemberLevelPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub includes: Option<Includes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excludes: Option<Includes>,

    /// Set by the evaluator.
    #[serde(skip_deserializing, skip_serializing_if = "Vec::is_empty")]
    pub includes_members: Vec<String>,
    /// Set by the evaluator.
    #[serde(skip_deserializing, skip_serializing_if = "Vec::is_empty")]
    pub excludes_members: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RowLevelPolicy {
    pub filters: Vec<RowLevelFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_all: Option<bool>,
}

/// A row-level filter, either a member condition or an `or`/`and` group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RowLevelFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<RefPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<RowLevelFilter>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<RowLevelFilter>>,

    /// Set by the evaluator.
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub member_reference: Option<String>,
}

// ============================================================================
// CubeDefinition
// ============================================================================

/// A cube or view as handed over by the parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CubeDefinition {
    pub name: String,
    pub is_view: bool,
    /// Source file the definition came from.
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<SqlExpr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_table: Option<SqlExpr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shown: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_key: Option<RefreshKey>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub measures: BTreeMap<String, MemberDefinition>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub dimensions: BTreeMap<String, MemberDefinition>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub segments: BTreeMap<String, MemberDefinition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub joins: Vec<JoinDefinition>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub pre_aggregations: BTreeMap<String, PreAggregationDefinition>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub hierarchies: BTreeMap<String, HierarchyDefinition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub folders: Vec<FolderDefinition>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub access_policy: Vec<AccessPolicyDefinition>,

    /// View composition rules.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cubes: Vec<ViewCubeDefinition>,
    /// Legacy view includes: flat `Cube.member` paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub includes: Option<Vec<RefPath>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excludes: Option<Vec<RefPath>>,

    // Derived during compilation
    #[serde(skip_deserializing, skip_serializing_if = "std::ops::Not::not")]
    pub is_split_view: bool,
    #[serde(skip_deserializing, skip_serializing_if = "Vec::is_empty")]
    pub included_members: Vec<IncludedMember>,
    #[serde(skip_deserializing, skip_serializing_if = "Vec::is_empty")]
    pub evaluated_hierarchies: Vec<EvaluatedHierarchy>,
    #[serde(skip_deserializing, skip_serializing_if = "Vec::is_empty")]
    pub evaluated_folders: Vec<EvaluatedFolder>,
}

impl CubeDefinition {
    /// A cube selecting from `sql_table`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// A view.
    pub fn view(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_view: true,
            ..Default::default()
        }
    }

    pub fn with_sql_table(mut self, table: impl Into<SqlExpr>) -> Self {
        self.sql_table = Some(table.into());
        self
    }

    pub fn with_sql(mut self, sql: impl Into<SqlExpr>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn with_extends(mut self, parent: impl Into<String>) -> Self {
        self.extends = Some(parent.into());
        self
    }

    pub fn with_measure(mut self, name: impl Into<String>, measure: MemberDefinition) -> Self {
        self.measures.insert(name.into(), measure);
        self
    }

    pub fn with_dimension(mut self, name: impl Into<String>, dimension: MemberDefinition) -> Self {
        self.dimensions.insert(name.into(), dimension);
        self
    }

    pub fn with_segment(mut self, name: impl Into<String>, segment: MemberDefinition) -> Self {
        self.segments.insert(name.into(), segment);
        self
    }

    pub fn with_join(mut self, join: JoinDefinition) -> Self {
        self.joins.push(join);
        self
    }

    pub fn with_pre_aggregation(
        mut self,
        name: impl Into<String>,
        pre_aggregation: PreAggregationDefinition,
    ) -> Self {
        self.pre_aggregations.insert(name.into(), pre_aggregation);
        self
    }

    pub fn with_view_cube(mut self, entry: ViewCubeDefinition) -> Self {
        self.cubes.push(entry);
        self
    }

    pub fn with_access_policy(mut self, policy: AccessPolicyDefinition) -> Self {
        self.access_policy.push(policy);
        self
    }

    /// Member map of `kind`; `None` for hierarchies.
    pub fn members(&self, kind: MemberKind) -> Option<&BTreeMap<String, MemberDefinition>> {
        match kind {
            MemberKind::Measure => Some(&self.measures),
            MemberKind::Dimension => Some(&self.dimensions),
            MemberKind::Segment => Some(&self.segments),
            MemberKind::Hierarchy => None,
        }
    }

    pub fn members_mut(
        &mut self,
        kind: MemberKind,
    ) -> Option<&mut BTreeMap<String, MemberDefinition>> {
        match kind {
            MemberKind::Measure => Some(&mut self.measures),
            MemberKind::Dimension => Some(&mut self.dimensions),
            MemberKind::Segment => Some(&mut self.segments),
            MemberKind::Hierarchy => None,
        }
    }

    /// Look a member up across measures, dimensions and segments.
    pub fn member(&self, name: &str) -> Option<(MemberKind, &MemberDefinition)> {
        MemberKind::MEMBERS.into_iter().find_map(|kind| {
            self.members(kind)
                .and_then(|members| members.get(name))
                .map(|member| (kind, member))
        })
    }

    /// Is `name` taken by any member or hierarchy?
    pub fn has_member(&self, name: &str) -> bool {
        self.member(name).is_some() || self.hierarchies.contains_key(name)
    }

    /// Names defined in more than one member collection.
    pub fn duplicate_member_names(&self) -> Vec<String> {
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        let collections = [
            self.measures.keys().collect::<Vec<_>>(),
            self.dimensions.keys().collect(),
            self.segments.keys().collect(),
            self.pre_aggregations.keys().collect(),
            self.hierarchies.keys().collect(),
        ];
        for names in &collections {
            for name in names {
                *seen.entry(name.as_str()).or_default() += 1;
            }
        }
        seen.into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Names of primary key dimensions.
    pub fn primary_key_names(&self) -> Vec<String> {
        self.dimensions
            .iter()
            .filter(|(_, d)| d.is_primary_key())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// `public`, falling back to `shown`, defaulting to visible.
    pub fn is_visible(&self) -> bool {
        self.public.or(self.shown).unwrap_or(true)
    }

    /// "cube" or "view".
    pub fn kind_name(&self) -> &'static str {
        if self.is_view {
            "view"
        } else {
            "cube"
        }
    }
}
