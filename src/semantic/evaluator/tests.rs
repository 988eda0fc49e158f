use super::*;
use crate::model::{
    AccessPolicyDefinition, FolderDefinition, HierarchyDefinition, Includes, IndexDefinition,
    JoinDefinition, MemberLevelPolicy, PreAggregationDefinition, RefPath, RowLevelFilter,
    RowLevelPolicy, SqlSnippet, ViewCubeDefinition,
};
use crate::semantic::error::ErrorReport;

fn path(raw: &str) -> RefPath {
    RefPath::parse(raw).unwrap()
}

fn users() -> CubeDefinition {
    CubeDefinition::new("Users")
        .with_file_name("users.yml")
        .with_sql_table("users")
        .with_dimension("id", MemberDefinition::of_type("number").with_sql("{CUBE}.id").with_primary_key())
        .with_dimension("city", MemberDefinition::of_type("string").with_sql("{CUBE}.city"))
        .with_dimension("country", MemberDefinition::of_type("string").with_sql("{CUBE}.country"))
}

fn orders() -> CubeDefinition {
    CubeDefinition::new("Orders")
        .with_file_name("orders.yml")
        .with_sql_table("orders")
        .with_join(JoinDefinition::new("Users", crate::model::Relationship::BelongsTo).with_sql("{CUBE}.user_id = {Users.id}"))
        .with_measure("count", MemberDefinition::of_type("count"))
        .with_measure("revenue", MemberDefinition::of_type("sum").with_sql("{CUBE}.amount"))
        .with_dimension("id", MemberDefinition::of_type("number").with_sql("{CUBE}.id").with_primary_key())
        .with_dimension("status", MemberDefinition::of_type("string").with_sql("{CUBE}.status"))
        .with_dimension("created_at", MemberDefinition::of_type("time").with_sql("{CUBE}.created_at"))
}

fn evaluate(cubes: Vec<CubeDefinition>) -> (CubeEvaluator, ErrorReport) {
    evaluate_with(cubes, PreAggregationSettings::default())
}

fn evaluate_with(cubes: Vec<CubeDefinition>, defaults: PreAggregationSettings) -> (CubeEvaluator, ErrorReport) {
    let mut report = ErrorReport::new();
    let mut symbols = CubeSymbols::new();
    symbols.compile(&cubes, &mut report.reporter());

    let mut validator = CubeValidator::new();
    for cube in symbols.cube_list() {
        validator.validate(cube, &mut report.reporter());
    }

    let mut evaluator = CubeEvaluator::new(defaults);
    evaluator.evaluate(&symbols, &validator, &mut report.reporter());
    (evaluator, report)
}

// ============================================================================
// Ownership
// ============================================================================

#[test]
fn test_own_members_are_owned() {
    let (evaluator, report) = evaluate(vec![orders(), users()]);
    assert!(!report.has_errors(), "{:?}", report.error_messages());

    let revenue = evaluator.measure_by_path("Orders.revenue").unwrap();
    assert_eq!(revenue.owned_by_cube, Some(true));
    assert_eq!(revenue.alias_member, None);
    assert_eq!(evaluator.measure_by_path("Orders.count").unwrap().owned_by_cube, Some(true));
}

#[test]
fn test_cube_member_with_foreign_reference_is_an_error() {
    let cube = orders().with_dimension(
        "user_city",
        MemberDefinition::of_type("string").with_sql("{Users.city}"),
    );
    let (evaluator, report) = evaluate(vec![cube, users()]);

    assert_eq!(
        report.error_messages(),
        vec![
            "Orders cube: Member 'Orders.user_city' references foreign cubes: Users. \
             Please split and move this definition to corresponding cubes."
        ]
    );
    let member = evaluator.dimension_by_path("Orders.user_city").unwrap();
    assert_eq!(member.owned_by_cube, Some(false));
    assert_eq!(member.alias_member.as_deref(), Some("Users.city"));
}

#[test]
fn test_view_members_alias_their_source() {
    let view = CubeDefinition::view("orders_view")
        .with_view_cube(ViewCubeDefinition::new(path("Orders")).with_includes(Includes::members(["revenue", "status"])))
        .with_view_cube(
            ViewCubeDefinition::new(path("Orders.Users"))
                .with_prefix()
                .with_includes(Includes::members(["city"])),
        );
    let (evaluator, report) = evaluate(vec![orders(), users(), view]);
    assert!(!report.has_errors(), "{:?}", report.error_messages());

    let revenue = evaluator.measure_by_path("orders_view.revenue").unwrap();
    assert_eq!(revenue.owned_by_cube, Some(false));
    assert_eq!(revenue.alias_member.as_deref(), Some("Orders.revenue"));

    let city = evaluator.dimension_by_path("orders_view.Users_city").unwrap();
    assert_eq!(city.alias_member.as_deref(), Some("Users.city"));
}

#[test]
fn test_view_defining_own_member() {
    let view = CubeDefinition::view("v")
        .with_view_cube(ViewCubeDefinition::new(path("Orders")).with_includes(Includes::members(["count"])))
        .with_measure("doubled", MemberDefinition::of_type("number").with_sql("{count} * 2"));
    let (_, report) = evaluate(vec![orders(), users(), view]);
    assert_eq!(
        report.error_messages(),
        vec![
            "v view: View 'v' defines own member 'v.doubled'. \
             Please move this member definition to one of the cubes."
        ]
    );
}

#[test]
fn test_view_defining_own_member_without_sql() {
    let view = CubeDefinition::view("everything")
        .with_view_cube(ViewCubeDefinition::new(path("Orders")).with_includes(Includes::all()))
        .with_measure("my_count", MemberDefinition::of_type("count"));
    let (evaluator, report) = evaluate(vec![orders(), users(), view]);
    assert_eq!(
        report.error_messages(),
        vec![
            "everything view: View 'everything' defines own member 'everything.my_count'. \
             Please move this member definition to one of the cubes."
        ]
    );

    let everything = evaluator.cube("everything").unwrap();
    assert_eq!(everything.measures["my_count"].owned_by_cube, Some(true));
    assert_eq!(everything.measures["count"].owned_by_cube, Some(false));
}

#[test]
fn test_view_geo_dimension_is_not_an_own_member() {
    let mut location = MemberDefinition::of_type("geo");
    location.latitude = Some(SqlSnippet::new("{CUBE}.lat"));
    location.longitude = Some(SqlSnippet::new("{CUBE}.lng"));
    let view = CubeDefinition::view("map")
        .with_view_cube(ViewCubeDefinition::new(path("Users")).with_includes(Includes::members(["location"])));
    let (evaluator, report) = evaluate(vec![orders(), users().with_dimension("location", location), view]);
    assert!(!report.has_errors(), "{:?}", report.error_messages());
    assert!(evaluator.cube("map").unwrap().dimensions.contains_key("location"));
}

#[test]
fn test_unresolved_reference_names_member() {
    let orders = orders().with_measure(
        "margin",
        MemberDefinition::of_type("number").with_sql("{CUBE}.amount - {cost}"),
    );
    let (evaluator, report) = evaluate(vec![orders, users()]);
    assert_eq!(
        report.error_messages(),
        vec!["Orders cube -> margin measure: cost cannot be resolved in Orders. There's no such member or cube."]
    );
    let margin = evaluator.measure_by_path("Orders.margin").unwrap();
    assert_eq!(margin.owned_by_cube, Some(true));
}

#[test]
fn test_invalid_cubes_are_skipped() {
    let broken = CubeDefinition::new("Broken").with_measure("total", MemberDefinition::of_type("sum"));
    let (evaluator, report) = evaluate(vec![orders(), users(), broken]);
    assert!(report.has_errors());
    assert!(!evaluator.cube_exists("Broken"));
    assert_eq!(evaluator.cube_names(), &["Orders".to_string(), "Users".to_string()]);
}

// ============================================================================
// Lookups
// ============================================================================

#[test]
fn test_by_path_errors() {
    let (evaluator, _) = evaluate(vec![orders(), users()]);

    assert_eq!(
        evaluator.measure_by_path("Ghost.count").unwrap_err().to_string(),
        "Cube 'Ghost' not found for path 'Ghost.count'"
    );
    assert_eq!(
        evaluator.measure_by_path("Orders.status").unwrap_err().to_string(),
        "'status' not found for path 'Orders.status'"
    );
    assert_eq!(
        evaluator.by_path_any_type("Orders.nope").unwrap_err().to_string(),
        "Can't resolve member 'Orders.nope'"
    );
    assert_eq!(evaluator.by_path_any_type("Orders.status").unwrap().0, MemberKind::Dimension);
    assert!(evaluator.is_measure("Orders.count"));
    assert!(!evaluator.is_segment("Orders.count"));
}

#[test]
fn test_primary_keys_and_time_dimensions() {
    let (evaluator, _) = evaluate(vec![orders(), users()]);
    assert_eq!(evaluator.primary_keys("Orders"), &["id".to_string()]);
    assert!(evaluator.primary_keys("Ghost").is_empty());
    assert_eq!(evaluator.time_dimension_paths_for_cube("Orders"), vec!["Orders.created_at"]);
    assert_eq!(evaluator.cubes_by_file_name("users.yml").len(), 1);
}

#[test]
fn test_relationship_is_canonicalized() {
    let mut join = JoinDefinition::belongs_to("Users").with_sql("{CUBE}.user_id = {Users.id}");
    join.relationship = "many_to_one".into();
    let mut cube = orders();
    cube.joins = vec![join];

    let (evaluator, _) = evaluate(vec![cube, users()]);
    assert_eq!(evaluator.cube("Orders").unwrap().joins[0].relationship, "belongsTo");
}

// ============================================================================
// Pre-aggregations
// ============================================================================

#[test]
fn test_pre_aggregation_references_and_defaults() {
    let mut main = PreAggregationDefinition::rollup(
        vec![path("count"), path("revenue")],
        vec![path("status"), path("Orders.Users.city")],
    )
    .with_time_dimension(path("created_at"), "day");
    main.indexes = Some(
        [(
            "by_status".to_string(),
            IndexDefinition {
                columns: vec![path("status")],
                index_type: None,
            },
        )]
        .into_iter()
        .collect(),
    );
    let cube = orders().with_pre_aggregation("main", main);

    let (evaluator, report) = evaluate(vec![cube, users()]);
    assert!(!report.has_errors(), "{:?}", report.error_messages());

    let descriptors = evaluator.pre_aggregations(&PreAggregationFilter::new());
    assert_eq!(descriptors.len(), 1);
    let descriptor = &descriptors[0];
    assert_eq!(descriptor.id, "Orders.main");
    assert_eq!(descriptor.data_source, "default");
    assert_eq!(descriptor.references.measures, vec!["Orders.count", "Orders.revenue"]);
    assert_eq!(descriptor.references.dimensions, vec!["Orders.status", "Orders.Users.city"]);
    assert_eq!(
        descriptor.references.time_dimensions,
        vec![crate::model::TimeDimensionReference {
            dimension: "Orders.created_at".into(),
            granularity: Some("day".into()),
        }]
    );

    let definition = &descriptor.pre_aggregation;
    assert_eq!(definition.scheduled_refresh, Some(true));
    assert_eq!(definition.external, Some(true));
    assert_eq!(definition.allow_non_strict_date_range_match, Some(false));
    assert!(definition.measures.is_none());
    let index = &definition.indexes_references.as_ref().unwrap()["by_status"];
    assert_eq!(index.columns, vec!["Orders.status"]);
    assert_eq!(index.index_type, "regular");
}

#[test]
fn test_pre_aggregation_defaults_follow_settings() {
    let cube = orders().with_pre_aggregation(
        "main",
        PreAggregationDefinition::rollup(vec![path("count")], vec![]),
    );
    let defaults = PreAggregationSettings {
        scheduled_refresh: false,
        external: false,
        allow_non_strict_date_range_match: true,
    };
    let (evaluator, _) = evaluate_with(vec![cube, users()], defaults);

    let descriptors = evaluator.pre_aggregations(&PreAggregationFilter::new());
    assert_eq!(descriptors[0].pre_aggregation.scheduled_refresh, Some(false));
    assert_eq!(descriptors[0].pre_aggregation.external, Some(false));
    // no time dimension, no date range matching flag
    assert_eq!(descriptors[0].pre_aggregation.allow_non_strict_date_range_match, None);
    assert!(evaluator.pre_aggregations(&PreAggregationFilter::new().scheduled()).is_empty());
}

#[test]
fn test_build_range_warning() {
    let mut main = PreAggregationDefinition::rollup(vec![path("count")], vec![]);
    main.build_range_start = Some(SqlSnippet::new("SELECT NOW() - interval '1 year'"));
    main.refresh_range_start = Some(SqlSnippet::new("SELECT NOW() - interval '2 year'"));
    let cube = orders().with_pre_aggregation("main", main);

    let (evaluator, report) = evaluate(vec![cube, users()]);
    assert_eq!(
        report.warning_messages(),
        vec![
            "Orders cube -> main pre-aggregation: You specified both buildRangeStart and \
             refreshRangeStart, buildRangeStart will be used."
        ]
    );
    let descriptor = &evaluator.pre_aggregations(&PreAggregationFilter::new())[0];
    assert_eq!(
        descriptor.pre_aggregation.refresh_range_start,
        Some(SqlSnippet::new("SELECT NOW() - interval '1 year'"))
    );
}

#[test]
fn test_pre_aggregation_filter() {
    let users = users()
        .with_measure("count", MemberDefinition::of_type("count"))
        .with_pre_aggregation("by_city", PreAggregationDefinition::rollup(vec![path("count")], vec![path("city")]));
    let mut orders = orders().with_pre_aggregation(
        "main",
        PreAggregationDefinition::rollup(vec![path("count")], vec![]),
    );
    orders.data_source = Some("warehouse".into());
    let (evaluator, _) = evaluate(vec![orders, users]);

    let ids = |filter: PreAggregationFilter| -> Vec<String> {
        evaluator.pre_aggregations(&filter).into_iter().map(|d| d.id).collect()
    };
    assert_eq!(ids(PreAggregationFilter::new()), vec!["Orders.main", "Users.by_city"]);
    assert_eq!(
        ids(PreAggregationFilter::new().with_data_sources(vec!["warehouse".into()])),
        vec!["Orders.main"]
    );
    assert_eq!(
        ids(PreAggregationFilter::new().with_cubes(vec!["Users".into()])),
        vec!["Users.by_city"]
    );
    assert_eq!(
        ids(PreAggregationFilter::new().with_ids(vec!["Orders.main".into()])),
        vec!["Orders.main"]
    );
}

#[test]
fn test_rollup_references() {
    let lambda = PreAggregationDefinition {
        pre_aggregation_type: Some("rollupLambda".into()),
        rollups: Some(vec![path("main"), path("Orders.missing")]),
        ..Default::default()
    };
    let cube = orders()
        .with_pre_aggregation("main", PreAggregationDefinition::rollup(vec![path("count")], vec![]))
        .with_pre_aggregation("lambda", lambda);

    let (_, report) = evaluate(vec![cube, users()]);
    assert_eq!(
        report.error_messages(),
        vec![
            "Orders cube -> lambda pre-aggregation: Pre-aggregation 'Orders.missing' \
             referenced in rollups of 'Orders' not found"
        ]
    );
}

// ============================================================================
// Hierarchies, folders, access policies
// ============================================================================

#[test]
fn test_hierarchy_levels() {
    let mut cube = users().with_measure("count", MemberDefinition::of_type("count"));
    cube.hierarchies.insert(
        "geo".into(),
        HierarchyDefinition {
            levels: vec![path("country"), path("city")],
            ..Default::default()
        },
    );
    cube.hierarchies.insert(
        "bad".into(),
        HierarchyDefinition {
            levels: vec![path("count")],
            ..Default::default()
        },
    );

    let (evaluator, report) = evaluate(vec![cube]);
    assert_eq!(
        report.error_messages(),
        vec![
            "Users cube: Only dimensions can be part of a hierarchy. \
             Please remove the 'count' member from the 'bad' hierarchy."
        ]
    );
    let users = evaluator.cube("Users").unwrap();
    let geo = users.evaluated_hierarchies.iter().find(|h| h.name == "geo").unwrap();
    assert_eq!(geo.levels, vec!["Users.country", "Users.city"]);
}

#[test]
fn test_view_hierarchy_maps_through_included_members() {
    let mut users = users();
    users.hierarchies.insert(
        "geo".into(),
        HierarchyDefinition {
            levels: vec![path("country"), path("city")],
            ..Default::default()
        },
    );
    let view = CubeDefinition::view("v").with_view_cube(
        ViewCubeDefinition::new(path("Users"))
            .with_prefix()
            .with_includes(Includes::members(["geo"])),
    );

    let (evaluator, report) = evaluate(vec![users, view]);
    assert!(!report.has_errors(), "{:?}", report.error_messages());

    let view = evaluator.cube("v").unwrap();
    assert!(view.dimensions.contains_key("Users_city"));
    let geo = &view.evaluated_hierarchies[0];
    assert_eq!(geo.name, "Users_geo");
    assert_eq!(geo.levels, vec!["v.Users_country", "v.Users_city"]);
    assert_eq!(geo.alias_member.as_deref(), Some("Users.geo"));
}

#[test]
fn test_folders() {
    let mut view = CubeDefinition::view("v")
        .with_view_cube(ViewCubeDefinition::new(path("Users")).with_includes(Includes::members(["city"])));
    view.folders = vec![FolderDefinition {
        name: "Location".into(),
        includes: Includes::members(["city", "zip"]),
    }];

    let (evaluator, report) = evaluate(vec![users(), view]);
    assert_eq!(
        report.error_messages(),
        vec!["v view: Member 'zip' included in folder 'Location' not found"]
    );
    let folder = &evaluator.cube("v").unwrap().evaluated_folders[0];
    assert_eq!(folder.members, vec!["v.city"]);
}

#[test]
fn test_access_policy_references() {
    let policy = AccessPolicyDefinition {
        role: Some("analyst".into()),
        member_level: Some(MemberLevelPolicy {
            includes: Some(Includes::all()),
            excludes: Some(Includes::members(["revenue"])),
            ..Default::default()
        }),
        row_level: Some(RowLevelPolicy {
            filters: vec![
                RowLevelFilter {
                    member: Some(path("status")),
                    operator: Some("equals".into()),
                    values: Some(vec![serde_json::json!("done")]),
                    ..Default::default()
                },
                RowLevelFilter {
                    member: Some(path("Orders.Users.city")),
                    operator: Some("equals".into()),
                    ..Default::default()
                },
            ],
            allow_all: None,
        }),
    };
    let cube = orders().with_access_policy(policy);

    let (evaluator, report) = evaluate(vec![cube, users()]);
    assert_eq!(
        report.error_messages(),
        vec![
            "Orders cube -> analyst access policy: Paths aren't allowed in the accessPolicy policy \
             but 'Orders.Users.city' provided as a filter member reference for Orders"
        ]
    );

    let policy = &evaluator.cube("Orders").unwrap().access_policy[0];
    let member_level = policy.member_level.as_ref().unwrap();
    assert!(member_level.includes_members.contains(&"Orders.status".to_string()));
    assert_eq!(member_level.excludes_members, vec!["Orders.revenue"]);
    let filters = &policy.row_level.as_ref().unwrap().filters;
    assert_eq!(filters[0].member_reference.as_deref(), Some("Orders.status"));
    assert_eq!(filters[1].member_reference, None);
}
