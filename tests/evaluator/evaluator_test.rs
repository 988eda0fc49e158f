//! Evaluation of pre-aggregations, lookups and policies over a compiled model.

use cubist::compile::{compile, CompileOptions, CompiledSchema};
use cubist::config::Settings;
use cubist::model::{cubes_from_json, IndexReferences, MemberKind, TimeDimensionReference};
use cubist::semantic::PreAggregationFilter;

const MODEL: &str = r#"[
    {
        "name": "Orders",
        "fileName": "orders.yml",
        "sqlTable": "orders",
        "dataSource": "warehouse",
        "measures": {
            "count": { "type": "count" },
            "revenue": { "type": "sum", "sql": "{CUBE}.amount" }
        },
        "dimensions": {
            "id": { "type": "number", "sql": "{CUBE}.id", "primaryKey": true },
            "status": { "type": "string", "sql": "{CUBE}.status" },
            "created_at": { "type": "time", "sql": "{CUBE}.created_at" }
        },
        "joins": [
            { "name": "Users", "relationship": "many_to_one", "sql": "{CUBE}.user_id = {Users.id}" }
        ],
        "preAggregations": {
            "daily": {
                "measures": ["count", "revenue"],
                "dimensions": ["status"],
                "timeDimension": "created_at",
                "granularity": "day",
                "indexes": { "by_status": { "columns": ["status"] } }
            },
            "source": { "type": "originalSql" },
            "joined": { "type": "rollupJoin", "rollups": ["daily", "Users.by_city"] }
        }
    },
    {
        "name": "Users",
        "fileName": "users.yml",
        "sqlTable": "users",
        "measures": { "count": { "type": "count" } },
        "dimensions": {
            "id": { "type": "number", "sql": "{CUBE}.id", "primaryKey": true },
            "city": { "type": "string", "sql": "{CUBE}.city" }
        },
        "preAggregations": {
            "by_city": { "measures": ["count"], "dimensions": ["city"] }
        }
    }
]"#;

fn compile_model(options: CompileOptions) -> CompiledSchema {
    let cubes = cubes_from_json(MODEL, "model.json").unwrap();
    compile(&cubes, options).unwrap()
}

fn ids(schema: &CompiledSchema, filter: PreAggregationFilter) -> Vec<String> {
    schema
        .evaluator
        .pre_aggregations(&filter)
        .into_iter()
        .map(|d| d.id)
        .collect()
}

#[test]
fn test_pre_aggregation_references() {
    let schema = compile_model(CompileOptions::default());
    let descriptors = schema
        .evaluator
        .pre_aggregations(&PreAggregationFilter::new().with_ids(vec!["Orders.daily".into()]));
    let daily = &descriptors[0];

    assert_eq!(daily.data_source, "warehouse");
    assert_eq!(daily.references.measures, vec!["Orders.count", "Orders.revenue"]);
    assert_eq!(daily.references.dimensions, vec!["Orders.status"]);
    assert_eq!(
        daily.references.time_dimensions,
        vec![TimeDimensionReference {
            dimension: "Orders.created_at".into(),
            granularity: Some("day".into()),
        }]
    );
    assert_eq!(
        daily.pre_aggregation.indexes_references.as_ref().unwrap()["by_status"],
        IndexReferences {
            columns: vec!["Orders.status".into()],
            index_type: "regular".into(),
        }
    );

    let joined = &schema
        .evaluator
        .pre_aggregations(&PreAggregationFilter::new().with_ids(vec!["Orders.joined".into()]))[0];
    assert_eq!(joined.references.rollups, vec!["Orders.daily", "Users.by_city"]);
}

#[test]
fn test_defaults_follow_settings() {
    let settings = Settings::from_str(
        r#"
        [pre_aggregations]
        scheduled_refresh = false
        external = false
        allow_non_strict_date_range_match = true
        "#,
    )
    .unwrap();
    let schema = compile_model(CompileOptions::from_settings(&settings));

    let all = schema.evaluator.pre_aggregations(&PreAggregationFilter::new());
    let find = |id: &str| &all.iter().find(|d| d.id == id).unwrap().pre_aggregation;

    let daily = find("Orders.daily");
    assert_eq!(daily.pre_aggregation_type.as_deref(), Some("rollup"));
    assert_eq!(daily.scheduled_refresh, Some(false));
    assert_eq!(daily.external, Some(false));
    assert_eq!(daily.allow_non_strict_date_range_match, Some(true));

    let source = find("Orders.source");
    assert_eq!(source.scheduled_refresh, Some(false));
    assert_eq!(source.external, None);

    let joined = find("Orders.joined");
    assert_eq!(joined.scheduled_refresh, None);
    assert_eq!(joined.external, Some(false));

    assert!(ids(&schema, PreAggregationFilter::new().scheduled()).is_empty());
}

#[test]
fn test_pre_aggregation_filters() {
    let schema = compile_model(CompileOptions::default());

    assert_eq!(
        ids(&schema, PreAggregationFilter::new()),
        vec!["Orders.daily", "Orders.joined", "Orders.source", "Users.by_city"]
    );
    assert_eq!(
        ids(&schema, PreAggregationFilter::new().scheduled()),
        vec!["Orders.daily", "Orders.source", "Users.by_city"]
    );
    assert_eq!(
        ids(&schema, PreAggregationFilter::new().with_data_sources(vec!["default".into()])),
        vec!["Users.by_city"]
    );
    assert_eq!(
        ids(&schema, PreAggregationFilter::new().with_cubes(vec!["Orders".into()])).len(),
        3
    );
}

#[test]
fn test_member_lookups() {
    let schema = compile_model(CompileOptions::default());
    let evaluator = &schema.evaluator;

    assert_eq!(evaluator.by_path_any_type("Orders.status").unwrap().0, MemberKind::Dimension);
    assert_eq!(
        evaluator.measure_by_path("Orders.status").unwrap_err().to_string(),
        "'status' not found for path 'Orders.status'"
    );
    assert_eq!(evaluator.time_dimension_paths_for_cube("Orders"), vec!["Orders.created_at"]);
    assert_eq!(evaluator.cube("Orders").unwrap().joins[0].relationship, "belongsTo");
    assert_eq!(evaluator.cubes_by_file_name("users.yml").len(), 1);
}

#[test]
fn test_view_access_policy() {
    let mut cubes = cubes_from_json(MODEL, "model.json").unwrap();
    cubes.extend(
        cubes_from_json(
            r#"{
                "name": "sales",
                "isView": true,
                "cubes": [{ "joinPath": "Orders", "includes": ["revenue", "status"] }],
                "accessPolicy": [
                    {
                        "role": "analyst",
                        "memberLevel": { "includes": "*", "excludes": ["revenue"] },
                        "rowLevel": {
                            "filters": [{ "member": "status", "operator": "equals", "values": ["done"] }]
                        }
                    }
                ]
            }"#,
            "sales.yml",
        )
        .unwrap(),
    );

    let schema = compile(&cubes, CompileOptions::default()).unwrap();
    let policy = &schema.evaluator.cube("sales").unwrap().access_policy[0];

    let member_level = policy.member_level.as_ref().unwrap();
    assert_eq!(member_level.includes_members, vec!["sales.revenue", "sales.status"]);
    assert_eq!(member_level.excludes_members, vec!["sales.revenue"]);

    let filter = &policy.row_level.as_ref().unwrap().filters[0];
    assert_eq!(filter.member_reference.as_deref(), Some("sales.status"));
}

#[test]
fn test_unknown_rollup_is_an_error() {
    let cubes = cubes_from_json(
        r#"{
            "name": "Orders",
            "sqlTable": "orders",
            "measures": { "count": { "type": "count" } },
            "preAggregations": {
                "lambda": { "type": "rollupLambda", "rollups": ["missing"] }
            }
        }"#,
        "orders.yml",
    )
    .unwrap();

    let schema = compile(&cubes, CompileOptions::default().with_omit_errors(true)).unwrap();
    assert_eq!(
        schema.report.error_messages(),
        vec![
            "Orders cube -> lambda pre-aggregation: Pre-aggregation 'missing' \
             referenced in rollups of 'Orders' not found"
        ]
    );
}
