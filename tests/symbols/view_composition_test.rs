//! View composition through the full compile pipeline.

use cubist::compile::{compile, CompileOptions, CompiledSchema};
use cubist::model::{cubes_from_json, MemberKind};

const CUBES: &str = r#"[
    {
        "name": "Orders",
        "fileName": "orders.yml",
        "sqlTable": "orders",
        "measures": {
            "count": { "type": "count" },
            "revenue": { "type": "sum", "sql": "{CUBE}.amount" }
        },
        "dimensions": {
            "id": { "type": "number", "sql": "{CUBE}.id", "primaryKey": true },
            "status": { "type": "string", "sql": "{CUBE}.status" }
        },
        "joins": [
            { "name": "Users", "relationship": "belongsTo", "sql": "{CUBE}.user_id = {Users.id}" }
        ]
    },
    {
        "name": "Users",
        "fileName": "users.yml",
        "sqlTable": "users",
        "dimensions": {
            "id": { "type": "number", "sql": "{CUBE}.id", "primaryKey": true },
            "city": { "type": "string", "sql": "{CUBE}.city" },
            "name": { "type": "string", "sql": "{CUBE}.name" }
        }
    }
]"#;

fn compile_with(view: &str) -> CompiledSchema {
    let mut cubes = cubes_from_json(CUBES, "model.json").unwrap();
    cubes.extend(cubes_from_json(view, "views.yml").unwrap());
    compile(&cubes, CompileOptions::default()).unwrap()
}

#[test]
fn test_prefixed_and_aliased_includes() {
    let schema = compile_with(
        r#"{
            "name": "orders_view",
            "isView": true,
            "cubes": [
                { "joinPath": "Orders", "includes": ["revenue", { "name": "status", "alias": "order_status" }] },
                { "joinPath": "Orders.Users", "prefix": true, "includes": ["city"] }
            ]
        }"#,
    );

    let view = schema.evaluator.cube("orders_view").unwrap();
    let measures: Vec<_> = view.measures.keys().collect();
    let dimensions: Vec<_> = view.dimensions.keys().collect();
    assert_eq!(measures, vec!["revenue"]);
    assert_eq!(dimensions, vec!["Users_city", "order_status"]);

    assert_eq!(
        schema.evaluator.dimension_by_path("orders_view.Users_city").unwrap().alias_member.as_deref(),
        Some("Users.city")
    );
    assert_eq!(
        schema.evaluator.dimension_by_path("orders_view.order_status").unwrap().alias_member.as_deref(),
        Some("Orders.status")
    );
}

#[test]
fn test_wildcard_with_excludes() {
    let schema = compile_with(
        r#"{
            "name": "users_view",
            "isView": true,
            "cubes": [
                { "joinPath": "Users", "includes": "*", "excludes": ["name"] }
            ]
        }"#,
    );

    let view = schema.symbols.cube("users_view").unwrap();
    assert!(view.dimensions.contains_key("city"));
    assert!(view.dimensions.contains_key("id"));
    assert!(!view.dimensions.contains_key("name"));

    let paths: Vec<_> = view
        .included_members
        .iter()
        .map(|m| (m.member_path.as_str(), m.kind))
        .collect();
    assert!(paths.contains(&("Users.city", MemberKind::Dimension)));
}

#[test]
fn test_split_view_becomes_its_own_cube() {
    let schema = compile_with(
        r#"{
            "name": "sales",
            "isView": true,
            "cubes": [
                { "joinPath": "Orders", "includes": ["count"] },
                { "joinPath": "Orders.Users", "split": true, "includes": ["city"] }
            ]
        }"#,
    );

    let split = schema.evaluator.cube("sales_Users").unwrap();
    assert!(split.is_split_view);
    assert!(split.dimensions.contains_key("city"));
    assert!(schema.meta.iter().any(|m| m.name == "sales_Users"));
}

#[test]
fn test_conflicting_includes_fail_compilation() {
    let mut cubes = cubes_from_json(CUBES, "model.json").unwrap();
    cubes.extend(
        cubes_from_json(
            r#"{
                "name": "clash",
                "isView": true,
                "cubes": [
                    { "joinPath": "Orders", "includes": ["id"] },
                    { "joinPath": "Orders.Users", "includes": ["id"] }
                ]
            }"#,
            "clash.yml",
        )
        .unwrap(),
    );

    let err = compile(&cubes, CompileOptions::default()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Compile errors:\nclash.yml:\n  clash view: Included member 'id' conflicts with existing \
         member of 'clash'. Please consider excluding this member or assigning it an alias."
    );
}

#[test]
fn test_view_of_view() {
    let schema = compile_with(
        r#"[
            {
                "name": "outer",
                "isView": true,
                "cubes": [{ "joinPath": "inner", "includes": "*" }]
            },
            {
                "name": "inner",
                "isView": true,
                "cubes": [{ "joinPath": "Users", "includes": ["city"] }]
            }
        ]"#,
    );

    let outer = schema.evaluator.cube("outer").unwrap();
    assert!(outer.dimensions.contains_key("city"));
}
