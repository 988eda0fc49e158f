//! `extends` chains through the full compile pipeline.

use cubist::compile::{compile, CompileOptions};
use cubist::model::cubes_from_json;

const BASE: &str = r#"{
    "name": "BaseEvents",
    "fileName": "base.yml",
    "sqlTable": "events",
    "title": "Events",
    "measures": {
        "count": { "type": "count" }
    },
    "dimensions": {
        "id": { "type": "number", "sql": "{CUBE}.id", "primaryKey": true },
        "kind": { "type": "string", "sql": "{CUBE}.kind" }
    }
}"#;

#[test]
fn test_child_inherits_members_and_source() {
    let mut cubes = cubes_from_json(BASE, "base.yml").unwrap();
    cubes.extend(
        cubes_from_json(
            r#"{
                "name": "Signups",
                "extends": "BaseEvents",
                "dimensions": {
                    "kind": { "type": "string", "sql": "'signup'" },
                    "plan": { "type": "string", "sql": "{CUBE}.plan" }
                }
            }"#,
            "signups.yml",
        )
        .unwrap(),
    );

    let schema = compile(&cubes, CompileOptions::default()).unwrap();
    let signups = schema.evaluator.cube("Signups").unwrap();

    assert!(signups.measures.contains_key("count"));
    let dimensions: Vec<_> = signups.dimensions.keys().collect();
    assert_eq!(dimensions, vec!["id", "kind", "plan"]);
    assert_eq!(
        signups.dimensions["kind"].sql.as_ref().map(|s| s.source()),
        Some("'signup'")
    );
    assert_eq!(signups.sql_table.as_ref().map(|s| s.source()), Some("events"));
    assert_eq!(signups.title.as_deref(), Some("Events"));
    assert_eq!(schema.evaluator.primary_keys("Signups"), &["id".to_string()]);
}

#[test]
fn test_grandchild_sees_whole_chain() {
    let mut cubes = cubes_from_json(BASE, "base.yml").unwrap();
    cubes.extend(
        cubes_from_json(
            r#"[
                {
                    "name": "PaidSignups",
                    "extends": "Signups",
                    "sql": "SELECT * FROM events WHERE paid"
                },
                {
                    "name": "Signups",
                    "extends": "BaseEvents",
                    "measures": { "unique_kinds": { "type": "countDistinct", "sql": "{CUBE}.kind" } }
                }
            ]"#,
            "signups.yml",
        )
        .unwrap(),
    );

    let schema = compile(&cubes, CompileOptions::default()).unwrap();
    let paid = schema.evaluator.cube("PaidSignups").unwrap();

    let measures: Vec<_> = paid.measures.keys().collect();
    assert_eq!(measures, vec!["count", "unique_kinds"]);
    assert!(paid.sql_table.is_none());
    assert!(paid.sql.is_some());
}

#[test]
fn test_missing_parent_is_reported_against_child() {
    let cubes = cubes_from_json(
        r#"{ "name": "Orphan", "extends": "Nobody", "sqlTable": "orphans" }"#,
        "orphan.yml",
    )
    .unwrap();

    let err = compile(&cubes, CompileOptions::default()).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Compile errors:\norphan.yml:\n  Orphan cube: Cube 'Orphan' extends 'Nobody' which doesn't exist"
    );
}

#[test]
fn test_cyclic_extends() {
    let cubes = cubes_from_json(
        r#"[
            { "name": "A", "extends": "B", "sqlTable": "a" },
            { "name": "B", "extends": "A", "sqlTable": "b" }
        ]"#,
        "cycle.yml",
    )
    .unwrap();

    let schema = compile(&cubes, CompileOptions::default().with_omit_errors(true)).unwrap();
    assert_eq!(
        schema.report.error_messages(),
        vec![
            "A cube: Cube 'A' has cyclic extends: A -> B -> A",
            "B cube: Cube 'B' has cyclic extends: B -> A -> B",
        ]
    );
    assert!(schema.evaluator.cube_names().is_empty());
}
