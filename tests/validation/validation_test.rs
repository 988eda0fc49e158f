use cubist::model::cubes_from_json;
use cubist::semantic::ErrorReport;
use cubist::validation::{validate_cube, CubeValidator, Violation};

fn messages(json: &str) -> Vec<String> {
    let cubes = cubes_from_json(json, "model.json").unwrap();
    validate_cube(&cubes[0]).iter().map(Violation::to_string).collect()
}

#[test]
fn test_valid_cube_from_json() {
    let json = r#"{
        "name": "Orders",
        "sqlTable": "public.orders",
        "measures": {
            "count": { "type": "count" },
            "revenue": { "type": "sum", "sql": "{CUBE}.amount" }
        },
        "dimensions": {
            "id": { "type": "number", "sql": "{CUBE}.id", "primaryKey": true },
            "created_at": { "type": "time", "sql": "{CUBE}.created_at" }
        },
        "joins": [
            { "name": "Users", "relationship": "many_to_one", "sql": "{CUBE}.user_id = {Users.id}" }
        ]
    }"#;
    assert!(messages(json).is_empty());
}

#[test]
fn test_missing_source() {
    let json = r#"{ "name": "Orders", "measures": { "count": { "type": "count" } } }"#;
    assert_eq!(messages(json), vec!["(sql) either sql or sqlTable is required"]);
}

#[test]
fn test_measure_without_sql() {
    let json = r#"{
        "name": "Orders",
        "sqlTable": "orders",
        "measures": { "revenue": { "type": "sum" } }
    }"#;
    assert_eq!(messages(json), vec!["(measures.revenue.sql) is required"]);
}

#[test]
fn test_violations_are_grouped_per_cube() {
    let json = r#"[
        {
            "name": "Broken",
            "fileName": "broken.yml",
            "sqlTable": "broken",
            "measures": { "total": { "type": "sum" } },
            "dimensions": { "total": { "type": "string", "sql": "total" } }
        },
        {
            "name": "Fine",
            "sqlTable": "fine",
            "measures": { "count": { "type": "count" } }
        }
    ]"#;
    let cubes = cubes_from_json(json, "model.json").unwrap();

    let mut report = ErrorReport::new();
    let mut validator = CubeValidator::new();
    let results: Vec<bool> = cubes
        .iter()
        .map(|cube| validator.validate(cube, &mut report.reporter()))
        .collect();

    assert_eq!(results, vec![false, true]);
    assert_eq!(report.errors().len(), 1);
    let error = &report.errors()[0];
    assert_eq!(error.file.as_deref(), Some("broken.yml"));
    assert!(error.message.contains("total defined more than once"));
    assert!(error.message.contains("(measures.total.sql) is required"));
}

#[test]
fn test_view_with_split_and_prefix() {
    let json = r#"{
        "name": "orders_view",
        "isView": true,
        "cubes": [
            { "joinPath": "Orders", "includes": "*", "split": true, "prefix": true }
        ]
    }"#;
    assert_eq!(
        messages(json),
        vec!["(cubes[0]) Using split together with prefix is not supported"]
    );
}

#[test]
fn test_unknown_relationship() {
    let json = r#"{
        "name": "Orders",
        "sqlTable": "orders",
        "joins": [{ "name": "Users", "relationship": "sideways", "sql": "1 = 1" }]
    }"#;
    assert_eq!(
        messages(json),
        vec!["(joins.Users.relationship = sideways) must be one of [belongsTo, hasMany, hasOne] or a synonym"]
    );
}

#[test]
fn test_violation_display() {
    let violation = Violation {
        path: "measures.revenue.type".to_string(),
        value: Some("median".to_string()),
        message: "is not supported".to_string(),
    };
    assert_eq!(violation.to_string(), "(measures.revenue.type = median) is not supported");

    let bare = Violation {
        path: String::new(),
        value: None,
        message: "revenue defined more than once".to_string(),
    };
    assert_eq!(bare.to_string(), "revenue defined more than once");
}
