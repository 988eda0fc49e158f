//! Join trees over a compiled model.

use cubist::compile::{compile, CompileOptions, CompiledSchema};
use cubist::model::cubes_from_json;
use cubist::semantic::{JoinHint, JoinTree};

const MODEL: &str = r#"[
    {
        "name": "Orders",
        "sqlTable": "orders",
        "measures": { "count": { "type": "count" } },
        "dimensions": { "id": { "type": "number", "sql": "{CUBE}.id", "primaryKey": true } },
        "joins": [
            { "name": "Users", "relationship": "belongsTo", "sql": "{CUBE}.user_id = {Users.id}" },
            { "name": "LineItems", "relationship": "hasMany", "sql": "{CUBE}.id = {LineItems.order_id}" }
        ]
    },
    {
        "name": "Users",
        "sqlTable": "users",
        "dimensions": { "id": { "type": "number", "sql": "{CUBE}.id", "primaryKey": true } }
    },
    {
        "name": "LineItems",
        "sqlTable": "line_items",
        "measures": { "quantity": { "type": "sum", "sql": "{CUBE}.quantity" } },
        "dimensions": {
            "id": { "type": "number", "sql": "{CUBE}.id", "primaryKey": true },
            "order_id": { "type": "number", "sql": "{CUBE}.order_id" }
        },
        "joins": [
            { "name": "Products", "relationship": "many_to_one", "sql": "{CUBE}.product_id = {Products.id}" }
        ]
    },
    {
        "name": "Products",
        "sqlTable": "products",
        "dimensions": { "id": { "type": "number", "sql": "{CUBE}.id", "primaryKey": true } }
    },
    {
        "name": "Lonely",
        "sqlTable": "lonely",
        "measures": { "count": { "type": "count" } }
    }
]"#;

fn schema() -> CompiledSchema {
    let cubes = cubes_from_json(MODEL, "model.json").unwrap();
    compile(&cubes, CompileOptions::default()).unwrap()
}

fn build(schema: &CompiledSchema, hints: &[&str]) -> JoinTree {
    let hints: Vec<JoinHint> = hints.iter().map(|h| JoinHint::parse(h)).collect();
    schema.join_graph.build_join(&hints).unwrap().unwrap()
}

fn pairs(tree: &JoinTree) -> Vec<(&str, &str)> {
    tree.joins.iter().map(|j| (j.from.as_str(), j.to.as_str())).collect()
}

#[test]
fn test_tree_over_three_cubes() {
    let schema = schema();
    let tree = build(&schema, &["Orders", "Users", "LineItems"]);

    assert_eq!(tree.root, "Orders");
    assert_eq!(pairs(&tree), vec![("Orders", "Users"), ("Orders", "LineItems")]);
    assert_eq!(tree.multiplication_factor["Orders"], true);
    assert_eq!(tree.multiplication_factor["Users"], true);
    assert_eq!(tree.multiplication_factor["LineItems"], false);
}

#[test]
fn test_path_hint_extends_tree() {
    let schema = schema();
    let tree = build(&schema, &["Orders", "LineItems.Products"]);

    assert_eq!(tree.root, "Orders");
    assert_eq!(pairs(&tree), vec![("Orders", "LineItems"), ("LineItems", "Products")]);
    let cubes: Vec<_> = tree.multiplication_factor.keys().collect();
    assert_eq!(cubes, vec!["Orders", "Products"]);
    assert_eq!(tree.multiplication_factor["Products"], true);
}

#[test]
fn test_reverse_traversal_keeps_declared_direction() {
    let schema = schema();
    let path = schema.join_graph.find_path("Users", "LineItems").unwrap();

    let walked: Vec<_> = path.iter().map(|e| (e.from.as_str(), e.to.as_str())).collect();
    assert_eq!(walked, vec![("Users", "Orders"), ("Orders", "LineItems")]);
    assert_eq!(path[0].key(), "Orders-Users");
    assert_eq!(path[0].join.relationship, "belongsTo");
}

#[test]
fn test_unreachable_cube() {
    let schema = schema();
    let hints = vec![JoinHint::parse("Orders"), JoinHint::parse("Lonely")];
    let err = schema.join_graph.build_join(&hints).unwrap_err();
    assert_eq!(err.to_string(), "Can't find join path to join 'Orders', 'Lonely'");
    assert!(schema.join_graph.find_path("Orders", "Lonely").is_none());
}

#[test]
fn test_tree_serializes_camel_case() {
    let schema = schema();
    let tree = build(&schema, &["Users", "Orders"]);
    let json = serde_json::to_value(&tree).unwrap();

    assert_eq!(json["root"], "Users");
    assert_eq!(json["joins"][0]["from"], "Users");
    assert_eq!(json["joins"][0]["originalFrom"], "Orders");
    assert_eq!(json["joins"][0]["join"]["name"], "Users");
    assert_eq!(json["multiplicationFactor"]["Users"], true);
}

#[test]
fn test_connected_components_reach_meta() {
    let schema = schema();
    for cube in ["Orders", "Users", "LineItems", "Products"] {
        assert_eq!(schema.join_graph.connected_component(cube), Some(1));
    }
    assert_eq!(schema.join_graph.connected_component("Lonely"), None);

    let lonely = schema.meta.iter().find(|m| m.name == "Lonely").unwrap();
    assert_eq!(lonely.connected_component, None);
    let orders = schema.meta.iter().find(|m| m.name == "Orders").unwrap();
    assert_eq!(orders.connected_component, Some(1));
}

#[test]
fn test_join_to_invalid_cube() {
    let cubes = cubes_from_json(
        r#"[
            {
                "name": "Orders",
                "fileName": "orders.yml",
                "sqlTable": "orders",
                "measures": { "count": { "type": "count" } },
                "dimensions": { "id": { "type": "number", "sql": "{CUBE}.id", "primaryKey": true } },
                "joins": [{ "name": "Broken", "relationship": "belongsTo", "sql": "{CUBE}.broken_id = broken.id" }]
            },
            {
                "name": "Broken",
                "fileName": "broken.yml",
                "sqlTable": "broken",
                "measures": { "total": { "type": "sum" } }
            }
        ]"#,
        "model.json",
    )
    .unwrap();

    let schema = compile(&cubes, CompileOptions::default().with_omit_errors(true)).unwrap();
    assert_eq!(
        schema.report.error_messages(),
        vec![
            "Broken cube: (measures.total.sql) is required",
            "Orders cube: Cube Broken doesn't exist",
        ]
    );
    assert_eq!(schema.join_graph.edges().count(), 0);
}
