//! Client-facing metadata produced by a full compile.

use cubist::compile::{compile, CompileOptions};
use cubist::meta::CubeMeta;
use cubist::model::cubes_from_json;
use insta::assert_snapshot;

const MODEL: &str = r#"[
    {
        "name": "Orders",
        "sqlTable": "orders",
        "title": "Online Orders",
        "description": "Orders placed in the web shop",
        "measures": {
            "count": { "type": "count", "drillMembers": ["id", "status", "Users.city"] },
            "total_amount": { "type": "sum", "sql": "{CUBE}.amount", "format": "currency" },
            "running_total": { "type": "runningTotal", "sql": "{CUBE}.amount", "public": false }
        },
        "dimensions": {
            "id": { "type": "number", "sql": "{CUBE}.id", "primaryKey": true },
            "status": { "type": "string", "sql": "{CUBE}.status", "title": "Order Status" },
            "created_at": {
                "type": "time",
                "sql": "{CUBE}.created_at",
                "granularities": { "fiscal_year": { "interval": "1 year", "offset": "3 months" } }
            }
        },
        "segments": {
            "completed": { "sql": "{CUBE}.status = 'completed'" }
        },
        "joins": [
            { "name": "Users", "relationship": "belongsTo", "sql": "{CUBE}.user_id = {Users.id}" }
        ]
    },
    {
        "name": "Users",
        "sqlTable": "users",
        "public": false,
        "dimensions": {
            "id": { "type": "number", "sql": "{CUBE}.id", "primaryKey": true },
            "city": { "type": "string", "sql": "{CUBE}.city" },
            "country": { "type": "string", "sql": "{CUBE}.country" }
        },
        "hierarchies": {
            "geo": { "levels": ["country", "city"] }
        }
    },
    {
        "name": "sales",
        "isView": true,
        "cubes": [
            { "joinPath": "Orders", "includes": ["count", "status"] },
            { "joinPath": "Orders.Users", "prefix": true, "includes": ["geo"] }
        ],
        "folders": [
            { "name": "Location", "includes": ["Users_city", "Users_country"] }
        ]
    }
]"#;

fn meta() -> Vec<CubeMeta> {
    let cubes = cubes_from_json(MODEL, "model.json").unwrap();
    compile(&cubes, CompileOptions::default()).unwrap().meta
}

fn find<'a>(meta: &'a [CubeMeta], name: &str) -> &'a CubeMeta {
    meta.iter().find(|m| m.name == name).unwrap()
}

#[test]
fn test_every_evaluated_cube_is_exported() {
    let meta = meta();
    let names: Vec<_> = meta.iter().map(|m| (m.name.as_str(), m.cube_type.as_str())).collect();
    assert_eq!(names, vec![("Orders", "cube"), ("Users", "cube"), ("sales", "view")]);
}

#[test]
fn test_cube_titles_and_visibility() {
    let meta = meta();
    let orders = find(&meta, "Orders");
    assert_eq!(orders.title, "Online Orders");
    assert_eq!(orders.description.as_deref(), Some("Orders placed in the web shop"));
    assert!(orders.is_visible);

    let users = find(&meta, "Users");
    assert_eq!(users.title, "Users");
    assert!(!users.is_visible);
    assert!(users.dimensions.iter().all(|d| !d.is_visible));
}

#[test]
fn test_measures() {
    let meta = meta();
    let orders = find(&meta, "Orders");
    let measure = |name: &str| orders.measures.iter().find(|m| m.name == name).unwrap();

    let count = measure("Orders.count");
    assert_eq!(count.title, "Online Orders Count");
    assert_eq!(count.drill_members, vec!["Orders.id", "Orders.status", "Users.city"]);
    assert!(count.drill_members_grouped.measures.is_empty());
    assert_eq!(count.drill_members_grouped.dimensions.len(), 3);

    let total = measure("Orders.total_amount");
    assert_eq!(total.short_title, "Total Amount");
    assert_eq!(total.measure_type, "number");
    assert_eq!(total.agg_type.as_deref(), Some("sum"));
    assert_eq!(total.format.as_deref(), Some("currency"));

    let running = measure("Orders.running_total");
    assert!(running.cumulative);
    assert!(!running.is_visible);
}

#[test]
fn test_dimensions() {
    let meta = meta();
    let orders = find(&meta, "Orders");
    let dimension = |name: &str| orders.dimensions.iter().find(|d| d.name == name).unwrap();

    let id = dimension("Orders.id");
    assert!(id.primary_key);
    assert!(!id.is_visible);

    let status = dimension("Orders.status");
    assert_eq!(status.title, "Online Orders Order Status");
    assert_eq!(status.short_title, "Order Status");
    assert!(status.suggest_filter_values);

    let created_at = dimension("Orders.created_at");
    let granularities = created_at.granularities.as_ref().unwrap();
    assert_eq!(granularities[0].name, "fiscal_year");
    assert_eq!(granularities[0].title, "Fiscal Year");
    assert_eq!(granularities[0].offset.as_deref(), Some("3 months"));
}

#[test]
fn test_segment_snapshot() {
    let meta = meta();
    let segment = &find(&meta, "Orders").segments[0];
    assert_snapshot!(serde_json::to_string_pretty(segment).unwrap(), @r#"
    {
      "name": "Orders.completed",
      "title": "Online Orders Completed",
      "shortTitle": "Completed",
      "isVisible": true,
      "public": true
    }
    "#);
}

#[test]
fn test_view_meta() {
    let meta = meta();
    let sales = find(&meta, "sales");
    assert_eq!(sales.title, "Sales");

    let count = sales.measures.iter().find(|m| m.name == "sales.count").unwrap();
    assert_eq!(count.measure_type, "number");
    assert_eq!(count.agg_type.as_deref(), Some("count"));
    assert_eq!(count.alias_member.as_deref(), Some("Orders.count"));

    let hierarchy = &sales.hierarchies[0];
    assert_eq!(hierarchy.name, "sales.Users_geo");
    assert_eq!(hierarchy.levels, vec!["sales.Users_country", "sales.Users_city"]);
    assert_eq!(hierarchy.alias_member.as_deref(), Some("Users.geo"));

    assert_eq!(sales.folders[0].name, "Location");
    assert_eq!(sales.folders[0].members, vec!["sales.Users_city", "sales.Users_country"]);
}
