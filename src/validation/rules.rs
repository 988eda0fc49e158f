//! Shape rules per `type` discriminator.
//!
//! Each table lists the fields that are required or forbidden for a type;
//! anything not listed is optional. Fields are named as authored (camelCase)
//! and looked up on the serialized definition, so a rule is data rather than
//! code.

use std::sync::LazyLock;

use regex::Regex;

/// Whether a field must, may or must not be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Forbidden,
}

/// Field requirements shared by a group of types.
#[derive(Debug, Clone, Copy)]
pub struct Shape {
    pub types: &'static [&'static str],
    pub fields: &'static [(&'static str, Requirement)],
}

impl Shape {
    /// Shape declaring `member_type`, if any.
    pub fn find(shapes: &'static [Shape], member_type: &str) -> Option<&'static Shape> {
        shapes.iter().find(|shape| shape.types.contains(&member_type))
    }

    /// Every type the shapes accept.
    pub fn all_types(shapes: &'static [Shape]) -> Vec<&'static str> {
        shapes.iter().flat_map(|shape| shape.types.iter().copied()).collect()
    }
}

use Requirement::{Forbidden, Required};

const NON_MEASURE_FIELDS: [(&str, Requirement); 4] = [
    ("primaryKey", Forbidden),
    ("granularities", Forbidden),
    ("latitude", Forbidden),
    ("longitude", Forbidden),
];

pub static MEASURE_SHAPES: &[Shape] = &[
    Shape {
        types: &["count"],
        fields: &NON_MEASURE_FIELDS,
    },
    Shape {
        types: &[
            "number",
            "string",
            "boolean",
            "time",
            "sum",
            "avg",
            "min",
            "max",
            "countDistinct",
            "countDistinctApprox",
            "runningTotal",
        ],
        fields: &[
            ("sql", Required),
            ("primaryKey", Forbidden),
            ("granularities", Forbidden),
            ("latitude", Forbidden),
            ("longitude", Forbidden),
        ],
    },
];

pub static DIMENSION_SHAPES: &[Shape] = &[
    Shape {
        types: &["string", "number", "boolean"],
        fields: &[
            ("sql", Required),
            ("granularities", Forbidden),
            ("filters", Forbidden),
            ("drillMembers", Forbidden),
            ("rollingWindow", Forbidden),
        ],
    },
    Shape {
        types: &["time"],
        fields: &[
            ("sql", Required),
            ("filters", Forbidden),
            ("drillMembers", Forbidden),
            ("rollingWindow", Forbidden),
        ],
    },
    Shape {
        types: &["geo"],
        fields: &[
            ("latitude", Required),
            ("longitude", Required),
            ("sql", Forbidden),
            ("granularities", Forbidden),
            ("filters", Forbidden),
            ("drillMembers", Forbidden),
            ("rollingWindow", Forbidden),
        ],
    },
];

pub static SEGMENT_SHAPE: Shape = Shape {
    types: &[],
    fields: &[
        ("sql", Required),
        ("type", Forbidden),
        ("primaryKey", Forbidden),
        ("granularities", Forbidden),
    ],
};

const MEMBER_REFERENCE_FIELDS: [(&str, Requirement); 12] = [
    ("measures", Forbidden),
    ("dimensions", Forbidden),
    ("segments", Forbidden),
    ("timeDimension", Forbidden),
    ("timeDimensions", Forbidden),
    ("rollups", Forbidden),
    ("measureReferences", Forbidden),
    ("dimensionReferences", Forbidden),
    ("segmentReferences", Forbidden),
    ("timeDimensionReference", Forbidden),
    ("timeDimensionReferences", Forbidden),
    ("rollupReferences", Forbidden),
];

pub static PRE_AGGREGATION_SHAPES: &[Shape] = &[
    Shape {
        types: &["rollup"],
        fields: &[
            ("rollups", Forbidden),
            ("rollupReferences", Forbidden),
            ("maxPreAggregations", Forbidden),
        ],
    },
    Shape {
        types: &["originalSql"],
        fields: &MEMBER_REFERENCE_FIELDS,
    },
    Shape {
        types: &["rollupJoin", "rollupLambda"],
        fields: &[("maxPreAggregations", Forbidden), ("indexes", Forbidden)],
    },
    Shape {
        types: &["autoRollup"],
        fields: &MEMBER_REFERENCE_FIELDS,
    },
];

pub const MEASURE_FORMATS: &[&str] = &["percent", "currency", "number"];

pub const DIMENSION_FORMATS: &[&str] = &["imageUrl", "link", "currency", "percent", "number", "id"];

pub const INDEX_TYPES: &[&str] = &["regular", "aggregate"];

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[_a-zA-Z][_a-zA-Z0-9]*$").unwrap());

static INTERVAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?\d+ (second|minute|hour|day|week|month|quarter|year)s?$").unwrap()
});

/// Five or six cron fields.
static CRON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d*/,?LW#A-Z-]+(\s+[\d*/,?LW#A-Z-]+){4,5}$").unwrap());

pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// `1 day`, `2 weeks`, `-1 month`.
pub fn is_interval(value: &str) -> bool {
    INTERVAL.is_match(value.trim())
}

/// `refreshKey.every`: an interval or a cron expression.
pub fn is_refresh_every(value: &str) -> bool {
    is_interval(value) || CRON.is_match(value.trim())
}
