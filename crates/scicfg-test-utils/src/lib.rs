//! Testing utilities for scicfg workspace
//!
//! Shared fixture schemas and tracing setup.

#![allow(missing_docs)]

use std::sync::{Arc, Once};

use scicfg_schema::{
    ChoiceField, ChoiceTypes, ConfigChoiceField, ConfigField, Dtype, Field, ListField, RangeField,
    Schema, Selection,
};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test subscriber honouring `RUST_LOG` (once per process)
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Base schema for algorithm configs
pub fn algorithm_base() -> Arc<Schema> {
    Schema::builder("AlgorithmConfig")
        .doc("base of all algorithm configs")
        .build()
        .unwrap()
}

/// `GaussConfig`: `sigma` (float, 1.0) and `order` (int in [0, 4], 2)
pub fn gauss_schema(base: &Arc<Schema>) -> Arc<Schema> {
    Schema::builder("GaussConfig")
        .extends(base)
        .field("sigma", Field::new("kernel width", Dtype::Float).with_default(1.0))
        .field(
            "order",
            RangeField::new("polynomial order", Dtype::Int)
                .min(0.0)
                .max(4.0)
                .inclusive_max(true)
                .with_default(2)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

/// `BoxConfig`: `width` (int, 3) and `mode` ("reflect" | "wrap")
pub fn box_schema(base: &Arc<Schema>) -> Arc<Schema> {
    Schema::builder("BoxConfig")
        .extends(base)
        .field("width", Field::new("box width", Dtype::Int).with_default(3))
        .field(
            "mode",
            ChoiceField::new("edge handling", Dtype::Str)
                .allow("reflect", "mirror at the edge")
                .allow("wrap", "periodic")
                .with_default("reflect")
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

/// `SimpleConfig`: one field of every scalar and list kind
pub fn simple_schema() -> Arc<Schema> {
    Schema::builder("SimpleConfig")
        .field("i", Field::new("an int", Dtype::Int).with_default(4))
        .field("f", Field::new("a float", Dtype::Float).with_default(0.5))
        .field("b", Field::new("a bool", Dtype::Bool).with_default(true))
        .field("s", Field::new("a string", Dtype::Str).optional(true))
        .field(
            "ll",
            ListField::new("int list", Dtype::Int)
                .with_default(vec![1, 2, 3])
                .max_length(5)
                .build()
                .unwrap(),
        )
        .field(
            "grid",
            ListField::nested("nested int lists", Dtype::Int)
                .with_default(vec![vec![1], vec![2, 3]])
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

/// `OuterConfig`: a nested `SimpleConfig` plus a choice over Gauss/Box
pub fn outer_schema() -> Arc<Schema> {
    let base = algorithm_base();
    let types = Arc::new(
        ChoiceTypes::new()
            .with("gauss", &gauss_schema(&base))
            .with("box", &box_schema(&base)),
    );
    Schema::builder("OuterConfig")
        .field("name", Field::new("run name", Dtype::Str).with_default("test"))
        .field("simple", ConfigField::new("nested simple config", &simple_schema()))
        .field(
            "smooth",
            ConfigChoiceField::new("smoothing kernel", types).with_default(Selection::from("gauss")),
        )
        .build()
        .unwrap()
}
