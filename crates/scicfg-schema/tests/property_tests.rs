use std::sync::Arc;

use proptest::prelude::*;
use scicfg_schema::{Config, Dtype, Field, ListField, Schema, Value};

fn schema() -> Arc<Schema> {
    Schema::builder("Props")
        .field("n", Field::new("n", Dtype::Int).with_default(0))
        .field("x", Field::new("x", Dtype::Float).optional(true))
        .field("s", Field::new("s", Dtype::Str).with_default(""))
        .field(
            "l",
            ListField::new("l", Dtype::Int)
                .max_length(8)
                .with_default(Vec::<i64>::new())
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn prop_list_assignment_reads_back(items in prop::collection::vec(any::<i64>(), 0..16)) {
        let mut config = Config::new(&schema()).unwrap();
        config.set("l", items.clone()).unwrap();
        prop_assert_eq!(config.value("l").unwrap(), Value::from(items.clone()));
        prop_assert_eq!(config.list("l").unwrap().unwrap().len(), items.len());
    }

    #[test]
    fn prop_push_matches_vec_push(items in prop::collection::vec(-1000i64..1000, 0..16)) {
        let mut config = Config::new(&schema()).unwrap();
        let mut expected = Vec::new();
        for item in &items {
            config.list_mut("l").unwrap().push(*item).unwrap();
            expected.push(*item);
        }
        prop_assert_eq!(config.value("l").unwrap(), Value::from(expected));
        prop_assert_eq!(config.history("l").unwrap().len(), items.len() + 1);
    }

    #[test]
    fn prop_validate_is_idempotent(
        n in any::<i64>(),
        s in "[a-z]{0,12}",
        items in prop::collection::vec(any::<i64>(), 0..12),
    ) {
        let mut config = Config::new(&schema()).unwrap();
        config.set("n", n).unwrap();
        config.set("s", s).unwrap();
        config.set("l", items).unwrap();
        let before = config.clone();
        let first = config.validate().map_err(|e| e.to_string());
        let second = config.validate().map_err(|e| e.to_string());
        prop_assert_eq!(first, second);
        prop_assert_eq!(&config, &before);
    }

    #[test]
    fn prop_frozen_configs_never_change(n in any::<i64>(), x in any::<f64>(), item in any::<i64>()) {
        let mut config = Config::new(&schema()).unwrap();
        config.freeze();
        let before = config.clone();
        prop_assert!(config.set("n", n).unwrap_err().is_frozen());
        prop_assert!(config.set("x", x).unwrap_err().is_frozen());
        prop_assert!(config.list_mut("l").unwrap().push(item).unwrap_err().is_frozen());
        prop_assert!(config.set_path("s", "changed").unwrap_err().is_frozen());
        prop_assert_eq!(&config, &before);
        prop_assert_eq!(config.history("n").unwrap().len(), 1);
    }

    #[test]
    fn prop_script_round_trip(
        n in any::<i64>(),
        x in prop::option::of(-1.0e6f64..1.0e6),
        s in "[ -~]{0,16}",
        items in prop::collection::vec(any::<i64>(), 0..8),
    ) {
        let schema = schema();
        let mut original = Config::new(&schema).unwrap();
        original.set("n", n).unwrap();
        original.set("x", x).unwrap();
        original.set("s", s).unwrap();
        original.set("l", items).unwrap();

        let mut restored = Config::new(&schema).unwrap();
        restored.load_from_str(&original.save_to_string("root"), "root").unwrap();
        prop_assert_eq!(restored, original);
    }
}
