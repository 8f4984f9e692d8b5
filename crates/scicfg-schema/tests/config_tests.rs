use std::sync::Arc;

use pretty_assertions::assert_eq;
use scicfg_schema::{
    ChoiceField, ChoiceTypes, Config, ConfigChoiceField, ConfigError, ConfigField, DefinitionError,
    Dtype, Failure, Field, ListField, RangeField, Schema, Selection, Value,
};

fn detection() -> Arc<Schema> {
    Schema::builder("DetectionConfig")
        .doc("source detection")
        .field(
            "threshold",
            RangeField::new("S/N cut", Dtype::Float)
                .min(0.0)
                .with_default(5.0)
                .build()
                .unwrap(),
        )
        .field(
            "polarity",
            ChoiceField::new("which sign to detect", Dtype::Str)
                .allow("positive", "bright sources")
                .allow("negative", "dark sources")
                .with_default("positive")
                .build()
                .unwrap(),
        )
        .field("radii", ListField::new("apertures", Dtype::Float).with_default(vec![1.0, 2.0]).build().unwrap())
        .build()
        .unwrap()
}

fn pipeline() -> Arc<Schema> {
    let detection = detection();
    let background = Schema::builder("BackgroundConfig")
        .field("bin", Field::new("bin size", Dtype::Int).with_default(128))
        .build()
        .unwrap();
    let types = Arc::new(ChoiceTypes::new().with("detect", &detection).with("background", &background));
    Schema::builder("PipelineConfig")
        .field("name", Field::new("run name", Dtype::Str).optional(true))
        .field("detection", ConfigField::new("detection step", &detection))
        .field(
            "extra",
            ConfigChoiceField::new("extra step", types).with_default(Selection::from("background")),
        )
        .build()
        .unwrap()
}

#[test]
fn range_field_bounds() {
    let mut config = Config::new(&detection()).unwrap();
    config.set("threshold", 0).unwrap();
    assert_eq!(config.value("threshold").unwrap(), Value::Float(0.0));
    let err = config.set("threshold", -0.5).unwrap_err();
    match err.failure().unwrap() {
        Failure::OutOfRange { range, .. } => assert_eq!(range, "[0.0,inf)"),
        other => panic!("unexpected failure {other:?}"),
    }
    assert_eq!(err.validation().unwrap().field_type, "RangeField");
}

#[test]
fn choice_field_values() {
    let mut config = Config::new(&detection()).unwrap();
    config.set("polarity", "negative").unwrap();
    let err = config.set("polarity", "both").unwrap_err();
    assert!(matches!(err.failure().unwrap(), Failure::NotAllowed { .. }));
    assert_eq!(config.value("polarity").unwrap(), Value::from("negative"));
}

#[test]
fn definition_errors() {
    assert_eq!(
        RangeField::new("x", Dtype::Str).min(0.0).build().err(),
        Some(DefinitionError::NonNumericRange("str".to_string()))
    );
    assert_eq!(RangeField::new("x", Dtype::Int).build().err(), Some(DefinitionError::EmptyRange));
    assert_eq!(
        ChoiceField::new("x", Dtype::Int).build().err(),
        Some(DefinitionError::EmptyChoices)
    );
    assert_eq!(
        ListField::new("x", Dtype::Int).length(0).build().err(),
        Some(DefinitionError::NonPositiveLength { param: "length", value: 0 })
    );
    assert_eq!(
        ListField::new("x", Dtype::Int).min_length(3).max_length(2).build().err(),
        Some(DefinitionError::MinExceedsMax { min: 3, max: 2 })
    );
    assert_eq!(
        Schema::builder("Bad")
            .field("a", Field::new("a", Dtype::Int))
            .field("a", Field::new("a", Dtype::Int))
            .build()
            .err(),
        Some(DefinitionError::DuplicateField {
            field: "a".to_string(),
            schema: "Bad".to_string()
        })
    );
    assert_eq!(
        Schema::builder("Bad").field("not valid", Field::new("a", Dtype::Int)).build().err(),
        Some(DefinitionError::InvalidFieldName("not valid".to_string()))
    );
}

#[test]
fn nested_configs_are_named_by_path() {
    let config = Config::named(&pipeline(), "root").unwrap();
    let detection = config.sub("detection").unwrap();
    assert_eq!(detection.name(), Some("root.detection"));
    assert_eq!(config.history("detection").unwrap().labels(), vec!["default"]);
    assert_eq!(
        config.history("detection").unwrap().last().unwrap().value(),
        &Value::from("config value set")
    );
}

#[test]
fn path_get_and_set() {
    let mut config = Config::new(&pipeline()).unwrap();
    assert_eq!(config.get_path("detection.threshold").unwrap(), Value::Float(5.0));
    assert_eq!(config.get_path("detection.radii[1]").unwrap(), Value::Float(2.0));
    assert_eq!(config.get_path("extra.name").unwrap(), Value::from("background"));
    assert_eq!(config.get_path("extra[background].bin").unwrap(), Value::Int(128));

    config.set_path("detection.threshold", 3.5).unwrap();
    config.set_path("detection.radii[0]", 0.5).unwrap();
    config.set_path("extra[detect].polarity", "negative").unwrap();
    config.set_path("extra.name", "detect").unwrap();

    let detection = config.sub("detection").unwrap();
    assert_eq!(detection.value("threshold").unwrap(), Value::Float(3.5));
    assert_eq!(detection.value("radii").unwrap(), Value::from(vec![0.5, 2.0]));
    assert_eq!(detection.history("radii").unwrap().labels(), vec!["default", "setitem"]);
    assert_eq!(config.get_path("extra[detect].polarity").unwrap(), Value::from("negative"));
}

#[test]
fn path_errors_match_direct_errors() {
    let mut config = Config::new(&pipeline()).unwrap();
    let via_path = config.set_path("detection.threshold", -1.0).unwrap_err();
    let direct = config.sub_mut("detection").unwrap().set("threshold", -1.0).unwrap_err();
    assert_eq!(via_path.failure(), direct.failure());
    assert_eq!(
        via_path.validation().unwrap().full_name,
        direct.validation().unwrap().full_name
    );

    let err = config.set_path("detection.missing", 1).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownField { .. }));
    let err = config.get_path("name.x").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidPath { .. }));
    let err = config.get_path("detection.radii[9]").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidPath { .. }));
    assert!(config.get_path("detection..x").is_err());
}

#[test]
fn set_config_copies_values() {
    let schema = pipeline();
    let mut config = Config::new(&schema).unwrap();
    let detection_schema = Arc::clone(config.sub("detection").unwrap().schema());
    let mut replacement = Config::new(&detection_schema).unwrap();
    replacement.set("threshold", 9.0).unwrap();
    config.set_config("detection", &replacement).unwrap();

    assert_eq!(config.get_path("detection.threshold").unwrap(), Value::Float(9.0));
    assert_eq!(config.sub("detection").unwrap().name(), Some("detection"));
    assert_eq!(
        config.history("detection").unwrap().labels(),
        vec!["default", "assignment"]
    );

    let other = Config::new(&detection()).unwrap();
    let err = config.set_config("detection", &other).unwrap_err();
    assert!(matches!(err.failure().unwrap(), Failure::WrongSchema { .. }));
}

#[test]
fn inheritance_overrides_and_extends() {
    let base = detection();
    let child = Schema::builder("DeepDetectionConfig")
        .extends(&base)
        .field(
            "threshold",
            RangeField::new("stricter cut", Dtype::Float).min(1.0).with_default(10.0).build().unwrap(),
        )
        .field("passes", Field::new("number of passes", Dtype::Int).with_default(2))
        .build()
        .unwrap();

    assert_eq!(child.field_names(), vec!["threshold", "polarity", "radii", "passes"]);
    assert!(child.is_subclass_of(&base));
    assert!(!base.is_subclass_of(&child));

    let config = Config::new(&child).unwrap();
    assert_eq!(config.value("threshold").unwrap(), Value::Float(10.0));
    assert_eq!(config.value("polarity").unwrap(), Value::from("positive"));
}

#[test]
fn defaults_hooks_run_parent_first() {
    let base = Schema::builder("Base")
        .field("a", Field::new("a", Dtype::Int).with_default(1))
        .on_defaults(|config| config.set("a", 2))
        .build()
        .unwrap();
    let child = Schema::builder("Child")
        .extends(&base)
        .on_defaults(|config| {
            let a = config.value("a")?.as_int().unwrap_or(0);
            config.set("a", a * 10)
        })
        .build()
        .unwrap();
    let config = Config::new(&child).unwrap();
    assert_eq!(config.value("a").unwrap(), Value::Int(20));
    assert_eq!(
        config.history("a").unwrap().labels(),
        vec!["default", "assignment", "assignment"]
    );
}

#[test]
fn validators_run_after_field_checks() {
    let schema = Schema::builder("Window")
        .field("lo", Field::new("low", Dtype::Float).with_default(0.0))
        .field("hi", Field::new("high", Dtype::Float).with_default(1.0))
        .validator(|config| {
            let lo = config.value("lo").map_err(|e| e.to_string())?;
            let hi = config.value("hi").map_err(|e| e.to_string())?;
            if lo.as_float() < hi.as_float() {
                Ok(())
            } else {
                Err("lo must be below hi".to_string())
            }
        })
        .build()
        .unwrap();
    let mut config = Config::new(&schema).unwrap();
    config.validate().unwrap();
    config.set("lo", 2.0).unwrap();
    let err = config.validate().unwrap_err();
    assert_eq!(err.to_string(), "Window failed validation: lo must be below hi");
}

#[test]
fn freeze_propagates_everywhere() {
    let mut config = Config::new(&pipeline()).unwrap();
    config.freeze();
    assert!(config.is_frozen());
    assert!(config.sub("detection").unwrap().is_frozen());
    assert!(config.choice("extra").unwrap().get("background").unwrap().is_frozen());

    assert!(config.set("name", "x").unwrap_err().is_frozen());
    assert!(config.unset("name").unwrap_err().is_frozen());
    assert!(config.set_path("detection.threshold", 1.0).unwrap_err().is_frozen());
    assert!(config.sub_mut("detection").unwrap().set("threshold", 1.0).unwrap_err().is_frozen());
    assert_eq!(config.get_path("detection.threshold").unwrap(), Value::Float(5.0));
}

#[test]
fn update_stops_at_first_error() {
    let mut config = Config::new(&detection()).unwrap();
    let err = config
        .update([
            ("threshold", Value::Float(1.0)),
            ("polarity", Value::from("sideways")),
            ("threshold", Value::Float(2.0)),
        ])
        .unwrap_err();
    assert!(matches!(err.failure().unwrap(), Failure::NotAllowed { .. }));
    assert_eq!(config.value("threshold").unwrap(), Value::Float(1.0));
    assert_eq!(config.history("threshold").unwrap().labels(), vec!["default", "update"]);
}

#[test]
fn script_round_trip() {
    let schema = pipeline();
    let mut original = Config::new(&schema).unwrap();
    original.set("name", "run \"7\"").unwrap();
    original.set_path("detection.threshold", f64::INFINITY).unwrap();
    original.set_path("detection.radii", vec![0.5, 1.5, 3.0]).unwrap();
    original.set_path("extra[detect].polarity", "negative").unwrap();
    original.set_path("extra.name", "detect").unwrap();

    let script = original.save_to_string("root");
    assert!(script.contains("root.detection.threshold=.inf\n"));
    assert!(script.contains("root.extra[detect].polarity=\"negative\"\n"));
    assert!(script.ends_with("root.extra.name=\"detect\"\n"));

    let mut restored = Config::new(&schema).unwrap();
    restored.load_from_str(&script, "root").unwrap();
    assert_eq!(restored, original);
    assert_eq!(restored.save_to_string("root"), script);
}

#[test]
fn numeric_choice_names_survive_scripts() {
    let versioned = Schema::builder("Versioned")
        .field("v", Field::new("version parameter", Dtype::Int).with_default(0))
        .build()
        .unwrap();
    let types = Arc::new(ChoiceTypes::new().with("1", &versioned).with("2", &versioned));
    let schema = Schema::builder("Holder")
        .field("algo", ConfigChoiceField::new("versioned algorithm", types))
        .build()
        .unwrap();

    let mut original = Config::new(&schema).unwrap();
    original.set_path("algo[1].v", 7).unwrap();
    original.set_path("algo.name", "1").unwrap();
    assert_eq!(original.get_path("algo[\"1\"].v").unwrap(), Value::Int(7));
    assert_eq!(original.get_path("algo[2].v").unwrap(), Value::Int(0));

    let script = original.save_to_string("root");
    assert!(script.contains("root.algo[\"1\"].v=7\n"));

    let mut restored = Config::new(&schema).unwrap();
    restored.load_from_str(&script, "root").unwrap();
    assert_eq!(restored, original);
}

#[test]
fn script_errors_match_direct_errors() {
    let mut config = Config::new(&detection()).unwrap();
    let err = config.load_from_str("root.threshold=-3.0\n", "root").unwrap_err();
    assert!(matches!(err.failure().unwrap(), Failure::OutOfRange { .. }));
    let err = config.load_from_str("root.unknown=1\n", "root").unwrap_err();
    assert!(err.is_lookup());
}

#[test]
fn export_formats() {
    let config = Config::new(&pipeline()).unwrap();
    let json = config.to_json().unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["detection"]["threshold"], serde_json::json!(5.0));
    assert_eq!(parsed["extra"]["name"], serde_json::json!("background"));
    assert!(parsed.get("name").is_none());
}

#[test]
fn history_is_formatted_with_call_sites() {
    let mut config = Config::named(&detection(), "root").unwrap();
    config.set("threshold", 4.5).unwrap();
    let text = config.format_history("threshold").unwrap();
    assert!(text.starts_with("root.threshold:\n"));
    assert!(text.contains("assignment"));
    assert!(text.contains("config_tests.rs"));
}
