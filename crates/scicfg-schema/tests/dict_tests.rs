use std::sync::Arc;

use pretty_assertions::assert_eq;
use scicfg_schema::{Config, ConfigDictField, DictField, Dtype, Failure, Field, Schema, Value};

fn aperture() -> Arc<Schema> {
    Schema::builder("ApertureConfig")
        .field("radius", Field::new("radius in pixels", Dtype::Float).with_default(3.0))
        .field("shape", Field::new("aperture shape", Dtype::Str).with_default("circle"))
        .build()
        .unwrap()
}

fn photometry() -> Arc<Schema> {
    Schema::builder("PhotometryConfig")
        .field(
            "gains",
            DictField::new("gain per amplifier", Dtype::Float)
                .with_default([("a1", 1.0), ("a2", 1.5)].into_iter().collect::<Value>())
                .item_check(|v| v.as_float().is_some_and(|g| g > 0.0))
                .dict_check(|items| items.len() <= 3),
        )
        .field("flags", DictField::new("optional flags", Dtype::Bool).optional(true))
        .field(
            "apertures",
            ConfigDictField::new("named apertures", &aperture())
                .item_check(|c| c.value("radius").ok().and_then(|v| v.as_float()).is_some_and(|r| r < 50.0))
                .dict_check(|d| d.len() <= 2),
        )
        .build()
        .unwrap()
}

fn aperture_map(radius: f64) -> Value {
    [("radius", Value::Float(radius))].into_iter().collect()
}

fn notes(config: &Config, name: &str) -> Vec<String> {
    config
        .history(name)
        .unwrap()
        .iter()
        .map(|entry| entry.value().as_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn dict_defaults_and_item_history() {
    let mut config = Config::new(&photometry()).unwrap();
    let gains = config.dict("gains").unwrap().unwrap();
    assert_eq!(gains.keys().collect::<Vec<_>>(), vec!["a1", "a2"]);
    assert_eq!(config.dict("flags").unwrap(), None);

    let mut gains = config.dict_mut("gains").unwrap();
    gains.set("a3", 2).unwrap();
    assert_eq!(gains.as_dict().get("a3"), Some(&Value::Float(2.0)));
    assert_eq!(gains.remove("a1").unwrap(), Value::Float(1.0));

    assert_eq!(config.history("gains").unwrap().labels(), vec!["default", "setitem", "delitem"]);
    assert_eq!(
        config.value("gains").unwrap(),
        [("a2", 1.5), ("a3", 2.0)].into_iter().collect::<Value>()
    );
}

#[test]
fn dict_items_are_type_checked_and_item_checked() {
    let mut config = Config::new(&photometry()).unwrap();
    let mut gains = config.dict_mut("gains").unwrap();

    let err = gains.set("a3", "high").unwrap_err();
    assert!(matches!(
        err.failure(),
        Some(Failure::DictItemTypeMismatch { key, actual: "str", .. }) if key == "a3"
    ));

    let err = gains.set("a3", -1.0).unwrap_err();
    assert_eq!(
        err.failure(),
        Some(&Failure::DictItemCheckFailed {
            key: "a3".to_string(),
            value: Value::Float(-1.0),
        })
    );
    let err = gains.remove("missing").unwrap_err();
    assert!(matches!(err.failure(), Some(Failure::UnknownKey { key }) if key == "missing"));

    let err = config.set("gains", vec![1.0]).unwrap_err();
    assert!(matches!(err.failure(), Some(Failure::NotAMapping { actual: "list", .. })));
    assert_eq!(config.history("gains").unwrap().labels(), vec!["default"]);
}

#[test]
fn dict_check_and_required_run_on_validate() {
    let mut config = Config::new(&photometry()).unwrap();
    config.validate().unwrap();

    config.dict_mut("gains").unwrap().set("a3", 1.0).unwrap();
    config.dict_mut("gains").unwrap().set("a4", 1.0).unwrap();
    assert!(matches!(
        config.validate().unwrap_err().failure(),
        Some(Failure::DictCheckFailed { .. })
    ));

    config.set("gains", Value::Null).unwrap();
    assert_eq!(config.validate().unwrap_err().failure(), Some(&Failure::Required));
    assert_eq!(config.dict_mut("gains").err().unwrap().failure(), Some(&Failure::NullDict));
}

#[test]
fn dict_paths_read_and_write_items() {
    let mut config = Config::new(&photometry()).unwrap();
    config.set_path("gains[a2]", 4.0).unwrap();
    config.set_path("gains[\"a-5\"]", 0.5).unwrap();
    config.set_path("gains[7]", 0.25).unwrap();

    assert_eq!(config.get_path("gains[a2]").unwrap(), Value::Float(4.0));
    assert_eq!(config.get_path("gains[\"a-5\"]").unwrap(), Value::Float(0.5));
    assert_eq!(config.get_path("gains[7]").unwrap(), Value::Float(0.25));
    assert!(config.get_path("gains[a9]").is_err());
    assert_eq!(config.history("gains").unwrap().labels(), vec!["default", "setitem", "setitem", "setitem"]);
}

#[test]
fn frozen_dicts_reject_changes() {
    let mut config = Config::new(&photometry()).unwrap();
    config.freeze();
    assert!(config.dict_mut("gains").unwrap().set("a1", 2.0).unwrap_err().is_frozen());
    assert!(config.dict_mut("gains").unwrap().clear().unwrap_err().is_frozen());
    assert!(config.set_path("gains[a1]", 2.0).unwrap_err().is_frozen());
    assert!(config
        .config_dict_mut("apertures")
        .unwrap()
        .get_or_insert("small")
        .unwrap_err()
        .is_frozen());
}

#[test]
fn clear_records_one_entry_per_key() {
    let mut config = Config::new(&photometry()).unwrap();
    config.dict_mut("gains").unwrap().clear().unwrap();
    assert!(config.dict("gains").unwrap().unwrap().is_empty());
    assert_eq!(config.history("gains").unwrap().labels(), vec!["default", "delitem", "delitem"]);
}

#[test]
fn config_dict_records_what_happened_to_each_key() {
    let schema = photometry();
    let mut config = Config::named(&schema, "root").unwrap();

    let mut apertures = config.config_dict_mut("apertures").unwrap();
    apertures.get_or_insert("small").unwrap().set("radius", 1.0).unwrap();
    assert_eq!(apertures.as_dict().get("small").unwrap().name(), Some("root.apertures[small]"));

    let mut replacement = Config::new(&aperture()).unwrap();
    replacement.set("radius", 1.5).unwrap();
    let err = apertures.insert("small", &replacement).unwrap_err();
    assert!(matches!(err.failure(), Some(Failure::WrongSchema { .. })));

    let mut replacement = Config::new(apertures.as_dict().get("small").unwrap().schema()).unwrap();
    replacement.set("radius", 1.5).unwrap();
    apertures.insert("small", &replacement).unwrap();
    apertures.remove("small").unwrap();

    config.set_path("apertures[large]", aperture_map(8.0)).unwrap();
    assert_eq!(config.get_path("apertures[large].radius").unwrap(), Value::Float(8.0));
    assert_eq!(config.get_path("apertures[large].shape").unwrap(), Value::from("circle"));

    assert_eq!(
        notes(&config, "apertures"),
        vec![
            "Dict initialized",
            "Added item at key small",
            "Modified item at key small",
            "Removed item at key small",
            "Added item at key large",
        ]
    );
    assert_eq!(
        config.history("apertures").unwrap().labels(),
        vec!["default", "setitem", "setitem", "delitem", "setitem"]
    );
}

#[test]
fn config_dict_assignment_builds_every_item() {
    let mut config = Config::new(&photometry()).unwrap();
    let value: Value = [("inner", aperture_map(2.0)), ("outer", aperture_map(6.0))]
        .into_iter()
        .collect();
    config.set("apertures", value).unwrap();

    let apertures = config.config_dict("apertures").unwrap().unwrap();
    assert_eq!(apertures.keys().collect::<Vec<_>>(), vec!["inner", "outer"]);
    assert_eq!(apertures.get("outer").unwrap().value("radius").unwrap(), Value::Float(6.0));
    assert_eq!(
        notes(&config, "apertures")[1..].to_vec(),
        vec!["Dict initialized", "Added item at key inner", "Added item at key outer"]
    );

    let bad: Value = [("inner", Value::from(2.0))].into_iter().collect();
    let err = config.set("apertures", bad).unwrap_err();
    assert!(matches!(
        err.failure(),
        Some(Failure::DictItemTypeMismatch { key, actual: "float", .. }) if key == "inner"
    ));
    assert_eq!(config.config_dict("apertures").unwrap().unwrap().len(), 2);

    config.set("apertures", Value::Null).unwrap();
    assert_eq!(notes(&config, "apertures").last().unwrap(), "set to None");
    assert_eq!(config.validate().unwrap_err().failure(), Some(&Failure::Required));
}

#[test]
fn config_dict_paths_need_an_existing_key() {
    let mut config = Config::new(&photometry()).unwrap();
    let err = config.set_path("apertures[missing].radius", 2.0).unwrap_err();
    assert!(matches!(err.failure(), Some(Failure::UnknownKey { key }) if key == "missing"));
    assert!(config.get_path("apertures[missing].radius").is_err());
}

#[test]
fn config_dict_checks_run_on_validate() {
    let mut config = Config::new(&photometry()).unwrap();
    config.set_path("apertures[a]", aperture_map(2.0)).unwrap();
    config.validate().unwrap();

    config.set_path("apertures[a].radius", 80.0).unwrap();
    assert!(matches!(
        config.validate().unwrap_err().failure(),
        Some(Failure::ConfigItemCheckFailed { key, schema }) if key == "a" && schema == "ApertureConfig"
    ));

    config.set_path("apertures[a].radius", 2.0).unwrap();
    config.set_path("apertures[b]", aperture_map(2.0)).unwrap();
    config.set_path("apertures[c]", aperture_map(2.0)).unwrap();
    assert!(matches!(
        config.validate().unwrap_err().failure(),
        Some(Failure::DictCheckFailed { .. })
    ));
}

#[test]
fn freeze_reaches_config_dict_items() {
    let mut config = Config::new(&photometry()).unwrap();
    config.set_path("apertures[a]", aperture_map(2.0)).unwrap();
    config.freeze();

    assert!(config.config_dict("apertures").unwrap().unwrap().get("a").unwrap().is_frozen());
    assert!(config.set_path("apertures[a].radius", 3.0).unwrap_err().is_frozen());
    assert!(config.config_dict_mut("apertures").unwrap().remove("a").unwrap_err().is_frozen());
}

#[test]
fn dicts_survive_scripts_and_flatten() {
    let schema = photometry();
    let mut config = Config::new(&schema).unwrap();
    config.set_path("gains[\"amp 3\"]", 2.5).unwrap();
    config.set_path("apertures[wide]", aperture_map(12.0)).unwrap();
    config.set_path("apertures[5]", aperture_map(4.0)).unwrap();
    config.set_path("apertures[wide].shape", "square").unwrap();

    let script = config.save_to_string("root");
    assert!(script.contains("root.apertures={}\n"));
    assert!(script.contains("root.apertures[wide].shape=\"square\"\n"));
    assert!(script.contains("root.apertures[\"5\"]={}\n"));

    let mut restored = Config::new(&schema).unwrap();
    restored.load_from_str(&script, "root").unwrap();
    assert_eq!(restored, config);

    assert_eq!(
        serde_json::Value::Object(config.flatten()),
        serde_json::json!({
            "gains": {"a1": 1.0, "a2": 1.5, "amp 3": 2.5},
            "apertures": {
                "wide": {"radius": 12.0, "shape": "square"},
                "5": {"radius": 4.0, "shape": "circle"},
            },
        })
    );
}
