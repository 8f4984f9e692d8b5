use std::sync::Arc;

use pretty_assertions::assert_eq;
use scicfg_schema::{Config, Dtype, Failure, FieldKind, ListField, Schema, Slice, Value};

fn schema() -> Arc<Schema> {
    Schema::builder("Nested")
        .field(
            "grid",
            ListField::nested("rows of ints", Dtype::Int)
                .with_default(vec![vec![1, 2], vec![3]])
                .max_length(3)
                .sublist(|rows| rows.max_length(2).item_check(|v| v.as_int().is_some_and(|i| i >= 0)))
                .build()
                .unwrap(),
        )
        .build()
        .unwrap()
}

#[test]
fn elements_become_nested_lists() {
    let config = Config::new(&schema()).unwrap();
    let grid = config.list("grid").unwrap().unwrap();
    assert_eq!(grid.len(), 2);
    let row = grid.nested(0).unwrap();
    assert_eq!(*row.list(), Value::from(vec![1, 2]));
    assert_eq!(row.history().labels(), vec!["insert"]);
    assert_eq!(row.field().name(), "grid[0]");
    assert_eq!(row.field().doc(), "subfield[0] of grid");
    assert!(row.field().is_optional());
    assert_eq!(row.field().source(), config.schema().field("grid").unwrap().source());
    assert_eq!(config.history("grid").unwrap().labels(), vec!["default"]);
}

#[test]
fn subfields_are_cached_per_index() {
    let schema = schema();
    let field = schema.field("grid").unwrap();
    let first = field.subfield(1).unwrap();
    let second = field.subfield(1).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(!Arc::ptr_eq(&first, &field.subfield(0).unwrap()));

    let config = Config::new(&schema).unwrap();
    let row = config.list("grid").unwrap().unwrap().nested(1).unwrap();
    assert!(Arc::ptr_eq(row.field(), &first));

    let FieldKind::List(spec) = first.kind() else {
        panic!("subfield is a list field");
    };
    assert!(!spec.is_nested());
    assert_eq!(spec.rules().max_length(), Some(2));
}

#[test]
fn non_list_elements_are_rejected() {
    let mut config = Config::new(&schema()).unwrap();
    let err = config.set("grid", vec![Value::Int(1)]).unwrap_err();
    match err.failure().unwrap() {
        Failure::ItemTypeMismatch { index, expected, .. } => {
            assert_eq!(*index, 0);
            assert_eq!(expected, "list[int]");
        }
        other => panic!("unexpected failure {other:?}"),
    }
}

#[test]
fn inner_items_are_checked_by_the_subfield() {
    let mut config = Config::new(&schema()).unwrap();
    let err = config
        .set("grid", vec![Value::from(vec![1]), Value::from(vec![Value::Int(2), Value::from("x")])])
        .unwrap_err();
    let validation = err.validation().unwrap();
    assert_eq!(validation.field_name, "grid[1]");
    assert!(matches!(validation.failure, Failure::ItemTypeMismatch { index: 1, .. }));

    let err = config.set("grid", vec![vec![-1]]).unwrap_err();
    assert!(matches!(err.failure().unwrap(), Failure::ItemCheckFailed { index: 0, .. }));
}

#[test]
fn null_elements_stay_null() {
    let mut config = Config::new(&schema()).unwrap();
    config.set("grid", vec![Value::Null, Value::from(vec![4])]).unwrap();
    let grid = config.list("grid").unwrap().unwrap();
    assert!(grid.nested(0).is_none());
    assert_eq!(grid.get(0).unwrap().to_value(), Value::Null);
    assert!(grid.nested(1).is_some());
}

#[test]
fn nested_mutation_is_mirrored_in_parent_history() {
    let mut config = Config::new(&schema()).unwrap();
    config.list_mut("grid").unwrap().nested(0).unwrap().set(1, 5).unwrap();

    let grid = config.list("grid").unwrap().unwrap();
    let row = grid.nested(0).unwrap();
    assert_eq!(*row.list(), Value::from(vec![1, 5]));
    assert_eq!(row.history().labels(), vec!["insert", "setitem"]);

    let history = config.history("grid").unwrap();
    assert_eq!(history.labels(), vec!["default", "setitem[0]"]);
    assert_eq!(history.last().unwrap().value(), &Value::from(vec![vec![1, 5], vec![3]]));
}

#[test]
fn nested_push_and_delete_labels() {
    let mut config = Config::new(&schema()).unwrap();
    {
        let mut row = config.list_mut("grid").unwrap().nested(1).unwrap();
        row.push(4).unwrap();
        row.remove(0).unwrap();
    }
    let history = config.history("grid").unwrap();
    assert_eq!(history.labels(), vec!["default", "insert[1]", "delitem[1]"]);
    let row = config.list("grid").unwrap().unwrap().nested(1).unwrap();
    assert_eq!(row.history().labels(), vec!["insert", "insert", "delitem"]);
    assert_eq!(*row.list(), Value::from(vec![4]));
}

#[test]
fn replacing_an_element_builds_a_fresh_nested_list() {
    let mut config = Config::new(&schema()).unwrap();
    config.list_mut("grid").unwrap().set(0, vec![9]).unwrap();
    let row = config.list("grid").unwrap().unwrap().nested(0).unwrap();
    assert_eq!(row.history().labels(), vec!["setitem"]);
    assert_eq!(
        config.history("grid").unwrap().labels(),
        vec!["default", "setitem[0]", "setitem"]
    );
}

#[test]
fn created_element_lists_are_mirrored_in_parent_history() {
    let mut config = Config::new(&schema()).unwrap();
    {
        let mut grid = config.list_mut("grid").unwrap();
        grid.set(1, vec![9, 9]).unwrap();
        grid.push(vec![4]).unwrap();
    }
    let history = config.history("grid").unwrap();
    assert_eq!(
        history.labels(),
        vec!["default", "setitem[1]", "setitem", "insert[2]", "insert"]
    );
    assert_eq!(*history.entries()[3].value(), Value::from(vec![vec![1, 2], vec![9, 9], vec![4]]));

    let grid = config.list("grid").unwrap().unwrap();
    assert_eq!(grid.nested(1).unwrap().history().labels(), vec!["setitem"]);
    assert_eq!(grid.nested(2).unwrap().history().labels(), vec!["insert"]);
}

#[test]
fn slice_assignment_and_insert_mirror_each_new_element() {
    let mut config = Config::new(&schema()).unwrap();
    {
        let mut grid = config.list_mut("grid").unwrap();
        grid.set_slice(Slice::from(0..1), vec![vec![5], vec![6]]).unwrap();
        grid.insert(0, Value::Null).unwrap();
    }
    assert_eq!(
        config.history("grid").unwrap().labels(),
        vec!["default", "setitem[0]", "setitem[1]", "setitem", "insert"]
    );
}

#[test]
fn nested_view_requires_a_nested_element() {
    let mut config = Config::new(&schema()).unwrap();
    config.set("grid", vec![Value::Null]).unwrap();
    let err = config.list_mut("grid").unwrap().nested(0).err().unwrap();
    assert_eq!(err.failure().unwrap(), &Failure::NotNested { index: 0 });
}

#[test]
fn validate_checks_inner_rules() {
    let mut config = Config::new(&schema()).unwrap();
    config.validate().unwrap();

    config.list_mut("grid").unwrap().nested(0).unwrap().push(7).unwrap();
    let err = config.validate().unwrap_err();
    let validation = err.validation().unwrap();
    assert_eq!(validation.full_name, "grid[0]");
    assert_eq!(validation.failure, Failure::TooLong { max: 2, actual: 3 });

    config.list_mut("grid").unwrap().nested(0).unwrap().pop().unwrap();
    config.validate().unwrap();

    config.list_mut("grid").unwrap().extend(vec![vec![1], vec![2]]).unwrap();
    let err = config.validate().unwrap_err();
    assert_eq!(err.failure().unwrap(), &Failure::TooLong { max: 3, actual: 4 });
}

#[test]
fn export_keeps_nesting() {
    let config = Config::new(&schema()).unwrap();
    assert_eq!(config.value("grid").unwrap(), Value::from(vec![vec![1, 2], vec![3]]));
    assert_eq!(config.save_to_string("root"), "root.grid=[[1, 2], [3]]\n");
}
