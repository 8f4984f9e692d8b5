//! List values and in-place list mutation
//!
//! A [`List`] is the value of a list field. Every element is checked against
//! the field's item type and `item_check` when it is inserted; whole-list
//! rules wait for `Config::validate`.
//!
//! Elements of a nested list field are themselves lists ([`NestedList`]),
//! each bound to a per-index sub-field and carrying its own history. When a
//! nested list records an entry, the parent list's history gets a mirrored
//! entry whose label is suffixed with the element index.
//!
//! All mutation goes through [`ListMut`], obtained from `Config::list_mut`.

use std::fmt::{self, Display, Formatter};
use std::panic::Location;
use std::sync::Arc;

use crate::config::Owner;
use crate::error::{ConfigResult, Failure, FieldValidationError};
use crate::field::{Field, ItemPolicy};
use crate::history::{CallSite, History};
use crate::value::Value;

/// One element of a [`List`]
#[derive(Debug, Clone)]
pub enum Item {
    /// Scalar element (or `Null`)
    Value(Value),
    /// Element list of a nested list field
    Nested(NestedList),
}

impl Item {
    /// Plain value of the element (nested lists become `Value::List`)
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Nested(nested) => nested.list.to_value(),
        }
    }

    /// Get as scalar
    #[inline]
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Nested(_) => None,
        }
    }

    /// Get as nested list
    #[inline]
    #[must_use]
    pub fn as_nested(&self) -> Option<&NestedList> {
        match self {
            Self::Nested(nested) => Some(nested),
            Self::Value(_) => None,
        }
    }
}

/// Element list of a nested list field
#[derive(Debug, Clone)]
pub struct NestedList {
    field: Arc<Field>,
    list: List,
    history: History,
}

impl NestedList {
    /// Per-index sub-field this list is bound to
    #[inline]
    #[must_use]
    pub fn field(&self) -> &Arc<Field> {
        &self.field
    }

    /// Elements
    #[inline]
    #[must_use]
    pub fn list(&self) -> &List {
        &self.list
    }

    /// History of this element list alone
    #[inline]
    #[must_use]
    pub fn history(&self) -> &History {
        &self.history
    }
}

/// Validated ordered sequence held by a list field
#[derive(Debug, Clone, Default)]
pub struct List {
    items: Vec<Item>,
}

impl List {
    /// Number of elements
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the list is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Element at `index`
    #[inline]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    /// Nested list at `index`, if that element is one
    #[inline]
    #[must_use]
    pub fn nested(&self, index: usize) -> Option<&NestedList> {
        self.items.get(index).and_then(Item::as_nested)
    }

    /// Iterate over elements
    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    /// Check whether a plain value equal to `value` is present
    #[must_use]
    pub fn contains(&self, value: &Value) -> bool {
        self.items.iter().any(|item| item.to_value() == *value)
    }

    /// Element values
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        self.items.iter().map(Item::to_value).collect()
    }

    /// Snapshot as a `Value::List`
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::List(self.values())
    }
}

impl<'a> IntoIterator for &'a List {
    type Item = &'a Item;
    type IntoIter = std::slice::Iter<'a, Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl PartialEq for List {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.values() == other.values()
    }
}

impl PartialEq<[Value]> for List {
    fn eq(&self, other: &[Value]) -> bool {
        self.len() == other.len() && self.values() == other
    }
}

impl PartialEq<Vec<Value>> for List {
    fn eq(&self, other: &Vec<Value>) -> bool {
        *self == other[..]
    }
}

impl PartialEq<Value> for List {
    fn eq(&self, other: &Value) -> bool {
        match other {
            Value::List(items) => *self == items[..],
            _ => false,
        }
    }
}

impl Display for List {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

/// Range of positions for slice assignment and deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    start: Option<usize>,
    stop: Option<usize>,
    step: usize,
}

impl Slice {
    /// Positions `start..stop` (open ends run to the list bounds)
    #[inline]
    #[must_use]
    pub fn new(start: Option<usize>, stop: Option<usize>) -> Self {
        Self {
            start,
            stop,
            step: 1,
        }
    }

    /// Every position
    #[inline]
    #[must_use]
    pub fn all() -> Self {
        Self::new(None, None)
    }

    /// Take every `step`-th position (a step of 0 counts as 1)
    #[inline]
    #[must_use]
    pub fn step(mut self, step: usize) -> Self {
        self.step = step.max(1);
        self
    }

    /// Clamp to a list of length `len`, returning `(start, stop, step)`
    fn indices(self, len: usize) -> (usize, usize, usize) {
        let start = self.start.unwrap_or(0).min(len);
        let stop = self.stop.unwrap_or(len).min(len).max(start);
        (start, stop, self.step.max(1))
    }

    /// Positions covered in a list of length `len`
    fn positions(self, len: usize) -> Vec<usize> {
        let (start, stop, step) = self.indices(len);
        (start..stop).step_by(step).collect()
    }
}

impl From<std::ops::Range<usize>> for Slice {
    fn from(range: std::ops::Range<usize>) -> Self {
        Self::new(Some(range.start), Some(range.end))
    }
}

/// Turn assigned values into a list for `field`
///
/// Nested elements record an `"insert"` entry in their own history.
pub(crate) fn build(
    owner: Owner<'_>,
    field: &Field,
    values: Vec<Value>,
    at: CallSite,
) -> Result<List, FieldValidationError> {
    let items = values
        .into_iter()
        .enumerate()
        .map(|(i, value)| prepare(owner, field, i, value, at, "insert"))
        .collect::<Result<_, _>>()?;
    Ok(List { items })
}

/// Coerce and validate one element destined for position `index`
fn prepare(
    owner: Owner<'_>,
    field: &Field,
    index: usize,
    value: Value,
    at: CallSite,
    label: &str,
) -> Result<Item, FieldValidationError> {
    let Some(spec) = field.list_spec() else {
        return Err(owner.fail(field, Failure::WrongFieldKind { expected: "list field" }));
    };

    if let ItemPolicy::Nested(_) = spec.policy() {
        return match value {
            Value::Null => Ok(Item::Value(Value::Null)),
            Value::List(values) => {
                let Some(sub) = field.subfield(index) else {
                    return Err(owner.fail(field, Failure::NotNested { index }));
                };
                let list = build(owner, &sub, values, at)?;
                let mut history = History::new();
                history.record(list.to_value(), at, label);
                Ok(Item::Nested(NestedList {
                    field: sub,
                    list,
                    history,
                }))
            }
            other => Err(owner.fail(
                field,
                Failure::ItemTypeMismatch {
                    index,
                    actual: other.type_name(),
                    expected: format!("list[{}]", spec.dtype()),
                    value: other,
                },
            )),
        };
    }

    let value = spec.dtype().coerce(value);
    if value.is_null() {
        return Ok(Item::Value(value));
    }
    if !spec.dtype().accepts(&value) {
        return Err(owner.fail(
            field,
            Failure::ItemTypeMismatch {
                index,
                actual: value.type_name(),
                expected: spec.dtype().to_string(),
                value,
            },
        ));
    }
    if let Some(check) = spec.rules().item_check() {
        if !check(&value) {
            return Err(owner.fail(field, Failure::ItemCheckFailed { index, value }));
        }
    }
    Ok(Item::Value(value))
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Root,
    Nested(usize),
}

/// Mutable view of a list field (or one of its nested element lists)
///
/// Every operation rejects a frozen owner, validates all affected elements
/// before changing anything, then appends one history entry labelled with
/// the operation name (`"setitem"`, `"insert"`, `"delitem"`) unless
/// [`ListMut::labeled`] overrides it. On a nested list field, each element
/// list created by the operation first adds a `label[i]` entry.
pub struct ListMut<'a> {
    owner: Owner<'a>,
    field: Arc<Field>,
    root: &'a mut List,
    history: &'a mut History,
    target: Target,
    label: Option<String>,
}

impl<'a> ListMut<'a> {
    pub(crate) fn new(
        owner: Owner<'a>,
        field: Arc<Field>,
        root: &'a mut List,
        history: &'a mut History,
    ) -> Self {
        Self {
            owner,
            field,
            root,
            history,
            target: Target::Root,
            label: None,
        }
    }

    /// Record subsequent operations under `label`
    #[must_use]
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Mutable view of the nested element list at `index`
    ///
    /// # Errors
    /// Returns error if the element is not a nested list
    pub fn nested(self, index: usize) -> ConfigResult<ListMut<'a>> {
        let nested = matches!(self.target, Target::Root)
            && matches!(self.root.items.get(index), Some(Item::Nested(_)));
        if !nested {
            return Err(self.owner.fail(&self.field, Failure::NotNested { index }).into());
        }
        Ok(Self {
            target: Target::Nested(index),
            ..self
        })
    }

    /// Field of the list this view mutates
    #[must_use]
    pub fn field(&self) -> &Arc<Field> {
        match self.target {
            Target::Nested(i) => match self.root.items.get(i) {
                Some(Item::Nested(nested)) => &nested.field,
                _ => &self.field,
            },
            Target::Root => &self.field,
        }
    }

    /// Current contents
    #[must_use]
    pub fn as_list(&self) -> &List {
        match self.target {
            Target::Nested(i) => match self.root.items.get(i) {
                Some(Item::Nested(nested)) => &nested.list,
                _ => self.root,
            },
            Target::Root => self.root,
        }
    }

    /// Number of elements
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_list().len()
    }

    /// Check if the list is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_list().is_empty()
    }

    /// Replace the element at `index` (label `"setitem"`)
    ///
    /// # Errors
    /// Returns error on a frozen owner, a bad index, or a rejected value
    #[track_caller]
    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> ConfigResult<()> {
        self.set_with(index, value.into(), Location::caller())
    }

    pub(crate) fn set_with(&mut self, index: usize, value: Value, at: CallSite) -> ConfigResult<()> {
        let label = self.label_or("setitem");
        let field = self.begin()?;
        let len = self.len();
        if index >= len {
            return Err(self.fail(&field, Failure::IndexOutOfRange { index, len }));
        }
        let item = prepare(self.owner, &field, index, value, at, &label)?;
        self.items_mut()[index] = item;
        self.mirror_created([index], at, &label);
        self.commit(at, &label);
        Ok(())
    }

    /// Assign `values` to the positions of `slice` (label `"setitem"`)
    ///
    /// With a step of 1 the slice is replaced and the list may grow or
    /// shrink. A larger step requires exactly one value per position.
    ///
    /// # Errors
    /// Returns error on a frozen owner, a size mismatch, or a rejected value
    #[track_caller]
    pub fn set_slice<I, V>(&mut self, slice: Slice, values: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let at = Location::caller();
        let label = self.label_or("setitem");
        let field = self.begin()?;
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let (start, stop, step) = slice.indices(self.len());

        if step == 1 {
            let items = values
                .into_iter()
                .enumerate()
                .map(|(j, value)| prepare(self.owner, &field, start + j, value, at, &label))
                .collect::<Result<Vec<_>, _>>()?;
            let created = start..start + items.len();
            self.items_mut().splice(start..stop, items);
            self.mirror_created(created, at, &label);
        } else {
            let positions = slice.positions(self.len());
            if positions.len() != values.len() {
                return Err(self.fail(
                    &field,
                    Failure::SliceSizeMismatch {
                        expected: positions.len(),
                        actual: values.len(),
                    },
                ));
            }
            let items = positions
                .iter()
                .zip(values)
                .map(|(&i, value)| prepare(self.owner, &field, i, value, at, &label))
                .collect::<Result<Vec<_>, _>>()?;
            let list = self.items_mut();
            for (&i, item) in positions.iter().zip(items) {
                list[i] = item;
            }
            self.mirror_created(positions, at, &label);
        }
        self.commit(at, &label);
        Ok(())
    }

    /// Insert before `index`, clamped to the list length (label `"insert"`)
    ///
    /// # Errors
    /// Returns error on a frozen owner or a rejected value
    #[track_caller]
    pub fn insert(&mut self, index: usize, value: impl Into<Value>) -> ConfigResult<()> {
        let at = Location::caller();
        let label = self.label_or("insert");
        let field = self.begin()?;
        let index = index.min(self.len());
        let item = prepare(self.owner, &field, index, value.into(), at, &label)?;
        self.items_mut().insert(index, item);
        self.mirror_created([index], at, &label);
        self.commit(at, &label);
        Ok(())
    }

    /// Append one element (label `"insert"`)
    ///
    /// # Errors
    /// Returns error on a frozen owner or a rejected value
    #[track_caller]
    pub fn push(&mut self, value: impl Into<Value>) -> ConfigResult<()> {
        let at = Location::caller();
        let label = self.label_or("insert");
        let field = self.begin()?;
        let index = self.len();
        let item = prepare(self.owner, &field, index, value.into(), at, &label)?;
        self.items_mut().push(item);
        self.mirror_created([index], at, &label);
        self.commit(at, &label);
        Ok(())
    }

    /// Append several elements as one operation (label `"insert"`)
    ///
    /// # Errors
    /// Returns error on a frozen owner or if any value is rejected
    #[track_caller]
    pub fn extend<I, V>(&mut self, values: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let at = Location::caller();
        let label = self.label_or("insert");
        let field = self.begin()?;
        let len = self.len();
        let items = values
            .into_iter()
            .enumerate()
            .map(|(j, value)| prepare(self.owner, &field, len + j, value.into(), at, &label))
            .collect::<Result<Vec<_>, _>>()?;
        let created = len..len + items.len();
        self.items_mut().extend(items);
        self.mirror_created(created, at, &label);
        self.commit(at, &label);
        Ok(())
    }

    /// Remove and return the element at `index` (label `"delitem"`)
    ///
    /// # Errors
    /// Returns error on a frozen owner or a bad index
    #[track_caller]
    pub fn remove(&mut self, index: usize) -> ConfigResult<Value> {
        let at = Location::caller();
        let label = self.label_or("delitem");
        let field = self.begin()?;
        let len = self.len();
        if index >= len {
            return Err(self.fail(&field, Failure::IndexOutOfRange { index, len }));
        }
        let removed = self.items_mut().remove(index);
        self.commit(at, &label);
        Ok(removed.to_value())
    }

    /// Remove the last element (label `"delitem"`)
    ///
    /// # Errors
    /// Returns error on a frozen owner or an empty list
    #[track_caller]
    pub fn pop(&mut self) -> ConfigResult<Value> {
        let at = Location::caller();
        let label = self.label_or("delitem");
        let field = self.begin()?;
        let Some(removed) = self.items_mut().pop() else {
            return Err(self.fail(&field, Failure::IndexOutOfRange { index: 0, len: 0 }));
        };
        self.commit(at, &label);
        Ok(removed.to_value())
    }

    /// Remove the positions of `slice` (label `"delitem"`)
    ///
    /// # Errors
    /// Returns error on a frozen owner
    #[track_caller]
    pub fn delete_slice(&mut self, slice: Slice) -> ConfigResult<()> {
        let at = Location::caller();
        let label = self.label_or("delitem");
        self.begin()?;
        let positions = slice.positions(self.len());
        let list = self.items_mut();
        for i in positions.into_iter().rev() {
            list.remove(i);
        }
        self.commit(at, &label);
        Ok(())
    }

    /// Remove every element (label `"delitem"`)
    ///
    /// # Errors
    /// Returns error on a frozen owner
    #[track_caller]
    pub fn clear(&mut self) -> ConfigResult<()> {
        let at = Location::caller();
        let label = self.label_or("delitem");
        self.begin()?;
        self.items_mut().clear();
        self.commit(at, &label);
        Ok(())
    }

    fn label_or(&self, default: &str) -> String {
        self.label.clone().unwrap_or_else(|| default.to_string())
    }

    fn fail(&self, field: &Field, failure: Failure) -> crate::error::ConfigError {
        self.owner.fail(field, failure).into()
    }

    /// Frozen guard; returns the field of the targeted list
    fn begin(&self) -> ConfigResult<Arc<Field>> {
        let field = Arc::clone(self.field());
        self.owner.guard(&field)?;
        Ok(field)
    }

    fn items_mut(&mut self) -> &mut Vec<Item> {
        match self.target {
            Target::Nested(i) if matches!(self.root.items.get(i), Some(Item::Nested(_))) => {
                match &mut self.root.items[i] {
                    Item::Nested(nested) => &mut nested.list.items,
                    Item::Value(_) => unreachable!("element {i} was checked to be nested"),
                }
            }
            _ => &mut self.root.items,
        }
    }

    /// Mirror the creation of nested element lists at `positions` into the
    /// parent history as `label[i]`
    fn mirror_created(&mut self, positions: impl IntoIterator<Item = usize>, at: CallSite, label: &str) {
        if !matches!(self.target, Target::Root) {
            return;
        }
        for i in positions {
            if matches!(self.root.items.get(i), Some(Item::Nested(_))) {
                self.history
                    .record(self.root.to_value(), at, format!("{label}[{i}]"));
            }
        }
    }

    fn commit(&mut self, at: CallSite, label: &str) {
        if let Target::Nested(i) = self.target {
            if let Some(Item::Nested(nested)) = self.root.items.get_mut(i) {
                nested.history.record(nested.list.to_value(), at, label);
            }
            self.history
                .record(self.root.to_value(), at, format!("{label}[{i}]"));
        } else {
            self.history.record(self.root.to_value(), at, label);
        }
    }
}
