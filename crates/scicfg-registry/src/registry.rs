//! Named registries of configurables
//!
//! A [`Registry`] maps names to configurables: callables parameterised by a
//! [`Config`] of a known schema. Registries implement [`TypeMap`], so a
//! registry can back a choice field created with [`Registry::make_field`].

use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use scicfg_schema::{Config, ConfigChoiceField, Schema, TypeMap};

use crate::error::{RegistryError, RegistryResult};

/// Something that can be built or run from a config
///
/// `A` is the extra argument passed along by `apply`; `O` is the result.
pub trait Configurable<A, O>: Send + Sync {
    /// Schema of the config this configurable takes
    fn config_class(&self) -> Option<Arc<Schema>> {
        None
    }

    /// Run with a config and extra arguments
    fn call(&self, config: &Config, args: A) -> O;
}

impl<A, O, F> Configurable<A, O> for F
where
    F: Fn(&Config, A) -> O + Send + Sync,
{
    fn call(&self, config: &Config, args: A) -> O {
        self(config, args)
    }
}

/// Pairs a target with an explicit config schema
pub struct ConfigurableWrapper<T> {
    target: T,
    schema: Arc<Schema>,
}

impl<T> ConfigurableWrapper<T> {
    /// Wrap `target` so it reports `schema` as its config class
    #[must_use]
    pub fn new(target: T, schema: &Arc<Schema>) -> Self {
        Self {
            target,
            schema: Arc::clone(schema),
        }
    }

    /// The wrapped target
    #[inline]
    #[must_use]
    pub fn target(&self) -> &T {
        &self.target
    }
}

impl<A, O, T: Configurable<A, O>> Configurable<A, O> for ConfigurableWrapper<T> {
    fn config_class(&self) -> Option<Arc<Schema>> {
        Some(Arc::clone(&self.schema))
    }

    fn call(&self, config: &Config, args: A) -> O {
        self.target.call(config, args)
    }
}

struct Entry<A, O> {
    target: Arc<dyn Configurable<A, O>>,
    schema: Arc<Schema>,
}

/// Insertion-ordered name → configurable mapping
///
/// Every registered schema extends the registry's base schema, if one is
/// declared. Names are unique and entries are never removed.
pub struct Registry<A, O> {
    doc: String,
    base: Option<Arc<Schema>>,
    entries: RwLock<IndexMap<String, Entry<A, O>>>,
}

impl<A: 'static, O: 'static> Registry<A, O> {
    /// Create a registry accepting any schema
    #[must_use]
    pub fn new(doc: impl Into<String>) -> Self {
        Self {
            doc: doc.into(),
            base: None,
            entries: RwLock::new(IndexMap::new()),
        }
    }

    /// Create a registry whose schemas must extend `base`
    #[must_use]
    pub fn with_base(doc: impl Into<String>, base: &Arc<Schema>) -> Self {
        Self {
            base: Some(Arc::clone(base)),
            ..Self::new(doc)
        }
    }

    /// Registry documentation
    #[inline]
    #[must_use]
    pub fn doc(&self) -> &str {
        &self.doc
    }

    /// Declared base schema
    #[inline]
    #[must_use]
    pub fn base(&self) -> Option<&Arc<Schema>> {
        self.base.as_ref()
    }

    /// Add a configurable that reports its own config class
    ///
    /// # Errors
    /// Returns error if the name is taken, the target has no config class,
    /// or its schema does not extend the base
    pub fn register(
        &self,
        name: impl Into<String>,
        target: impl Configurable<A, O> + 'static,
    ) -> RegistryResult<()> {
        let name = name.into();
        let schema = target
            .config_class()
            .ok_or_else(|| RegistryError::MissingConfigClass(name.clone()))?;
        self.insert(name, Arc::new(target), schema)
    }

    /// Add a target paired with an explicit config schema
    ///
    /// # Errors
    /// Returns error if the name is taken or `schema` does not extend the base
    pub fn register_with<T>(
        &self,
        name: impl Into<String>,
        target: T,
        schema: &Arc<Schema>,
    ) -> RegistryResult<()>
    where
        T: Configurable<A, O> + 'static,
    {
        let wrapper = ConfigurableWrapper::new(target, schema);
        self.insert(name.into(), Arc::new(wrapper), Arc::clone(schema))
    }

    fn insert(
        &self,
        name: String,
        target: Arc<dyn Configurable<A, O>>,
        schema: Arc<Schema>,
    ) -> RegistryResult<()> {
        if let Some(base) = &self.base {
            if !schema.is_subclass_of(base) {
                return Err(RegistryError::WrongBase {
                    name,
                    schema: schema.name().to_string(),
                    base: base.name().to_string(),
                });
            }
        }
        let mut entries = self.entries.write();
        if entries.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        tracing::debug!("Registered {} ({}) in registry '{}'", name, schema.name(), self.doc);
        entries.insert(name, Entry { target, schema });
        Ok(())
    }

    /// Configurable registered under `name`
    ///
    /// # Errors
    /// Returns a lookup error if `name` is not registered
    pub fn get(&self, name: &str) -> RegistryResult<Arc<dyn Configurable<A, O>>> {
        let entries = self.entries.read();
        entries
            .get(name)
            .map(|entry| Arc::clone(&entry.target))
            .ok_or_else(|| RegistryError::UnknownName {
                name: name.to_string(),
                available: entries.keys().cloned().collect(),
            })
    }

    /// Number of registered names
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Check whether `name` is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Registered names, in registration order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Declare a choice field selecting among this registry's names
    ///
    /// Chain `.multi(true)`, `.optional(true)` or `.with_default(..)` on the
    /// returned builder as needed.
    #[track_caller]
    #[must_use]
    pub fn make_field(self: &Arc<Self>, doc: impl Into<String>) -> ConfigChoiceField {
        let types: Arc<dyn TypeMap> = Arc::<Self>::clone(self);
        ConfigChoiceField::new(doc, types).field_type("RegistryField")
    }
}

impl<A: 'static, O: 'static> TypeMap for Registry<A, O> {
    fn config_class(&self, name: &str) -> Option<Arc<Schema>> {
        self.entries.read().get(name).map(|entry| Arc::clone(&entry.schema))
    }

    fn names(&self) -> Vec<String> {
        Registry::names(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<A, O> Debug for Registry<A, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("doc", &self.doc)
            .field("base", &self.base.as_ref().map(|b| b.name()))
            .field("names", &self.entries.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scicfg_schema::{Dtype, Field};

    fn schemas() -> (Arc<Schema>, Arc<Schema>, Arc<Schema>) {
        let base = Schema::builder("AlgorithmConfig").build().unwrap();
        let child = Schema::builder("FooConfig")
            .extends(&base)
            .field("val", Field::new("parameter for foo", Dtype::Int).with_default(3))
            .build()
            .unwrap();
        let unrelated = Schema::builder("BarConfig").build().unwrap();
        (base, child, unrelated)
    }

    struct Foo {
        schema: Arc<Schema>,
    }

    impl Configurable<i64, i64> for Foo {
        fn config_class(&self) -> Option<Arc<Schema>> {
            Some(Arc::clone(&self.schema))
        }

        fn call(&self, config: &Config, num: i64) -> i64 {
            config.value("val").ok().and_then(|v| v.as_int()).unwrap_or(0) + num
        }
    }

    #[test]
    fn register_and_get() {
        let (base, child, _) = schemas();
        let registry: Registry<i64, i64> = Registry::with_base("algorithms", &base);
        registry.register("foo", Foo { schema: Arc::clone(&child) }).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.contains("foo"));
        let foo = registry.get("foo").unwrap();
        let config = Config::new(&child).unwrap();
        assert_eq!(foo.call(&config, 5), 8);
        assert!(Arc::ptr_eq(&TypeMap::config_class(&registry, "foo").unwrap(), &child));
    }

    #[test]
    fn register_rejects_duplicates_and_foreign_schemas() {
        let (base, child, unrelated) = schemas();
        let registry: Registry<i64, i64> = Registry::with_base("algorithms", &base);
        registry.register_with("foo", |_: &Config, n: i64| n, &child).unwrap();

        let err = registry.register_with("foo", |_: &Config, n: i64| n, &child).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(name) if name == "foo"));

        let err = registry.register_with("bar", |_: &Config, n: i64| n, &unrelated).unwrap_err();
        assert!(matches!(err, RegistryError::WrongBase { .. }));
        assert_eq!(registry.names(), vec!["foo".to_string()]);
    }

    #[test]
    fn plain_closures_need_a_schema() {
        let registry: Registry<(), ()> = Registry::new("anything");
        let err = registry.register("f", |_: &Config, (): ()| ()).unwrap_err();
        assert!(matches!(err, RegistryError::MissingConfigClass(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_name_lists_options() {
        let (_, child, _) = schemas();
        let registry: Registry<i64, i64> = Registry::new("algorithms");
        registry.register_with("b", |_: &Config, n: i64| n, &child).unwrap();
        registry.register_with("a", |_: &Config, n: i64| n, &child).unwrap();
        let err = registry.get("c").err().unwrap();
        assert_eq!(err.to_string(), "Unknown registry name 'c'. Options: b a");
    }
}
