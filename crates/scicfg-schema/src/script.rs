//! Script persistence
//!
//! A script is a sequence of `root.<path>=<literal>` lines. Literals are
//! YAML flow values (`null`, `true`, `3`, `1.5`, `.inf`, `"text"`,
//! `[1, 2]`). Loading routes every line through [`Config::set_path`], so a
//! script is rejected exactly where the same assignment in code would be.
//!
//! Config dict fields are written as `root.d={}` followed by
//! `root.d[key]={}` and the statements of each item. Configurable fields
//! write the statements of their sub-config; the target itself is not
//! persisted.

use std::fmt::Write as _;
use std::panic::Location;

use indexmap::IndexMap;

use crate::config::{Config, Slot};
use crate::error::{ConfigError, ConfigResult};
use crate::history::CallSite;
use crate::path::is_valid_name;
use crate::value::Value;

impl Config {
    /// Render every field as an assignment statement under `root`
    ///
    /// Choice fields write each created sub-config before the selection.
    #[must_use]
    pub fn save_to_string(&self, root: &str) -> String {
        let mut out = String::new();
        self.save_into(&mut out, root);
        out
    }

    fn save_into(&self, out: &mut String, prefix: &str) {
        for (field, slot) in self.slots() {
            let path = format!("{prefix}.{}", field.name());
            match slot {
                Slot::Scalar(value) => statement(out, &path, value),
                Slot::List(list) => {
                    let value = list.as_ref().map_or(Value::Null, crate::list::List::to_value);
                    statement(out, &path, &value);
                }
                Slot::Config(sub) => sub.save_into(out, &path),
                Slot::Choice(dict) => {
                    for (name, sub) in dict.iter() {
                        sub.save_into(out, &format!("{path}[{}]", subscript(name)));
                    }
                    let attribute = if dict.is_multi() { "names" } else { "name" };
                    statement(out, &format!("{path}.{attribute}"), &dict.selection().to_value());
                }
                Slot::Dict(dict) => {
                    let value = dict.as_ref().map_or(Value::Null, crate::dict::Dict::to_value);
                    statement(out, &path, &value);
                }
                Slot::ConfigDict(None) => statement(out, &path, &Value::Null),
                Slot::ConfigDict(Some(dict)) => {
                    let empty = Value::Map(IndexMap::new());
                    statement(out, &path, &empty);
                    for (key, sub) in dict.iter() {
                        let item = format!("{path}[{}]", subscript(key));
                        statement(out, &item, &empty);
                        sub.save_into(out, &item);
                    }
                }
                Slot::Configurable(instance) => instance.value().save_into(out, &path),
            }
        }
    }

    /// Apply a script produced by [`Config::save_to_string`]
    ///
    /// Blank lines and lines starting with `#` are skipped. Each statement
    /// must start with `root.`.
    ///
    /// # Errors
    /// Returns [`ConfigError::Script`] on a malformed line, or the error of
    /// the failing assignment unchanged
    #[track_caller]
    pub fn load_from_str(&mut self, text: &str, root: &str) -> ConfigResult<()> {
        let at = Location::caller();
        let mut applied = 0usize;
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            self.load_line(number + 1, line, root, at)?;
            applied += 1;
        }
        tracing::debug!("Loaded {} statements into {}", applied, self.schema().name());
        Ok(())
    }

    fn load_line(&mut self, number: usize, line: &str, root: &str, at: CallSite) -> ConfigResult<()> {
        let script_error = |message: String| ConfigError::Script {
            line: number,
            message,
        };
        let (lhs, rhs) = line
            .split_once('=')
            .ok_or_else(|| script_error(format!("expected '<path>=<value>', got '{line}'")))?;
        let path = lhs
            .trim()
            .strip_prefix(root)
            .and_then(|rest| rest.strip_prefix('.'))
            .ok_or_else(|| script_error(format!("statement does not start with '{root}.'")))?;
        let literal: serde_yaml::Value = serde_yaml::from_str(rhs.trim())
            .map_err(|e| script_error(format!("invalid literal '{}': {e}", rhs.trim())))?;
        let value = Value::from_yaml(&literal)
            .ok_or_else(|| script_error(format!("unsupported literal '{}'", rhs.trim())))?;
        tracing::trace!("Script line {}: {} = {}", number, path, value);
        self.set_path_at(path, value, at)
    }
}

fn statement(out: &mut String, path: &str, value: &Value) {
    let _ = writeln!(out, "{path}={}", value.to_literal());
}

/// Choice names and dict keys that are not plain identifiers, or that read
/// as list indices, are quoted
fn subscript(name: &str) -> String {
    if is_valid_name(name) && name.parse::<usize>().is_err() {
        name.to_string()
    } else {
        serde_json::to_string(name).unwrap_or_else(|_| format!("\"{name}\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{Field, ListField};
    use crate::schema::Schema;
    use crate::value::Dtype;

    fn schema() -> std::sync::Arc<Schema> {
        Schema::builder("Script")
            .field("f", Field::new("f", Dtype::Float).with_default(1.0))
            .field("s", Field::new("s", Dtype::Str).optional(true))
            .field("l", ListField::new("l", Dtype::Int).with_default(vec![1, 2]).build().unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn save_writes_one_line_per_field() {
        let config = Config::new(&schema()).unwrap();
        assert_eq!(
            config.save_to_string("root"),
            "root.f=1.0\nroot.s=null\nroot.l=[1, 2]\n"
        );
    }

    #[test]
    fn load_applies_statements() {
        let mut config = Config::new(&schema()).unwrap();
        config
            .load_from_str("# comment\n\nroot.f=.inf\nroot.s=\"a = b\"\nroot.l=[3]\n", "root")
            .unwrap();
        assert_eq!(config.value("f").unwrap(), Value::Float(f64::INFINITY));
        assert_eq!(config.value("s").unwrap(), Value::from("a = b"));
        assert_eq!(config.value("l").unwrap(), Value::from(vec![3]));
    }

    #[test]
    fn malformed_lines_name_the_line() {
        let mut config = Config::new(&schema()).unwrap();
        let err = config.load_from_str("root.f=2.0\nnonsense\n", "root").unwrap_err();
        assert!(matches!(err, ConfigError::Script { line: 2, .. }));

        let err = config.load_from_str("other.f=2.0", "root").unwrap_err();
        assert!(matches!(err, ConfigError::Script { line: 1, .. }));
    }

    #[test]
    fn quoted_subscripts() {
        assert_eq!(subscript("gauss"), "gauss");
        assert_eq!(subscript("gauss.v2"), "\"gauss.v2\"");
        assert_eq!(subscript("1"), "\"1\"");
        assert_eq!(subscript("v1"), "v1");
    }
}
