//! Host-provided bindings installed into every built context

use crate::error::SandboxError;
use boa_engine::property::Attribute;
use boa_engine::{Context, JsString, JsValue, NativeFunction};

#[derive(Clone)]
enum Binding {
    Value(serde_json::Value),
    Function {
        length: usize,
        function: NativeFunction,
    },
}

/// Named bindings made visible to user code as globals
///
/// # Example
/// ```ignore
/// let globals = Globals::new()
///     .with_value("ENVIRONMENT", serde_json::json!("production"))
///     .with_function("callback", 1, NativeFunction::from_fn_ptr(log_call));
/// ```
#[derive(Clone, Default)]
pub struct Globals {
    bindings: Vec<(String, Binding)>,
}

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a JSON value
    pub fn with_value(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.bindings.push((name.into(), Binding::Value(value)));
        self
    }

    /// Bind `name` to a host function taking `length` declared arguments
    pub fn with_function(mut self, name: impl Into<String>, length: usize, function: NativeFunction) -> Self {
        self.bindings
            .push((name.into(), Binding::Function { length, function }));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Later bindings with the same name replace earlier ones
    pub(crate) fn install(&self, context: &mut Context) -> Result<(), SandboxError> {
        let engine = |err: boa_engine::JsError| SandboxError::Engine(err.to_string());
        for (name, binding) in &self.bindings {
            let key = JsString::from(name.as_str());
            match binding {
                Binding::Value(json) => {
                    let value = JsValue::from_json(json, context).map_err(engine)?;
                    context
                        .register_global_property(key, value, Attribute::all())
                        .map_err(engine)?;
                }
                Binding::Function { length, function } => {
                    context
                        .register_global_builtin_callable(key, *length, function.clone())
                        .map_err(engine)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::Source;

    fn answer(_this: &JsValue, _args: &[JsValue], _context: &mut Context) -> boa_engine::JsResult<JsValue> {
        Ok(JsValue::from(42))
    }

    #[test]
    fn test_install_values_and_functions() {
        let globals = Globals::new()
            .with_value("config", serde_json::json!({ "name": "worker", "retries": 3 }))
            .with_function("answer", 0, NativeFunction::from_fn_ptr(answer));
        assert_eq!(globals.names().collect::<Vec<_>>(), vec!["config", "answer"]);

        let mut context = Context::default();
        globals.install(&mut context).unwrap();
        let value = context
            .eval(Source::from_bytes("config.retries + answer()"))
            .unwrap();
        assert_eq!(value.as_number(), Some(45.0));
    }

    #[test]
    fn test_empty_globals() {
        let globals = Globals::new();
        assert!(globals.is_empty());
        globals.install(&mut Context::default()).unwrap();
    }
}
