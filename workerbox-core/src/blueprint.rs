//! Blueprints and the units built from them
//!
//! A [`Blueprint`] is immutable source text plus the logical path it is
//! attributed to. Building it creates a fresh sandboxed context and compiles
//! the source there, either as a classic [`Script`] or as a [`Module`] whose
//! imports are resolved through a [`Linker`].

use crate::attribution::{compile_error, headline, STRING_SCRIPT_LABEL};
use crate::error::SandboxError;
use crate::globals::Globals;
use crate::linker::{root_key, Linker, ReferencedPaths};
use crate::loaders::CompiledWasmModule;
use crate::sandbox::{Sandbox, SandboxOptions};
use boa_engine::object::builtins::JsArrayBuffer;
use boa_engine::property::PropertyKey;
use boa_engine::{
    js_string, Context, JsError, JsNativeError, JsResult, JsValue, Module as JsModule,
    Script as JsScript, Source,
};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Where a blueprint's source is attributed to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalPath {
    /// Backed by a real file; imports resolve relative to it
    File(PathBuf),
    /// No file backing; imports are refused
    Sentinel,
}

impl LogicalPath {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        LogicalPath::File(path.into())
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            LogicalPath::File(path) => Some(path),
            LogicalPath::Sentinel => None,
        }
    }

    /// Label used in error locations
    pub fn label(&self) -> Cow<'_, str> {
        match self {
            LogicalPath::File(path) => path.to_string_lossy(),
            LogicalPath::Sentinel => Cow::Borrowed(STRING_SCRIPT_LABEL),
        }
    }
}

/// Immutable source text plus its logical path
#[derive(Debug, Clone)]
pub struct Blueprint {
    source: String,
    path: LogicalPath,
    options: SandboxOptions,
}

impl Blueprint {
    pub fn new(source: impl Into<String>, path: LogicalPath) -> Self {
        Self {
            source: source.into(),
            path,
            options: SandboxOptions::default(),
        }
    }

    /// Use `options` for contexts built from this blueprint
    pub fn with_options(mut self, options: SandboxOptions) -> Self {
        self.options = options;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn path(&self) -> &LogicalPath {
        &self.path
    }

    pub fn options(&self) -> &SandboxOptions {
        &self.options
    }

    /// Compile as a classic script in a fresh context
    #[instrument(target = "workerbox::blueprint", skip_all, fields(path = %self.path.label()))]
    pub fn build_script(&self, globals: &Globals) -> Result<Script, SandboxError> {
        let mut sandbox = Sandbox::new(&self.options, globals, None)?;
        let origin = self.path.label().into_owned();
        let source = Source::from_bytes(self.source.as_bytes());
        let source = match &self.path {
            LogicalPath::File(path) => source.with_path(path),
            LogicalPath::Sentinel => source,
        };
        let script = JsScript::parse(source, None, &mut sandbox.context)
            .map_err(|err| compile_error(&err, &origin))?;
        debug!(target: "workerbox::blueprint", "script compiled");
        Ok(Script {
            sandbox,
            script,
            origin,
        })
    }

    /// Compile as a module in a fresh context and link its imports
    ///
    /// Every static import is resolved before this returns, so link
    /// failures surface here rather than from [`Module::run`].
    #[instrument(target = "workerbox::blueprint", skip_all, fields(path = %self.path.label()))]
    pub fn build_module(&self, globals: &Globals, linker: &Linker) -> Result<Module, SandboxError> {
        let session = linker.bind()?;
        let mut sandbox = Sandbox::new(&self.options, globals, Some(session))?;
        let origin = self.path.label().into_owned();

        let root = self.path.as_path().map(root_key);
        let source = Source::from_bytes(self.source.as_bytes());
        let source = match &root {
            Some(path) => source.with_path(path),
            None => source,
        };
        let module = JsModule::parse(source, None, &mut sandbox.context)
            .map_err(|err| compile_error(&err, &origin))?;
        if let Some(path) = root {
            linker.register_root(path, module.clone());
        }

        let checkpoint = sandbox.checkpoint();
        let loaded = module.load(&mut sandbox.context);
        if let Err(err) = sandbox.settle(&loaded) {
            let text = sandbox.error_text(&err);
            return Err(match linker.take_failure(&text, true) {
                Some(failure) => failure,
                None => sandbox.runtime_error(&err, &origin, checkpoint),
            });
        }
        linker.clear_failures();
        module
            .link(&mut sandbox.context)
            .map_err(|err| compile_error(&err, &origin))?;
        debug!(
            target: "workerbox::blueprint",
            modules = linker.cached_paths().len(),
            "module graph linked"
        );

        Ok(Module {
            sandbox,
            module,
            origin,
            linker: linker.clone(),
            exports: None,
        })
    }
}

/// A compiled classic script
pub struct Script {
    sandbox: Sandbox,
    script: JsScript,
    origin: String,
}

impl Script {
    /// Execute the script and return its completion value
    #[instrument(target = "workerbox::blueprint", skip_all, fields(path = %self.origin))]
    pub fn run(&mut self) -> Result<JsValue, SandboxError> {
        let checkpoint = self.sandbox.checkpoint();
        let result = self
            .script
            .evaluate(&mut self.sandbox.context)
            .and_then(|value| self.sandbox.context.run_jobs().map(|()| value));
        result.map_err(|err| self.sandbox.runtime_error(&err, &self.origin, checkpoint))
    }

    /// Context the script runs in, for interpreting returned values
    pub fn context(&mut self) -> &mut Context {
        &mut self.sandbox.context
    }
}

/// Named exports of an evaluated module
#[derive(Debug, Clone, Default)]
pub struct Exports {
    values: BTreeMap<String, JsValue>,
}

impl Exports {
    pub fn get(&self, name: &str) -> Option<&JsValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Export names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A compiled and linked module
pub struct Module {
    sandbox: Sandbox,
    module: JsModule,
    origin: String,
    linker: Linker,
    exports: Option<Exports>,
}

impl Module {
    /// Evaluate the module graph's top-level code
    #[instrument(target = "workerbox::blueprint", skip_all, fields(path = %self.origin))]
    pub fn run(&mut self) -> Result<(), SandboxError> {
        let checkpoint = self.sandbox.checkpoint();
        let evaluated = self.module.evaluate(&mut self.sandbox.context);
        if let Err(err) = self.sandbox.settle(&evaluated) {
            let text = self.sandbox.error_text(&err);
            return Err(match self.linker.take_failure(&text, false) {
                Some(failure) => failure,
                None => {
                    let err = self.sandbox.runtime_error(&err, &self.origin, checkpoint);
                    self.linker.unwrap_location(err)
                }
            });
        }
        self.linker.clear_failures();
        let exports = self.collect_exports().map_err(engine_error)?;
        debug!(target: "workerbox::blueprint", exports = exports.len(), "module evaluated");
        self.exports = Some(exports);
        Ok(())
    }

    fn collect_exports(&mut self) -> JsResult<Exports> {
        let context = &mut self.sandbox.context;
        let namespace = self.module.namespace(context);
        let mut values = BTreeMap::new();
        for key in namespace.own_property_keys(context)? {
            if let PropertyKey::String(name) = &key {
                let value = namespace.get(key.clone(), context)?;
                values.insert(name.to_std_string_escaped(), value);
            }
        }
        Ok(Exports { values })
    }

    /// Exports of the evaluated module
    pub fn exports(&self) -> Result<&Exports, SandboxError> {
        self.exports.as_ref().ok_or(SandboxError::ExportsUnavailable)
    }

    /// Export `name` if it is a string
    pub fn export_string(&self, name: &str) -> Result<Option<String>, SandboxError> {
        Ok(self
            .exports()?
            .get(name)
            .and_then(|value| value.as_string().map(|s| s.to_std_string_escaped())))
    }

    /// Contents of export `name` if it is an `ArrayBuffer`
    pub fn export_bytes(&self, name: &str) -> Result<Option<Vec<u8>>, SandboxError> {
        let Some(object) = self.exports()?.get(name).and_then(|value| value.as_object()) else {
            return Ok(None);
        };
        let Ok(buffer) = JsArrayBuffer::from_object(object.clone()) else {
            return Ok(None);
        };
        Ok(buffer.data().map(|bytes| bytes.to_vec()))
    }

    /// Compiled module behind export `name` if it is a `WebAssembly.Module`
    pub fn export_wasm(&self, name: &str) -> Result<Option<wasmtime::Module>, SandboxError> {
        let Some(object) = self.exports()?.get(name).and_then(|value| value.as_object()) else {
            return Ok(None);
        };
        let wasm = object
            .downcast_ref::<CompiledWasmModule>()
            .map(|compiled| compiled.module().clone());
        Ok(wasm)
    }

    /// Export `name` serialised through `JSON.stringify`
    ///
    /// `None` when the export is missing or has no JSON form.
    pub fn export_json(&mut self, name: &str) -> Result<Option<serde_json::Value>, SandboxError> {
        let Some(value) = self.exports()?.get(name).cloned() else {
            return Ok(None);
        };
        let Some(text) = stringify(&value, &mut self.sandbox.context).map_err(engine_error)? else {
            return Ok(None);
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| SandboxError::Engine(err.to_string()))
    }

    /// Paths the module's linker session touched
    pub fn referenced_paths(&self) -> ReferencedPaths {
        self.linker.referenced_paths()
    }

    /// Context the module runs in, for interpreting exported values
    pub fn context(&mut self) -> &mut Context {
        &mut self.sandbox.context
    }
}

fn stringify(value: &JsValue, context: &mut Context) -> JsResult<Option<String>> {
    let json = context.global_object().get(js_string!("JSON"), context)?;
    let stringify = match json.as_object() {
        Some(json) => json.get(js_string!("stringify"), context)?,
        None => JsValue::undefined(),
    };
    let Some(stringify) = stringify.as_callable() else {
        return Err(JsNativeError::typ()
            .with_message("JSON.stringify is not callable")
            .into());
    };
    let text = stringify.call(&JsValue::undefined(), &[value.clone()], context)?;
    Ok(text.as_string().map(|s| s.to_std_string_escaped()))
}

fn engine_error(err: JsError) -> SandboxError {
    SandboxError::Engine(headline(&err.to_string()))
}
