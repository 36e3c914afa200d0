use super::{default_export_module, KindLoader};
use crate::error::SandboxError;
use crate::kind::ModuleKind;
use boa_engine::object::builtins::JsArray;
use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::{js_string, Context, JsData, JsString, JsSymbol, JsValue, Module};
use boa_gc::{Finalize, Trace};
use std::cell::OnceCell;
use std::path::Path;
use tracing::debug;
use wasmtime::{Engine, ExternType};

/// Host data behind a `WebAssembly.Module` object
///
/// Holds the compiled, uninstantiated module.
#[derive(Trace, Finalize, JsData)]
pub struct CompiledWasmModule {
    #[unsafe_ignore_trace]
    module: wasmtime::Module,
}

impl CompiledWasmModule {
    pub fn module(&self) -> &wasmtime::Module {
        &self.module
    }
}

/// Compiles WebAssembly binaries into module objects
///
/// The engine is created on first use.
#[derive(Default)]
pub struct CompiledWasmLoader {
    engine: OnceCell<Engine>,
}

impl CompiledWasmLoader {
    fn engine(&self) -> &Engine {
        self.engine.get_or_init(Engine::default)
    }
}

impl KindLoader for CompiledWasmLoader {
    fn kind(&self) -> ModuleKind {
        ModuleKind::CompiledWasm
    }

    fn load(&self, path: &Path, bytes: Vec<u8>, context: &mut Context) -> Result<Module, SandboxError> {
        let module = wasmtime::Module::from_binary(self.engine(), &bytes).map_err(|err| {
            SandboxError::Wasm {
                path: path.to_path_buf(),
                message: format!("{err:#}"),
            }
        })?;
        debug!(
            target: "workerbox::loader",
            path = %path.display(),
            exports = module.exports().len(),
            imports = module.imports().len(),
            "compiled wasm module"
        );

        let exports: Vec<JsValue> = module
            .exports()
            .map(|export| descriptor(None, export.name(), &export.ty(), context))
            .collect();
        let imports: Vec<JsValue> = module
            .imports()
            .map(|import| descriptor(Some(import.module()), import.name(), &import.ty(), context))
            .collect();
        let exports = JsArray::from_iter(exports, context);
        let imports = JsArray::from_iter(imports, context);

        let object = ObjectInitializer::with_native_data(CompiledWasmModule { module }, context)
            .property(js_string!("exports"), exports, Attribute::READONLY | Attribute::ENUMERABLE)
            .property(js_string!("imports"), imports, Attribute::READONLY | Attribute::ENUMERABLE)
            .property(
                JsSymbol::to_string_tag(),
                js_string!("WebAssembly.Module"),
                Attribute::CONFIGURABLE,
            )
            .build();

        Ok(default_export_module(object.into(), path, context))
    }
}

fn extern_kind(ty: &ExternType) -> &'static str {
    match ty {
        ExternType::Func(_) => "function",
        ExternType::Global(_) => "global",
        ExternType::Table(_) => "table",
        ExternType::Memory(_) => "memory",
        #[allow(unreachable_patterns)]
        _ => "tag",
    }
}

fn descriptor(module: Option<&str>, name: &str, ty: &ExternType, context: &mut Context) -> JsValue {
    let mut init = ObjectInitializer::new(context);
    if let Some(module) = module {
        init.property(js_string!("module"), JsString::from(module), Attribute::all());
    }
    init.property(js_string!("name"), JsString::from(name), Attribute::all())
        .property(js_string!("kind"), JsString::from(extern_kind(ty)), Attribute::all());
    init.build().into()
}
