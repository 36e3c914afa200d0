//! Shared helpers for workerbox-core integration tests

#![allow(dead_code)]

use boa_engine::{Context, JsArgs, JsValue, NativeFunction};
use boa_gc::{Gc, GcRefCell};
use std::sync::Arc;
use workerbox_core::{
    build_linker, Blueprint, Globals, LogicalPath, Module, ModuleRuleConfig, ModuleRules,
    ReferencedPaths, SandboxError,
};
use workerbox_vfs::{MemoryFileSystem, RecordingFileSystem};

/// A worker directory in memory plus the rules that classify it
pub struct Workspace {
    pub fs: RecordingFileSystem<MemoryFileSystem>,
    pub rules: ModuleRules,
}

impl Workspace {
    /// Files given as `(path, content)`; rules as `(kind, include)`
    pub fn new(files: &[(&str, &[u8])], rules: &[(&str, &[&str])]) -> Self {
        let memory = MemoryFileSystem::with_files(
            files
                .iter()
                .map(|(path, content)| (path.to_string(), content.to_vec())),
        );
        let decls: Vec<_> = rules
            .iter()
            .map(|(kind, include)| ModuleRuleConfig::new(*kind, include.iter().copied()))
            .collect();
        Self {
            fs: RecordingFileSystem::new(memory),
            rules: ModuleRules::compile(&decls).expect("test rules compile"),
        }
    }

    /// Build `source` as the module at `path` with a fresh linker
    pub fn build(&self, source: &str, path: &str) -> (Result<Module, SandboxError>, ReferencedPaths) {
        self.build_with(source, LogicalPath::file(path), &Globals::new())
    }

    pub fn build_with(
        &self,
        source: &str,
        path: LogicalPath,
        globals: &Globals,
    ) -> (Result<Module, SandboxError>, ReferencedPaths) {
        let (linker, referenced) = build_linker(&self.rules, Arc::new(self.fs.clone()));
        let module = Blueprint::new(source, path).build_module(globals, &linker);
        (module, referenced)
    }

    /// Build and run, panicking on failure
    pub fn run(&self, source: &str, path: &str) -> (Module, ReferencedPaths) {
        let (module, referenced) = self.build(source, path);
        let mut module = match module {
            Ok(module) => module,
            Err(err) => panic!("build failed: {err}"),
        };
        if let Err(err) = module.run() {
            panic!("run failed: {err}");
        }
        (module, referenced)
    }
}

/// The rules most tests use: user kinds first, then the defaults
pub const STANDARD_RULES: &[(&str, &[&str])] = &[
    ("Text", &["*.txt"]),
    ("Data", &["**/*.bin"]),
    ("CompiledWasm", &["**/*.wasm"]),
    ("PNG", &["**/*.png"]),
    ("ESModule", &["**/*.mjs"]),
    ("CommonJS", &["**/*.js", "**/*.cjs"]),
];

/// Calls recorded by the `callback` global
pub type Calls = Gc<GcRefCell<Vec<String>>>;

/// Globals exposing `callback(value)`, which records its argument
pub fn recording_callback() -> (Globals, Calls) {
    let calls: Calls = Gc::new(GcRefCell::new(Vec::new()));
    let function = NativeFunction::from_copy_closure_with_captures(
        |_this: &JsValue, args: &[JsValue], calls: &Calls, context: &mut Context| {
            let value = args
                .get_or_undefined(0)
                .to_string(context)?
                .to_std_string_escaped();
            calls.borrow_mut().push(value);
            Ok(JsValue::undefined())
        },
        calls.clone(),
    );
    (Globals::new().with_function("callback", 1, function), calls)
}

/// Minimal WebAssembly binary exporting `add(i32, i32) -> i32`
pub fn add_wasm() -> Vec<u8> {
    vec![
        0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // magic + version
        0x01, 0x07, 0x01, 0x60, 0x02, 0x7f, 0x7f, 0x01, 0x7f, // type: (i32, i32) -> i32
        0x03, 0x02, 0x01, 0x00, // function 0 has type 0
        0x07, 0x07, 0x01, 0x03, b'a', b'd', b'd', 0x00, 0x00, // export "add"
        0x0a, 0x09, 0x01, 0x07, 0x00, 0x20, 0x00, 0x20, 0x01, 0x6a, 0x0b, // local.get 0 1; i32.add
    ]
}
