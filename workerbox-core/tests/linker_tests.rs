//! Module linking end-to-end tests

mod common;

use common::{add_wasm, Workspace, STANDARD_RULES};
use serde_json::json;
use std::path::PathBuf;
use workerbox_core::{ErrorKind, Globals, LogicalPath, SandboxError};
use workerbox_vfs::VfsError;

#[test]
fn test_text_import_keeps_trailing_newline() {
    let ws = Workspace::new(&[("/w/text.txt", b"hello\n")], STANDARD_RULES);
    let (module, referenced) = ws.run(
        r#"import text from "./text.txt"; export default text;"#,
        "/w/index.mjs",
    );
    assert_eq!(module.export_string("default").unwrap().as_deref(), Some("hello\n"));
    assert_eq!(referenced.to_vec(), vec![PathBuf::from("/w/text.txt")]);
}

#[test]
fn test_text_invalid_utf8_is_read_error() {
    let ws = Workspace::new(&[("/w/bad.txt", &[0xff, 0xfe, 0x00])], STANDARD_RULES);
    let (module, _) = ws.build(r#"import t from "./bad.txt";"#, "/w/index.mjs");
    match module.err().unwrap() {
        SandboxError::Read { path, source } => {
            assert_eq!(path, PathBuf::from("/w/bad.txt"));
            assert!(source.to_string().contains("invalid UTF-8"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_data_import_is_unmodified_bytes() {
    let bytes: &[u8] = &[0x00, 0x01, 0x7f, 0x80, 0xff];
    let ws = Workspace::new(&[("/w/blob.bin", bytes)], STANDARD_RULES);
    let (mut module, _) = ws.run(
        r#"import data from "./blob.bin";
export default data;
export const size = data.byteLength;"#,
        "/w/index.mjs",
    );
    assert_eq!(module.export_bytes("default").unwrap(), Some(bytes.to_vec()));
    assert_eq!(module.export_json("size").unwrap(), Some(json!(5)));
}

#[test]
fn test_unsupported_kind_fails_naming_kind() {
    let ws = Workspace::new(&[("/w/img.png", b"\x89PNG")], STANDARD_RULES);
    let (module, referenced) = ws.build(r#"import img from "./img.png";"#, "/w/index.mjs");
    let err = module.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::UnsupportedModuleKind);
    assert!(err.to_string().starts_with("PNG modules are unsupported"));
    assert!(referenced.contains("/w/img.png"));
    // classification fails before any content is read
    assert_eq!(ws.fs.read_count("/w/img.png"), 0);
}

#[test]
fn test_no_matching_rule() {
    let ws = Workspace::new(&[("/w/photo.jpg", b"\xff\xd8")], STANDARD_RULES);
    let (module, referenced) = ws.build(r#"import p from "./photo.jpg";"#, "/w/index.mjs");
    match module.err().unwrap() {
        SandboxError::NoMatchingModuleRule { path } => {
            assert_eq!(path, PathBuf::from("/w/photo.jpg"))
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(referenced.contains("/w/photo.jpg"));
    assert_eq!(ws.fs.total_reads(), 0);
}

#[test]
fn test_referenced_paths_include_successes_and_failures() {
    let ws = Workspace::new(&[("/w/text.txt", b"t")], STANDARD_RULES);
    let (module, referenced) = ws.build(
        r#"import t from "./text.txt";
import p from "./photo.jpg";"#,
        "/w/index.mjs",
    );
    assert!(module.is_err());
    assert!(referenced.contains("/w/text.txt"));
    assert!(referenced.contains("/w/photo.jpg"));
    assert!(!referenced.contains("/w/index.mjs"));
}

#[test]
fn test_missing_file_is_read_error() {
    let ws = Workspace::new(&[], STANDARD_RULES);
    let (module, referenced) = ws.build(r#"import t from "./missing.txt";"#, "/w/index.mjs");
    match module.err().unwrap() {
        SandboxError::Read { path, source } => {
            assert_eq!(path, PathBuf::from("/w/missing.txt"));
            assert!(matches!(source, VfsError::NotFound { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(referenced.contains("/w/missing.txt"));
}

#[test]
fn test_url_specifier_is_unresolvable() {
    let ws = Workspace::new(&[], STANDARD_RULES);
    let (module, referenced) = ws.build(r#"import fs from "node:fs";"#, "/w/index.mjs");
    let err = module.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::UnresolvableSpecifier);
    assert!(referenced.is_empty());
}

#[test]
fn test_cycle_loads_each_module_once() {
    let ws = Workspace::new(
        &[
            (
                "/w/a.mjs",
                br#"import { b } from "./b.mjs";
export const a = "A";
export function getB() { return b; }"#,
            ),
            (
                "/w/b.mjs",
                br#"import * as modA from "./a.mjs";
export const b = "B";
export function readA() { return modA.a; }"#,
            ),
        ],
        STANDARD_RULES,
    );
    let (module, referenced) = ws.run(
        r#"import { a, getB } from "./a.mjs";
export default a + getB();"#,
        "/w/index.mjs",
    );
    assert_eq!(module.export_string("default").unwrap().as_deref(), Some("AB"));
    assert_eq!(ws.fs.read_count("/w/a.mjs"), 1);
    assert_eq!(ws.fs.read_count("/w/b.mjs"), 1);
    assert_eq!(
        referenced.to_vec(),
        vec![PathBuf::from("/w/a.mjs"), PathBuf::from("/w/b.mjs")]
    );
}

#[test]
fn test_cycle_back_to_root_hits_cache() {
    let ws = Workspace::new(
        &[(
            "/w/helper.mjs",
            br#"import { name } from "./index.mjs";
export function greet() { return "hello " + name; }"#,
        )],
        STANDARD_RULES,
    );
    let (module, referenced) = ws.run(
        r#"import { greet } from "./helper.mjs";
export const name = "root";
export default greet();"#,
        "/w/index.mjs",
    );
    assert_eq!(module.export_string("default").unwrap().as_deref(), Some("hello root"));
    assert_eq!(ws.fs.read_count("/w/index.mjs"), 0);
    assert!(referenced.contains("/w/index.mjs"));
}

#[test]
fn test_shared_dependency_is_loaded_once() {
    let ws = Workspace::new(
        &[
            ("/w/left.mjs", br#"import s from "./shared.txt"; export default "L" + s;"#),
            ("/w/right.mjs", br#"import s from "./shared.txt"; export default "R" + s;"#),
            ("/w/shared.txt", b"!"),
        ],
        STANDARD_RULES,
    );
    let (module, _) = ws.run(
        r#"import l from "./left.mjs";
import r from "./right.mjs";
export default l + r;"#,
        "/w/index.mjs",
    );
    assert_eq!(module.export_string("default").unwrap().as_deref(), Some("L!R!"));
    assert_eq!(ws.fs.read_count("/w/shared.txt"), 1);
}

#[test]
fn test_specifiers_normalise_to_one_record() {
    let ws = Workspace::new(
        &[
            ("/w/lib/value.txt", b"v"),
            ("/w/lib/reader.mjs", br#"import v from "../lib/./value.txt"; export default v;"#),
        ],
        STANDARD_RULES,
    );
    let (module, referenced) = ws.run(
        r#"import v from "./lib/value.txt";
import r from "./lib/reader.mjs";
export default v + r;"#,
        "/w/index.mjs",
    );
    assert_eq!(module.export_string("default").unwrap().as_deref(), Some("vv"));
    assert_eq!(ws.fs.read_count("/w/lib/value.txt"), 1);
    assert_eq!(referenced.len(), 2);
}

#[test]
fn test_commonjs_default_is_module_exports() {
    let ws = Workspace::new(
        &[
            ("/w/math.js", b"module.exports = { add: (a, b) => a + b };\nexports.lost = true;\n"),
            ("/w/flags.cjs", b"exports.enabled = true;\n"),
        ],
        STANDARD_RULES,
    );
    let (mut module, _) = ws.run(
        r#"import math from "./math.js";
import flags from "./flags.cjs";
export const sum = math.add(2, 3);
export const lost = "lost" in math;
export const enabled = flags.enabled;"#,
        "/w/index.mjs",
    );
    assert_eq!(module.export_json("sum").unwrap(), Some(json!(5)));
    assert_eq!(module.export_json("lost").unwrap(), Some(json!(false)));
    assert_eq!(module.export_json("enabled").unwrap(), Some(json!(true)));
}

#[test]
fn test_commonjs_body_runs_at_evaluation_time() {
    let ws = Workspace::new(
        &[("/w/side.js", b"order.push('cjs'); module.exports = 1;\n")],
        STANDARD_RULES,
    );
    let globals = Globals::new().with_value("order", json!([]));
    let (module, _) = ws.build_with(
        r#"import one from "./side.js";
order.push("root");
export default order.join(",");"#,
        LogicalPath::file("/w/index.mjs"),
        &globals,
    );
    let mut module = module.unwrap();
    module.run().unwrap();
    assert_eq!(module.export_string("default").unwrap().as_deref(), Some("cjs,root"));
}

#[test]
fn test_commonjs_syntax_error_names_file() {
    let ws = Workspace::new(&[("/w/broken.js", b"module.exports = ;\n")], STANDARD_RULES);
    let (module, _) = ws.build(r#"import b from "./broken.js";"#, "/w/index.mjs");
    let err = module.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Compile);
    assert_eq!(err.location().unwrap().label, "/w/broken.js");
}

#[test]
fn test_wasm_default_is_compiled_module() {
    let wasm = add_wasm();
    let ws = Workspace::new(&[("/w/add.wasm", wasm.as_slice())], STANDARD_RULES);
    let (module, _) = ws.run(
        r#"import add from "./add.wasm";
export default add;
export const tag = Object.prototype.toString.call(add);
export const exported = add.exports.map((e) => e.name + ":" + e.kind).join(",");"#,
        "/w/index.mjs",
    );
    assert_eq!(
        module.export_string("tag").unwrap().as_deref(),
        Some("[object WebAssembly.Module]")
    );
    assert_eq!(module.export_string("exported").unwrap().as_deref(), Some("add:function"));
    let compiled = module.export_wasm("default").unwrap().unwrap();
    let names: Vec<_> = compiled.exports().map(|e| e.name().to_string()).collect();
    assert_eq!(names, vec!["add"]);
}

#[test]
fn test_invalid_wasm_is_wasm_error() {
    let ws = Workspace::new(&[("/w/bad.wasm", b"not wasm")], STANDARD_RULES);
    let (module, _) = ws.build(r#"import bad from "./bad.wasm";"#, "/w/index.mjs");
    match module.err().unwrap() {
        SandboxError::Wasm { path, .. } => assert_eq!(path, PathBuf::from("/w/bad.wasm")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_failed_dynamic_import_surfaces_from_run() {
    let ws = Workspace::new(&[], STANDARD_RULES);
    let (module, referenced) = ws.build(
        r#"export const loaded = await import("./photo.jpg");"#,
        "/w/index.mjs",
    );
    let mut module = module.unwrap();
    let err = module.run().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoMatchingModuleRule);
    assert!(referenced.contains("/w/photo.jpg"));
}

#[test]
fn test_linker_cannot_back_two_builds() {
    use std::sync::Arc;
    use workerbox_core::{build_linker, Blueprint};

    let ws = Workspace::new(&[], STANDARD_RULES);
    let (linker, _) = build_linker(&ws.rules, Arc::new(ws.fs.clone()));
    let blueprint = Blueprint::new("export default 1;", LogicalPath::file("/w/index.mjs"));
    assert!(blueprint.build_module(&Globals::new(), &linker).is_ok());
    let err = blueprint.build_module(&Globals::new(), &linker).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::LinkerReused);
}
