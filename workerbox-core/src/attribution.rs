//! Mapping engine errors back to user source locations

use crate::error::{ErrorLocation, SandboxError};
use crate::sandbox::RefusalSite;
use boa_engine::{Context, JsError, JsNativeErrorKind};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Label reported for code compiled without file backing
pub const STRING_SCRIPT_LABEL: &str = "<anonymous>";

/// Fixed diagnostic raised when a string would be compiled under a
/// policy that forbids it
pub const CODE_GENERATION_DISALLOWED: &str =
    "Code generation from strings disallowed for this context";

// Parser diagnostics end in "at line 3, col 14"
static PARSE_POSITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"line (\d+), col(?:umn)? (\d+)").expect("parse position pattern is valid")
});

// Frames look like "(/w/index.mjs:1:7)", or "(unknown at :1:7)" for code
// compiled without a path
static FRAME_POSITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((?:unknown at |eval at )?([^()]*?):(\d+):(\d+)\)")
        .expect("frame position pattern is valid")
});

/// Full diagnostic text of an engine error
///
/// Thrown error objects lose their backtrace once they pass through a
/// promise, so the position recorded when the object was created comes
/// first.
pub(crate) fn error_text(err: &JsError, context: &mut Context) -> String {
    let mut text = String::new();
    if let Ok(native) = err.try_native(context) {
        text.push_str(&native.to_string());
        text.push('\n');
    }
    text.push_str(&format!("{err}\n{err:?}"));
    text
}

/// First non-empty line of a diagnostic
pub(crate) fn headline(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("unknown error")
        .to_string()
}

/// Location of a compile error inside the unit labelled `origin`
pub(crate) fn compile_location(text: &str, origin: &str) -> ErrorLocation {
    match parse_position(text) {
        Some((line, column)) => ErrorLocation::at(origin, line, column),
        None => ErrorLocation::unknown(origin),
    }
}

/// Location of a runtime throw that escaped the unit labelled `origin`
///
/// The innermost frame wins. Frames naming another file-backed unit are
/// attributed to that unit.
pub(crate) fn runtime_location(text: &str, origin: &str) -> ErrorLocation {
    for caps in FRAME_POSITION.captures_iter(text) {
        let frame = &caps[1];
        // Native frames point into the engine, not user code
        if frame.starts_with("native") {
            continue;
        }
        if let (Ok(line), Ok(column)) = (caps[2].parse(), caps[3].parse()) {
            return ErrorLocation::at(frame_label(Some(Path::new(frame)), origin), line, column);
        }
    }
    compile_location(text, origin)
}

/// Label for a frame in `path`: absolute paths name their own unit
fn frame_label(path: Option<&Path>, origin: &str) -> String {
    match path {
        Some(path) if path.is_absolute() => path.to_string_lossy().into_owned(),
        _ => origin.to_string(),
    }
}

fn parse_position(text: &str) -> Option<(usize, usize)> {
    let caps = PARSE_POSITION.captures(text)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

/// Compile error raised while parsing the unit labelled `origin`
pub(crate) fn compile_error(err: &JsError, origin: &str) -> SandboxError {
    let text = format!("{err}\n{err:?}");
    SandboxError::Compile {
        message: headline(&format!("{err}")),
        location: compile_location(&text, origin),
    }
}

/// Error thrown while running code from the unit labelled `origin`
///
/// `refusal` is where the sandbox hooks last refused to compile a string
/// during the failed run, if they did.
pub(crate) fn runtime_error(
    err: &JsError,
    origin: &str,
    refusal: Option<&RefusalSite>,
    context: &mut Context,
) -> SandboxError {
    if let Some(site) = refusal {
        if is_refusal(err, context) {
            let label = frame_label(site.path.as_deref(), origin);
            return SandboxError::CodeGenerationDisallowed {
                location: ErrorLocation::at(label, site.line, site.column),
            };
        }
    }
    let text = error_text(err, context);
    SandboxError::Runtime {
        message: headline(&format!("{err}")),
        location: runtime_location(&text, origin),
    }
}

/// Whether `err` is the `EvalError` the sandbox hooks raise
fn is_refusal(err: &JsError, context: &mut Context) -> bool {
    err.try_native(context).is_ok_and(|native| {
        matches!(native.kind, JsNativeErrorKind::Eval)
            && native.message() == CODE_GENERATION_DISALLOWED
    })
}
