//! Linker and module graph
//!
//! A [`Linker`] is one build's resolution session: it resolves every import
//! issued while building a module graph, caches module records per resolved
//! path, deduplicates concurrent loads and records every path it touched in
//! a [`ReferencedPaths`] set shared with the caller.

use crate::error::SandboxError;
use crate::kind::ModuleKind;
use crate::loaders::{commonjs, LoaderLookup, LoaderRegistry};
use crate::rules::ModuleRules;
use crate::single_flight::SingleFlight;
use boa_engine::module::{ModuleLoader, Referrer};
use boa_engine::{Context, JsError, JsNativeError, JsResult, JsString, Module};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, warn};
use workerbox_vfs::VirtualFileSystem;

/// Resolved paths touched by a linker session, including failed ones
///
/// A live handle: clones observe later additions.
#[derive(Debug, Clone, Default)]
pub struct ReferencedPaths {
    paths: Rc<RefCell<BTreeSet<PathBuf>>>,
}

impl ReferencedPaths {
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.paths.borrow().contains(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.paths.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.borrow().is_empty()
    }

    /// Sorted snapshot of the set
    pub fn to_vec(&self) -> Vec<PathBuf> {
        self.paths.borrow().iter().cloned().collect()
    }

    fn insert(&self, path: PathBuf) {
        self.paths.borrow_mut().insert(path);
    }
}

/// Resolve `specifier` against the directory of `referrer`
///
/// Returns `None` for specifiers that cannot name a file: empty ones and
/// ones carrying a URL scheme such as `node:fs` or `https://...`. Bare
/// specifiers are treated as relative.
pub fn resolve_specifier(referrer: &Path, specifier: &str) -> Option<PathBuf> {
    if specifier.is_empty() || has_url_scheme(specifier) {
        return None;
    }
    let target = Path::new(specifier);
    if target.is_absolute() {
        return Some(normalize(target));
    }
    let base = referrer.parent().unwrap_or_else(|| Path::new(""));
    Some(normalize(&base.join(target)))
}

fn has_url_scheme(specifier: &str) -> bool {
    let Some((scheme, _)) = specifier.split_once(':') else {
        return false;
    };
    // Single letters are drive prefixes
    scheme.len() > 1
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Lexically normalise `.` and `..` components
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Turn a host-supplied root path into a session cache key
pub(crate) fn root_key(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return normalize(path);
    }
    match std::env::current_dir() {
        Ok(cwd) => normalize(&cwd.join(path)),
        Err(_) => normalize(path),
    }
}

/// State of one resolution session
pub(crate) struct LinkerSession {
    rules: ModuleRules,
    vfs: Arc<dyn VirtualFileSystem>,
    loaders: LoaderRegistry,
    records: RefCell<HashMap<PathBuf, Module>>,
    in_flight: SingleFlight<PathBuf, Result<Module, SandboxError>>,
    referenced: ReferencedPaths,
    failures: RefCell<Vec<SandboxError>>,
    wrapped: RefCell<BTreeSet<PathBuf>>,
    bound: Cell<bool>,
}

impl LinkerSession {
    fn new(rules: ModuleRules, vfs: Arc<dyn VirtualFileSystem>, referenced: ReferencedPaths) -> Self {
        Self {
            rules,
            vfs,
            loaders: LoaderRegistry::new(),
            records: RefCell::new(HashMap::new()),
            in_flight: SingleFlight::new(),
            referenced,
            failures: RefCell::new(Vec::new()),
            wrapped: RefCell::new(BTreeSet::new()),
            bound: Cell::new(false),
        }
    }

    /// Resolve one import issued by the unit at `referrer`
    async fn resolve(
        &self,
        referrer: Option<&Path>,
        specifier: &str,
        context: &RefCell<&mut Context>,
    ) -> Result<Module, SandboxError> {
        let Some(referrer) = referrer else {
            return Err(SandboxError::ImportFromNonFileScript {
                specifier: specifier.to_string(),
            });
        };
        let path = resolve_specifier(referrer, specifier).ok_or_else(|| {
            SandboxError::UnresolvableSpecifier {
                specifier: specifier.to_string(),
                referrer: referrer.display().to_string(),
            }
        })?;
        self.referenced.insert(path.clone());

        if let Some(module) = self.records.borrow().get(&path) {
            debug!(target: "workerbox::linker", path = %path.display(), "module cache hit");
            return Ok(module.clone());
        }

        let kind = self
            .rules
            .classify(&path)
            .cloned()
            .ok_or_else(|| SandboxError::NoMatchingModuleRule { path: path.clone() })?;

        let key = path.clone();
        let path = path.as_path();
        let kind = &kind;
        self.in_flight
            .run(key, move || async move { self.load(path, kind, context) })
            .await
    }

    /// Read and load `path`, caching the record on success
    fn load(
        &self,
        path: &Path,
        kind: &ModuleKind,
        context: &RefCell<&mut Context>,
    ) -> Result<Module, SandboxError> {
        let loader = match self.loaders.loader_for(kind) {
            LoaderLookup::Loader(loader) => loader,
            LoaderLookup::Unsupported(name) => {
                return Err(SandboxError::UnsupportedModuleKind {
                    kind: name.to_string(),
                    path: path.to_path_buf(),
                })
            }
        };
        debug!(target: "workerbox::linker", path = %path.display(), kind = %kind, "module cache miss");

        let bytes = self.vfs.read_file(path).map_err(|source| SandboxError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let module = {
            let mut context = context.borrow_mut();
            loader.load(path, bytes, &mut context)?
        };
        if *kind == ModuleKind::CommonJS {
            self.wrapped.borrow_mut().insert(path.to_path_buf());
        }
        // Cached before the loader returns to the engine, so cycles hit it
        self.records
            .borrow_mut()
            .insert(path.to_path_buf(), module.clone());
        Ok(module)
    }

    fn fail(&self, specifier: &str, err: SandboxError) -> JsError {
        warn!(target: "workerbox::linker", specifier, error = %err, "import failed");
        let message = err.to_string();
        self.failures.borrow_mut().push(err);
        JsNativeError::error().with_message(message).into()
    }
}

impl ModuleLoader for LinkerSession {
    async fn load_imported_module(
        self: Rc<Self>,
        referrer: Referrer,
        specifier: JsString,
        context: &RefCell<&mut Context>,
    ) -> JsResult<Module> {
        let specifier = specifier.to_std_string_escaped();
        let referrer = referrer.path().map(Path::to_path_buf);
        self.resolve(referrer.as_deref(), &specifier, context)
            .await
            .map_err(|err| self.fail(&specifier, err))
    }
}

/// Handle to a resolution session
///
/// Bound to the first module build that uses it; module records are only
/// meaningful inside the context that created them.
#[derive(Clone)]
pub struct Linker {
    session: Rc<LinkerSession>,
}

impl Linker {
    /// The session's referenced-path set
    pub fn referenced_paths(&self) -> ReferencedPaths {
        self.session.referenced.clone()
    }

    /// Paths with a cached module record, sorted
    pub fn cached_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.session.records.borrow().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Whether any load is currently running
    pub fn is_loading(&self) -> bool {
        !self.session.in_flight.is_empty()
    }

    pub(crate) fn bind(&self) -> Result<Rc<LinkerSession>, SandboxError> {
        if self.session.bound.replace(true) {
            return Err(SandboxError::LinkerReused);
        }
        Ok(self.session.clone())
    }

    /// Register the root module under its own path
    pub(crate) fn register_root(&self, path: PathBuf, module: Module) {
        self.session.records.borrow_mut().insert(path, module);
    }

    /// Forget import failures that user code already handled
    pub(crate) fn clear_failures(&self) {
        self.session.failures.borrow_mut().clear();
    }

    /// Map an error location inside a wrapped CommonJS file back to the file
    pub(crate) fn unwrap_location(&self, mut err: SandboxError) -> SandboxError {
        if let Some(location) = err.location_mut() {
            if self.session.wrapped.borrow().contains(Path::new(&location.label)) {
                commonjs::unwrap_location(location);
            }
        }
        err
    }

    /// Recorded import failure matching an engine diagnostic
    ///
    /// With `fallback` set the earliest recorded failure is returned when
    /// none matches.
    pub(crate) fn take_failure(&self, text: &str, fallback: bool) -> Option<SandboxError> {
        let mut failures = self.session.failures.borrow_mut();
        let index = failures
            .iter()
            .position(|err| text.contains(&err.to_string()))
            .or(if fallback && !failures.is_empty() { Some(0) } else { None })?;
        let err = failures.remove(index);
        failures.clear();
        Some(err)
    }
}

/// Create a fresh resolution session over `vfs`
///
/// Returns the linker together with its live referenced-path set.
pub fn build_linker(rules: &ModuleRules, vfs: Arc<dyn VirtualFileSystem>) -> (Linker, ReferencedPaths) {
    let referenced = ReferencedPaths::default();
    let session = LinkerSession::new(rules.clone(), vfs, referenced.clone());
    let linker = Linker {
        session: Rc::new(session),
    };
    debug!(target: "workerbox::linker", rules = rules.len(), "linker session created");
    (linker, referenced)
}
