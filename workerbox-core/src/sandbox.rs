//! Execution contexts with the sandbox policy applied

use crate::attribution::{self, error_text, CODE_GENERATION_DISALLOWED};
use crate::error::SandboxError;
use crate::globals::Globals;
use crate::linker::LinkerSession;
use boa_engine::builtins::promise::PromiseState;
use boa_engine::context::HostHooks;
use boa_engine::object::builtins::JsPromise;
use boa_engine::realm::Realm;
use boa_engine::vm::{RuntimeLimits, SourcePath};
use boa_engine::{Context, JsError, JsNativeError, JsResult, JsString, JsValue};
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::warn;
use workerbox_config::{LimitConfig, SandboxPolicy};

/// Policy and limits applied to every context a blueprint creates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SandboxOptions {
    pub policy: SandboxPolicy,
    pub limits: LimitConfig,
}

impl SandboxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: SandboxPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_limits(mut self, limits: LimitConfig) -> Self {
        self.limits = limits;
        self
    }

    /// Permit `eval` and the `Function` constructors
    pub fn allow_code_generation(mut self, allow: bool) -> Self {
        self.policy.allow_code_generation = allow;
        self
    }
}

/// Call site of a refused string compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RefusalSite {
    /// File of the calling code; `None` for code compiled without a path
    pub(crate) path: Option<PathBuf>,
    pub(crate) line: usize,
    pub(crate) column: usize,
}

/// Host hooks enforcing the code generation policy
#[derive(Debug)]
pub(crate) struct SandboxHooks {
    allow_code_generation: bool,
    blocked: Cell<usize>,
    last_refusal: RefCell<Option<RefusalSite>>,
}

impl SandboxHooks {
    fn new(policy: &SandboxPolicy) -> Self {
        Self {
            allow_code_generation: policy.allow_code_generation,
            blocked: Cell::new(0),
            last_refusal: RefCell::new(None),
        }
    }

    /// Number of string compilations refused so far
    pub(crate) fn blocked(&self) -> usize {
        self.blocked.get()
    }

    pub(crate) fn last_refusal(&self) -> Option<RefusalSite> {
        self.last_refusal.borrow().clone()
    }
}

/// Position of the innermost script frame, which is the caller of
/// `eval` or a `Function` constructor while the hook runs
fn calling_site(context: &Context) -> Option<RefusalSite> {
    let location = context.stack_trace().next()?.position();
    let position = location.position?;
    let path = match &location.path {
        SourcePath::Path(path) => Some(path.to_path_buf()),
        _ => None,
    };
    Some(RefusalSite {
        path,
        line: position.line_number() as usize,
        column: position.column_number() as usize,
    })
}

impl HostHooks for SandboxHooks {
    fn ensure_can_compile_strings(
        &self,
        _realm: Realm,
        _parameters: &[JsString],
        _body: &JsString,
        _direct: bool,
        context: &mut Context,
    ) -> JsResult<()> {
        if self.allow_code_generation {
            return Ok(());
        }
        let site = calling_site(context);
        self.blocked.set(self.blocked.get() + 1);
        warn!(
            target: "workerbox::blueprint",
            line = site.as_ref().map(|site| site.line),
            "refused to compile a string"
        );
        *self.last_refusal.borrow_mut() = site;
        Err(JsNativeError::eval()
            .with_message(CODE_GENERATION_DISALLOWED)
            .into())
    }
}

/// A context plus the hooks installed in it
pub(crate) struct Sandbox {
    pub(crate) context: Context,
    hooks: Rc<SandboxHooks>,
}

impl Sandbox {
    /// Create a context with the policy, limits and globals applied
    pub(crate) fn new(
        options: &SandboxOptions,
        globals: &Globals,
        linker: Option<Rc<LinkerSession>>,
    ) -> Result<Self, SandboxError> {
        let hooks = Rc::new(SandboxHooks::new(&options.policy));
        let mut builder = Context::builder().host_hooks(hooks.clone());
        if let Some(linker) = linker {
            builder = builder.module_loader(linker);
        }
        let mut context = builder
            .build()
            .map_err(|err| SandboxError::Engine(err.to_string()))?;
        context.set_runtime_limits(runtime_limits(&options.limits));
        globals.install(&mut context)?;
        Ok(Self { context, hooks })
    }

    /// Marker to pass to [`Sandbox::runtime_error`] after a failed run
    pub(crate) fn checkpoint(&self) -> usize {
        self.hooks.blocked()
    }

    /// Attribute an error thrown while running code from `origin`
    pub(crate) fn runtime_error(&mut self, err: &JsError, origin: &str, checkpoint: usize) -> SandboxError {
        let refusal = if self.hooks.blocked() > checkpoint {
            self.hooks.last_refusal()
        } else {
            None
        };
        attribution::runtime_error(err, origin, refusal.as_ref(), &mut self.context)
    }

    pub(crate) fn error_text(&mut self, err: &JsError) -> String {
        error_text(err, &mut self.context)
    }

    /// Drain the job queue and read the settled state of `promise`
    pub(crate) fn settle(&mut self, promise: &JsPromise) -> JsResult<JsValue> {
        self.context.run_jobs()?;
        match promise.state() {
            PromiseState::Fulfilled(value) => Ok(value),
            PromiseState::Rejected(reason) => Err(JsError::from_opaque(reason)),
            PromiseState::Pending => Err(JsNativeError::error()
                .with_message("top-level evaluation never settled")
                .into()),
        }
    }
}

fn runtime_limits(config: &LimitConfig) -> RuntimeLimits {
    let mut limits = RuntimeLimits::default();
    limits.set_loop_iteration_limit(config.loop_iteration_limit);
    limits.set_recursion_limit(config.max_recursion_depth);
    limits.set_stack_size_limit(config.max_stack_size);
    limits
}
