//! Lifecycle hooks.
//!
//! A [`HookRegistry`] holds one [`HookTable`] per event type. Each table is an
//! ordered list of `(HookPoint, Hook)` bindings. Dispatching a point runs the
//! matching hooks as a middleware chain: every hook receives the event and a
//! [`Next`] that runs the rest of the chain, ending in a terminal supplied by
//! the caller (usually the actual record write). Each hook decides whether its
//! own work happens before or after calling [`Next::run`], and returns a
//! [`HookOutcome`] to its caller.
//!
//! The registry is built once at start-up by [`default_registry`] and shared
//! read-only through the application state.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};

use crate::models::{Organisation, OrganisationDocument, User};
use crate::records::{Collection, StoreError};

pub mod document_versions;
pub mod event;
pub mod first_user;
pub mod membership;
pub mod static_files;
pub mod terminate;

pub use document_versions::DocumentVersionHook;
pub use event::{RecordEvent, ServeEvent, TerminateEvent, UploadedFile};
pub use first_user::FirstUserAdminHook;
pub use membership::OrganisationMembershipHook;
pub use static_files::StaticFilesHook;
pub use terminate::TerminationLogHook;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookPoint {
    Serve,
    Terminate,
    RecordAfterCreateSuccess(Collection),
    RecordCreateRequest(Collection),
    RecordCreate(Collection),
    RecordUpdate(Collection),
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("no uploaded file found for field `{0}`")]
    MissingUpload(&'static str),
    #[error("update event carries no pre-update record")]
    MissingOriginal,
    #[error("document {0} has reached the highest version number")]
    VersionLimit(uuid::Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of running a hook (and, transitively, the rest of its chain).
#[derive(Debug)]
#[must_use]
pub enum HookOutcome {
    Continue,
    /// A best-effort side effect failed; the primary operation still stands.
    ContinueWithWarning(Vec<String>),
    Abort(HookError),
}

impl HookOutcome {
    pub fn warning(message: impl Into<String>) -> Self {
        HookOutcome::ContinueWithWarning(vec![message.into()])
    }

    pub fn abort(error: impl Into<HookError>) -> Self {
        HookOutcome::Abort(error.into())
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, HookOutcome::Abort(_))
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            HookOutcome::ContinueWithWarning(warnings) => warnings,
            _ => &[],
        }
    }

    /// Combines two outcomes: an abort wins, warnings accumulate in order.
    pub fn merge(self, later: HookOutcome) -> HookOutcome {
        match (self, later) {
            (HookOutcome::Abort(err), _) | (_, HookOutcome::Abort(err)) => HookOutcome::Abort(err),
            (HookOutcome::Continue, other) => other,
            (warned @ HookOutcome::ContinueWithWarning(_), HookOutcome::Continue) => warned,
            (
                HookOutcome::ContinueWithWarning(mut first),
                HookOutcome::ContinueWithWarning(second),
            ) => {
                first.extend(second);
                HookOutcome::ContinueWithWarning(first)
            }
        }
    }

    pub fn into_result(self) -> Result<Vec<String>, HookError> {
        match self {
            HookOutcome::Continue => Ok(Vec::new()),
            HookOutcome::ContinueWithWarning(warnings) => Ok(warnings),
            HookOutcome::Abort(err) => Err(err),
        }
    }
}

pub trait Hook<E>: Send + Sync {
    fn name(&self) -> &'static str;

    fn handle(&self, event: &mut E, next: Next<'_, E>) -> HookOutcome;
}

/// The remainder of a hook chain. Running it consumes it, so a hook can
/// continue the chain at most once.
pub struct Next<'a, E> {
    hooks: &'a [Arc<dyn Hook<E>>],
    terminal: &'a mut dyn FnMut(&mut E) -> HookOutcome,
}

impl<'a, E> Next<'a, E> {
    pub fn run(self, event: &mut E) -> HookOutcome {
        let Next { hooks, terminal } = self;
        match hooks.split_first() {
            Some((hook, rest)) => {
                trace!(hook = hook.name(), "running hook");
                hook.handle(
                    event,
                    Next {
                        hooks: rest,
                        terminal,
                    },
                )
            }
            None => (*terminal)(event),
        }
    }
}

pub struct HookTable<E> {
    bindings: Vec<(HookPoint, Arc<dyn Hook<E>>)>,
}

impl<E> Default for HookTable<E> {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }
}

impl<E: 'static> HookTable<E> {
    pub fn bind<H>(&mut self, point: HookPoint, hook: H) -> &mut Self
    where
        H: Hook<E> + 'static,
    {
        self.bindings.push((point, Arc::new(hook)));
        self
    }

    /// Names of the hooks bound to `point`, in the order they run.
    pub fn names_for(&self, point: HookPoint) -> Vec<&'static str> {
        self.bindings
            .iter()
            .filter(|(bound, _)| *bound == point)
            .map(|(_, hook)| hook.name())
            .collect()
    }

    pub fn dispatch<F>(&self, point: HookPoint, event: &mut E, mut terminal: F) -> HookOutcome
    where
        F: FnMut(&mut E) -> HookOutcome,
    {
        let chain: Vec<Arc<dyn Hook<E>>> = self
            .bindings
            .iter()
            .filter(|(bound, _)| *bound == point)
            .map(|(_, hook)| Arc::clone(hook))
            .collect();
        debug!(?point, hooks = chain.len(), "dispatching hook chain");

        Next {
            hooks: &chain,
            terminal: &mut terminal,
        }
        .run(event)
    }
}

#[derive(Default)]
pub struct HookRegistry {
    pub serve: HookTable<ServeEvent>,
    pub terminate: HookTable<TerminateEvent>,
    pub users: HookTable<RecordEvent<User>>,
    pub organisations: HookTable<RecordEvent<Organisation>>,
    pub documents: HookTable<RecordEvent<OrganisationDocument>>,
}

/// The application's hook bindings.
pub fn default_registry() -> HookRegistry {
    let mut registry = HookRegistry::default();
    registry.serve.bind(HookPoint::Serve, StaticFilesHook);
    registry
        .terminate
        .bind(HookPoint::Terminate, TerminationLogHook);
    registry.users.bind(
        HookPoint::RecordAfterCreateSuccess(Collection::Users),
        FirstUserAdminHook,
    );
    registry.organisations.bind(
        HookPoint::RecordCreateRequest(Collection::Organisations),
        OrganisationMembershipHook,
    );
    registry
        .documents
        .bind(
            HookPoint::RecordCreate(Collection::OrganisationDocuments),
            DocumentVersionHook::on_create(),
        )
        .bind(
            HookPoint::RecordUpdate(Collection::OrganisationDocuments),
            DocumentVersionHook::on_update(),
        );
    registry
}
