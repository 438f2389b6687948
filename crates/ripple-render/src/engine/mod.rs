#![forbid(unsafe_code)]

//! The reconciliation engine.
//!
//! [`Engine`] walks a descriptor tree, creates backend nodes through a
//! [`RenderStrategy`], subscribes to every signal embedded in the tree, and
//! re-renders the affected subtree when one of them changes, patching
//! backend nodes in place where the backend allows it.
//!
//! # Architecture
//!
//! - `arena`: rendered nodes indexed by [`RenderId`], with explicit removal.
//! - `build`: first render of a descriptor, component invocation, and
//!   async/stream suspension.
//! - `reconcile`: in-place patching, keyed child matching, backend node
//!   placement, and disposal.
//!
//! Signal listeners never touch engine state directly. They enqueue a job
//! and drain the queue unless a drain is already running higher up the
//! stack, so a signal written while the engine is mid-render is applied
//! after the current pass completes.
//!
//! # Invariants
//!
//! 1. Every subscription a rendered node owns is disposed exactly once, on
//!    replacement or unmount.
//! 2. After a host's children are reconciled, the backend children of its
//!    node are exactly the flattened backend nodes of its rendered children,
//!    in order.
//! 3. Re-rendering a signal with an equal value performs no backend
//!    mutation.
//!
//! # Failure Modes
//!
//! - **Component error or panic**: the error fallback renders in its place;
//!   siblings are unaffected.
//! - **Signal value with no element form**: the error fallback renders in
//!   place of that dynamic marker only.
//! - **Update storm**: a drain stops after `max_flush_jobs` jobs and logs
//!   [`RenderError::FlushOverflow`].
//! - **Engine called from inside a component**: panics (engine state is
//!   already borrowed).

mod arena;
mod build;
mod reconcile;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use futures::executor::LocalSpawner;
use ripple_core::untracked;

pub use arena::{RenderId, RenderedInfo, RenderedKind};

use crate::config::EngineConfig;
use crate::context::ContextOverlay;
use crate::element::{Element, fragment};
use crate::error::RenderError;
use crate::scheduler::Scheduler;
use crate::strategy::RenderStrategy;
use crate::value::Value;
use arena::{Arena, RenderedNode};

pub(crate) struct EngineState<S: RenderStrategy> {
    pub(crate) strategy: S,
    pub(crate) arena: Arena<S::Node>,
}

pub(crate) enum Job {
    /// A dynamic marker's signal changed.
    Content { id: RenderId, value: Value },
    /// A signal-valued prop changed.
    Prop {
        id: RenderId,
        key: Rc<str>,
        value: Value,
    },
}

pub(crate) struct EngineInner<S: RenderStrategy> {
    state: RefCell<EngineState<S>>,
    jobs: RefCell<VecDeque<Job>>,
    busy: Cell<bool>,
    pub(crate) scheduler: Scheduler,
    pub(crate) config: EngineConfig,
    this: Weak<EngineInner<S>>,
}

struct BusyGuard<'a>(&'a Cell<bool>);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<S: RenderStrategy + 'static> EngineInner<S> {
    pub(crate) fn enqueue(&self, job: Job) {
        self.jobs.borrow_mut().push_back(job);
        self.drain();
    }

    pub(crate) fn weak(&self) -> Weak<Self> {
        self.this.clone()
    }

    /// Run `f` against engine state, then apply updates it queued.
    fn with_state<R>(&self, f: impl FnOnce(&Self, &mut EngineState<S>) -> R) -> R {
        let nested = self.busy.replace(true);
        let result = {
            let _guard = (!nested).then(|| BusyGuard(&self.busy));
            let mut st = self.state.borrow_mut();
            untracked(|| f(self, &mut st))
        };
        if !nested {
            self.drain();
        }
        result
    }

    fn drain(&self) {
        if self.busy.replace(true) {
            return;
        }
        let _guard = BusyGuard(&self.busy);
        let limit = self.config.max_flush_jobs;
        let mut processed = 0usize;
        loop {
            let next = self.jobs.borrow_mut().pop_front();
            let Some(job) = next else {
                break;
            };
            processed += 1;
            if processed > limit {
                let dropped = {
                    let mut jobs = self.jobs.borrow_mut();
                    let n = jobs.len() + 1;
                    jobs.clear();
                    n
                };
                let err = RenderError::FlushOverflow { limit };
                tracing::error!(error = %err, dropped, "dropping queued updates");
                break;
            }
            let mut st = self.state.borrow_mut();
            untracked(|| self.run_job(&mut st, job));
        }
    }

    fn run_job(&self, st: &mut EngineState<S>, job: Job) {
        match job {
            Job::Content { id, value } => self.update_dynamic(st, id, &value),
            Job::Prop { id, key, value } => {
                let Some(node) = st.arena.get(id).and_then(|n| n.node.clone()) else {
                    tracing::trace!(render_id = %id, "dropping prop update for disposed node");
                    return;
                };
                tracing::trace!(render_id = %id, prop = %key, "signal prop changed");
                st.strategy.set_property(&node, &key, &value);
            }
        }
    }

    /// Report a bookkeeping inconsistency.
    pub(crate) fn violation(&self, what: &str) {
        if self.config.strict {
            panic!("ripple engine invariant violated: {what}");
        }
        tracing::error!(what, "engine invariant violated");
    }
}

/// Backend-agnostic renderer. Cheap to clone; clones share one tree.
pub struct Engine<S: RenderStrategy> {
    inner: Rc<EngineInner<S>>,
}

impl<S: RenderStrategy> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: RenderStrategy> fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl<S: RenderStrategy + 'static> Engine<S> {
    #[must_use]
    pub fn new(strategy: S) -> Self {
        Self::with_config(strategy, EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(strategy: S, config: EngineConfig) -> Self {
        let inner = Rc::new_cyclic(|this| EngineInner {
            state: RefCell::new(EngineState {
                strategy,
                arena: Arena::new(),
            }),
            jobs: RefCell::new(VecDeque::new()),
            busy: Cell::new(false),
            scheduler: Scheduler::new(),
            config,
            this: this.clone(),
        });
        Self { inner }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Render `element` under `overlay` into detached backend nodes.
    ///
    /// The caller places the nodes (see [`backend_nodes`](Self::backend_nodes)).
    /// A dynamic marker with no enclosing element keeps its nodes at the
    /// position the caller gave them, located with
    /// [`RenderStrategy::parent_of`] and [`RenderStrategy::next_sibling`],
    /// as its node count changes.
    pub fn render(&self, element: &Element, overlay: &ContextOverlay) -> RenderId {
        let span = tracing::debug_span!("ripple.render", kind = element.kind().name());
        let _enter = span.enter();
        self.inner
            .with_state(|engine, st| engine.build(st, element, overlay, None))
    }

    /// Render `element` as the content of `container`.
    pub fn mount(&self, container: S::Node, element: &Element) -> RenderId {
        self.mount_with(container, element, &ContextOverlay::new())
    }

    pub fn mount_with(&self, container: S::Node, element: &Element, overlay: &ContextOverlay) -> RenderId {
        let span = tracing::debug_span!("ripple.mount", kind = element.kind().name());
        let _enter = span.enter();
        self.inner.with_state(|engine, st| {
            let mut root = RenderedNode::new(fragment([element.clone()]), None, overlay.clone());
            root.node = Some(container);
            root.root = true;
            let id = st.arena.insert(root);
            let child = engine.build(st, element, overlay, Some(id));
            st.arena.set_children(id, vec![child]);
            engine.sync_host(st, id);
            tracing::debug!(render_id = %id, nodes = st.arena.len(), "mounted");
            id
        })
    }

    /// Detach and dispose the subtree rooted at `id`. Idempotent.
    pub fn unmount(&self, id: RenderId) {
        self.inner.with_state(|engine, st| engine.unmount(st, id));
    }

    /// Backend nodes the rendered node contributes to its parent, in order.
    /// For a mount root, the container's current children.
    #[must_use]
    pub fn backend_nodes(&self, id: RenderId) -> Vec<S::Node> {
        let st = self.inner.state.borrow();
        match st.arena.get(id) {
            Some(n) if n.root => n.attached.clone(),
            Some(_) => st.arena.flatten(id),
            None => Vec::new(),
        }
    }

    #[must_use]
    pub fn rendered(&self, id: RenderId) -> Option<RenderedInfo> {
        self.inner.state.borrow().arena.info(id)
    }

    /// Number of live rendered nodes.
    #[must_use]
    pub fn live_nodes(&self) -> usize {
        self.inner.state.borrow().arena.len()
    }

    /// Number of live signal subscriptions and task handles held by rendered
    /// nodes.
    #[must_use]
    pub fn live_subscriptions(&self) -> usize {
        self.inner.state.borrow().arena.subscription_count()
    }

    /// Borrow the backend.
    pub fn with_strategy<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.inner.state.borrow_mut().strategy)
    }

    /// Poll async and streaming components until none can progress.
    pub fn run_until_stalled(&self) {
        self.inner.scheduler.run_until_stalled();
    }

    /// Spawner for tasks that should run alongside component tasks.
    #[must_use]
    pub fn spawner(&self) -> LocalSpawner {
        self.inner.scheduler.spawner()
    }
}
