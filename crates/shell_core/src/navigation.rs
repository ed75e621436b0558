//! The navigation state machine: controller cache plus the ordered handoff
//! between the outgoing and incoming controller.

use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use shared::{
    domain::{
        ControllerHandle, ElementId, HandoffMode, LifecyclePhase, NavState, NavigationVerdict,
        ViewHandle,
    },
    error::ShellError,
    protocol::{HistorySnapshot, PageDefinition},
};
use view::{
    load_view, owning_handle, scan_actions, scan_bindings, scan_refs, tag_handle, BindingWiring,
    DisplayTree, ViewLoader,
};

use crate::{
    binding::{BindingSet, ObservableModel},
    config::ShellConfig,
    context::NavigationContext,
    controller::{ActionEvent, ActionTarget, PageController, ResolvedAction, WiredView},
    registry::{ControllerRegistry, PageTable},
};

struct ControllerEntry {
    handle: ControllerHandle,
    page: String,
    view: ViewHandle,
    controller: Box<dyn PageController>,
    actions: Vec<ResolvedAction>,
    bindings: Vec<BindingWiring>,
    models: BindingSet,
}

impl ControllerEntry {
    async fn before_in(&mut self, ctx: &NavigationContext) -> Result<(), ShellError> {
        tracing::debug!(page = %self.page, handle = %self.handle, "before navigate in");
        let page = self.page.clone();
        self.controller
            .before_navigate_in(ctx)
            .await
            .map_err(|source| ShellError::Hook {
                page,
                phase: LifecyclePhase::BeforeNavigateIn,
                source,
            })
    }

    async fn after_in(&mut self, ctx: &NavigationContext) -> Result<(), ShellError> {
        tracing::debug!(page = %self.page, handle = %self.handle, "after navigate in");
        let page = self.page.clone();
        self.controller
            .after_navigate_in(ctx)
            .await
            .map_err(|source| ShellError::Hook {
                page,
                phase: LifecyclePhase::AfterNavigateIn,
                source,
            })
    }

    async fn before_out(&mut self, ctx: &NavigationContext) -> Result<(), ShellError> {
        tracing::debug!(page = %self.page, handle = %self.handle, "before navigate out");
        let page = self.page.clone();
        self.controller
            .before_navigate_out(ctx)
            .await
            .map_err(|source| ShellError::Hook {
                page,
                phase: LifecyclePhase::BeforeNavigateOut,
                source,
            })
    }

    async fn after_out(&mut self, ctx: &NavigationContext) -> Result<(), ShellError> {
        tracing::debug!(page = %self.page, handle = %self.handle, "after navigate out");
        let page = self.page.clone();
        self.controller
            .after_navigate_out(ctx)
            .await
            .map_err(|source| ShellError::Hook {
                page,
                phase: LifecyclePhase::AfterNavigateOut,
                source,
            })
    }

    /// Post-construction wiring: refs, actions, bindings, then `view_ready`.
    async fn wire(&mut self, tree: &DisplayTree) -> Result<(), ShellError> {
        let refs = scan_refs(tree, self.view);
        let actions = scan_actions(tree, self.view).map_err(|error| ShellError::Construction {
            page: self.page.clone(),
            source: error.into(),
        })?;
        let controller = &self.controller;
        self.actions = actions
            .into_iter()
            .map(|wiring| {
                let target = if controller.has_action(&wiring.action) {
                    ActionTarget::Method(wiring.action)
                } else {
                    ActionTarget::Inline(wiring.action)
                };
                ResolvedAction {
                    element: wiring.element,
                    event: wiring.event,
                    target,
                }
            })
            .collect();
        self.bindings = scan_bindings(tree, self.view);

        let wired = WiredView {
            handle: self.handle,
            view: self.view,
            refs,
            actions: self.actions.clone(),
        };
        let page = self.page.clone();
        self.controller
            .view_ready(&wired)
            .await
            .map_err(|source| ShellError::Hook {
                page,
                phase: LifecyclePhase::ViewReady,
                source,
            })
    }

    /// Turns every `data-shell-bind` path of the view into an observable
    /// model. Paths bound on an earlier visit are kept.
    fn materialize_bindings(&mut self) -> Result<(), ShellError> {
        for binding in &self.bindings {
            if self.models.contains(&binding.path) {
                continue;
            }
            let Some(model) = self.controller.model_mut() else {
                let segment = binding.path.split('.').next().unwrap_or_default();
                return Err(ShellError::ModelPath {
                    path: binding.path.clone(),
                    segment: segment.to_string(),
                });
            };
            self.models.materialize(model, &binding.path)?;
        }
        Ok(())
    }
}

/// Returns disjoint mutable references to two distinct cache entries.
fn pair_mut(
    entries: &mut [ControllerEntry],
    first: ControllerHandle,
    second: ControllerHandle,
) -> Option<(&mut ControllerEntry, &mut ControllerEntry)> {
    let (a, b) = (first.index(), second.index());
    if a == b || a >= entries.len() || b >= entries.len() {
        return None;
    }
    if a < b {
        let (left, right) = entries.split_at_mut(b);
        Some((&mut left[a], &mut right[0]))
    } else {
        let (left, right) = entries.split_at_mut(a);
        Some((&mut right[0], &mut left[b]))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationOutcome {
    pub page: String,
    pub current: ControllerHandle,
    pub previous: Option<ControllerHandle>,
    /// True when the controller was constructed by this navigation.
    pub created: bool,
}

/// Owns the controller cache, the display tree and the lifecycle protocol.
pub struct AppShell {
    pages: PageTable,
    registry: ControllerRegistry,
    loader: Arc<dyn ViewLoader>,
    tree: DisplayTree,
    entries: Vec<ControllerEntry>,
    by_page: HashMap<String, ControllerHandle>,
    state: NavState,
    current: Option<ControllerHandle>,
    home_page: String,
    handoff: HandoffMode,
}

impl AppShell {
    pub fn new(
        config: ShellConfig,
        mut registry: ControllerRegistry,
        loader: Arc<dyn ViewLoader>,
    ) -> Result<Self, ShellError> {
        config.validate()?;
        let pages = PageTable::new(config.pages)?;
        if let Some(namespace) = config.namespace.as_deref() {
            registry.use_namespace(namespace);
        }
        if !pages.contains(&config.home_page) {
            tracing::warn!(home_page = %config.home_page, "home page has no page definition");
        }

        Ok(Self {
            pages,
            registry,
            loader,
            tree: DisplayTree::new(),
            entries: Vec::new(),
            by_page: HashMap::new(),
            state: NavState::Idle,
            current: None,
            home_page: config.home_page,
            handoff: config.handoff,
        })
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn current(&self) -> Option<ControllerHandle> {
        self.current
    }

    pub fn home_page(&self) -> &str {
        &self.home_page
    }

    pub fn handoff(&self) -> HandoffMode {
        self.handoff
    }

    pub fn pages(&self) -> &PageTable {
        &self.pages
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    pub fn tree(&self) -> &DisplayTree {
        &self.tree
    }

    pub fn controller_count(&self) -> usize {
        self.entries.len()
    }

    pub fn handle_for(&self, page: &str) -> Option<ControllerHandle> {
        self.by_page.get(page).copied()
    }

    pub fn page_of(&self, handle: ControllerHandle) -> Option<&str> {
        self.entries
            .get(handle.index())
            .map(|entry| entry.page.as_str())
    }

    pub fn view_of(&self, handle: ControllerHandle) -> Option<ViewHandle> {
        self.entries.get(handle.index()).map(|entry| entry.view)
    }

    pub fn controller(&self, handle: ControllerHandle) -> Option<&dyn PageController> {
        self.entries
            .get(handle.index())
            .map(|entry| entry.controller.as_ref())
    }

    pub fn bound_model(&self, handle: ControllerHandle, path: &str) -> Option<&ObservableModel> {
        self.entries.get(handle.index())?.models.get(path)
    }

    /// Recovers the controller owning `element` by walking its ancestors.
    pub fn owning_controller(&self, element: ElementId) -> Option<ControllerHandle> {
        owning_handle(&self.tree, element).filter(|handle| handle.index() < self.entries.len())
    }

    /// Unknown targets are vetoed; the host should drop the navigation.
    pub fn before_navigate(&self, target: &str) -> NavigationVerdict {
        if self.pages.contains(target) {
            NavigationVerdict::Proceed
        } else {
            tracing::debug!(page = target, "navigation vetoed: no page definition");
            NavigationVerdict::Veto
        }
    }

    pub async fn launch(&mut self) -> Result<NavigationOutcome, ShellError> {
        let home = self.home_page.clone();
        self.navigate(&home, 0, &HistorySnapshot::default(), None)
            .await
    }

    /// Brings a machine left mid-transition by a dropped `navigate` future
    /// back to [`NavState::Idle`], leaving only the current page's view
    /// attached. Returns false when there was nothing to recover.
    pub fn recover(&mut self) -> bool {
        if self.state == NavState::Idle {
            return false;
        }
        tracing::warn!(state = ?self.state, "recovering from an abandoned transition");
        for entry in &self.entries {
            if Some(entry.handle) != self.current {
                self.tree.detach(entry.view);
            }
        }
        if let Some(view) = self.current.and_then(|handle| self.view_of(handle)) {
            attach(&mut self.tree, view);
        }
        self.state = NavState::Idle;
        true
    }

    /// Runs one navigation transaction to completion. Failures are logged and
    /// returned; the machine is back in [`NavState::Idle`] either way.
    pub async fn navigate(
        &mut self,
        target: &str,
        delta: i32,
        history: &HistorySnapshot,
        caller_state: Option<Value>,
    ) -> Result<NavigationOutcome, ShellError> {
        if self.state != NavState::Idle {
            return Err(ShellError::NavigationInFlight {
                target: target.to_string(),
            });
        }

        let previous = history
            .previous_location(delta)
            .and_then(|location| self.by_page.get(location).copied());
        tracing::info!(
            page = target,
            delta,
            previous = ?previous.and_then(|handle| self.page_of(handle)),
            "navigating"
        );

        let ctx = NavigationContext::new(target, delta, previous, caller_state);
        self.state = NavState::Resolving;
        let result = self.run_transition(target, &ctx).await;
        self.state = NavState::Idle;

        if let Err(error) = &result {
            tracing::error!(page = target, delta, %error, "navigation failed");
        }
        result
    }

    async fn run_transition(
        &mut self,
        target: &str,
        ctx: &NavigationContext,
    ) -> Result<NavigationOutcome, ShellError> {
        let (next, created) = self.load_page(target).await?;

        self.state = NavState::Transitioning;
        match ctx.previous {
            Some(previous) if previous != next => self.hand_off(previous, next, ctx).await?,
            Some(same) => self.re_enter(same, ctx).await?,
            None => self.enter(next, ctx).await?,
        }
        self.current = Some(next);

        Ok(NavigationOutcome {
            page: target.to_string(),
            current: next,
            previous: ctx.previous,
            created,
        })
    }

    /// Returns the cached controller for `name`, building it on first use.
    /// A controller is cached only once it is fully wired; on failure its
    /// view is removed from the tree and the next visit starts over.
    async fn load_page(&mut self, name: &str) -> Result<(ControllerHandle, bool), ShellError> {
        if let Some(handle) = self.by_page.get(name) {
            return Ok((*handle, false));
        }

        let page: PageDefinition =
            self.pages
                .get(name)
                .cloned()
                .ok_or_else(|| ShellError::UnknownPage {
                    name: name.to_string(),
                })?;

        let view = load_view(self.loader.as_ref(), &mut self.tree, &page.view)
            .await
            .map_err(|source| ShellError::ViewLoad {
                view: page.view.clone(),
                source,
            })?;

        let entry = match self.stage(&page, view).await {
            Ok(entry) => entry,
            Err(error) => {
                let removed = self.tree.remove_subtree(view);
                tracing::debug!(page = %page.name, removed, "discarded view of failed page");
                return Err(error);
            }
        };

        let handle = entry.handle;
        self.entries.push(entry);
        self.by_page.insert(page.name, handle);
        Ok((handle, true))
    }

    /// Resolves, constructs and wires the controller for a freshly loaded
    /// view without touching the cache.
    async fn stage(
        &mut self,
        page: &PageDefinition,
        view: ViewHandle,
    ) -> Result<ControllerEntry, ShellError> {
        // Resolved after the view loads: loading may make controller code
        // available.
        let resolved = self.registry.resolve(page).await?;
        let controller =
            resolved
                .construct(view, &page.config)
                .map_err(|source| ShellError::Construction {
                    page: page.name.clone(),
                    source,
                })?;

        let handle = ControllerHandle(self.entries.len() as u32);
        let mut entry = ControllerEntry {
            handle,
            page: page.name.clone(),
            view,
            controller,
            actions: Vec::new(),
            bindings: Vec::new(),
            models: BindingSet::new(),
        };
        tag_handle(&mut self.tree, view, handle);
        entry.wire(&self.tree).await?;
        tracing::info!(page = %page.name, %handle, controller = %resolved.key, "controller created");
        Ok(entry)
    }

    /// Incoming half only: attach, bind, `before_in`, `after_in`.
    async fn enter(
        &mut self,
        next: ControllerHandle,
        ctx: &NavigationContext,
    ) -> Result<(), ShellError> {
        let Self { tree, entries, .. } = self;
        let Some(entry) = entries.get_mut(next.index()) else {
            return Ok(());
        };
        attach(tree, entry.view);
        entry.materialize_bindings()?;
        entry.before_in(ctx).await?;
        entry.after_in(ctx).await
    }

    /// The outgoing and incoming controller are the same instance.
    async fn re_enter(
        &mut self,
        handle: ControllerHandle,
        ctx: &NavigationContext,
    ) -> Result<(), ShellError> {
        let Self { tree, entries, .. } = self;
        let Some(entry) = entries.get_mut(handle.index()) else {
            return Ok(());
        };
        entry.before_out(ctx).await?;
        tree.detach(entry.view);
        entry.after_out(ctx).await?;
        attach(tree, entry.view);
        entry.materialize_bindings()?;
        entry.before_in(ctx).await?;
        entry.after_in(ctx).await
    }

    async fn hand_off(
        &mut self,
        previous: ControllerHandle,
        next: ControllerHandle,
        ctx: &NavigationContext,
    ) -> Result<(), ShellError> {
        let handoff = self.handoff;
        let Self { tree, entries, .. } = self;
        let Some((outgoing, incoming)) = pair_mut(entries, previous, next) else {
            return Ok(());
        };

        match handoff {
            HandoffMode::Sequential => {
                outgoing.before_out(ctx).await?;
                tree.detach(outgoing.view);
                outgoing.after_out(ctx).await?;

                attach(tree, incoming.view);
                incoming.materialize_bindings()?;
                incoming.before_in(ctx).await?;
                incoming.after_in(ctx).await
            }
            HandoffMode::Overlapped => {
                attach(tree, incoming.view);
                let outgoing_view = outgoing.view;
                let teardown = async {
                    outgoing.before_out(ctx).await?;
                    tree.detach(outgoing_view);
                    Ok::<_, ShellError>(())
                };
                let setup = async {
                    incoming.materialize_bindings()?;
                    incoming.before_in(ctx).await
                };
                let (teardown, setup) = futures::join!(teardown, setup);
                teardown?;
                setup?;

                incoming.after_in(ctx).await?;
                outgoing.after_out(ctx).await
            }
        }
    }

    /// Runs the action wired for `event` on `element` or its nearest wired
    /// ancestor within the owning view. Returns the action name, or `None`
    /// when nothing is wired.
    pub async fn dispatch_action(
        &mut self,
        element: ElementId,
        event: &str,
        payload: Value,
    ) -> Result<Option<String>, ShellError> {
        let Some(handle) = self.owning_controller(element) else {
            return Ok(None);
        };
        let Self { tree, entries, .. } = self;
        let Some(entry) = entries.get_mut(handle.index()) else {
            return Ok(None);
        };

        let wired = tree.ancestors(element).find_map(|id| {
            entry
                .actions
                .iter()
                .find(|action| action.element == id && action.event == event)
                .cloned()
        });
        let Some(action) = wired else {
            return Ok(None);
        };

        let action_event = ActionEvent {
            event: event.to_string(),
            element,
            payload,
        };
        let result = match &action.target {
            ActionTarget::Method(name) => entry.controller.invoke_action(name, &action_event).await,
            ActionTarget::Inline(body) => entry.controller.run_inline(body, &action_event).await,
        };
        result.map_err(|source| ShellError::Action {
            page: entry.page.clone(),
            action: action.name().to_string(),
            source,
        })?;

        tracing::debug!(page = %entry.page, event, action = action.name(), "action dispatched");
        Ok(Some(action.name().to_string()))
    }
}

fn attach(tree: &mut DisplayTree, view: ViewHandle) {
    let host = tree.host();
    tree.append_child(host, view);
}

#[cfg(test)]
#[path = "tests/navigation_tests.rs"]
mod tests;
