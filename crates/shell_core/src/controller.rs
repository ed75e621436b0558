//! Controller contract and the default controller.

use std::{collections::BTreeMap, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::Value;
use shared::domain::{ControllerHandle, ElementId, ViewHandle};

use crate::context::NavigationContext;

/// Builds a controller from its freshly loaded view and the page config.
pub type ControllerFactory =
    Arc<dyn Fn(ViewHandle, &Value) -> anyhow::Result<Box<dyn PageController>> + Send + Sync>;

pub fn factory<F>(build: F) -> ControllerFactory
where
    F: Fn(ViewHandle, &Value) -> anyhow::Result<Box<dyn PageController>> + Send + Sync + 'static,
{
    Arc::new(build)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionEvent {
    pub event: String,
    pub element: ElementId,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionTarget {
    /// Name of an action the controller exposes.
    Method(String),
    /// Inline body run with the controller as its context.
    Inline(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAction {
    pub element: ElementId,
    pub event: String,
    pub target: ActionTarget,
}

impl ResolvedAction {
    pub fn name(&self) -> &str {
        match &self.target {
            ActionTarget::Method(name) | ActionTarget::Inline(name) => name,
        }
    }
}

/// Result of post-construction wiring, handed to [`PageController::view_ready`].
#[derive(Debug, Clone, PartialEq)]
pub struct WiredView {
    pub handle: ControllerHandle,
    pub view: ViewHandle,
    pub refs: BTreeMap<String, ElementId>,
    pub actions: Vec<ResolvedAction>,
}

/// Lifecycle contract for a page controller. Every hook has a no-op default.
#[async_trait]
pub trait PageController: Send {
    fn view(&self) -> ViewHandle;

    /// Runs once, after refs and actions are wired.
    async fn view_ready(&mut self, _view: &WiredView) -> anyhow::Result<()> {
        Ok(())
    }

    async fn before_navigate_in(&mut self, _ctx: &NavigationContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_navigate_in(&mut self, _ctx: &NavigationContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn before_navigate_out(&mut self, _ctx: &NavigationContext) -> anyhow::Result<()> {
        Ok(())
    }

    async fn after_navigate_out(&mut self, _ctx: &NavigationContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn has_action(&self, _name: &str) -> bool {
        false
    }

    async fn invoke_action(&mut self, name: &str, _event: &ActionEvent) -> anyhow::Result<()> {
        Err(anyhow!("controller has no action named '{name}'"))
    }

    async fn run_inline(&mut self, body: &str, event: &ActionEvent) -> anyhow::Result<()> {
        tracing::debug!(event = %event.event, body, "inline action ignored by controller");
        Ok(())
    }

    /// Root of the bindable model, if the controller exposes one.
    fn model_mut(&mut self) -> Option<&mut Value> {
        None
    }
}

/// Used for pages with no dedicated controller. Exposes its page config as
/// the bindable model.
#[derive(Debug, Clone)]
pub struct BaseController {
    view: ViewHandle,
    config: Value,
    refs: BTreeMap<String, ElementId>,
}

impl BaseController {
    pub fn new(view: ViewHandle, config: &Value) -> Self {
        Self {
            view,
            config: config.clone(),
            refs: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &Value {
        &self.config
    }

    pub fn refs(&self) -> &BTreeMap<String, ElementId> {
        &self.refs
    }
}

#[async_trait]
impl PageController for BaseController {
    fn view(&self) -> ViewHandle {
        self.view
    }

    async fn view_ready(&mut self, view: &WiredView) -> anyhow::Result<()> {
        self.refs = view.refs.clone();
        Ok(())
    }

    fn model_mut(&mut self) -> Option<&mut Value> {
        Some(&mut self.config)
    }
}
