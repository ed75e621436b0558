use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use collection::{KeyOrderMirror, KeyedCollection};
use serde_json::Value;
use shared::domain::ViewHandle;
use shell_core::{
    factory, ActionEvent, ControllerRegistry, NavigationContext, PageController, WiredView,
};

pub const INBOX_CLASS: &str = "demo.Inbox";

pub fn registry() -> ControllerRegistry {
    let mut registry = ControllerRegistry::new();
    registry.register(
        "Demo.Pages.HomeController",
        factory(|view, _config| Ok(Box::new(HomeController::new(view)) as Box<dyn PageController>)),
    );
    registry.register_class(
        INBOX_CLASS,
        factory(|view, config| {
            Ok(Box::new(InboxController::new(view, config)?) as Box<dyn PageController>)
        }),
    );
    registry
}

pub struct HomeController {
    view: ViewHandle,
    visits: u32,
}

impl HomeController {
    pub fn new(view: ViewHandle) -> Self {
        Self { view, visits: 0 }
    }
}

#[async_trait]
impl PageController for HomeController {
    fn view(&self) -> ViewHandle {
        self.view
    }

    async fn after_navigate_in(&mut self, ctx: &NavigationContext) -> Result<()> {
        self.visits += 1;
        tracing::info!(visits = self.visits, delta = ctx.delta, "home shown");
        Ok(())
    }

    fn has_action(&self, name: &str) -> bool {
        name == "greet"
    }

    async fn invoke_action(&mut self, name: &str, event: &ActionEvent) -> Result<()> {
        tracing::info!(action = name, element = %event.element, "hello from home");
        Ok(())
    }
}

/// Inbox page: keeps its messages in a [`KeyedCollection`] and re-sorts them
/// every time the page is entered.
pub struct InboxController {
    view: ViewHandle,
    model: Value,
    messages: KeyedCollection<Value>,
    mirror: KeyOrderMirror,
    newest_first: bool,
}

impl InboxController {
    pub fn new(view: ViewHandle, config: &Value) -> Result<Self> {
        let mut messages = KeyedCollection::with_key_field("id");
        let mirror = KeyOrderMirror::new();
        messages.subscribe(Box::new(mirror.clone()));

        let seed = config
            .get("messages")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        messages.set_data(seed).context("inbox messages")?;

        Ok(Self {
            view,
            model: config.clone(),
            messages,
            mirror,
            newest_first: true,
        })
    }

    fn sort(&mut self) -> usize {
        let newest_first = self.newest_first;
        let moves = self.messages.sort_by(|a, b| {
            let order = received(a).cmp(&received(b));
            if newest_first {
                order.reverse()
            } else {
                order
            }
        });
        tracing::info!(moves, order = ?self.mirror.keys(), newest_first, "inbox sorted");
        moves
    }
}

fn received(message: &Value) -> i64 {
    message
        .get("received")
        .and_then(Value::as_i64)
        .unwrap_or_default()
}

#[async_trait]
impl PageController for InboxController {
    fn view(&self) -> ViewHandle {
        self.view
    }

    async fn view_ready(&mut self, view: &WiredView) -> Result<()> {
        if !view.refs.contains_key("list") {
            return Err(anyhow!("inbox view has no 'list' element"));
        }
        Ok(())
    }

    async fn before_navigate_in(&mut self, _ctx: &NavigationContext) -> Result<()> {
        self.sort();
        Ok(())
    }

    fn has_action(&self, name: &str) -> bool {
        matches!(name, "sort" | "archive")
    }

    async fn invoke_action(&mut self, name: &str, event: &ActionEvent) -> Result<()> {
        match name {
            "sort" => {
                self.newest_first = !self.newest_first;
                self.sort();
            }
            "archive" => {
                let key = match event.payload.get("id").and_then(Value::as_str) {
                    Some(id) => id.to_string(),
                    None => self
                        .messages
                        .keys()
                        .next()
                        .map(str::to_string)
                        .ok_or_else(|| anyhow!("inbox is empty"))?,
                };
                if self.messages.remove(&key).is_some() {
                    tracing::info!(key = %key, left = self.messages.count(), "message archived");
                }
            }
            other => return Err(anyhow!("inbox has no action named '{other}'")),
        }
        Ok(())
    }

    fn model_mut(&mut self) -> Option<&mut Value> {
        Some(&mut self.model)
    }
}
