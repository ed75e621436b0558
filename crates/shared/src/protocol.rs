use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::ControllerHandle,
    error::ShellFailure,
};

/// A page as written in configuration: a bare name or a full definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageDescriptor {
    Name(String),
    Definition {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        view: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        controller: Option<String>,
        #[serde(
            default,
            alias = "controllerClass",
            skip_serializing_if = "Option::is_none"
        )]
        controller_class: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        config: Option<Value>,
    },
}

impl PageDescriptor {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Definition { name, .. } => name,
        }
    }
}

impl From<&str> for PageDescriptor {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

/// Normalized, immutable page definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDefinition {
    pub name: String,
    pub view: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_class: Option<String>,
    pub config: Value,
}

impl From<PageDescriptor> for PageDefinition {
    fn from(value: PageDescriptor) -> Self {
        match value {
            PageDescriptor::Name(name) => Self {
                view: name.clone(),
                name,
                controller: None,
                controller_class: None,
                config: Value::Object(Default::default()),
            },
            PageDescriptor::Definition {
                name,
                view,
                controller,
                controller_class,
                config,
            } => Self {
                view: view.unwrap_or_else(|| name.clone()),
                name,
                controller,
                controller_class,
                config: match config {
                    Some(Value::Null) | None => Value::Object(Default::default()),
                    Some(config) => config,
                },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
}

impl HistoryEntry {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            state: None,
        }
    }
}

/// Back/forward stacks as seen by the host navigation facility at the moment
/// a navigation event is delivered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    #[serde(default)]
    pub back_stack: Vec<HistoryEntry>,
    #[serde(default)]
    pub forward_stack: Vec<HistoryEntry>,
}

impl HistorySnapshot {
    /// Location of the page being left, per the delta convention: going back
    /// reads the forward stack, going forward reads the back stack, a plain
    /// navigate reads the top of the back stack.
    pub fn previous_location(&self, delta: i32) -> Option<&str> {
        let entry = if delta < 0 {
            let len = self.forward_stack.len() as i64;
            let index = (len + i64::from(delta)).max(0) as usize;
            self.forward_stack.get(index)
        } else if delta > 0 {
            let len = self.back_stack.len() as i64;
            let index = (len - i64::from(delta)).max(0) as usize;
            self.back_stack.get(index)
        } else {
            self.back_stack.last()
        };
        entry.map(|entry| entry.location.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ShellEvent {
    Navigated {
        from: Option<String>,
        to: String,
        handle: ControllerHandle,
        delta: i32,
        created: bool,
        at: DateTime<Utc>,
    },
    Vetoed {
        target: String,
    },
    ActionDispatched {
        page: String,
        event: String,
        action: String,
    },
    Info(String),
    Error(ShellFailure),
}
