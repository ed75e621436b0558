use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use shared::domain::ControllerHandle;

/// State carried into a navigation. Lookups read the own layer first and fall
/// back to the inherited layer, which is never modified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarryState {
    own: Map<String, Value>,
    inherited: Option<Value>,
}

impl CarryState {
    /// Fresh, empty state layered over `parent`.
    pub fn inheriting(parent: Option<Value>) -> Self {
        Self {
            own: Map::new(),
            inherited: parent,
        }
    }

    /// State whose own layer is a copy of `value`'s fields. Non-object values
    /// are kept as the inherited layer.
    pub fn from_value(value: Option<Value>) -> Self {
        match value {
            Some(Value::Object(own)) => Self {
                own,
                inherited: None,
            },
            other => Self::inheriting(other),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.own
            .get(key)
            .or_else(|| self.inherited.as_ref().and_then(|parent| parent.get(key)))
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.own.insert(key.into(), value);
    }

    pub fn inherited(&self) -> Option<&Value> {
        self.inherited.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.own.is_empty() && self.inherited.is_none()
    }
}

/// Lives for one navigation transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationContext {
    pub target: String,
    pub delta: i32,
    pub previous: Option<ControllerHandle>,
    pub state: CarryState,
    pub started_at: DateTime<Utc>,
}

impl NavigationContext {
    pub fn new(
        target: impl Into<String>,
        delta: i32,
        previous: Option<ControllerHandle>,
        caller_state: Option<Value>,
    ) -> Self {
        let state = if delta == 0 {
            CarryState::inheriting(caller_state)
        } else {
            CarryState::from_value(caller_state)
        };
        Self {
            target: target.into(),
            delta,
            previous,
            state,
            started_at: Utc::now(),
        }
    }
}
