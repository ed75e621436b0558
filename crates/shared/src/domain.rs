use std::{fmt, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u32>().map(Self)
            }
        }
    };
}

id_newtype!(ControllerHandle);
id_newtype!(ElementId);

impl ControllerHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ElementId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Root element of a materialized view fragment.
pub type ViewHandle = ElementId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandoffMode {
    /// Outgoing half completes before the incoming half starts.
    #[default]
    Sequential,
    /// Incoming view attaches immediately; teardown and setup interleave.
    Overlapped,
}

impl FromStr for HandoffMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "overlapped" => Ok(Self::Overlapped),
            other => Err(format!("unknown handoff mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavState {
    Idle,
    Resolving,
    Transitioning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    ViewReady,
    BeforeNavigateIn,
    AfterNavigateIn,
    BeforeNavigateOut,
    AfterNavigateOut,
}

impl LifecyclePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ViewReady => "view_ready",
            Self::BeforeNavigateIn => "before_navigate_in",
            Self::AfterNavigateIn => "after_navigate_in",
            Self::BeforeNavigateOut => "before_navigate_out",
            Self::AfterNavigateOut => "after_navigate_out",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationVerdict {
    Proceed,
    Veto,
}

impl NavigationVerdict {
    pub fn is_veto(self) -> bool {
        self == Self::Veto
    }
}
