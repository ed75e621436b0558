//! Page controller lifecycle for single-page, multi-view applications.
//!
//! [`AppShell`] resolves a controller for each named page, caches it under a
//! stable [`ControllerHandle`](shared::domain::ControllerHandle), and runs the
//! ordered handoff between the outgoing and incoming controller on every
//! navigation. [`runtime`] serializes navigation requests from a UI thread.

pub mod binding;
pub mod config;
pub mod context;
pub mod controller;
pub mod host;
pub mod navigation;
pub mod registry;
pub mod runtime;

pub use binding::{materialize_path, BindingSet, ObservableModel};
pub use config::{load_config, parse_config, ShellConfig};
pub use context::{CarryState, NavigationContext};
pub use controller::{
    factory, ActionEvent, ActionTarget, BaseController, ControllerFactory, PageController,
    ResolvedAction, WiredView,
};
pub use host::{NavigationHistory, PendingNavigation};
pub use navigation::{AppShell, NavigationOutcome};
pub use registry::{
    ControllerRegistry, ModuleLoader, Namespace, PageTable, ResolutionSource, ResolvedController,
    DEFAULT_CONTROLLER,
};
pub use runtime::{dispatch_shell_command, spawn_shell_worker, ShellCommand, ShellSession};
