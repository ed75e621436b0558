//! View-handle contract for the page shell: an element tree standing in for
//! the display, attribute scanning, and view fragment loading.

pub mod loader;
pub mod scan;
pub mod tree;
pub mod url;

pub use loader::{load_view, mount_fragment, DirectoryViewLoader, StaticViewLoader, ViewLoader};
pub use scan::{
    owning_handle, parse_action_list, scan_actions, scan_bindings, scan_refs, tag_handle,
    ActionWiring, BindingWiring, ScanError, ACTIONS_ATTR, BIND_ATTR, HANDLE_ATTR, REF_ATTR,
};
pub use tree::{DisplayTree, Element, ElementSpec};

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
