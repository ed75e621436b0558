//! Types shared by every pageshell crate: ids, page descriptors, history
//! snapshots, runtime events and the error taxonomy.

pub mod domain;
pub mod error;
pub mod protocol;
