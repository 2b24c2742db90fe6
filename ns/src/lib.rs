//! NodeStore - single-writer JSON store for simulated household nodes
//!
//! Holds the authoritative state of every node (on/off, destination, assigned
//! user) and the users that can be assigned to them.
//!
//! # Layout
//!
//! ```text
//! {data_dir}/
//! ├── nodes.json      # array of node records
//! └── users.json      # array of user records
//! ```
//!
//! # Example
//!
//! ```ignore
//! use nodestore::StateStore;
//!
//! let store = StateStore::open("data")?;
//! let outcome = store.start_node("kitchen-faucet", Some("alice"))?;
//! assert!(outcome.success);
//! let active = store.list_active_nodes()?;
//! ```

mod error;
mod model;
mod persist;
mod store;

pub use error::{StoreError, StoreResult};
pub use model::{Node, NodeStatus, NodeType, Outcome, User, slugify};
pub use store::{NODES_FILE, StateStore, USERS_FILE};
