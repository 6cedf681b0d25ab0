//! core
//!
//! Domain types and persistence: the environment state record, its
//! durable store, the exclusive operation lock, path routing, static
//! service tables, and user configuration.

pub mod config;
pub mod lock;
pub mod paths;
pub mod services;
pub mod state;
pub mod store;

pub use config::Config;
pub use paths::EnvPaths;
pub use state::{AppState, ClusterState, EnvironmentState, Phase};
pub use store::{StateStore, StateTx, StoreError};
