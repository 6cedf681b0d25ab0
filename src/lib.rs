//! airlocal - a local Kind + Apache Airflow developer environment
//!
//! airlocal provisions and manages a single-node Kubernetes (Kind)
//! cluster running Apache Airflow on a developer machine, standing in
//! for a managed cloud service during development: `install` once,
//! `stop` at the end of the day, `start` the next morning, `destroy`
//! when done.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Lifecycle orchestrator: install, start, stop, status, destroy
//! - [`core`] - State record, durable store, lock, paths, configuration
//! - [`preflight`] - Prerequisite checks for the external tools
//! - [`cluster`] - Cluster driver (kind/docker) behind a trait seam
//! - [`installer`] - Chart installer (helm/kubectl) behind a trait seam
//! - [`forward`] - Port-forward tunnels and their background supervisor
//! - [`tools`] - Bounded subprocess plumbing
//! - [`ui`] - User interaction utilities
//!
//! # Correctness Invariants
//!
//! 1. All mutations run inside a single exclusive state transaction
//! 2. State writes are atomic; a crash leaves the old or new record
//! 3. Every operation is idempotent and resumable from persisted state
//! 4. External tools are only ever driven with bounded timeouts

pub mod cli;
pub mod cluster;
pub mod core;
pub mod engine;
pub mod forward;
pub mod installer;
pub mod preflight;
pub mod tools;
pub mod ui;
