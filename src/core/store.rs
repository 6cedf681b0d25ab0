//! core::store
//!
//! Durable storage for the environment state record.
//!
//! # Architecture
//!
//! The store owns the single on-disk record described in
//! [`crate::core::state`]. Two disciplines keep it trustworthy:
//!
//! - **Atomic writes**: every save serializes to `state.json.tmp`, fsyncs,
//!   then renames over `state.json`. A crash at any point leaves the old
//!   or the new record on disk, never a torn one.
//! - **Transactions**: mutations happen inside a [`StateTx`], which holds
//!   the exclusive environment lock for its lifetime. A second concurrent
//!   invocation fails fast with [`StoreError::Locked`] instead of
//!   corrupting state.
//!
//! # Corruption
//!
//! A record that exists but cannot be parsed or fails validation is
//! surfaced as [`StoreError::Corrupt`]: never silently replaced. The CLI
//! offers an explicit, confirmed reset on that path.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::lock::{EnvLock, LockError};
use crate::core::paths::EnvPaths;
use crate::core::state::EnvironmentState;

/// Errors from state storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another operation holds the environment lock.
    #[error("another airlocal operation is already running")]
    Locked,

    /// The state record exists but cannot be read or fails validation.
    #[error("state record at {path} is corrupt: {message}")]
    Corrupt { path: PathBuf, message: String },

    /// Failed to serialize the record.
    #[error("failed to serialize state: {0}")]
    Serialize(String),

    /// Lock machinery failed for a reason other than contention.
    #[error("lock error: {0}")]
    Lock(String),

    /// I/O error reading or writing the record.
    #[error("state i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LockError> for StoreError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::AlreadyLocked => StoreError::Locked,
            other => StoreError::Lock(other.to_string()),
        }
    }
}

/// File-backed store for the environment state record.
#[derive(Debug, Clone)]
pub struct StateStore {
    paths: EnvPaths,
    /// Cluster name used when synthesizing the default absent record.
    default_cluster: String,
}

impl StateStore {
    /// Create a store rooted at the given paths.
    pub fn new(paths: EnvPaths, default_cluster: impl Into<String>) -> Self {
        Self {
            paths,
            default_cluster: default_cluster.into(),
        }
    }

    /// Load the current state record.
    ///
    /// A missing file is not an error: it yields the default absent
    /// record, which is what a fresh machine looks like.
    ///
    /// # Errors
    ///
    /// [`StoreError::Corrupt`] if the file exists but cannot be parsed
    /// or fails validation.
    pub fn load(&self) -> Result<EnvironmentState, StoreError> {
        let path = self.paths.state_path();
        if !path.exists() {
            return Ok(EnvironmentState::absent(&self.default_cluster));
        }

        let content = fs::read_to_string(&path)?;
        let state: EnvironmentState =
            serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?;
        state.validate().map_err(|e| StoreError::Corrupt {
            path,
            message: e.to_string(),
        })?;
        Ok(state)
    }

    /// Persist the state record atomically.
    ///
    /// Write-temp-then-rename: the record is serialized to
    /// `state.json.tmp`, fsynced, and renamed over `state.json`. The
    /// rename is atomic on POSIX filesystems, so readers see the old or
    /// the new record, never a partial write.
    pub fn save(&self, state: &EnvironmentState) -> Result<(), StoreError> {
        self.paths.ensure_dirs()?;

        let content = serde_json::to_string_pretty(state)
            .map_err(|e| StoreError::Serialize(e.to_string()))?;

        let tmp = self.paths.state_tmp_path();
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, self.paths.state_path())?;
        Ok(())
    }

    /// Reset the record to the default absent state.
    ///
    /// Used by `destroy` and by the guarded corruption recovery path.
    pub fn reset(&self) -> Result<EnvironmentState, StoreError> {
        let state = EnvironmentState::absent(&self.default_cluster);
        self.save(&state)?;
        Ok(state)
    }

    /// Begin a transaction: acquire the exclusive lock and load state.
    ///
    /// The returned [`StateTx`] holds the lock until dropped. All
    /// lifecycle operations run inside exactly one transaction.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Locked`] if another operation is running
    /// - [`StoreError::Corrupt`] if the record cannot be loaded
    pub fn transaction(&self) -> Result<StateTx, StoreError> {
        let lock = EnvLock::acquire(&self.paths)?;
        let state = self.load()?;
        Ok(StateTx {
            store: self.clone(),
            state,
            _lock: lock,
        })
    }

    /// Begin a transaction over a freshly reset record.
    ///
    /// The recovery entry point for a corrupt state file: the exclusive
    /// lock is acquired, the default absent record is written over the
    /// unreadable one, and a normal transaction proceeds from there.
    /// Callers must have confirmed the reset with the user first.
    pub fn reset_transaction(&self) -> Result<StateTx, StoreError> {
        let lock = EnvLock::acquire(&self.paths)?;
        let state = self.reset()?;
        Ok(StateTx {
            store: self.clone(),
            state,
            _lock: lock,
        })
    }

    /// Run a closure inside a transaction, saving the state afterwards.
    ///
    /// Convenience wrapper for callers that mutate state in one shot.
    /// The state is persisted only when the closure succeeds.
    pub fn with_transaction<T, E>(
        &self,
        f: impl FnOnce(&mut EnvironmentState) -> Result<T, E>,
    ) -> Result<Result<T, E>, StoreError> {
        let mut tx = self.transaction()?;
        match f(tx.state_mut()) {
            Ok(value) => {
                tx.save()?;
                Ok(Ok(value))
            }
            Err(e) => Ok(Err(e)),
        }
    }

    /// The paths this store is rooted at.
    pub fn paths(&self) -> &EnvPaths {
        &self.paths
    }
}

/// An in-flight transaction over the state record.
///
/// Holds the environment lock for its lifetime. [`StateTx::save`] may be
/// called repeatedly to checkpoint progress mid-operation; each save is
/// atomic, so a crash between checkpoints re-derives from the last one.
#[derive(Debug)]
pub struct StateTx {
    store: StateStore,
    state: EnvironmentState,
    _lock: EnvLock,
}

impl StateTx {
    /// Read access to the transactional state.
    pub fn state(&self) -> &EnvironmentState {
        &self.state
    }

    /// Mutable access to the transactional state.
    pub fn state_mut(&mut self) -> &mut EnvironmentState {
        &mut self.state
    }

    /// Checkpoint: persist the current in-memory state atomically.
    pub fn save(&mut self) -> Result<(), StoreError> {
        self.state.touch();
        self.store.save(&self.state)
    }

    /// Replace the state with the default absent record and persist it.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.state = EnvironmentState::absent(&self.store.default_cluster);
        self.store.save(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{AppState, ClusterState, Phase};
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> StateStore {
        StateStore::new(EnvPaths::new(temp.path().to_path_buf()), "cdp-local")
    }

    #[test]
    fn load_missing_file_yields_absent_default() {
        let temp = TempDir::new().expect("temp dir");
        let state = store(&temp).load().expect("load");
        assert_eq!(state.phase(), Phase::Absent);
        assert_eq!(state.cluster_name, "cdp-local");
    }

    #[test]
    fn save_then_load_roundtrip() {
        let temp = TempDir::new().expect("temp dir");
        let store = store(&temp);

        let mut state = EnvironmentState::absent("cdp-local");
        state.cluster_status = ClusterState::Ready;
        state.app_status = AppState::Ready;
        state.installed_chart_version = Some("1.13.1".into());
        store.save(&state).expect("save");

        let loaded = store.load().expect("load");
        assert_eq!(loaded.phase(), Phase::Ready);
        assert_eq!(loaded.installed_chart_version.as_deref(), Some("1.13.1"));
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let temp = TempDir::new().expect("temp dir");
        let store = store(&temp);
        store
            .save(&EnvironmentState::absent("cdp-local"))
            .expect("save");
        assert!(store.paths().state_path().exists());
        assert!(!store.paths().state_tmp_path().exists());
    }

    #[test]
    fn stale_temp_file_does_not_affect_load() {
        // Simulates a crash between the temp write and the rename: the
        // canonical record must still load as its previous value.
        let temp = TempDir::new().expect("temp dir");
        let store = store(&temp);

        let mut state = EnvironmentState::absent("cdp-local");
        state.cluster_status = ClusterState::Stopped;
        store.save(&state).expect("save");

        fs::write(store.paths().state_tmp_path(), "{ \"torn\": ").expect("write tmp");

        let loaded = store.load().expect("load");
        assert_eq!(loaded.cluster_status, ClusterState::Stopped);
    }

    #[test]
    fn corrupt_record_is_reported_not_replaced() {
        let temp = TempDir::new().expect("temp dir");
        let store = store(&temp);
        fs::create_dir_all(temp.path()).unwrap();
        fs::write(store.paths().state_path(), "not json at all").expect("write");

        let err = store.load().expect_err("corrupt");
        assert!(matches!(err, StoreError::Corrupt { .. }));
        // The corrupt file must survive for inspection.
        assert!(store.paths().state_path().exists());
    }

    #[test]
    fn invariant_violating_record_is_corrupt() {
        let temp = TempDir::new().expect("temp dir");
        let store = store(&temp);

        // app ready without cluster ready
        let json = r#"{
            "schema_version": 1,
            "cluster_name": "cdp-local",
            "cluster_status": "stopped",
            "app_status": "ready",
            "installed_chart_version": "1.13.1",
            "last_operation": null,
            "last_error": null,
            "port_forwards": {},
            "updated_at": "2026-01-01T00:00:00Z"
        }"#;
        fs::write(store.paths().state_path(), json).expect("write");

        let err = store.load().expect_err("corrupt");
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[test]
    fn reset_returns_to_absent() {
        let temp = TempDir::new().expect("temp dir");
        let store = store(&temp);

        let mut state = EnvironmentState::absent("cdp-local");
        state.cluster_status = ClusterState::Ready;
        store.save(&state).expect("save");

        let state = store.reset().expect("reset");
        assert_eq!(state.phase(), Phase::Absent);
        assert_eq!(store.load().expect("load").phase(), Phase::Absent);
    }

    mod transactions {
        use super::*;

        #[test]
        fn second_transaction_fails_fast() {
            let temp = TempDir::new().expect("temp dir");
            let store = store(&temp);

            let _tx = store.transaction().expect("first tx");
            let err = store.transaction().expect_err("second tx");
            assert!(matches!(err, StoreError::Locked));
        }

        #[test]
        fn lock_released_when_transaction_drops() {
            let temp = TempDir::new().expect("temp dir");
            let store = store(&temp);

            {
                let _tx = store.transaction().expect("first tx");
            }
            let _tx2 = store.transaction().expect("second tx after drop");
        }

        #[test]
        fn checkpoint_saves_are_visible_to_later_loads() {
            let temp = TempDir::new().expect("temp dir");
            let store = store(&temp);

            let mut tx = store.transaction().expect("tx");
            tx.state_mut().cluster_status = ClusterState::Creating;
            tx.save().expect("checkpoint");
            drop(tx);

            let loaded = store.load().expect("load");
            assert_eq!(loaded.cluster_status, ClusterState::Creating);
        }

        #[test]
        fn with_transaction_persists_on_success() {
            let temp = TempDir::new().expect("temp dir");
            let store = store(&temp);

            store
                .with_transaction(|state| -> Result<(), String> {
                    state.cluster_status = ClusterState::Stopped;
                    Ok(())
                })
                .expect("store ok")
                .expect("closure ok");

            assert_eq!(
                store.load().expect("load").cluster_status,
                ClusterState::Stopped
            );
        }

        #[test]
        fn with_transaction_skips_save_on_closure_error() {
            let temp = TempDir::new().expect("temp dir");
            let store = store(&temp);

            let result = store
                .with_transaction(|state| -> Result<(), String> {
                    state.cluster_status = ClusterState::Stopped;
                    Err("boom".into())
                })
                .expect("store ok");
            assert!(result.is_err());

            assert_eq!(
                store.load().expect("load").cluster_status,
                ClusterState::Absent
            );
        }

        #[test]
        fn transaction_reset_persists_absent() {
            let temp = TempDir::new().expect("temp dir");
            let store = store(&temp);

            let mut tx = store.transaction().expect("tx");
            tx.state_mut().cluster_status = ClusterState::Ready;
            tx.save().expect("save");
            tx.reset().expect("reset");
            drop(tx);

            assert_eq!(store.load().expect("load").phase(), Phase::Absent);
        }
    }
}
