//! engine::ops
//!
//! The lifecycle operations.
//!
//! Every mutating operation follows the same shape: open a state
//! transaction (acquiring the exclusive lock), check the transition
//! table, gate on prerequisites, drive the tools in dependency order
//! with a checkpoint save after each step, and record success or
//! failure before returning. The checkpoints are what make a crashed
//! run resumable: the next invocation sees exactly how far this one
//! got.

use crate::cluster::ClusterStatus;
use crate::core::state::{AppState, ClusterState, EnvironmentState, Phase};
use crate::core::store::StoreError;
use crate::forward::TunnelEvent;
use crate::ui::output;

use super::{ClusterReport, Orchestrator, OrchestratorError, Outcome, StatusReport};

impl Orchestrator {
    /// First-time setup: preflight, cluster, chart, tunnels.
    ///
    /// Also the resume path for an interrupted install and the repair
    /// path after an error: every step is idempotent against whatever
    /// the previous run left behind.
    pub async fn install(&self, skip_preflight: bool) -> Result<Outcome, OrchestratorError> {
        let v = self.ctx.verbosity();
        let mut tx = self.store.transaction()?;

        match tx.state().phase() {
            Phase::Ready => {
                return Ok(Outcome::noop("environment is already installed and running"));
            }
            Phase::Stopped => {
                return Err(OrchestratorError::InvalidState {
                    operation: "install",
                    phase: Phase::Stopped,
                    hint: "the environment is installed but paused; run `airlocal start`".into(),
                });
            }
            Phase::Absent | Phase::Provisioning | Phase::Error => {}
        }

        // Gate before any mutation: a failed report leaves state untouched.
        if skip_preflight {
            output::warn("skipping preflight checks", v);
        } else {
            output::print("Running preflight checks...", v);
            let report = self.preflight.check().await;
            if !report.satisfied() {
                return Err(OrchestratorError::Prerequisite {
                    summary: report.failure_summary(),
                    report: Some(report),
                });
            }
        }

        output::print(
            format!("Ensuring Kind cluster '{}' is running...", self.cluster.name()),
            v,
        );
        tx.state_mut().cluster_status = ClusterState::Creating;
        tx.state_mut().last_operation = Some("install".into());
        tx.save()?;

        let handle = match self.cluster.ensure_running().await {
            Ok(handle) => handle,
            Err(e) => {
                tx.state_mut().cluster_status = ClusterState::Error;
                tx.state_mut()
                    .record_error("install", format!("cluster provisioning: {e}"));
                tx.save()?;
                return Err(OrchestratorError::Cluster {
                    operation: "install",
                    step: "cluster provisioning",
                    source: e,
                });
            }
        };
        if handle.created {
            output::success(format!("Cluster '{}' created.", handle.name), v);
        } else {
            output::print(format!("Cluster '{}' already exists.", handle.name), v);
        }
        tx.state_mut().cluster_status = ClusterState::Ready;
        tx.save()?;

        output::print(format!("Deploying chart '{}'...", self.config.chart.chart), v);
        tx.state_mut().app_status = AppState::Installing;
        tx.save()?;

        let version = match self.installer.install_or_upgrade().await {
            Ok(version) => version,
            Err(e) => {
                tx.state_mut().app_status = AppState::Error;
                tx.state_mut()
                    .record_error("install", format!("chart deployment: {e}"));
                tx.save()?;
                return Err(OrchestratorError::Install {
                    operation: "install",
                    step: "chart deployment",
                    source: e,
                });
            }
        };

        output::print("Waiting for workloads to become ready...", v);
        if let Err(e) = self.installer.wait_ready().await {
            tx.state_mut().app_status = AppState::Error;
            tx.state_mut()
                .record_error("install", format!("workload readiness: {e}"));
            tx.save()?;
            return Err(OrchestratorError::Install {
                operation: "install",
                step: "workload readiness",
                source: e,
            });
        }
        tx.state_mut().app_status = AppState::Ready;
        tx.state_mut().installed_chart_version = Some(version.to_string());
        tx.save()?;

        output::print("Starting port-forwards...", v);
        match self.forwards.start_all(tx.state_mut()).await {
            Ok(started) => {
                for tunnel in &started {
                    output::success(format!("{} -> {}", tunnel.service, tunnel.url), v);
                }
            }
            Err(e) => {
                tx.state_mut().app_status = AppState::Error;
                tx.state_mut()
                    .record_error("install", format!("tunnel startup: {e}"));
                tx.save()?;
                return Err(OrchestratorError::Forward {
                    operation: "install",
                    step: "tunnel startup",
                    source: e,
                });
            }
        }

        tx.state_mut().record_success("install");
        tx.save()?;
        Ok(Outcome::Changed)
    }

    /// Resume a paused environment: cluster containers, workloads,
    /// tunnels. Skips the chart deploy when the installed version
    /// already satisfies the configuration.
    pub async fn start(&self) -> Result<Outcome, OrchestratorError> {
        let v = self.ctx.verbosity();
        let mut tx = self.store.transaction()?;

        let phase = tx.state().phase();
        match phase {
            Phase::Absent => {
                return Err(OrchestratorError::InvalidState {
                    operation: "start",
                    phase,
                    hint: "nothing is installed yet; run `airlocal install` first".into(),
                });
            }
            Phase::Provisioning => {
                return Err(OrchestratorError::InvalidState {
                    operation: "start",
                    phase,
                    hint: "a previous install did not finish; run `airlocal install` to complete it"
                        .into(),
                });
            }
            Phase::Stopped | Phase::Error | Phase::Ready => {}
        }
        let was_ready = phase == Phase::Ready;

        if !self.preflight.docker_running().await {
            return Err(OrchestratorError::Prerequisite {
                summary: "the docker daemon is not running".into(),
                report: None,
            });
        }

        output::print(
            format!("Starting Kind cluster '{}'...", self.cluster.name()),
            v,
        );
        if let Err(e) = self.cluster.ensure_running().await {
            tx.state_mut().cluster_status = ClusterState::Error;
            tx.state_mut()
                .record_error("start", format!("cluster start: {e}"));
            tx.save()?;
            return Err(OrchestratorError::Cluster {
                operation: "start",
                step: "cluster start",
                source: e,
            });
        }
        tx.state_mut().cluster_status = ClusterState::Ready;
        tx.save()?;

        // Deploy only when the recorded version no longer satisfies the
        // configuration; a paused environment resumes with the release
        // it already has.
        let skip_deploy = match (
            tx.state().installed_chart_version.as_deref(),
            self.config.chart.version.as_deref(),
        ) {
            (Some(installed), Some(pin)) => installed == pin,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if skip_deploy {
            output::print("Chart version unchanged; skipping deploy.", v);
        } else {
            output::print(format!("Deploying chart '{}'...", self.config.chart.chart), v);
            tx.state_mut().app_status = AppState::Installing;
            tx.save()?;
            match self.installer.install_or_upgrade().await {
                Ok(version) => {
                    tx.state_mut().installed_chart_version = Some(version.to_string());
                }
                Err(e) => {
                    tx.state_mut().app_status = AppState::Error;
                    tx.state_mut()
                        .record_error("start", format!("chart deployment: {e}"));
                    tx.save()?;
                    return Err(OrchestratorError::Install {
                        operation: "start",
                        step: "chart deployment",
                        source: e,
                    });
                }
            }
        }

        output::print("Waiting for workloads to become ready...", v);
        if let Err(e) = self.installer.wait_ready().await {
            tx.state_mut().app_status = AppState::Error;
            tx.state_mut()
                .record_error("start", format!("workload readiness: {e}"));
            tx.save()?;
            return Err(OrchestratorError::Install {
                operation: "start",
                step: "workload readiness",
                source: e,
            });
        }
        tx.state_mut().app_status = AppState::Ready;
        tx.save()?;

        output::print("Starting port-forwards...", v);
        let started = match self.forwards.start_all(tx.state_mut()).await {
            Ok(started) => {
                for tunnel in &started {
                    output::success(format!("{} -> {}", tunnel.service, tunnel.url), v);
                }
                started
            }
            Err(e) => {
                tx.state_mut().app_status = AppState::Error;
                tx.state_mut()
                    .record_error("start", format!("tunnel startup: {e}"));
                tx.save()?;
                return Err(OrchestratorError::Forward {
                    operation: "start",
                    step: "tunnel startup",
                    source: e,
                });
            }
        };

        tx.state_mut().record_success("start");
        tx.save()?;

        if was_ready && started.iter().all(|t| t.reused) {
            Ok(Outcome::noop("environment is already running"))
        } else {
            Ok(Outcome::Changed)
        }
    }

    /// Pause the environment: tunnels down, cluster containers stopped,
    /// all data retained.
    pub async fn stop(&self) -> Result<Outcome, OrchestratorError> {
        let v = self.ctx.verbosity();
        let mut tx = self.store.transaction()?;

        let phase = tx.state().phase();
        match phase {
            Phase::Stopped => {
                return Ok(Outcome::noop("environment is already stopped"));
            }
            Phase::Absent => {
                return Err(OrchestratorError::InvalidState {
                    operation: "stop",
                    phase,
                    hint: "nothing is installed; there is nothing to stop".into(),
                });
            }
            Phase::Provisioning | Phase::Error => {
                return Err(OrchestratorError::InvalidState {
                    operation: "stop",
                    phase,
                    hint: "finish setup with `airlocal install`, or remove the environment with `airlocal destroy`"
                        .into(),
                });
            }
            Phase::Ready => {}
        }

        // Tunnels first, best-effort: a dead tunnel never blocks the
        // cluster from pausing.
        output::print("Stopping port-forwards...", v);
        let stopped = self.forwards.stop_all(tx.state_mut());
        tx.save()?;
        for tunnel in &stopped {
            if tunnel.was_alive {
                output::print(format!("Stopped tunnel '{}'.", tunnel.service), v);
            }
        }

        output::print("Stopping cluster containers (data is preserved)...", v);
        if let Err(e) = self.cluster.stop().await {
            tx.state_mut().cluster_status = ClusterState::Error;
            tx.state_mut()
                .record_error("stop", format!("cluster stop: {e}"));
            tx.save()?;
            return Err(OrchestratorError::Cluster {
                operation: "stop",
                step: "cluster stop",
                source: e,
            });
        }

        tx.state_mut().cluster_status = ClusterState::Stopped;
        // The release is retained (installed_chart_version stays), but
        // with the cluster paused its workloads are not ready.
        tx.state_mut().app_status = AppState::Absent;
        tx.state_mut().record_success("stop");
        tx.save()?;
        Ok(Outcome::Changed)
    }

    /// Read-only health snapshot. Never fails: probe errors degrade to
    /// "unknown" fields in the report.
    pub async fn status(&self) -> StatusReport {
        let (state, state_error) = match self.store.load() {
            Ok(state) => (state, None),
            Err(e) => (
                EnvironmentState::absent(&self.config.cluster.name),
                Some(e.to_string()),
            ),
        };

        let cluster = match self.cluster.inspect().await {
            Ok(status) => ClusterReport::Probed(status),
            Err(e) => ClusterReport::Unknown {
                detail: e.to_string(),
            },
        };

        let tunnels = self.forwards.statuses(&state);

        StatusReport {
            phase: state.phase(),
            cluster_name: state.cluster_name.clone(),
            cluster,
            installed_chart_version: state.installed_chart_version.clone(),
            last_operation: state.last_operation.clone(),
            last_error: state.last_error.clone(),
            state_error,
            tunnels,
        }
    }

    /// Delete the cluster and reset all state. The CLI confirms before
    /// calling; a corrupt state record is overwritten rather than
    /// blocking the one command that exists to clean up.
    pub async fn destroy(&self) -> Result<Outcome, OrchestratorError> {
        let v = self.ctx.verbosity();
        let mut tx = match self.store.transaction() {
            Ok(tx) => tx,
            Err(StoreError::Corrupt { path, message }) => {
                output::warn(
                    format!(
                        "state record at {} is corrupt ({}); resetting it",
                        path.display(),
                        message
                    ),
                    v,
                );
                self.store.reset_transaction()?
            }
            Err(e) => return Err(e.into()),
        };

        let had_state = tx.state().phase() != Phase::Absent
            || !tx.state().port_forwards.is_empty();

        output::print("Stopping port-forwards...", v);
        self.forwards.stop_all(tx.state_mut());
        tx.save()?;

        // If we cannot even probe, trust the record: a machine without
        // the tools installed has nothing to delete unless state says
        // otherwise.
        let cluster_present = match self.cluster.inspect().await {
            Ok(status) => status != ClusterStatus::Absent,
            Err(_) => had_state,
        };

        if cluster_present {
            output::print(
                format!("Deleting Kind cluster '{}'...", self.cluster.name()),
                v,
            );
            if let Err(first) = self.cluster.destroy().await {
                // One bounded retry: deletion is the one operation where
                // a transient failure (slow container teardown) is more
                // likely than a duplicated resource.
                output::warn(format!("cluster deletion failed ({first}); retrying once"), v);
                if let Err(second) = self.cluster.destroy().await {
                    tx.state_mut().cluster_status = ClusterState::Error;
                    tx.state_mut()
                        .record_error("destroy", format!("cluster deletion: {second}"));
                    tx.save()?;
                    return Err(OrchestratorError::Cluster {
                        operation: "destroy",
                        step: "cluster deletion",
                        source: second,
                    });
                }
            }
        }

        tx.reset()?;

        if had_state || cluster_present {
            output::success("Environment removed.", v);
            Ok(Outcome::Changed)
        } else {
            Ok(Outcome::noop("nothing to destroy"))
        }
    }

    /// Foreground supervision session: watch tunnel liveness, restart
    /// dead tunnels with bounded backoff, persist pid changes. Runs
    /// until Ctrl-C.
    pub async fn watch(&self) -> Result<(), OrchestratorError> {
        let v = self.ctx.verbosity();
        let state = self.store.load()?;
        let mut handle = self.forwards.supervise(&state);

        output::print("Supervising tunnels; press Ctrl-C to stop.", v);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = handle.next_event() => match event {
                    Some(TunnelEvent::Exited { service, pid }) => {
                        output::warn(format!("tunnel '{service}' (pid {pid}) exited"), v);
                    }
                    Some(TunnelEvent::Restarted { service, pid, attempt }) => {
                        output::success(
                            format!("tunnel '{service}' restarted (pid {pid}, attempt {attempt})"),
                            v,
                        );
                        self.persist_tunnel_pid(&service, pid);
                    }
                    Some(TunnelEvent::RestartFailed { service, attempt, detail }) => {
                        output::warn(
                            format!("tunnel '{service}' restart attempt {attempt} failed: {detail}"),
                            v,
                        );
                    }
                    None => break,
                }
            }
        }

        // Tunnels stay up after the session; persist where they ended up.
        let finals = handle.shutdown().await;
        match self.store.transaction() {
            Ok(mut tx) => {
                tx.state_mut().port_forwards = finals;
                tx.save()?;
            }
            Err(e) => {
                output::warn(format!("could not persist final tunnel pids: {e}"), v);
            }
        }
        Ok(())
    }

    /// Best-effort single-pid persistence from the watch loop.
    fn persist_tunnel_pid(&self, service: &str, pid: u32) {
        if let Ok(mut tx) = self.store.transaction() {
            tx.state_mut().port_forwards.insert(service.to_string(), pid);
            let _ = tx.save();
        }
    }
}
