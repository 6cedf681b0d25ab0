//! forward::supervisor
//!
//! Background watch loop that keeps tunnels alive during a watch
//! session.
//!
//! # Design
//!
//! The loop is an explicit tokio task with its own lifecycle, not a
//! shared flag: it reports what happened over an event channel and is
//! stopped through a shutdown channel. The foreground session decides
//! what to do with the events (print them, persist new pids); the loop
//! itself never touches the state store and never fails the session.
//! A tunnel that cannot be revived keeps being retried at the backoff
//! ceiling while everything else stays up.
//!
//! # Backoff
//!
//! Restart delays grow exponentially from the configured base to the
//! configured ceiling (defaults 1s → 30s) and reset after a successful
//! restart.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::TunnelSpawner;
use crate::core::config::ForwardConfig;
use crate::core::services::ServiceDescriptor;

/// What the supervisor observed or did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelEvent {
    /// A tracked tunnel process exited unexpectedly.
    Exited { service: String, pid: u32 },
    /// A tunnel was restarted; `attempt` counts tries since it died.
    Restarted {
        service: String,
        pid: u32,
        attempt: u32,
    },
    /// A restart attempt failed; the next one waits out the backoff.
    RestartFailed {
        service: String,
        attempt: u32,
        detail: String,
    },
}

/// Handle to a running supervision loop.
pub struct SupervisorHandle {
    events: mpsc::Receiver<TunnelEvent>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<BTreeMap<String, u32>>,
}

impl SupervisorHandle {
    /// Receive the next event. Returns `None` after the loop ends.
    pub async fn next_event(&mut self) -> Option<TunnelEvent> {
        self.events.recv().await
    }

    /// Stop the loop and return the final service → pid map, so the
    /// caller can persist pids that changed under supervision.
    pub async fn shutdown(self) -> BTreeMap<String, u32> {
        let _ = self.shutdown.send(true);
        self.task.await.unwrap_or_default()
    }
}

/// Restart delay after `failures` consecutive failed attempts.
///
/// Capped exponential: `base * 2^failures`, clamped to the ceiling.
pub fn backoff_delay(settings: &ForwardConfig, failures: u32) -> Duration {
    let base = settings.backoff_base_secs;
    let ceiling = settings.backoff_ceiling_secs;
    // Shift capped well below 64 so the multiply saturates instead of
    // wrapping for long outages.
    let factor = 1u64 << failures.min(32);
    Duration::from_secs(base.saturating_mul(factor).min(ceiling))
}

/// One watched tunnel's bookkeeping.
struct Watched {
    service: ServiceDescriptor,
    pid: Option<u32>,
    /// Consecutive failed restart attempts since the tunnel died.
    failures: u32,
    /// Earliest time the next restart may run.
    next_attempt_at: Instant,
}

/// Start the supervision loop.
pub(crate) fn spawn(
    spawner: Arc<dyn TunnelSpawner>,
    services: Vec<ServiceDescriptor>,
    tunnels: BTreeMap<String, u32>,
    settings: ForwardConfig,
) -> SupervisorHandle {
    let (event_tx, event_rx) = mpsc::channel(64);
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut watched: Vec<Watched> = services
            .into_iter()
            .map(|service| {
                let pid = tunnels.get(service.name).copied();
                Watched {
                    service,
                    pid,
                    failures: 0,
                    next_attempt_at: Instant::now(),
                }
            })
            .collect();

        let mut interval =
            tokio::time::interval(Duration::from_secs(settings.health_check_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = interval.tick() => {}
            }

            for entry in watched.iter_mut() {
                match entry.pid {
                    Some(pid) if spawner.is_alive(pid) => {
                        entry.failures = 0;
                    }
                    Some(pid) => {
                        // Unexpected exit: schedule the first restart.
                        let _ = event_tx.try_send(TunnelEvent::Exited {
                            service: entry.service.name.to_string(),
                            pid,
                        });
                        entry.pid = None;
                        entry.failures = 0;
                        entry.next_attempt_at =
                            Instant::now() + backoff_delay(&settings, 0);
                    }
                    None if Instant::now() >= entry.next_attempt_at => {
                        let attempt = entry.failures + 1;
                        match spawner.spawn(&entry.service).await {
                            Ok(handle) => {
                                entry.pid = Some(handle.pid);
                                entry.failures = 0;
                                let _ = event_tx.try_send(TunnelEvent::Restarted {
                                    service: entry.service.name.to_string(),
                                    pid: handle.pid,
                                    attempt,
                                });
                            }
                            Err(err) => {
                                entry.failures = attempt;
                                entry.next_attempt_at = Instant::now()
                                    + backoff_delay(&settings, entry.failures);
                                let _ = event_tx.try_send(TunnelEvent::RestartFailed {
                                    service: entry.service.name.to_string(),
                                    attempt,
                                    detail: err.to_string(),
                                });
                            }
                        }
                    }
                    None => {
                        // Still waiting out the backoff window.
                    }
                }
            }
        }

        watched
            .into_iter()
            .filter_map(|entry| entry.pid.map(|pid| (entry.service.name.to_string(), pid)))
            .collect()
    });

    SupervisorHandle {
        events: event_rx,
        shutdown: shutdown_tx,
        task,
    }
}
