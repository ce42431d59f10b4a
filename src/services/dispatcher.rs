use {
    crate::domain::id::{EntryId, LockId},
    crate::domain::outbox::{Lock, LogEntry, OutboxLog},
    crate::services::event_parser::EventParser,
    std::{
        sync::{
            Arc,
            atomic::{AtomicBool, Ordering},
        },
        time::Duration,
    },
    tokio::sync::{Notify, watch},
};

/// Wakes the dispatcher. Signals coalesce: any number of calls while a pass
/// is running leave at most one pending wake.
#[derive(Clone, Default)]
pub struct WakeSignal {
    notify: Arc<Notify>,
    probe_armed: Arc<AtomicBool>,
}

impl WakeSignal {
    /// Never blocks.
    pub fn notify(&self) {
        self.notify.notify_one();
    }

    pub async fn notified(&self) {
        self.notify.notified().await
    }

    /// Wake after `delay` from a detached task.
    pub fn notify_after(&self, delay: Duration) {
        let signal = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            signal.notify();
        });
    }

    /// Like [`notify_after`](Self::notify_after), but at most one probe is
    /// outstanding at a time. Returns `false` if one was already pending.
    pub fn arm_probe(&self, delay: Duration) -> bool {
        if self.probe_armed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let signal = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Cleared first so the pass this wakes can re-arm.
            signal.probe_armed.store(false, Ordering::Release);
            signal.notify();
        });
        true
    }
}

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub lock_id: LockId,
    /// First probe after startup, to drain whatever a previous run left behind.
    pub startup_delay: Duration,
    /// Probe delay after a failed pass or a lost lock race.
    pub retry_delay: Duration,
    /// Entries that have failed this many times are dropped. `None` keeps
    /// retrying forever.
    pub max_attempts: Option<i32>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            lock_id: LockId::DEFAULT,
            startup_delay: Duration::from_secs(5),
            retry_delay: Duration::from_secs(10),
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Every pending entry was applied (or dropped past the attempt limit) and deleted.
    Drained { applied: usize, discarded: usize },
    /// Another instance holds the lock.
    Contended,
    /// The lock could not even be attempted.
    LockUnavailable,
    /// `entry` could not be applied; its attempt counter was bumped.
    Halted { applied: usize, entry: EntryId },
    /// Reading the log or deleting an entry failed.
    StoreFailed { applied: usize },
}

impl PassOutcome {
    /// Whether the dispatcher should probe again on its own.
    ///
    /// A failed lock attempt waits for the next natural signal instead.
    pub fn needs_retry(&self) -> bool {
        matches!(
            self,
            Self::Contended | Self::Halted { .. } | Self::StoreFailed { .. }
        )
    }
}

/// Drains the outbox. One per process; cross-instance exclusion comes from
/// the store's lock.
pub struct Dispatcher<S: OutboxLog> {
    log: Arc<S>,
    parser: EventParser,
    wake: WakeSignal,
    config: DispatchConfig,
}

impl<S: OutboxLog> Dispatcher<S> {
    pub fn new(log: Arc<S>, parser: EventParser, wake: WakeSignal, config: DispatchConfig) -> Self {
        Self {
            log,
            parser,
            wake,
            config,
        }
    }

    /// Park on the wake signal and run one pass per wake until `shutdown` fires.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(component = "cdc.dispatcher", "outbox dispatcher started");
        self.wake.notify_after(self.config.startup_delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!(component = "cdc.dispatcher", "outbox dispatcher shutting down");
                    return;
                }
                _ = self.wake.notified() => {}
            }

            let outcome = self.run_pass().await;
            if outcome.needs_retry() && self.wake.arm_probe(self.config.retry_delay) {
                tracing::debug!(
                    component = "cdc.dispatcher",
                    ?outcome,
                    delay_ms = self.config.retry_delay.as_millis() as u64,
                    "scheduling retry probe"
                );
            }
        }
    }

    /// One drain attempt, bounded by a single lock acquisition.
    pub async fn run_pass(&self) -> PassOutcome {
        let lock = match self.log.try_get_lock(self.config.lock_id).await {
            Ok(lock) => lock,
            Err(e) => {
                tracing::error!(
                    component = "cdc.dispatcher",
                    error = %e,
                    "could not attempt dispatch lock"
                );
                return PassOutcome::LockUnavailable;
            }
        };

        if !lock.acquired() {
            self.release(lock).await;
            tracing::debug!(
                component = "cdc.dispatcher",
                lock_id = %self.config.lock_id,
                "dispatch lock held by another instance"
            );
            return PassOutcome::Contended;
        }

        let outcome = self.drain().await;
        self.release(lock).await;

        match &outcome {
            PassOutcome::Drained { applied, discarded } if applied + discarded > 0 => {
                tracing::info!(
                    component = "cdc.dispatcher",
                    applied,
                    discarded,
                    "outbox drained"
                );
            }
            _ => {}
        }
        outcome
    }

    async fn drain(&self) -> PassOutcome {
        let entries = match self.log.get_log().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(component = "cdc.dispatcher", error = %e, "could not read outbox");
                return PassOutcome::StoreFailed { applied: 0 };
            }
        };

        let mut applied = 0;
        let mut discarded = 0;
        for entry in &entries {
            if self.exceeds_attempt_limit(entry) {
                if let Err(e) = self.log.clean_event(entry).await {
                    tracing::error!(
                        component = "cdc.dispatcher",
                        entry_id = %entry.id,
                        error = %e,
                        "could not discard outbox entry"
                    );
                    return PassOutcome::StoreFailed { applied };
                }
                tracing::warn!(
                    component = "cdc.dispatcher",
                    entry_id = %entry.id,
                    action = %entry.action,
                    attempts = entry.attempts,
                    "discarded outbox entry past attempt limit"
                );
                discarded += 1;
                continue;
            }

            if self.parser.parse(std::slice::from_ref(entry)).await == 0 {
                if let Err(e) = self.log.failed_event(entry).await {
                    tracing::error!(
                        component = "cdc.dispatcher",
                        entry_id = %entry.id,
                        error = %e,
                        "could not record failed attempt"
                    );
                }
                return PassOutcome::Halted {
                    applied,
                    entry: entry.id,
                };
            }

            // The downstream side effect has happened; if the delete fails the
            // entry is replayed next pass.
            if let Err(e) = self.log.clean_event(entry).await {
                tracing::error!(
                    component = "cdc.dispatcher",
                    entry_id = %entry.id,
                    action = %entry.action,
                    error = %e,
                    "could not delete applied outbox entry"
                );
                return PassOutcome::StoreFailed { applied };
            }
            applied += 1;
        }

        PassOutcome::Drained { applied, discarded }
    }

    fn exceeds_attempt_limit(&self, entry: &LogEntry) -> bool {
        self.config
            .max_attempts
            .is_some_and(|max| entry.attempts >= max)
    }

    async fn release(&self, lock: Lock<S::Tx>) {
        if let Err(e) = self.log.release_lock(Some(lock)).await {
            tracing::error!(component = "cdc.dispatcher", error = %e, "could not release dispatch lock");
        }
    }
}
