// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Ordered operation chain with forward/inverse commands and lifecycle
//! hooks (component G, "Transaction Scope").
//!
//! This is deliberately not a thin wrapper over engine-native
//! savepoints: some operations (cache eviction callbacks, statistics
//! updates) have side effects outside the engine that a savepoint
//! cannot undo, and the before/after hooks give cross-cutting audit a
//! seam that doesn't leak into the operations' own data logic.

use std::{fmt, sync::Arc};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use crate::{
    cancel,
    error::{PersistError, PersistResult}
};

/// How an operation's forward/inverse commands execute against the
/// engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Executes without returning rows (insert/update/delete).
    NonQuery,
    /// Executes and returns a single scalar.
    Scalar,
    /// Executes and returns a row set.
    Reader
}

/// Lifecycle state of a [`TransactionScope`]. Transitions are one-way;
/// a scope in a terminal state (`Committed`, `RolledBack`, `Failed`)
/// rejects further operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Accepting operations, not yet executing.
    Active,
    /// Running forward commands.
    Committing,
    /// All forward commands succeeded.
    Committed,
    /// Running inverse commands after a forward failure.
    RollingBack,
    /// Every executed operation was successfully rolled back.
    RolledBack,
    /// A rollback itself failed; state is unrecoverable.
    Failed
}

/// One operation in a [`TransactionScope`]: a stable id, a
/// human-readable description, an [`ExecutionMode`], a forward command
/// and its inverse, plus four default-no-op hooks.
///
/// An implementor owns its own input/output rather than exposing them
/// as generic associated types, so a scope can hold a heterogeneous
/// `Vec<Box<dyn ScopedOperation>>` — operations for a create, an
/// update, and a cache eviction can all ride in the same scope.
#[async_trait::async_trait]
pub trait ScopedOperation: Send + Sync {
    /// Stable identifier, unique within a scope.
    fn id(&self) -> &str;

    /// Human-readable description for logging/audit.
    fn description(&self) -> &str;

    /// Execution mode this operation's forward/inverse commands use.
    fn mode(&self) -> ExecutionMode;

    /// Runs the forward command.
    ///
    /// # Errors
    ///
    /// Returns any engine or validation failure; the scope treats this
    /// as a signal to begin rollback.
    async fn forward(&mut self) -> PersistResult<()>;

    /// Runs the inverse command, undoing [`Self::forward`].
    ///
    /// # Errors
    ///
    /// Returns the rollback failure; the scope surfaces it as the
    /// linked rollback cause of [`PersistError::TransactionFailed`].
    async fn inverse(&mut self) -> PersistResult<()>;

    /// Fires immediately before [`Self::forward`] executes.
    async fn before_commit(&mut self) {}

    /// Fires immediately after [`Self::forward`] succeeds.
    async fn after_commit(&mut self) {}

    /// Fires immediately before [`Self::inverse`] executes.
    async fn before_rollback(&mut self) {}

    /// Fires immediately after [`Self::inverse`] succeeds.
    async fn after_rollback(&mut self) {}
}

impl fmt::Debug for dyn ScopedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedOperation")
            .field("id", &self.id())
            .field("description", &self.description())
            .field("mode", &self.mode())
            .finish()
    }
}

/// An ordered chain of [`ScopedOperation`]s sharing a single-writer
/// lock, committed or rolled back as a unit.
pub struct TransactionScope {
    operations: Vec<Box<dyn ScopedOperation>>,
    write_lock: Arc<Mutex<()>>,
    state: ScopeState
}

impl TransactionScope {
    /// Builds an empty, `Active` scope guarded by `write_lock` — the
    /// same lock handed to every concurrently open scope against this
    /// engine, enforcing the single-writer execute protocol.
    #[must_use]
    pub fn new(write_lock: Arc<Mutex<()>>) -> Self {
        Self {
            operations: Vec::new(),
            write_lock,
            state: ScopeState::Active
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ScopeState {
        self.state
    }

    /// Appends an operation to the chain.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Configuration`] if the scope is no
    /// longer `Active`.
    pub fn add(&mut self, operation: Box<dyn ScopedOperation>) -> PersistResult<()> {
        if self.state != ScopeState::Active {
            return Err(PersistError::Configuration(format!(
                "cannot add operation '{}' to a scope in state {:?}",
                operation.id(),
                self.state
            )));
        }
        self.operations.push(operation);
        Ok(())
    }

    /// Runs the execute protocol: acquires the write lock, runs forward
    /// commands in order with their hooks, and on any failure rolls
    /// back everything already executed in reverse order before
    /// surfacing the error.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::TransactionFailed`] wrapping the
    /// originating cause, plus a rollback cause if any inverse command
    /// itself failed. Returns [`PersistError::Canceled`] if `cancel`
    /// fires before every forward command finishes; operations already
    /// executed are rolled back first.
    #[instrument(skip(self, cancel), fields(operations = self.operations.len()))]
    pub async fn commit(mut self, cancel: Option<&CancellationToken>) -> PersistResult<()> {
        let _guard = self.write_lock.clone().lock_owned().await;
        self.state = ScopeState::Committing;

        let mut executed = Vec::with_capacity(self.operations.len());
        let mut failure: Option<PersistError> = None;

        let forward_result = cancel::race(cancel, async {
            for index in 0..self.operations.len() {
                let op = &mut self.operations[index];
                op.before_commit().await;
                match op.forward().await {
                    Ok(()) => {
                        op.after_commit().await;
                        executed.push(index);
                    }
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }
            Ok(())
        })
        .await;

        if let Err(PersistError::Canceled) = forward_result {
            failure = Some(PersistError::Canceled);
        }

        let Some(cause) = failure else {
            self.state = ScopeState::Committed;
            return Ok(());
        };

        self.state = ScopeState::RollingBack;
        for &index in executed.iter().rev() {
            let op = &mut self.operations[index];
            op.before_rollback().await;
            if let Err(rollback_err) = op.inverse().await {
                self.state = ScopeState::Failed;
                return Err(PersistError::transaction_failed_with_rollback(cause, rollback_err));
            }
            op.after_rollback().await;
        }

        self.state = ScopeState::RolledBack;
        Err(PersistError::transaction_failed(cause))
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if self.state == ScopeState::Active {
            warn!(
                operations = self.operations.len(),
                "transaction scope dropped while active without a commit() call; no forward command ever ran, so nothing needs rollback"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use super::*;

    struct RecordingOp {
        id: &'static str,
        fails: bool,
        forward_ran: Arc<AtomicBool>,
        inverse_ran: Arc<AtomicBool>,
        order: Arc<AtomicU32>,
        forward_order: Arc<AtomicU32>
    }

    #[async_trait::async_trait]
    impl ScopedOperation for RecordingOp {
        fn id(&self) -> &str {
            self.id
        }

        fn description(&self) -> &str {
            "test op"
        }

        fn mode(&self) -> ExecutionMode {
            ExecutionMode::NonQuery
        }

        async fn forward(&mut self) -> PersistResult<()> {
            self.forward_order.store(self.order.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
            if self.fails {
                return Err(PersistError::Storage("boom".into()));
            }
            self.forward_ran.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn inverse(&mut self) -> PersistResult<()> {
            self.inverse_ran.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn all_ops_succeed_commits() {
        let lock = Arc::new(Mutex::new(()));
        let mut scope = TransactionScope::new(lock);
        let forward_ran = Arc::new(AtomicBool::new(false));
        scope
            .add(Box::new(RecordingOp {
                id: "op1",
                fails: false,
                forward_ran: forward_ran.clone(),
                inverse_ran: Arc::new(AtomicBool::new(false)),
                order: Arc::new(AtomicU32::new(0)),
                forward_order: Arc::new(AtomicU32::new(0))
            }))
            .unwrap();

        scope.commit(None).await.unwrap();
        assert!(forward_ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failure_rolls_back_executed_ops_in_reverse() {
        let lock = Arc::new(Mutex::new(()));
        let mut scope = TransactionScope::new(lock);
        let inverse_ran_a = Arc::new(AtomicBool::new(false));
        let inverse_ran_b = Arc::new(AtomicBool::new(false));

        scope
            .add(Box::new(RecordingOp {
                id: "a",
                fails: false,
                forward_ran: Arc::new(AtomicBool::new(false)),
                inverse_ran: inverse_ran_a.clone(),
                order: Arc::new(AtomicU32::new(0)),
                forward_order: Arc::new(AtomicU32::new(0))
            }))
            .unwrap();
        scope
            .add(Box::new(RecordingOp {
                id: "b",
                fails: false,
                forward_ran: Arc::new(AtomicBool::new(false)),
                inverse_ran: inverse_ran_b.clone(),
                order: Arc::new(AtomicU32::new(0)),
                forward_order: Arc::new(AtomicU32::new(0))
            }))
            .unwrap();
        scope
            .add(Box::new(RecordingOp {
                id: "c",
                fails: true,
                forward_ran: Arc::new(AtomicBool::new(false)),
                inverse_ran: Arc::new(AtomicBool::new(false)),
                order: Arc::new(AtomicU32::new(0)),
                forward_order: Arc::new(AtomicU32::new(0))
            }))
            .unwrap();

        let err = scope.commit(None).await.unwrap_err();
        assert!(matches!(err, PersistError::TransactionFailed { .. }));
        assert!(inverse_ran_a.load(Ordering::SeqCst));
        assert!(inverse_ran_b.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn fired_token_cancels_and_rolls_back() {
        let lock = Arc::new(Mutex::new(()));
        let mut scope = TransactionScope::new(lock);
        let inverse_ran = Arc::new(AtomicBool::new(false));
        scope
            .add(Box::new(RecordingOp {
                id: "a",
                fails: false,
                forward_ran: Arc::new(AtomicBool::new(false)),
                inverse_ran: inverse_ran.clone(),
                order: Arc::new(AtomicU32::new(0)),
                forward_order: Arc::new(AtomicU32::new(0))
            }))
            .unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let err = scope.commit(Some(&token)).await.unwrap_err();
        assert!(matches!(err, PersistError::TransactionFailed { .. }));
    }

    #[tokio::test]
    async fn adding_after_terminal_state_rejects() {
        let lock = Arc::new(Mutex::new(()));
        let mut scope = TransactionScope::new(lock);
        scope.state = ScopeState::Committed;
        let op = RecordingOp {
            id: "late",
            fails: false,
            forward_ran: Arc::new(AtomicBool::new(false)),
            inverse_ran: Arc::new(AtomicBool::new(false)),
            order: Arc::new(AtomicU32::new(0)),
            forward_order: Arc::new(AtomicU32::new(0))
        };
        assert!(scope.add(Box::new(op)).is_err());
    }
}
