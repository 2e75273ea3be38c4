//! Fixed-size worker pool with per-round completion channels.
//!
//! This module defines the [`WorkerPool`] struct, which owns `P` long-lived
//! worker threads created once at construction. Work is submitted in rounds:
//! [`WorkerPool::dispatch`] hands exactly one [`Assignment`] to every worker
//! and resolves once every worker has answered, or as soon as the first one
//! fails.
//!
//! Every round creates a fresh [`oneshot`] channel per worker. Nothing is
//! registered on the workers themselves, so a reply belonging to an abandoned
//! round can never complete a later one: its receiver is already gone.
//!
//! The worker table sits behind an async mutex held for the whole round, so
//! concurrent callers sharing one pool are serialized and a worker never sees
//! a second assignment before answering the first.

use crate::{
    engine::DigitEngine,
    error::{Error, Result},
    types::{Assignment, DigitResult},
    worker::{WorkRequest, spawn_worker},
};
use core::time::Duration;
use futures::future::{join_all, try_join_all};
use std::{sync::Arc, thread::JoinHandle};
use tokio::{
    sync::{Mutex, mpsc, oneshot},
    time::timeout,
};
use tokio_util::sync::CancellationToken;

/// What the pool does with a worker whose thread has terminated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RespawnPolicy {
    /// Replace the dead worker at the start of the next round.
    #[default]
    OnFailure,
    /// Leave the slot dead. Every later round fails on that slot.
    Never,
}

/// Construction parameters for a [`WorkerPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers, fixed for the lifetime of the pool.
    pub size: usize,
    pub respawn: RespawnPolicy,
    /// How long shutdown waits for the in-flight round and for each worker's
    /// acknowledgement.
    pub shutdown_timeout: Duration,
}

impl PoolConfig {
    pub fn with_size(size: usize) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 3,
            respawn: RespawnPolicy::default(),
            shutdown_timeout: Duration::from_secs(3),
        }
    }
}

struct WorkerSlot {
    tx: mpsc::Sender<WorkRequest>,
    handle: Option<JoinHandle<()>>,
    /// Set once a round observed this worker die.
    terminated: bool,
}

impl WorkerSlot {
    fn spawn<E: DigitEngine>(worker_id: usize, engine: Arc<E>) -> Result<Self> {
        let (tx, handle) =
            spawn_worker(worker_id, engine).map_err(|e| Error::ChannelError {
                context: format!("Failed to spawn worker {worker_id}: {e}"),
            })?;
        Ok(Self {
            tx,
            handle: Some(handle),
            terminated: false,
        })
    }

    fn is_dead(&self) -> bool {
        self.terminated || self.tx.is_closed()
    }
}

/// A fixed pool of worker threads computing BBP digits.
pub struct WorkerPool<E: DigitEngine> {
    workers: Mutex<Vec<WorkerSlot>>,
    engine: Arc<E>,
    config: PoolConfig,
    shutdown_token: CancellationToken,
}

impl<E: DigitEngine> WorkerPool<E> {
    /// Spawns `config.size` workers sharing `engine`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if `config.size` is zero, or
    /// [`Error::ChannelError`] if a worker thread cannot be spawned.
    pub fn new(config: PoolConfig, engine: E) -> Result<Self> {
        if config.size == 0 {
            return Err(Error::InvalidRequest {
                reason: "Worker pool size must be greater than 0".to_string(),
            });
        }

        let engine = Arc::new(engine);
        let workers = (0..config.size)
            .map(|worker_id| WorkerSlot::spawn(worker_id, Arc::clone(&engine)))
            .collect::<Result<Vec<_>>>()?;

        #[cfg(feature = "tracing")]
        tracing::info!(workers = config.size, respawn = ?config.respawn, "Worker pool started");

        Ok(Self {
            workers: Mutex::new(workers),
            engine,
            config,
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Number of workers in the pool.
    pub fn size(&self) -> usize {
        self.config.size
    }

    /// Returns `true` once [`WorkerPool::shutdown`] has been called.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Runs one round: sends `assignments[i]` to worker `i` and waits for all
    /// of them.
    ///
    /// On success the result holds one ordered result sequence per worker, in
    /// worker order.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] if `assignments.len()` differs from the pool
    ///   size.
    /// - [`Error::ServiceShutdown`] if the pool has been shut down.
    /// - [`Error::WorkerReported`] / [`Error::WorkerTerminated`] for the first
    ///   worker failure observed. Replies from the other workers of this round
    ///   are discarded.
    pub async fn dispatch(&self, assignments: Vec<Assignment>) -> Result<Vec<Vec<DigitResult>>> {
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }
        if assignments.len() != self.size() {
            return Err(Error::InvalidRequest {
                reason: format!(
                    "Expected {} assignments, got {}",
                    self.size(),
                    assignments.len()
                ),
            });
        }

        let mut workers = self.workers.lock().await;
        // Shutdown may have started while we waited for the previous round.
        if self.shutdown_token.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        self.revive(&mut workers)?;

        let mut pending = Vec::with_capacity(workers.len());
        let mut closed_inbox = None;
        for (worker_id, (slot, assignment)) in workers.iter().zip(assignments).enumerate() {
            let (response, rx) = oneshot::channel();
            if slot
                .tx
                .send(WorkRequest::Compute {
                    assignment,
                    response,
                })
                .await
                .is_err()
            {
                closed_inbox = Some(worker_id);
                break;
            }

            pending.push(async move {
                match rx.await {
                    Ok(Ok(digits)) => Ok(digits),
                    Ok(Err(e)) => Err(Error::WorkerReported {
                        worker_id,
                        source: Box::new(e),
                    }),
                    // The sender was dropped without a reply: the worker
                    // thread unwound mid-assignment.
                    Err(_) => Err(Error::WorkerTerminated { worker_id }),
                }
            });
        }

        if let Some(worker_id) = closed_inbox {
            // Workers already holding an assignment answer into dropped
            // receivers.
            drop(pending);
            return Err(self.mark_failed(&mut workers, Error::WorkerTerminated { worker_id }));
        }

        match try_join_all(pending).await {
            Ok(results) => Ok(results),
            Err(e) => Err(self.mark_failed(&mut workers, e)),
        }
    }

    /// Records a terminated worker so the next round can act on it.
    fn mark_failed(&self, workers: &mut [WorkerSlot], err: Error) -> Error {
        #[cfg(feature = "tracing")]
        tracing::warn!("Round aborted: {err}");

        if let Error::WorkerTerminated { worker_id } = err {
            if let Some(slot) = workers.get_mut(worker_id) {
                slot.terminated = true;
            }
        }
        err
    }

    /// Applies the respawn policy to every dead worker.
    fn revive(&self, workers: &mut [WorkerSlot]) -> Result<()> {
        for (worker_id, slot) in workers.iter_mut().enumerate() {
            if !slot.is_dead() {
                continue;
            }

            match self.config.respawn {
                RespawnPolicy::Never => {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {worker_id} is dead and respawn is disabled");
                    return Err(Error::WorkerTerminated { worker_id });
                }
                RespawnPolicy::OnFailure => {
                    #[cfg(feature = "tracing")]
                    tracing::info!("Respawning worker {worker_id}");

                    let fresh = WorkerSlot::spawn(worker_id, Arc::clone(&self.engine))?;
                    let old = core::mem::replace(slot, fresh);
                    if let Some(handle) = old.handle {
                        reap(worker_id, handle);
                    }
                }
            }
        }
        Ok(())
    }

    /// Gracefully shuts down all workers in the pool.
    ///
    /// - Cancels the shutdown token so no new round starts.
    /// - Waits (up to `shutdown_timeout`) for an in-flight round to finish.
    /// - Sends a [`WorkRequest::Shutdown`] to each worker and waits (up to
    ///   `shutdown_timeout` per worker) for the acknowledgement.
    ///
    /// Calling this more than once is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        // === Phase 0: Refuse new rounds ===
        #[cfg(feature = "tracing")]
        tracing::info!("Refusing new rounds");
        self.shutdown_token.cancel();

        // === Phase 1: Wait for the in-flight round ===
        let Ok(mut workers) = timeout(self.config.shutdown_timeout, self.workers.lock()).await
        else {
            #[cfg(feature = "tracing")]
            tracing::warn!("In-flight round did not finish in time, leaving workers running");
            return Err(Error::ChannelError {
                context: "Timed out waiting for the in-flight round".to_string(),
            });
        };

        // === Phase 2: Notify workers ===
        #[cfg(feature = "tracing")]
        tracing::debug!("Notifying all workers to shut down");
        let mut acks = Vec::with_capacity(workers.len());
        for (_worker_id, slot) in workers.iter().enumerate() {
            let (tx, rx) = oneshot::channel();
            if let Err(_e) = slot.tx.send(WorkRequest::Shutdown { response: tx }).await {
                // Already gone: dead worker or a repeated shutdown.
                #[cfg(feature = "tracing")]
                tracing::debug!("Failed to send shutdown to worker {_worker_id}: {_e}");
            } else {
                acks.push((_worker_id, rx));
            }
        }

        let wait = self.config.shutdown_timeout;
        join_all(acks.into_iter().map(|(_worker_id, rx)| async move {
            match timeout(wait, rx).await {
                Ok(Ok(())) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Worker {_worker_id} shutdown acknowledged");
                }
                Ok(Err(_e)) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Worker {_worker_id} shutdown response: {_e}");
                }
                Err(_) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Worker {_worker_id} shutdown timed out");
                }
            }
        }))
        .await;

        // === Phase 3: Reap threads ===
        for (worker_id, slot) in workers.iter_mut().enumerate() {
            if let Some(handle) = slot.handle.take() {
                reap(worker_id, handle);
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!("Worker pool shutdown complete");
        Ok(())
    }
}

/// Joins a finished or finishing worker thread off the async runtime.
fn reap(_worker_id: usize, handle: JoinHandle<()>) {
    tokio::task::spawn_blocking(move || {
        if handle.join().is_err() {
            #[cfg(feature = "tracing")]
            tracing::warn!("Worker {_worker_id} exited with a panic");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bbp;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Panics on `position`, once or every time.
    struct PanicAt {
        position: u64,
        armed: AtomicBool,
        rearm: bool,
    }

    impl PanicAt {
        fn once(position: u64) -> Self {
            Self {
                position,
                armed: AtomicBool::new(true),
                rearm: false,
            }
        }

        fn always(position: u64) -> Self {
            Self {
                rearm: true,
                ..Self::once(position)
            }
        }
    }

    impl DigitEngine for PanicAt {
        fn digit_at(&self, position: u64) -> Result<char> {
            if position == self.position && self.armed.swap(self.rearm, Ordering::SeqCst) {
                panic!("injected worker crash at position {position}");
            }
            Bbp.digit_at(position)
        }
    }

    fn positions(p: &[u64]) -> Assignment {
        Assignment::Positions(p.to_vec())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rejects_empty_pool() {
        let err = WorkerPool::new(PoolConfig::with_size(0), Bbp).err().unwrap();
        assert!(matches!(err, Error::InvalidRequest { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dispatch_returns_results_in_worker_order() {
        let pool = WorkerPool::new(PoolConfig::with_size(3), Bbp).unwrap();
        let out = pool
            .dispatch(vec![positions(&[0, 1]), positions(&[2]), Assignment::NoWork])
            .await
            .unwrap();

        assert_eq!(
            out,
            vec![
                vec![DigitResult::new(0, '3'), DigitResult::new(1, '2')],
                vec![DigitResult::new(2, '4')],
                vec![],
            ]
        );
        pool.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dispatch_rejects_wrong_assignment_count() {
        let pool = WorkerPool::new(PoolConfig::with_size(2), Bbp).unwrap();
        let err = pool.dispatch(vec![Assignment::NoWork]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));
        pool.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reported_error_fails_round() {
        struct Overflowing;
        impl DigitEngine for Overflowing {
            fn digit_at(&self, position: u64) -> Result<char> {
                Err(Error::DigitOverflow { position })
            }
        }

        let pool = WorkerPool::new(PoolConfig::with_size(2), Overflowing).unwrap();
        let err = pool
            .dispatch(vec![Assignment::NoWork, positions(&[7])])
            .await
            .unwrap_err();

        assert_eq!(
            err,
            Error::WorkerReported {
                worker_id: 1,
                source: Box::new(Error::DigitOverflow { position: 7 }),
            }
        );
        pool.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn crashed_worker_is_respawned() {
        let pool = WorkerPool::new(PoolConfig::with_size(2), PanicAt::once(5)).unwrap();

        let err = pool
            .dispatch(vec![positions(&[4]), positions(&[5])])
            .await
            .unwrap_err();
        assert_eq!(err, Error::WorkerTerminated { worker_id: 1 });

        let out = pool
            .dispatch(vec![positions(&[4]), positions(&[5])])
            .await
            .unwrap();
        assert_eq!(out[1], vec![DigitResult::new(5, '6')]);
        pool.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn crashed_worker_stays_dead_without_respawn() {
        let config = PoolConfig {
            respawn: RespawnPolicy::Never,
            ..PoolConfig::with_size(2)
        };
        let pool = WorkerPool::new(config, PanicAt::always(0)).unwrap();

        let err = pool
            .dispatch(vec![positions(&[0]), positions(&[1])])
            .await
            .unwrap_err();
        assert_eq!(err, Error::WorkerTerminated { worker_id: 0 });

        // Position 0 is no longer requested, yet the dead slot still fails.
        let err = pool
            .dispatch(vec![positions(&[2]), positions(&[1])])
            .await
            .unwrap_err();
        assert_eq!(err, Error::WorkerTerminated { worker_id: 0 });
        pool.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn late_reply_never_completes_a_later_round() {
        /// Slow on position 100, failing on position 200.
        struct SlowAndFailing;
        impl DigitEngine for SlowAndFailing {
            fn digit_at(&self, position: u64) -> Result<char> {
                match position {
                    100 => {
                        std::thread::sleep(Duration::from_millis(300));
                        Ok('f')
                    }
                    200 => Err(Error::DigitOverflow { position }),
                    _ => Bbp.digit_at(position),
                }
            }
        }

        let pool = WorkerPool::new(PoolConfig::with_size(2), SlowAndFailing).unwrap();

        // Worker 1 fails at once while worker 0 is still busy.
        let err = pool
            .dispatch(vec![positions(&[100]), positions(&[200])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WorkerReported { worker_id: 1, .. }));

        // Worker 0 answers the abandoned round first; that reply is dropped.
        let out = pool
            .dispatch(vec![positions(&[1]), positions(&[2])])
            .await
            .unwrap();
        assert_eq!(
            out,
            vec![
                vec![DigitResult::new(1, '2')],
                vec![DigitResult::new(2, '4')],
            ]
        );
        pool.shutdown().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dispatch_after_shutdown_fails() {
        let pool = WorkerPool::new(PoolConfig::with_size(1), Bbp).unwrap();
        pool.shutdown().await.unwrap();
        assert!(pool.is_shutdown());

        let err = pool.dispatch(vec![Assignment::NoWork]).await.unwrap_err();
        assert_eq!(err, Error::ServiceShutdown);
        // A second shutdown is a no-op.
        pool.shutdown().await.unwrap();
    }
}
