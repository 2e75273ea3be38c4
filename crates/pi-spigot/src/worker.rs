//! Worker lifecycle and assignment processing.
//!
//! Each worker is a long-lived OS thread that owns a handle to the shared
//! [`DigitEngine`] and listens on its own bounded inbox. Digit extraction is
//! CPU-bound, so workers run on dedicated threads rather than async tasks and
//! block on [`mpsc::Receiver::blocking_recv`].
//!
//! A worker answers every [`WorkRequest::Compute`] exactly once through the
//! request's own one-shot channel. If the thread dies mid-assignment, the
//! sender is dropped during unwinding and the pool observes the closed channel
//! as an abnormal termination.

use crate::{
    engine::DigitEngine,
    error::Result,
    types::{Assignment, DigitResult},
};
use std::{sync::Arc, thread};
use tokio::sync::{mpsc, oneshot};

/// A message sent from the worker pool to an individual worker.
#[derive(Debug)]
pub enum WorkRequest {
    /// Compute every position of `assignment` and reply on `response`.
    Compute {
        assignment: Assignment,
        response: oneshot::Sender<Result<Vec<DigitResult>>>,
    },

    /// Request the worker to exit.
    ///
    /// - `response`: acknowledged right before the thread returns.
    Shutdown { response: oneshot::Sender<()> },
}

/// Computes one assignment, preserving assignment order.
///
/// [`Assignment::NoWork`] yields an empty result. The first digit that fails
/// aborts the whole assignment.
pub fn compute<E: DigitEngine + ?Sized>(
    engine: &E,
    assignment: &Assignment,
) -> Result<Vec<DigitResult>> {
    assignment
        .positions()
        .iter()
        .map(|&position| {
            engine
                .digit_at(position)
                .map(|digit| DigitResult::new(position, digit))
        })
        .collect()
}

/// Body of a worker thread.
///
/// Runs until a [`WorkRequest::Shutdown`] arrives or every sender for `rx` has
/// been dropped.
pub fn worker_loop<E: DigitEngine>(
    _worker_id: usize,
    mut rx: mpsc::Receiver<WorkRequest>,
    engine: Arc<E>,
) {
    #[cfg(feature = "tracing")]
    tracing::debug!("Worker {_worker_id} started");

    while let Some(work) = rx.blocking_recv() {
        match work {
            WorkRequest::Compute {
                assignment,
                response,
            } => {
                let result = compute(engine.as_ref(), &assignment);
                // The dispatcher may have given up on this round after another
                // worker failed. The late reply is simply discarded.
                if response.send(result).is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Worker {_worker_id} result discarded by dispatcher");
                }
            }
            WorkRequest::Shutdown { response } => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {_worker_id} received shutdown signal");

                if response.send(()).is_err() {
                    #[cfg(feature = "tracing")]
                    tracing::error!("Worker {_worker_id} failed to acknowledge shutdown");
                }
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!("Worker {_worker_id} stopped");
}

/// Spawns a worker thread named `pi-worker-{worker_id}`.
///
/// Returns the worker's inbox and the thread handle.
pub fn spawn_worker<E: DigitEngine>(
    worker_id: usize,
    engine: Arc<E>,
) -> std::io::Result<(mpsc::Sender<WorkRequest>, thread::JoinHandle<()>)> {
    // One request in flight per worker: the pool never sends a second
    // assignment before the first one is answered.
    let (tx, rx) = mpsc::channel(1);
    let handle = thread::Builder::new()
        .name(format!("pi-worker-{worker_id}"))
        .spawn(move || worker_loop(worker_id, rx, engine))?;
    Ok((tx, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bbp, Error};

    struct Failing;

    impl DigitEngine for Failing {
        fn digit_at(&self, position: u64) -> Result<char> {
            if position == 3 {
                Err(Error::DigitOverflow { position })
            } else {
                Ok('0')
            }
        }
    }

    #[test]
    fn no_work_yields_empty() {
        assert_eq!(compute(&Bbp, &Assignment::NoWork).unwrap(), vec![]);
    }

    #[test]
    fn preserves_assignment_order() {
        let out = compute(&Bbp, &Assignment::Positions(vec![2, 0, 1])).unwrap();
        assert_eq!(
            out,
            vec![
                DigitResult::new(2, '4'),
                DigitResult::new(0, '3'),
                DigitResult::new(1, '2'),
            ]
        );
    }

    #[test]
    fn first_failure_aborts_assignment() {
        let err = compute(&Failing, &Assignment::Positions(vec![1, 3, 5])).unwrap_err();
        assert_eq!(err, Error::DigitOverflow { position: 3 });
    }

    #[tokio::test]
    async fn worker_thread_answers_and_shuts_down() {
        let (tx, handle) = spawn_worker(0, Arc::new(Bbp)).unwrap();

        let (response, rx) = oneshot::channel();
        tx.send(WorkRequest::Compute {
            assignment: Assignment::Positions(vec![0, 1]),
            response,
        })
        .await
        .unwrap();
        let digits = rx.await.unwrap().unwrap();
        assert_eq!(digits.len(), 2);

        let (response, rx) = oneshot::channel();
        tx.send(WorkRequest::Shutdown { response }).await.unwrap();
        rx.await.unwrap();
        handle.join().unwrap();
        assert!(tx.is_closed());
    }
}
