//! Cycle planning and request execution.
//!
//! A request for `n` digits in `x` cycles is driven in two levels of
//! partitioning:
//!
//! 1. [`plan_cycles`] slices positions `0..n` into `x` cycles.
//! 2. [`plan_assignments`] slices one cycle into one [`Assignment`] per worker.
//!
//! Both levels use the same rule: cut the slice into equal contiguous chunks of
//! `len / parts` positions, then hand the `len % parts` leftover positions out
//! one each to the earliest chunks. Every position lands in exactly one chunk.
//!
//! [`compute_digits`] runs the cycles strictly one after another. A cycle is
//! dispatched only after the previous one fully succeeded, which caps the work
//! in flight at one cycle and keeps aggregation trivial, at the cost of
//! leaving workers idle while the slowest one of a cycle finishes.

use crate::{
    assembler::assemble,
    engine::DigitEngine,
    error::{Error, Result},
    pool::WorkerPool,
    types::{Assignment, DigitPosition},
};


/// Largest number of digits a single request may ask for.
///
/// Planning materializes every position up front, so `n` is capped well
/// below anything that could exhaust memory. The `f64` engine stops being
/// accurate long before this.
pub const MAX_REQUEST_DIGITS: u64 = 1 << 24;

/// Splits positions `0..n` into `x` cycles.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] unless `1 <= n <= MAX_REQUEST_DIGITS`
/// and `1 <= x <= n`.
pub fn plan_cycles(n: u64, x: u64) -> Result<Vec<Vec<DigitPosition>>> {
    if n == 0 {
        return Err(invalid("n must be greater than or equal to 1"));
    }
    if n > MAX_REQUEST_DIGITS {
        return Err(invalid(format!(
            "n must not exceed {MAX_REQUEST_DIGITS}, got {n}"
        )));
    }
    if x == 0 || x > n {
        return Err(invalid(format!("x must be between 1 and n ({n}), got {x}")));
    }

    let cycles = usize::try_from(x).map_err(|_| invalid("x does not fit in memory"))?;
    let positions: Vec<DigitPosition> = (0..n).collect();
    Ok(partition(&positions, cycles))
}

/// Splits one cycle into exactly `pool_size` assignments.
///
/// With fewer positions than workers, the first workers get one position each
/// and the rest get [`Assignment::NoWork`].
pub fn plan_assignments(cycle: &[DigitPosition], pool_size: usize) -> Vec<Assignment> {
    if cycle.len() < pool_size {
        return cycle
            .iter()
            .map(|&position| Assignment::Positions(vec![position]))
            .chain(core::iter::repeat(Assignment::NoWork))
            .take(pool_size)
            .collect();
    }

    partition(cycle, pool_size)
        .into_iter()
        .map(Assignment::Positions)
        .collect()
}

/// Equal contiguous chunks, leftovers appended one by one to the first chunks.
///
/// Requires `0 < parts <= items.len()`.
fn partition(items: &[DigitPosition], parts: usize) -> Vec<Vec<DigitPosition>> {
    debug_assert!(parts > 0 && parts <= items.len());

    let per_part = items.len() / parts;
    let (even, leftover) = items.split_at(per_part * parts);

    let mut chunks: Vec<Vec<DigitPosition>> = even.chunks(per_part).map(<[_]>::to_vec).collect();
    for (chunk, &position) in chunks.iter_mut().zip(leftover) {
        chunk.push(position);
    }
    chunks
}

/// Computes the first `n` digits of pi as a decimal string, using `x` cycles
/// over `pool`.
///
/// The output is the integer digit, a decimal point, and up to `n - 1`
/// fractional digits, truncated rather than rounded. For `n == 1` it is just
/// `"3"`.
///
/// # Errors
///
/// Any failure aborts the whole request and no digits are returned:
/// - [`Error::InvalidRequest`] if `n` or `x` is out of range.
/// - Any error from [`WorkerPool::dispatch`] for any cycle.
/// - [`Error::Assembly`] if the collected results do not cover `0..n`.
#[cfg_attr(feature = "tracing", tracing::instrument(skip(pool), fields(workers = pool.size())))]
pub async fn compute_digits<E: DigitEngine>(pool: &WorkerPool<E>, n: u64, x: u64) -> Result<String> {
    let plan = plan_cycles(n, x)?;
    let mut results = Vec::with_capacity(plan.iter().map(Vec::len).sum());

    for (_cycle, positions) in plan.iter().enumerate() {
        #[cfg(feature = "tracing")]
        tracing::debug!(cycle = _cycle, digits = positions.len(), "Dispatching cycle");

        let assignments = plan_assignments(positions, pool.size());
        let per_worker = pool.dispatch(assignments).await.inspect_err(|_e| {
            #[cfg(feature = "tracing")]
            tracing::error!(cycle = _cycle, "Cycle failed, aborting request: {_e}");
        })?;
        results.extend(per_worker.into_iter().flatten());
    }

    assemble(results, n)
}

fn invalid(reason: impl Into<String>) -> Error {
    Error::InvalidRequest {
        reason: reason.into(),
    }
}
