//! # `pi-spigot`: Parallel BBP Digit Extraction
//!
//! `pi-spigot` computes the first `n` digits of pi by evaluating the
//! Bailey-Borwein-Plouffe (BBP) spigot formula for every hexadecimal position
//! independently, spreading those positions over a fixed pool of long-lived
//! worker threads, and converting the reassembled hexadecimal numeral to
//! base 10.
//!
//! ## Highlights
//!
//! - **Position-independent digits**: [`engine::Bbp`] yields the hex digit at
//!   any position without computing the ones before it.
//! - **Fixed worker pool**: [`pool::WorkerPool`] owns `P` dedicated threads,
//!   created once and reused for every request.
//! - **Round-based fan-out/fan-in**: [`scheduler::compute_digits`] splits the
//!   digit range into cycles and waits on a barrier per cycle.
//! - **All or nothing**: any worker failure aborts the request. No partial
//!   digits are ever returned.
//! - **Exact base conversion**: [`assembler`] converts the hex numeral with
//!   arbitrary precision integers and truncates, never rounds.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pi_spigot::{Bbp, PoolConfig, WorkerPool, compute_digits};
//!
//! # async fn run() -> pi_spigot::Result<()> {
//! let pool = WorkerPool::new(PoolConfig::with_size(3), Bbp)?;
//! let pi = compute_digits(&pool, 6, 1).await?;
//! assert_eq!(pi, "3.14159");
//! pool.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`engine`] - BBP digit extraction for a single position.
//! - [`worker`] - Worker thread body and its message protocol.
//! - [`pool`] - Fixed-size worker pool with per-round completion channels.
//! - [`scheduler`] - Cycle and per-worker partitioning, request driver.
//! - [`assembler`] - Ordering, hex numeral building, decimal rendering.
//! - [`types`] - Positions, assignments and digit results.
//! - [`error`] - Unified error type.

pub mod assembler;
pub mod engine;
pub mod error;
pub mod pool;
pub mod scheduler;
pub mod types;
pub mod worker;

pub use engine::{Bbp, DigitEngine};
pub use error::{Error, Result};
pub use pool::{PoolConfig, RespawnPolicy, WorkerPool};
pub use scheduler::{MAX_REQUEST_DIGITS, compute_digits};
pub use types::{Assignment, DigitPosition, DigitResult};
