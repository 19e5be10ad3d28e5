// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`executor`] defines the synchronous `Executor` contract and the
//!   role -> executor registry.
//! - [`shell`] and [`human`] are the two local executors.
//! - [`ai`] hands AI-role tasks to the external AI subsystem.
//! - [`backend`] provides the `ExecutorBackend` trait the runtime talks to.
//! - [`pool`] is the production backend: a bounded worker pool.

pub mod ai;
pub mod backend;
pub mod executor;
pub mod human;
pub mod pool;
pub mod shell;

pub use ai::{AiDispatcher, QueueFileDispatcher};
pub use backend::ExecutorBackend;
pub use executor::{Executor, ExecutorRegistry};
pub use human::HumanExecutor;
pub use pool::WorkerPool;
pub use shell::ShellExecutor;
