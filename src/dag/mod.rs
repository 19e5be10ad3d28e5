// src/dag/mod.rs

pub mod clarify;
pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod task_info;

pub use clarify::ClarificationPolicy;
pub use graph::TaskGraph;
pub use scheduler::Scheduler;
pub use scheduler_step::{Dispatch, SchedulerStep};
pub use task_info::{ScheduledTask, TaskId, TaskOrigin, TaskRunState};
