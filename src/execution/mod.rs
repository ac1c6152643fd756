//! Matrix execution: expansion, scheduling, per-job pipelines and aggregation

pub mod aggregator;
pub mod engine;
pub mod executor;
pub mod expander;
pub mod scheduler;

pub use aggregator::aggregate;
pub use engine::{EventBus, EventHandler, ExecutionEngine, ExecutionEvent};
pub use executor::PipelineRunner;
pub use expander::expand;
pub use scheduler::{JobScheduler, SchedulingStrategy};
