pub mod calendar;
pub mod context;
pub mod orchestrator;

pub use orchestrator::Pipeline;
