pub mod backlog_pipeline;
pub mod plan_pipeline;
pub mod route_pipeline;

pub use backlog_pipeline::{BacklogJob, BacklogPipeline};
pub use plan_pipeline::{PlanJob, PlanPipeline};
pub use route_pipeline::{RouteBatch, RoutePipeline};
