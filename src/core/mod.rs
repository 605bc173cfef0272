pub mod assembler;
pub mod backlog;
pub mod classifier;
pub mod coordinates;
pub mod etl;
pub mod fetch;
pub mod matcher;
pub mod normalize;
pub mod plan;
pub mod records;
pub mod report;
pub mod sequencer;
pub mod table;

pub use crate::domain::model::{RoutePlan, SequencedRoute, Shipment};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;
