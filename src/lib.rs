pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::cli::LocalStorage;
#[cfg(feature = "cli")]
pub use config::{BacklogConfig, CliConfig, PlanConfig};

pub use app::pipelines::{BacklogPipeline, PlanPipeline, RoutePipeline};
pub use core::etl::EtlEngine;
pub use utils::error::{EtlError, Result};
