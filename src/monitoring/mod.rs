//! Host observation: metric sampling, service status and alert evaluation

pub mod command;
pub mod evaluator;
pub mod metrics;
pub mod services;

pub use evaluator::evaluate;
pub use metrics::{MetricsError, MetricsProvider, SysinfoMetrics};
pub use services::{collect_statuses, ControllerError, RestartOutput, ServiceController, SystemctlController};
