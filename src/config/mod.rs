pub mod services;
pub mod settings;

pub use services::{ConfigError, QuerySource, ServiceSet, ServiceSpec};
pub use settings::MonitorConfig;
