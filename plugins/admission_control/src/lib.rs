mod complexity;
mod config;
mod controller;
mod depth;
mod identity;
mod janitor;
mod plugin;
mod rate_limiter;
mod violation;


pub use crate::complexity::{query_complexity, CostModel, OperationKind};
pub use crate::config::AdmissionConfigError as ConfigError;
pub use crate::config::AdmissionControlPluginConfig as Config;
pub use crate::config::{CostModelConfig, JanitorConfig};
pub use crate::controller::AdmissionController;
pub use crate::depth::query_depth;
pub use crate::identity::{extract_caller_id, CallerId, IdentityError};
pub use crate::janitor::StateJanitor;
pub use crate::plugin::AdmissionControlPlugin as Plugin;
pub use crate::rate_limiter::{RateLimiter, SweepStats};
pub use crate::violation::AdmissionViolation;
