mod emergency;
mod health;
mod metrics;

pub use emergency::{emergency_handler, method_not_allowed};
pub use health::health_handler;
pub use metrics::metrics_handler;
