mod admission;
mod health;
mod metrics;

pub use admission::{bucket_handler, check_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;
