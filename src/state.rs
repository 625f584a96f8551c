use std::sync::Arc;

use crate::key::KeySource;
use crate::rate_limit::Limiter;

// app's shared state
pub struct AppState {
    pub limiter: Arc<Limiter>,       // answers admission checks for callers
    pub guard: Option<Arc<Limiter>>, // protects the admission API itself
    pub key_source: KeySource,       // how the guard identifies a request
}

impl AppState {
    pub fn new(limiter: Arc<Limiter>, guard: Option<Arc<Limiter>>, key_source: KeySource) -> Self {
        Self {
            limiter,
            guard,
            key_source,
        }
    }
}
