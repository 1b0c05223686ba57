use std::sync::Arc;

use crate::analyst::Analyst;

#[derive(Clone)]
pub struct AppState {
    pub analyst: Arc<Analyst>,
}

impl AppState {
    pub fn new(analyst: Analyst) -> Self {
        Self {
            analyst: Arc::new(analyst),
        }
    }
}
