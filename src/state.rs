use std::sync::Arc;

use crate::{config::AppConfig, mail::Mailer, storage::RecordStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, mailer: Arc<dyn Mailer>, config: AppConfig) -> Self {
        Self {
            store,
            mailer,
            config: Arc::new(config),
        }
    }
}
