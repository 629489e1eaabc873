use std::sync::Arc;

use sqlx::SqlitePool;

use crate::core::config::Settings;
use crate::services::exam_timer::TimerRegistry;
use crate::services::storage::StorageService;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: SqlitePool,
    storage: StorageService,
    timers: TimerRegistry,
}

impl AppState {
    pub(crate) fn new(settings: Settings, db: SqlitePool, storage: StorageService) -> Self {
        Self {
            inner: Arc::new(InnerState { settings, db, storage, timers: TimerRegistry::new() }),
        }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    pub(crate) fn storage(&self) -> &StorageService {
        &self.inner.storage
    }

    pub(crate) fn timers(&self) -> &TimerRegistry {
        &self.inner.timers
    }
}
