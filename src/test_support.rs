//! Fixtures shared by the in-crate tests.

use std::{collections::HashSet, time::Duration};

use migration::MigratorTrait;
use parking_lot::Mutex;
use sea_orm::{ConnectOptions, Database};

use crate::{
    domain::models::{EpubLocator, ProgressPayload},
    gateway::{ProgressGateway, PushError},
    storage::SeaOrmProgressStore,
};

/// Fresh migrated in-memory database. One connection, so every query sees the same database.
pub async fn memory_store() -> SeaOrmProgressStore {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opts).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    SeaOrmProgressStore::new(db)
}

pub fn paged(page: u32) -> ProgressPayload {
    ProgressPayload::Paged {
        page,
        elapsed_seconds: 60,
    }
}

pub fn epub(percentage: f64) -> ProgressPayload {
    ProgressPayload::Epub {
        locator: EpubLocator {
            href: "OEBPS/chapter-01.xhtml".into(),
            media_type: Some("application/xhtml+xml".into()),
            title: Some("Chapter 1".into()),
            cfi: None,
            progression: Some(0.25),
            position: Some(3),
            total_progression: Some(percentage / 100.0),
        },
        percentage,
        elapsed_seconds: 90,
    }
}

/// Gateway double recording every push it receives.
#[derive(Default)]
pub struct StubGateway {
    fail_all: bool,
    failing: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl StubGateway {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing_all() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn failing_for<const N: usize>(books: [&str; N]) -> Self {
        Self {
            failing: books.iter().map(|b| b.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, book_id: &str) -> usize {
        self.calls.lock().iter().filter(|b| *b == book_id).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait::async_trait]
impl ProgressGateway for StubGateway {
    async fn push_progress(
        &self,
        book_id: &str,
        _payload: &ProgressPayload,
    ) -> Result<(), PushError> {
        self.calls.lock().push(book_id.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_all {
            return Err(PushError::Transient("connection refused".into()));
        }
        if self.failing.contains(book_id) {
            return Err(PushError::Rejected("invalid progress".into()));
        }
        Ok(())
    }
}
