use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use augur::adapter::outbound::sqlite::{create_pool, run_migrations, SqliteStore};
use augur::port::outbound::store::Store;

/// Temporary SQLite database for integration tests.
pub struct TempDb {
    path: PathBuf,
    pub store: Arc<dyn Store + Send + Sync>,
}

impl TempDb {
    pub fn create(name: &str) -> Self {
        let mut path = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        path.push(format!("augur-{name}-{nanos}.db"));

        let url = path.display().to_string();
        let pool = create_pool(&url).expect("create sqlite pool");
        run_migrations(&pool).expect("run migrations");

        Self {
            path,
            store: Arc::new(SqliteStore::new(pool)),
        }
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
