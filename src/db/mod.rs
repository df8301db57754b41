// Database module - provides data access layer

use std::sync::Arc;
use std::time::Duration;

use color_eyre::{eyre::OptionExt, Result};

pub mod helpers;
pub mod models;
pub use models::*;

mod migrations;

mod analytics;
mod answer;
mod content;
mod learning;
mod question;
mod session;
mod user;

pub use session::{Completion, LevelStep};
pub use user::NewUser;

/// How long a local connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Db {
    db: Arc<libsql::Database>,
    local: bool,
}

impl Db {
    /// Open a local (`file:` prefixed) or remote libSQL database and apply migrations.
    pub async fn new(url: String, auth_token: Option<String>) -> Result<Self> {
        let local = url.starts_with("file:");
        let db = if let Some(path) = url.strip_prefix("file:") {
            libsql::Builder::new_local(path).build().await?
        } else {
            let token = auth_token.ok_or_eyre("remote databases need an auth token")?;
            libsql::Builder::new_remote(url.clone(), token).build().await?
        };

        let db = Self {
            db: Arc::new(db),
            local,
        };
        let conn = db.conn().await?;

        if local {
            // Readers keep going while one writer holds the lock.
            let mut rows = conn.query("PRAGMA journal_mode = WAL", ()).await?;
            let mode = rows
                .next()
                .await?
                .ok_or_eyre("journal mode not reported")?
                .get::<String>(0)?;
            tracing::debug!("journal mode: {mode}");
        }

        let one = conn
            .query("SELECT 1", ())
            .await?
            .next()
            .await?
            .ok_or_eyre("connection check failed")?
            .get::<i64>(0)?;
        color_eyre::eyre::ensure!(one == 1, "connection check returned {one}");

        migrations::run(&conn).await?;

        tracing::info!("database connection has been verified");

        Ok(db)
    }

    /// A fresh connection with foreign key enforcement turned on.
    ///
    /// Local connections wait up to [`BUSY_TIMEOUT`] for a concurrent writer
    /// instead of failing with `database is locked`.
    pub(crate) async fn conn(&self) -> Result<libsql::Connection> {
        let conn = self.db.connect()?;
        if self.local {
            conn.busy_timeout(BUSY_TIMEOUT)?;
        }
        conn.execute("PRAGMA foreign_keys = ON", ()).await?;
        Ok(conn)
    }

    pub async fn migration_applied(&self, version: &str) -> Result<bool> {
        let conn = self.conn().await?;
        migrations::is_applied(&conn, version).await
    }
}
