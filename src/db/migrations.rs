use color_eyre::Result;
use libsql::params;

use super::helpers::query_one;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "V1",
        sql: include_str!("../../migrations/V1__init.sql"),
    },
    Migration {
        version: "V2",
        sql: include_str!("../../migrations/V2__adaptive_learning.sql"),
    },
    Migration {
        version: "V3",
        sql: include_str!("../../migrations/V3__analytics.sql"),
    },
];

pub async fn run(conn: &libsql::Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
        (),
    )
    .await?;

    for migration in MIGRATIONS {
        if is_applied(conn, migration.version).await? {
            continue;
        }

        let tx = conn.transaction().await?;
        tx.execute_batch(migration.sql).await?;
        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?)",
            params![migration.version],
        )
        .await?;
        tx.commit().await?;

        tracing::info!(version = migration.version, "applied database migration");
    }

    Ok(())
}

pub async fn is_applied(conn: &libsql::Connection, version: &str) -> Result<bool> {
    query_one::<bool>(
        conn,
        "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = ?)",
        params![version],
    )
    .await
}
