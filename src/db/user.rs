use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use color_eyre::{eyre::OptionExt, Result};
use libsql::params;
use ulid::Ulid;

use super::helpers::{begin_write, query_all, query_one, query_optional};
use super::models::{LevelChange, User, USER_COLUMNS};
use super::Db;
use crate::models::{ProfileUpdate, Role};

pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub role: Role,
}

impl Db {
    pub async fn create_user(&self, user: NewUser<'_>) -> Result<i64> {
        let password_hash = hash_password(user.password)?;
        let level = (user.role == Role::Student).then_some(crate::names::MIN_LEVEL);
        let conn = self.conn().await?;

        let user_id = conn
            .query(
                r#"INSERT INTO users (username, email, password_hash, first_name, last_name, role, cognitive_level)
                   VALUES (?, ?, ?, ?, ?, ?, ?)
                   RETURNING id"#,
                params![
                    user.username,
                    user.email,
                    password_hash,
                    user.first_name,
                    user.last_name,
                    user.role.as_str(),
                    level
                ],
            )
            .await?
            .next()
            .await?
            .ok_or_eyre("could not get user id")?
            .get::<i64>(0)?;

        tracing::info!(
            "new user created: id={user_id}, username={}, role={}",
            user.username,
            user.role
        );
        Ok(user_id)
    }

    pub async fn find_user(&self, user_id: i64) -> Result<Option<User>> {
        let conn = self.conn().await?;
        find_user_on(&conn, user_id).await
    }

    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn().await?;
        query_optional(
            &conn,
            &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.username = ?"),
            params![username],
        )
        .await
    }

    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let conn = self.conn().await?;
        let row = conn
            .query("SELECT 1 FROM users WHERE username = ?", params![username])
            .await?
            .next()
            .await?;
        Ok(row.is_some())
    }

    pub async fn verify_user_password(&self, username: &str, password: &str) -> Result<bool> {
        let conn = self.conn().await?;
        let stored_hash = query_optional::<String>(
            &conn,
            "SELECT password_hash FROM users WHERE username = ?",
            params![username],
        )
        .await?;

        match stored_hash {
            Some(hash) => Ok(verify_password(password, &hash)),
            None => Ok(false),
        }
    }

    pub async fn create_auth_token(&self, user_id: i64) -> Result<String> {
        let token = Ulid::new().to_string();
        let conn = self.conn().await?;

        conn.execute(
            "INSERT INTO auth_tokens (id, user_id) VALUES (?, ?)",
            params![token.clone(), user_id],
        )
        .await?;

        tracing::info!("new auth token issued for user_id={user_id}");
        Ok(token)
    }

    /// Resolve a bearer token issued less than `ttl_hours` ago.
    pub async fn get_user_by_token(&self, token: &str, ttl_hours: i64) -> Result<Option<User>> {
        let conn = self.conn().await?;
        query_optional(
            &conn,
            &format!(
                r#"SELECT {USER_COLUMNS}
                   FROM auth_tokens a
                   JOIN users u ON u.id = a.user_id
                   WHERE a.id = ? AND a.created_at > datetime('now', ?)"#
            ),
            params![token, format!("-{ttl_hours} hours")],
        )
        .await
    }

    pub async fn delete_auth_token(&self, token: &str) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute("DELETE FROM auth_tokens WHERE id = ?", params![token])
            .await?;
        Ok(())
    }

    pub async fn update_profile(&self, user_id: i64, update: &ProfileUpdate) -> Result<()> {
        let conn = self.conn().await?;
        conn.execute(
            r#"UPDATE users
               SET first_name = COALESCE(?, first_name),
                   last_name = COALESCE(?, last_name),
                   email = COALESCE(?, email)
               WHERE id = ?"#,
            params![
                update.first_name.as_deref().map(str::trim),
                update.last_name.as_deref().map(str::trim),
                update.email.as_deref().map(str::trim),
                user_id
            ],
        )
        .await?;
        Ok(())
    }

    /// Change password for an authenticated user. Verifies current password first.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<bool> {
        let conn = self.conn().await?;
        let stored_hash = query_optional::<String>(
            &conn,
            "SELECT password_hash FROM users WHERE id = ?",
            params![user_id],
        )
        .await?;

        let Some(stored_hash) = stored_hash else {
            return Ok(false);
        };

        if !verify_password(current_password, &stored_hash) {
            return Ok(false);
        }

        let new_hash = hash_password(new_password)?;
        conn.execute(
            "UPDATE users SET password_hash = ? WHERE id = ?",
            params![new_hash, user_id],
        )
        .await?;

        tracing::info!("password changed for user_id={user_id}");
        Ok(true)
    }

    /// Store a new level and append it to the level history.
    pub async fn record_level_change(
        &self,
        user_id: i64,
        old_level: i64,
        new_level: i64,
        reason: &str,
        session_id: Option<i64>,
    ) -> Result<()> {
        let conn = self.conn().await?;
        let tx = begin_write(&conn).await?;
        write_level_change(&tx, user_id, old_level, new_level, reason, session_id).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn mark_placement_taken(&self, user_id: i64) -> Result<()> {
        let conn = self.conn().await?;
        write_placement_taken(&conn, user_id).await
    }

    pub async fn level_history(&self, user_id: i64) -> Result<Vec<LevelChange>> {
        let conn = self.conn().await?;
        query_all(
            &conn,
            r#"SELECT old_level, new_level, reason, timestamp
               FROM level_history
               WHERE user_id = ?
               ORDER BY timestamp DESC, id DESC"#,
            params![user_id],
        )
        .await
    }

    /// Every student, highest level first.
    pub async fn students(&self) -> Result<Vec<User>> {
        let conn = self.conn().await?;
        query_all(
            &conn,
            &format!(
                "SELECT {USER_COLUMNS} FROM users u WHERE u.role = 'student' ORDER BY u.cognitive_level DESC, u.username"
            ),
            (),
        )
        .await
    }

    pub async fn count_students(&self) -> Result<i64> {
        let conn = self.conn().await?;
        query_one(&conn, "SELECT COUNT(*) FROM users WHERE role = 'student'", ()).await
    }

    pub async fn average_student_level(&self) -> Result<f64> {
        let conn = self.conn().await?;
        query_one(
            &conn,
            "SELECT COALESCE(AVG(CAST(cognitive_level AS REAL)), 0.0) FROM users WHERE role = 'student'",
            (),
        )
        .await
    }
}

pub(super) async fn find_user_on(
    conn: &libsql::Connection,
    user_id: i64,
) -> Result<Option<User>> {
    query_optional(
        conn,
        &format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?"),
        params![user_id],
    )
    .await
}

pub(super) async fn write_level_change(
    conn: &libsql::Connection,
    user_id: i64,
    old_level: i64,
    new_level: i64,
    reason: &str,
    session_id: Option<i64>,
) -> Result<()> {
    conn.execute(
        "UPDATE users SET cognitive_level = ? WHERE id = ?",
        params![new_level, user_id],
    )
    .await?;
    conn.execute(
        r#"INSERT INTO level_history (user_id, old_level, new_level, session_id, reason)
           VALUES (?, ?, ?, ?, ?)"#,
        params![user_id, old_level, new_level, session_id, reason],
    )
    .await?;

    tracing::info!("level changed for user_id={user_id}: {old_level} -> {new_level}");
    Ok(())
}

pub(super) async fn write_placement_taken(conn: &libsql::Connection, user_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE users SET has_taken_placement_test = 1 WHERE id = ?",
        params![user_id],
    )
    .await?;
    Ok(())
}

/// Run argon2 hashing on a dedicated thread with a large stack to avoid
/// stack overflow in debug builds.
fn hash_password(password: &str) -> Result<String> {
    let password = password.to_string();
    std::thread::Builder::new()
        .stack_size(4 * 1024 * 1024)
        .spawn(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(|h| h.to_string())
                .map_err(|e| color_eyre::eyre::eyre!("failed to hash password: {e}"))
        })?
        .join()
        .map_err(|_| color_eyre::eyre::eyre!("hash thread panicked"))?
}

fn verify_password(password: &str, hash: &str) -> bool {
    let password = password.to_string();
    let hash = hash.to_string();
    std::thread::Builder::new()
        .stack_size(4 * 1024 * 1024)
        .spawn(move || {
            let Ok(parsed_hash) = PasswordHash::new(&hash) else {
                return false;
            };
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok()
        })
        .map(|h| h.join().unwrap_or(false))
        .unwrap_or(false)
}
