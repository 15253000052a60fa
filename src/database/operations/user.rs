use std::str::FromStr;

use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::database::UserStore;
use crate::database::models::user::UserRow;
use crate::error::StoreError;
use crate::models::{User, UserId};

const CREATE_USERS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        username TEXT NOT NULL,
        email TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
"#;

/// 基于 SQLite 的本地用户库
#[derive(Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

impl SqliteUserStore {
    /// 连接数据库并建表
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // 内存库每个连接各自独立，只能保留一个常驻连接
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(10)
        };

        let pool = pool_options.connect_with(options).await?;
        let store = Self::from_pool(pool);
        store.migrate().await?;

        tracing::info!("Local user store ready at {}", database_url);
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_USERS_TABLE).execute(&self.pool).await?;
        Ok(())
    }
}

impl UserStore for SqliteUserStore {
    async fn get(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, username, email, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn put(&self, user: &User) -> Result<(), StoreError> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, name, username, email, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                username = excluded.username,
                email = excluded.email,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user.id.0)
        .bind(&user.name)
        .bind(&user.username)
        .bind(&user.email)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Stored user {} locally", user.id);
        Ok(())
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn all(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, username, email, created_at, updated_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM users").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
