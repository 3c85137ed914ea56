//! PostgreSQL 자격증명 저장소.
//!
//! 스키마는 `migrations/` 디렉토리에 있으며 [`PgCredentialStore::migrate`]로 적용합니다.
//!
//! # 동시성
//!
//! 회전은 하나의 트랜잭션에서 `SELECT ... FOR UPDATE`로 이전 행을 잠근 뒤
//! `revoked = FALSE` 조건부 UPDATE와 후속 행 INSERT를 수행합니다.
//! 같은 토큰을 동시에 회전하려는 두 번째 트랜잭션은 락을 기다렸다가
//! 이미 폐기된 행을 보게 됩니다.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use super::{CredentialStore, RotateOutcome, SuccessorToken};
use crate::config::DatabaseConfig;
use crate::domain::{RefreshTokenRecord, RoleSet, TokenState, User};
use crate::error::StoreError;

/// `users` + 집계된 `user_roles` 행.
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    roles: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            roles: RoleSet::from_iter(row.roles),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    user_id: Uuid,
    token_hash: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    revoked: bool,
    revoked_at: Option<DateTime<Utc>>,
    replaced_by: Option<String>,
}

impl From<RefreshTokenRow> for RefreshTokenRecord {
    fn from(row: RefreshTokenRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            token_hash: row.token_hash,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
            revoked: row.revoked,
            revoked_at: row.revoked_at,
            replaced_by: row.replaced_by,
        }
    }
}

const SELECT_USER: &str = r#"
    SELECT u.id, u.username, u.email, u.password_hash, u.created_at, u.updated_at,
           COALESCE(array_agg(r.role ORDER BY r.role) FILTER (WHERE r.role IS NOT NULL), '{}') AS roles
    FROM users u
    LEFT JOIN user_roles r ON r.user_id = u.id
"#;

const SELECT_REFRESH_TOKEN: &str = r#"
    SELECT id, user_id, token_hash, issued_at, expires_at, revoked, revoked_at, replaced_by
    FROM refresh_tokens
"#;

/// PostgreSQL 저장소.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// 기존 연결 풀로 생성.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 데이터베이스 설정으로 연결합니다.
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .connect(url)
            .await?;

        info!(max_connections = config.max_connections, "PostgreSQL 연결 완료");
        Ok(Self { pool })
    }

    /// 내부 연결 풀을 반환합니다.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 데이터베이스 마이그레이션을 실행합니다.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        info!("Running auth schema migrations...");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        info!("Migrations completed successfully");
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await?;

        for role in user.roles.iter() {
            sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
                .bind(user.id)
                .bind(role)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(user_id = %user.id, "user inserted");
        Ok(())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let query = format!("{SELECT_USER} WHERE u.username = $1 GROUP BY u.id");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, StoreError> {
        let query = format!("{SELECT_USER} WHERE u.id = $1 GROUP BY u.id");
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn add_role(&self, user_id: Uuid, role: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO user_roles (user_id, role) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove_role(&self, user_id: Uuid, role: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role = $2")
            .bind(user_id)
            .bind(role)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Corrupt(format!("user {} vanished", user_id)));
        }
        Ok(())
    }

    async fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens
                (id, user_id, token_hash, issued_at, expires_at, revoked, revoked_at, replaced_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.token_hash)
        .bind(record.issued_at)
        .bind(record.expires_at)
        .bind(record.revoked)
        .bind(record.revoked_at)
        .bind(&record.replaced_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let query = format!("{SELECT_REFRESH_TOKEN} WHERE token_hash = $1");
        let row = sqlx::query_as::<_, RefreshTokenRow>(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(RefreshTokenRecord::from))
    }

    async fn rotate_refresh_token(
        &self,
        token_hash: &str,
        successor: &SuccessorToken,
        now: DateTime<Utc>,
    ) -> Result<RotateOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let query = format!("{SELECT_REFRESH_TOKEN} WHERE token_hash = $1 FOR UPDATE");
        let current = sqlx::query_as::<_, RefreshTokenRow>(&query)
            .bind(token_hash)
            .fetch_optional(&mut *tx)
            .await?
            .map(RefreshTokenRecord::from);

        let Some(current) = current else {
            return Ok(RotateOutcome::NotFound);
        };

        let user_id = current.user_id;
        match current.state(now) {
            TokenState::Active => {}
            TokenState::Expired => return Ok(RotateOutcome::Expired { user_id }),
            state => return Ok(RotateOutcome::AlreadyRevoked { user_id, state }),
        }

        let updated = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE, revoked_at = $2, replaced_by = $3
            WHERE token_hash = $1 AND revoked = FALSE
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .bind(&successor.token_hash)
        .execute(&mut *tx)
        .await?;

        // 행 락을 잡고 있으므로 정상적으로는 도달하지 않음
        if updated.rows_affected() != 1 {
            return Ok(RotateOutcome::AlreadyRevoked {
                user_id,
                state: TokenState::Rotated,
            });
        }

        let next = RefreshTokenRecord::new(
            user_id,
            successor.token_hash.clone(),
            successor.issued_at,
            successor.expires_at,
        );
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, issued_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(next.id)
        .bind(next.user_id)
        .bind(&next.token_hash)
        .bind(next.issued_at)
        .bind(next.expires_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(RotateOutcome::Rotated(next))
    }

    async fn revoke_refresh_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE, revoked_at = $2
            WHERE token_hash = $1 AND revoked = FALSE
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke_all_refresh_tokens(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE, revoked_at = $2
            WHERE user_id = $1 AND revoked = FALSE
            "#,
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn purge_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
