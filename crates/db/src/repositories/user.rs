use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use reqflow_core::domain::user::{Role, User, UserId};

use super::{RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn create(&self, user: &User, password_hash: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO app_user
                (id, username, email, password_hash, role, department, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id.0)
        .bind(&user.username)
        .bind(&user.email)
        .bind(password_hash)
        .bind(user.role.as_str())
        .bind(&user.department)
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, username, email, role, department, created_at, updated_at
             FROM app_user WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(decode_user).transpose()
    }

    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, username, email, password_hash, role, department, created_at, updated_at
             FROM app_user WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user = decode_user(&row)?;
        let password_hash = get_text(&row, "password_hash")?;
        Ok(Some((user, password_hash)))
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, username, email, role, department, created_at, updated_at
             FROM app_user ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_user).collect()
    }
}

fn decode_user(row: &SqliteRow) -> Result<User, RepositoryError> {
    Ok(User {
        id: UserId(get_text(row, "id")?),
        username: get_text(row, "username")?,
        email: get_text(row, "email")?,
        role: parse_role(&get_text(row, "role")?)?,
        department: get_text(row, "department")?,
        created_at: parse_timestamp(&get_text(row, "created_at")?)?,
        updated_at: parse_timestamp(&get_text(row, "updated_at")?)?,
    })
}

fn get_text(row: &SqliteRow, column: &str) -> Result<String, RepositoryError> {
    row.try_get::<String, _>(column)
        .map_err(|error| RepositoryError::Decode(format!("column `{column}`: {error}")))
}

fn parse_role(value: &str) -> Result<Role, RepositoryError> {
    value.parse::<Role>().map_err(|error| RepositoryError::Decode(error.to_string()))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("timestamp `{value}`: {error}")))
}
