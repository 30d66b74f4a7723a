//! User accounts (staff of every role)

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use carectl_core::models::{Email, PersonName, Phone};
use carectl_core::{Paginated, Pagination, Role};

use super::total_of;
use crate::db::error::stored;
use crate::db::DbError;

const USER_COLUMNS: &str =
    "id, email, name, role, phone, department, is_active, created_at, updated_at";

/// User record without credentials
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Result<Role, DbError> {
        stored(Role::parse(&self.role))
    }
}

/// What login needs, nothing more
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub password_hash: String,
    pub is_active: bool,
}

#[derive(Debug)]
pub struct NewUser {
    pub email: Email,
    pub name: PersonName,
    pub role: Role,
    pub password_hash: String,
    pub phone: Option<Phone>,
    pub department: Option<String>,
}

pub struct UserRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a user. A taken email is a conflict.
    pub async fn create(&self, user: NewUser) -> Result<User, DbError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, name, role, password_hash, phone, department)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.email.as_str())
        .bind(user.name.as_str())
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .bind(user.phone.as_ref().map(Phone::as_str))
        .bind(user.department.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| DbError::constraint(e, "a user with this email already exists"))
    }

    pub async fn find_credentials(&self, email: &Email) -> Result<Option<UserCredentials>, DbError> {
        let creds = sqlx::query_as::<_, UserCredentials>(
            "SELECT id, name, role, password_hash, is_active FROM users WHERE email = $1",
        )
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;
        Ok(creds)
    }

    pub async fn get(&self, id: Uuid) -> Result<User, DbError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("user", id))
    }

    /// `None` when the user does not exist.
    pub async fn is_active(&self, id: Uuid) -> Result<Option<bool>, DbError> {
        let active: Option<(bool,)> = sqlx::query_as("SELECT is_active FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(active.map(|(a,)| a))
    }

    pub async fn list(&self, role: Option<Role>, page: Pagination) -> Result<Paginated<User>, DbError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {USER_COLUMNS}, COUNT(*) OVER() AS total
            FROM users
            WHERE ($1::text IS NULL OR role = $1)
            ORDER BY name ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(role.map(|r| r.as_str()))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = total_of(&rows);
        let items = rows
            .iter()
            .map(User::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page.wrap(items, total))
    }

    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<User, DbError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET is_active = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(active)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("user", id))
    }

    pub async fn count_with_role(&self, role: Role) -> Result<i64, DbError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role.as_str())
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::test_support::{pool, unique_email};

    #[tokio::test]
    #[ignore = "requires database"]
    async fn duplicate_email_is_conflict() {
        let pool = pool().await;
        let repo = UserRepo::new(&pool);
        let email = unique_email("dup");

        let new_user = |email: &str| NewUser {
            email: Email::new(email).unwrap(),
            name: PersonName::new("Dana Scully").unwrap(),
            role: Role::Doctor,
            password_hash: "x".into(),
            phone: None,
            department: Some("Pathology".into()),
        };

        repo.create(new_user(&email)).await.expect("first insert");
        let err = repo.create(new_user(&email.to_uppercase())).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn deactivate_user() {
        let pool = pool().await;
        let repo = UserRepo::new(&pool);
        let user = repo
            .create(NewUser {
                email: Email::new(&unique_email("nurse")).unwrap(),
                name: PersonName::new("Carla Espinosa").unwrap(),
                role: Role::Nurse,
                password_hash: "x".into(),
                phone: None,
                department: None,
            })
            .await
            .unwrap();

        let user = repo.set_active(user.id, false).await.unwrap();
        assert!(!user.is_active);
        assert_eq!(repo.is_active(user.id).await.unwrap(), Some(false));
        assert_eq!(repo.is_active(Uuid::new_v4()).await.unwrap(), None);
    }
}
