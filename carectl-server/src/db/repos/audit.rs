//! Audit trail of mutating requests

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use carectl_core::{Paginated, Pagination};

use super::total_of;
use crate::db::DbError;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub actor_name: Option<String>,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<Uuid>,
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

pub struct AuditRepo<'a> {
    pool: &'a PgPool,
}

impl<'a> AuditRepo<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        actor_id: Option<Uuid>,
        action: &str,
        entity: &str,
        entity_id: Option<Uuid>,
        details: Value,
    ) -> Result<(), DbError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (actor_id, action, entity, entity_id, details)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(actor_id)
        .bind(action)
        .bind(entity)
        .bind(entity_id)
        .bind(details)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Most recent first.
    pub async fn list(
        &self,
        entity: Option<&str>,
        actor_id: Option<Uuid>,
        page: Pagination,
    ) -> Result<Paginated<AuditEntry>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT a.id, a.actor_id, u.name AS actor_name, a.action, a.entity, a.entity_id,
                   a.details, a.created_at, COUNT(*) OVER() AS total
            FROM audit_logs a
            LEFT JOIN users u ON u.id = a.actor_id
            WHERE ($1::text IS NULL OR a.entity = $1)
              AND ($2::uuid IS NULL OR a.actor_id = $2)
            ORDER BY a.created_at DESC, a.id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(entity)
        .bind(actor_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let total = total_of(&rows);
        let items = rows
            .iter()
            .map(AuditEntry::from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page.wrap(items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repos::test_support::{pool, seed_user};
    use carectl_core::Role;
    use serde_json::json;

    #[tokio::test]
    #[ignore = "requires database"]
    async fn recorded_entries_are_listed_with_actor() {
        let pool = pool().await;
        let admin = seed_user(&pool, Role::Admin).await;
        let repo = AuditRepo::new(&pool);
        let target = Uuid::new_v4();

        repo.record(Some(admin.id), "update", "room", Some(target), json!({"maintenance": true}))
            .await
            .unwrap();

        let page = repo
            .list(Some("room"), Some(admin.id), Pagination::default())
            .await
            .unwrap();
        let entry = page.items.iter().find(|e| e.entity_id == Some(target)).unwrap();
        assert_eq!(entry.actor_name.as_deref(), Some(admin.name.as_str()));
        assert_eq!(entry.details["maintenance"], true);
    }
}
