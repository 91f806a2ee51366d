use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use reqflow_core::domain::requisition::{
    Requisition, RequisitionId, RequisitionItem, RequisitionStatus,
};
use reqflow_core::domain::user::UserId;

use super::{RepositoryError, RequisitionRepository};
use crate::DbPool;

pub struct SqlRequisitionRepository {
    pool: DbPool,
}

impl SqlRequisitionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_items(
        &self,
        requisition_id: &str,
    ) -> Result<Vec<RequisitionItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, description, quantity, estimated_cost, justification
             FROM requisition_item
             WHERE requisition_id = ?
             ORDER BY position",
        )
        .bind(requisition_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_item).collect()
    }
}

#[async_trait::async_trait]
impl RequisitionRepository for SqlRequisitionRepository {
    async fn create(&self, requisition: &Requisition) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO requisition
                (id, title, description, total_cost, status, created_by,
                 approved_by, approved_at, rejected_by, rejected_at,
                 rejection_reason, processing_notes, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&requisition.id.0)
        .bind(&requisition.title)
        .bind(&requisition.description)
        .bind(requisition.total_cost.to_string())
        .bind(requisition.status.as_str())
        .bind(&requisition.created_by.0)
        .bind(requisition.approved_by.as_ref().map(|id| id.0.as_str()))
        .bind(requisition.approved_at.map(|at| at.to_rfc3339()))
        .bind(requisition.rejected_by.as_ref().map(|id| id.0.as_str()))
        .bind(requisition.rejected_at.map(|at| at.to_rfc3339()))
        .bind(requisition.rejection_reason.as_deref())
        .bind(requisition.processing_notes.as_deref())
        .bind(requisition.created_at.to_rfc3339())
        .bind(requisition.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        insert_items(&mut tx, &requisition.id.0, &requisition.items).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &RequisitionId,
    ) -> Result<Option<Requisition>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, title, description, total_cost, status, created_by,
                    approved_by, approved_at, rejected_by, rejected_at,
                    rejection_reason, processing_notes, created_at, updated_at
             FROM requisition WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = self.load_items(&id.0).await?;
        decode_requisition(&row, items).map(Some)
    }

    async fn list(
        &self,
        created_by: Option<&UserId>,
    ) -> Result<Vec<Requisition>, RepositoryError> {
        let base = "SELECT id, title, description, total_cost, status, created_by,
                           approved_by, approved_at, rejected_by, rejected_at,
                           rejection_reason, processing_notes, created_at, updated_at
                    FROM requisition";

        let rows = match created_by {
            Some(creator) => {
                sqlx::query(&format!("{base} WHERE created_by = ? ORDER BY created_at, id"))
                    .bind(&creator.0)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query(&format!("{base} ORDER BY created_at, id"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut requisitions = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String =
                row.try_get("id").map_err(|error| RepositoryError::Decode(error.to_string()))?;
            let items = self.load_items(&id).await?;
            requisitions.push(decode_requisition(row, items)?);
        }

        Ok(requisitions)
    }

    async fn apply_transition(
        &self,
        requisition: &Requisition,
        expected: RequisitionStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE requisition
             SET status = ?, approved_by = ?, approved_at = ?, rejected_by = ?,
                 rejected_at = ?, rejection_reason = ?, processing_notes = ?, updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(requisition.status.as_str())
        .bind(requisition.approved_by.as_ref().map(|id| id.0.as_str()))
        .bind(requisition.approved_at.map(|at| at.to_rfc3339()))
        .bind(requisition.rejected_by.as_ref().map(|id| id.0.as_str()))
        .bind(requisition.rejected_at.map(|at| at.to_rfc3339()))
        .bind(requisition.rejection_reason.as_deref())
        .bind(requisition.processing_notes.as_deref())
        .bind(requisition.updated_at.to_rfc3339())
        .bind(&requisition.id.0)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_content(&self, requisition: &Requisition) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE requisition
             SET title = ?, description = ?, total_cost = ?, updated_at = ?
             WHERE id = ? AND status IN ('draft', 'pending')",
        )
        .bind(&requisition.title)
        .bind(&requisition.description)
        .bind(requisition.total_cost.to_string())
        .bind(requisition.updated_at.to_rfc3339())
        .bind(&requisition.id.0)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM requisition_item WHERE requisition_id = ?")
            .bind(&requisition.id.0)
            .execute(&mut *tx)
            .await?;
        insert_items(&mut tx, &requisition.id.0, &requisition.items).await?;
        tx.commit().await?;

        Ok(true)
    }

    async fn delete(&self, id: &RequisitionId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM requisition WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

async fn insert_items(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    requisition_id: &str,
    items: &[RequisitionItem],
) -> Result<(), RepositoryError> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO requisition_item
                (id, requisition_id, position, name, description, quantity,
                 estimated_cost, justification)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.id)
        .bind(requisition_id)
        .bind(position as i64)
        .bind(&item.name)
        .bind(&item.description)
        .bind(i64::from(item.quantity))
        .bind(item.estimated_cost.to_string())
        .bind(&item.justification)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

fn decode_requisition(
    row: &SqliteRow,
    items: Vec<RequisitionItem>,
) -> Result<Requisition, RepositoryError> {
    Ok(Requisition {
        id: RequisitionId(get_text(row, "id")?),
        title: get_text(row, "title")?,
        description: get_text(row, "description")?,
        items,
        total_cost: parse_decimal(&get_text(row, "total_cost")?)?,
        status: parse_status(&get_text(row, "status")?)?,
        created_by: UserId(get_text(row, "created_by")?),
        approved_by: get_optional_text(row, "approved_by")?.map(UserId),
        approved_at: get_optional_text(row, "approved_at")?
            .map(|value| parse_timestamp(&value))
            .transpose()?,
        rejected_by: get_optional_text(row, "rejected_by")?.map(UserId),
        rejected_at: get_optional_text(row, "rejected_at")?
            .map(|value| parse_timestamp(&value))
            .transpose()?,
        rejection_reason: get_optional_text(row, "rejection_reason")?,
        processing_notes: get_optional_text(row, "processing_notes")?,
        created_at: parse_timestamp(&get_text(row, "created_at")?)?,
        updated_at: parse_timestamp(&get_text(row, "updated_at")?)?,
    })
}

fn decode_item(row: &SqliteRow) -> Result<RequisitionItem, RepositoryError> {
    let quantity: i64 = row
        .try_get("quantity")
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    Ok(RequisitionItem {
        id: get_text(row, "id")?,
        name: get_text(row, "name")?,
        description: get_text(row, "description")?,
        quantity: u32::try_from(quantity).map_err(|_| {
            RepositoryError::Decode(format!("item quantity {quantity} out of range"))
        })?,
        estimated_cost: parse_decimal(&get_text(row, "estimated_cost")?)?,
        justification: get_text(row, "justification")?,
    })
}

fn get_text(row: &SqliteRow, column: &str) -> Result<String, RepositoryError> {
    row.try_get::<String, _>(column)
        .map_err(|error| RepositoryError::Decode(format!("column `{column}`: {error}")))
}

fn get_optional_text(row: &SqliteRow, column: &str) -> Result<Option<String>, RepositoryError> {
    row.try_get::<Option<String>, _>(column)
        .map_err(|error| RepositoryError::Decode(format!("column `{column}`: {error}")))
}

fn parse_decimal(value: &str) -> Result<Decimal, RepositoryError> {
    value
        .parse::<Decimal>()
        .map_err(|error| RepositoryError::Decode(format!("decimal `{value}`: {error}")))
}

fn parse_status(value: &str) -> Result<RequisitionStatus, RepositoryError> {
    value
        .parse::<RequisitionStatus>()
        .map_err(|error| RepositoryError::Decode(error.to_string()))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("timestamp `{value}`: {error}")))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use reqflow_core::domain::requisition::{
        Requisition, RequisitionId, RequisitionItem, RequisitionStatus,
    };
    use reqflow_core::domain::user::UserId;

    use crate::repositories::RequisitionRepository;
    use crate::{connect_with_settings, migrations};

    use super::SqlRequisitionRepository;

    async fn setup() -> crate::DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let now = Utc::now().to_rfc3339();
        for (id, username, email, role) in [
            ("USR-owner", "jdoe", "jdoe@example.com", "user"),
            ("USR-manager", "msmith", "msmith@example.com", "manager"),
        ] {
            sqlx::query(
                "INSERT INTO app_user
                    (id, username, email, password_hash, role, department, created_at, updated_at)
                 VALUES (?, ?, ?, 'x', ?, 'Operations', ?, ?)",
            )
            .bind(id)
            .bind(username)
            .bind(email)
            .bind(role)
            .bind(&now)
            .bind(&now)
            .execute(&pool)
            .await
            .expect("seed user");
        }

        pool
    }

    fn requisition(id: &str, created_by: &str, status: RequisitionStatus) -> Requisition {
        let items = vec![
            RequisitionItem {
                id: format!("{id}-ITM-1"),
                name: "Laptop".to_string(),
                description: "14-inch developer laptop".to_string(),
                quantity: 2,
                estimated_cost: Decimal::new(10_000, 2),
                justification: "Replacement hardware".to_string(),
            },
            RequisitionItem {
                id: format!("{id}-ITM-2"),
                name: "Dock".to_string(),
                description: "USB-C docking station".to_string(),
                quantity: 1,
                estimated_cost: Decimal::new(5_000, 2),
                justification: "Desk setup".to_string(),
            },
        ];
        Requisition {
            id: RequisitionId(id.to_string()),
            title: "Hardware refresh".to_string(),
            description: "Laptops and docks".to_string(),
            total_cost: Requisition::computed_total(&items),
            items,
            status,
            created_by: UserId(created_by.to_string()),
            approved_by: None,
            approved_at: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            processing_notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_then_find_round_trips_items_in_order() {
        let pool = setup().await;
        let repo = SqlRequisitionRepository::new(pool);
        let record = requisition("REQ-1", "USR-owner", RequisitionStatus::Pending);

        repo.create(&record).await.expect("create");
        let found = repo
            .find_by_id(&record.id)
            .await
            .expect("find")
            .expect("record exists");

        assert_eq!(found, record);
        assert_eq!(found.items[0].name, "Laptop");
        assert_eq!(found.items[1].name, "Dock");
        assert_eq!(found.total_cost, Decimal::new(25_000, 2));
    }

    #[tokio::test]
    async fn find_unknown_id_returns_none() {
        let pool = setup().await;
        let repo = SqlRequisitionRepository::new(pool);

        let found = repo.find_by_id(&RequisitionId("REQ-missing".to_string())).await.expect("find");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn list_filters_by_creator_equality() {
        let pool = setup().await;
        let repo = SqlRequisitionRepository::new(pool);

        repo.create(&requisition("REQ-1", "USR-owner", RequisitionStatus::Pending))
            .await
            .expect("create");
        repo.create(&requisition("REQ-2", "USR-manager", RequisitionStatus::Pending))
            .await
            .expect("create");
        repo.create(&requisition("REQ-3", "USR-owner", RequisitionStatus::Draft))
            .await
            .expect("create");

        let all = repo.list(None).await.expect("list all");
        assert_eq!(all.len(), 3);

        let owned = repo.list(Some(&UserId("USR-owner".to_string()))).await.expect("list owned");
        let ids: Vec<&str> = owned.iter().map(|record| record.id.0.as_str()).collect();
        assert_eq!(ids, vec!["REQ-1", "REQ-3"]);
    }

    #[tokio::test]
    async fn apply_transition_is_guarded_by_expected_status() {
        let pool = setup().await;
        let repo = SqlRequisitionRepository::new(pool);
        let mut record = requisition("REQ-1", "USR-owner", RequisitionStatus::Pending);
        repo.create(&record).await.expect("create");

        record.status = RequisitionStatus::Approved;
        record.approved_by = Some(UserId("USR-manager".to_string()));
        record.approved_at = Some(Utc::now());
        record.updated_at = Utc::now();

        let applied = repo
            .apply_transition(&record, RequisitionStatus::Pending)
            .await
            .expect("transition");
        assert!(applied);

        let stored = repo.find_by_id(&record.id).await.expect("find").expect("exists");
        assert_eq!(stored.status, RequisitionStatus::Approved);
        assert_eq!(stored.approved_by, Some(UserId("USR-manager".to_string())));

        // The guard misses once the status has moved on.
        let applied_again = repo
            .apply_transition(&record, RequisitionStatus::Pending)
            .await
            .expect("transition");
        assert!(!applied_again);
    }

    #[tokio::test]
    async fn update_content_replaces_items_while_editable() {
        let pool = setup().await;
        let repo = SqlRequisitionRepository::new(pool);
        let mut record = requisition("REQ-1", "USR-owner", RequisitionStatus::Draft);
        repo.create(&record).await.expect("create");

        record.title = "Hardware refresh (revised)".to_string();
        record.items.truncate(1);
        record.items[0].quantity = 3;
        record.total_cost = Requisition::computed_total(&record.items);
        record.updated_at = Utc::now();

        let updated = repo.update_content(&record).await.expect("update");
        assert!(updated);

        let stored = repo.find_by_id(&record.id).await.expect("find").expect("exists");
        assert_eq!(stored.title, "Hardware refresh (revised)");
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.total_cost, Decimal::new(30_000, 2));
    }

    #[tokio::test]
    async fn update_content_refuses_once_past_editing() {
        let pool = setup().await;
        let repo = SqlRequisitionRepository::new(pool);
        let mut record = requisition("REQ-1", "USR-owner", RequisitionStatus::Pending);
        repo.create(&record).await.expect("create");

        record.status = RequisitionStatus::Approved;
        record.approved_by = Some(UserId("USR-manager".to_string()));
        record.approved_at = Some(Utc::now());
        assert!(repo
            .apply_transition(&record, RequisitionStatus::Pending)
            .await
            .expect("transition"));

        record.title = "Too late".to_string();
        let updated = repo.update_content(&record).await.expect("update");
        assert!(!updated);
    }

    #[tokio::test]
    async fn delete_removes_record_and_items() {
        let pool = setup().await;
        let repo = SqlRequisitionRepository::new(pool.clone());
        let record = requisition("REQ-1", "USR-owner", RequisitionStatus::Draft);
        repo.create(&record).await.expect("create");

        assert!(repo.delete(&record.id).await.expect("delete"));
        assert!(repo.find_by_id(&record.id).await.expect("find").is_none());

        let orphaned: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM requisition_item WHERE requisition_id = ?")
                .bind(&record.id.0)
                .fetch_one(&pool)
                .await
                .expect("count items");
        assert_eq!(orphaned, 0);

        // Idempotent from the caller's perspective: a second delete simply
        // reports nothing matched.
        assert!(!repo.delete(&record.id).await.expect("delete again"));
    }
}
