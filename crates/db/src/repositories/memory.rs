//! In-memory repositories. Test fixtures only; the sqlite repositories are
//! the authoritative store.

use std::collections::HashMap;

use tokio::sync::RwLock;

use reqflow_core::domain::requisition::{Requisition, RequisitionId, RequisitionStatus};
use reqflow_core::domain::user::{User, UserId};

use super::{RepositoryError, RequisitionRepository, UserRepository};

#[derive(Default)]
pub struct InMemoryRequisitionRepository {
    requisitions: RwLock<HashMap<String, Requisition>>,
}

#[async_trait::async_trait]
impl RequisitionRepository for InMemoryRequisitionRepository {
    async fn create(&self, requisition: &Requisition) -> Result<(), RepositoryError> {
        let mut requisitions = self.requisitions.write().await;
        requisitions.insert(requisition.id.0.clone(), requisition.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &RequisitionId,
    ) -> Result<Option<Requisition>, RepositoryError> {
        let requisitions = self.requisitions.read().await;
        Ok(requisitions.get(&id.0).cloned())
    }

    async fn list(
        &self,
        created_by: Option<&UserId>,
    ) -> Result<Vec<Requisition>, RepositoryError> {
        let requisitions = self.requisitions.read().await;
        let mut matched: Vec<Requisition> = requisitions
            .values()
            .filter(|record| created_by.map_or(true, |creator| &record.created_by == creator))
            .cloned()
            .collect();
        matched.sort_by(|left, right| {
            left.created_at.cmp(&right.created_at).then_with(|| left.id.0.cmp(&right.id.0))
        });
        Ok(matched)
    }

    async fn apply_transition(
        &self,
        requisition: &Requisition,
        expected: RequisitionStatus,
    ) -> Result<bool, RepositoryError> {
        let mut requisitions = self.requisitions.write().await;
        match requisitions.get_mut(&requisition.id.0) {
            Some(stored) if stored.status == expected => {
                *stored = requisition.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_content(&self, requisition: &Requisition) -> Result<bool, RepositoryError> {
        let mut requisitions = self.requisitions.write().await;
        match requisitions.get_mut(&requisition.id.0) {
            Some(stored)
                if matches!(
                    stored.status,
                    RequisitionStatus::Draft | RequisitionStatus::Pending
                ) =>
            {
                stored.title = requisition.title.clone();
                stored.description = requisition.description.clone();
                stored.items = requisition.items.clone();
                stored.total_cost = requisition.total_cost;
                stored.updated_at = requisition.updated_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: &RequisitionId) -> Result<bool, RepositoryError> {
        let mut requisitions = self.requisitions.write().await;
        Ok(requisitions.remove(&id.0).is_some())
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, (User, String)>>,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: &User, password_hash: &str) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        users.insert(user.id.0.clone(), (user.clone(), password_hash.to_string()));
        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&id.0).map(|(user, _)| user.clone()))
    }

    async fn find_by_email(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|(user, _)| user.email == email).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.read().await;
        let mut profiles: Vec<User> = users.values().map(|(user, _)| user.clone()).collect();
        profiles.sort_by(|left, right| {
            left.created_at.cmp(&right.created_at).then_with(|| left.id.0.cmp(&right.id.0))
        });
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use reqflow_core::domain::requisition::{
        Requisition, RequisitionId, RequisitionItem, RequisitionStatus,
    };
    use reqflow_core::domain::user::{Role, User, UserId};

    use crate::repositories::{
        InMemoryRequisitionRepository, InMemoryUserRepository, RequisitionRepository,
        UserRepository,
    };

    fn requisition(id: &str, created_by: &str) -> Requisition {
        let items = vec![RequisitionItem {
            id: format!("{id}-ITM-1"),
            name: "Chair".to_string(),
            description: "Ergonomic office chair".to_string(),
            quantity: 4,
            estimated_cost: Decimal::new(35_000, 2),
            justification: "Meeting room refit".to_string(),
        }];
        Requisition {
            id: RequisitionId(id.to_string()),
            title: "Office furniture".to_string(),
            description: "Chairs for the meeting room".to_string(),
            total_cost: Requisition::computed_total(&items),
            items,
            status: RequisitionStatus::Pending,
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
    async fn in_memory_requisition_repo_round_trip() {
        let repo = InMemoryRequisitionRepository::default();
        let record = requisition("REQ-1", "USR-1");

        repo.create(&record).await.expect("create");
        let found = repo.find_by_id(&record.id).await.expect("find");
        assert_eq!(found, Some(record));
    }

    #[tokio::test]
    async fn in_memory_list_filters_by_creator() {
        let repo = InMemoryRequisitionRepository::default();
        repo.create(&requisition("REQ-1", "USR-1")).await.expect("create");
        repo.create(&requisition("REQ-2", "USR-2")).await.expect("create");

        let owned = repo.list(Some(&UserId("USR-1".to_string()))).await.expect("list");
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].id.0, "REQ-1");
    }

    #[tokio::test]
    async fn in_memory_transition_guard_matches_sql_behavior() {
        let repo = InMemoryRequisitionRepository::default();
        let mut record = requisition("REQ-1", "USR-1");
        repo.create(&record).await.expect("create");

        record.status = RequisitionStatus::Approved;
        assert!(repo
            .apply_transition(&record, RequisitionStatus::Pending)
            .await
            .expect("transition"));
        assert!(!repo
            .apply_transition(&record, RequisitionStatus::Pending)
            .await
            .expect("transition"));
    }

    #[tokio::test]
    async fn in_memory_user_repo_round_trip() {
        let repo = InMemoryUserRepository::default();
        let profile = User {
            id: UserId("USR-1".to_string()),
            username: "jdoe".to_string(),
            email: "jdoe@example.com".to_string(),
            role: Role::User,
            department: "Marketing".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        repo.create(&profile, "hash").await.expect("create");
        let (found, hash) = repo
            .find_by_email("jdoe@example.com")
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(found, profile);
        assert_eq!(hash, "hash");
    }
}
