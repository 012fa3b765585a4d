//! Child registry: the list of children, default-catalog seeding, and the
//! cascade that keeps the other stores consistent on delete.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::errors::DomainError;
use crate::domain::templates;
use crate::storage::DbConnection;
use shared::{Child, CreateChildRequest};

/// Service for managing children in the points chart
#[derive(Clone)]
pub struct ChildService {
    db: Arc<DbConnection>,
}

impl ChildService {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self { db }
    }

    /// List all children in creation order
    pub async fn list_children(&self) -> Result<Vec<Child>, DomainError> {
        Ok(self.db.list_children().await?)
    }

    pub async fn get_child(&self, child_id: &str) -> Result<Option<Child>, DomainError> {
        Ok(self.db.get_child(child_id).await?)
    }

    /// Create a child, or rename an existing one when the caller supplies an
    /// ID that is already taken. The built-in schedule, task and reward
    /// templates are seeded only on first creation, so a rename never
    /// touches catalogs the family has since edited.
    pub async fn create_child(&self, request: CreateChildRequest) -> Result<Child, DomainError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::EmptyName);
        }

        let now = Utc::now();
        let id = request
            .id
            .unwrap_or_else(|| Child::generate_id(now.timestamp_millis() as u64));

        if let Some(mut existing) = self.db.get_child(&id).await? {
            existing.name = name;
            existing.updated_at = now.to_rfc3339();
            self.db.store_child(&existing).await?;
            info!("Renamed child {}: {}", existing.id, existing.name);
            return Ok(existing);
        }

        let child = Child {
            id,
            name,
            created_at: now.to_rfc3339(),
            updated_at: now.to_rfc3339(),
        };
        self.db.store_child(&child).await?;

        self.db
            .replace_schedule_entries(&child.id, &templates::default_schedule())
            .await?;
        self.db
            .replace_point_tasks(&child.id, &templates::default_point_tasks())
            .await?;
        self.db
            .replace_rewards(&child.id, &templates::default_rewards())
            .await?;

        info!("Created child {} ({}) with default catalogs", child.name, child.id);
        Ok(child)
    }

    /// Delete a child and cascade through catalogs and daily records.
    ///
    /// At least one child must always exist; deleting the only remaining
    /// child is rejected and nothing changes.
    pub async fn delete_child(&self, child_id: &str) -> Result<(), DomainError> {
        let child = self
            .db
            .get_child(child_id)
            .await?
            .ok_or_else(|| DomainError::ChildNotFound(child_id.to_string()))?;

        if self.db.count_children().await? <= 1 {
            warn!("Refusing to delete the last remaining child: {}", child_id);
            return Err(DomainError::LastChild);
        }

        self.db.delete_child_cascade(child_id).await?;
        info!("Deleted child {} ({}) and all its data", child.name, child.id);
        Ok(())
    }
}
