use std::sync::Arc;

use euprava_storage::{PortalStorage, Role, UserId, UserRecord};

use crate::catalog::require_admin;
use crate::error::PortalError;
use crate::identity::Actor;

/// Admin-only user directory and role management.
pub struct Users<S> {
    storage: Arc<S>,
}

impl<S> Clone for Users<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: PortalStorage> Users<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub async fn list(&self, actor: &Actor) -> Result<Vec<UserRecord>, PortalError> {
        require_admin(actor, "list users")?;
        Ok(self.storage.list_users().await?)
    }

    pub async fn get(&self, actor: &Actor, id: UserId) -> Result<UserRecord, PortalError> {
        require_admin(actor, "view users")?;
        Ok(self.storage.get_user(id).await?)
    }

    pub async fn change_role(
        &self,
        actor: &Actor,
        id: UserId,
        role: Role,
    ) -> Result<UserRecord, PortalError> {
        require_admin(actor, "change user roles")?;
        if id == actor.id {
            return Err(PortalError::PreconditionFailed(
                "administrators cannot change their own role".to_string(),
            ));
        }
        let user = self.storage.update_user_role(id, role).await?;
        tracing::info!(user_id = id, role = %role, actor = actor.id, "user role changed");
        Ok(user)
    }

    /// Remove a user account along with its sessions and the requests it
    /// owns. Refused while the user is reviewing a request.
    pub async fn delete(&self, actor: &Actor, id: UserId) -> Result<(), PortalError> {
        require_admin(actor, "delete users")?;
        if id == actor.id {
            return Err(PortalError::PreconditionFailed(
                "administrators cannot delete their own account".to_string(),
            ));
        }
        let removed = self.storage.delete_user(id).await?;
        tracing::info!(
            user_id = id,
            actor = actor.id,
            removed_requests = removed,
            "user deleted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use euprava_storage::{MemoryStorage, NewUser};

    async fn setup() -> (Users<MemoryStorage>, UserRecord) {
        let storage = Arc::new(MemoryStorage::new());
        let user = storage
            .insert_user(NewUser {
                name: "Marko".to_string(),
                email: "marko@example.rs".to_string(),
                date_of_birth: "1985-05-05".to_string(),
                jmbg: "0505985710002".to_string(),
                role: Role::Citizen,
                password_hash: String::new(),
            })
            .await
            .unwrap();
        (Users::new(storage), user)
    }

    #[tokio::test]
    async fn admin_promotes_citizen() {
        let (users, marko) = setup().await;
        let admin = Actor::new(100, Role::Admin);
        let updated = users.change_role(&admin, marko.id, Role::Officer).await.unwrap();
        assert_eq!(updated.role, Role::Officer);
        assert_eq!(users.list(&admin).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn role_changes_are_guarded() {
        let (users, marko) = setup().await;
        assert!(matches!(
            users
                .change_role(&Actor::new(marko.id, Role::Officer), marko.id, Role::Admin)
                .await,
            Err(PortalError::Forbidden(_))
        ));
        assert!(matches!(
            users
                .change_role(&Actor::new(marko.id, Role::Admin), marko.id, Role::Citizen)
                .await,
            Err(PortalError::PreconditionFailed(_))
        ));
        assert!(matches!(
            users
                .get(&Actor::new(1, Role::Admin), 4242)
                .await,
            Err(PortalError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn admin_deletes_other_accounts_only() {
        let (users, marko) = setup().await;
        let admin = Actor::new(100, Role::Admin);
        assert!(matches!(
            users.delete(&Actor::new(marko.id, Role::Citizen), marko.id).await,
            Err(PortalError::Forbidden(_))
        ));
        assert!(matches!(
            users.delete(&Actor::new(marko.id, Role::Admin), marko.id).await,
            Err(PortalError::PreconditionFailed(_))
        ));

        users.delete(&admin, marko.id).await.unwrap();
        assert!(users.list(&admin).await.unwrap().is_empty());
        assert!(matches!(
            users.delete(&admin, marko.id).await,
            Err(PortalError::NotFound(_))
        ));
    }
}
