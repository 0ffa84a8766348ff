//! Institutions, service types and services.
//!
//! Services and types are readable by every authenticated role; non-admins
//! only ever see `ACTIVE` services. Institutions are an administrative
//! record and are admin-only even for reads. Every write is admin-only.
//!
//! Deleting a service, an institution or a type also deletes the service
//! requests filed against the services that go with it.

use std::sync::Arc;

use euprava_storage::{
    InstitutionRecord, NewInstitution, NewService, NewType, PortalStorage, Role, ServiceFilter,
    ServiceId, ServiceRecord, ServiceStatus, StorageError, TypeRecord,
};

use crate::error::PortalError;
use crate::identity::Actor;
use crate::input::{InstitutionInput, ServiceInput, ServiceQuery, TypeInput};

pub struct Catalog<S> {
    storage: Arc<S>,
}

impl<S> Clone for Catalog<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: PortalStorage> Catalog<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    pub async fn list_services(
        &self,
        actor: &Actor,
        query: ServiceQuery,
    ) -> Result<Vec<ServiceRecord>, PortalError> {
        let filter = ServiceFilter {
            active_only: actor.role != Role::Admin,
            institution_id: query.institution_id,
            type_id: query.type_id,
        };
        Ok(self.storage.list_services(&filter).await?)
    }

    /// An inactive service is reported as missing to non-admins.
    pub async fn get_service(
        &self,
        actor: &Actor,
        id: ServiceId,
    ) -> Result<ServiceRecord, PortalError> {
        let service = self.storage.get_service(id).await?;
        if actor.role != Role::Admin && service.status != ServiceStatus::Active {
            return Err(StorageError::ServiceNotFound { service_id: id }.into());
        }
        Ok(service)
    }

    pub async fn create_service(
        &self,
        actor: &Actor,
        input: ServiceInput,
    ) -> Result<ServiceRecord, PortalError> {
        require_admin(actor, "create services")?;
        input.require_complete()?;
        let c = input.change;
        let new = NewService {
            institution_id: c.institution_id.unwrap_or_default(),
            type_id: c.type_id.unwrap_or_default(),
            name: c.name.unwrap_or_default(),
            description: c.description.flatten(),
            fee: c.fee.unwrap_or_default(),
            requires_attachment: c.requires_attachment.unwrap_or_default(),
            status: c.status.unwrap_or(ServiceStatus::Active),
        };
        let service = self
            .storage
            .insert_service(new)
            .await
            .map_err(reference_error)?;
        tracing::info!(service_id = service.id, actor = actor.id, "service created");
        Ok(service)
    }

    /// Partial update. Existing requests keep the payment status they were
    /// created with even if the fee changes.
    pub async fn update_service(
        &self,
        actor: &Actor,
        id: ServiceId,
        input: ServiceInput,
    ) -> Result<ServiceRecord, PortalError> {
        require_admin(actor, "update services")?;
        let service = self
            .storage
            .update_service(id, input.change)
            .await
            .map_err(|e| match e {
                StorageError::ServiceNotFound { .. } => e.into(),
                other => reference_error(other),
            })?;
        tracing::info!(service_id = id, actor = actor.id, "service updated");
        Ok(service)
    }

    pub async fn delete_service(&self, actor: &Actor, id: ServiceId) -> Result<(), PortalError> {
        require_admin(actor, "delete services")?;
        let removed = self.storage.delete_service(id).await?;
        tracing::info!(
            service_id = id,
            actor = actor.id,
            removed_requests = removed,
            "service deleted"
        );
        Ok(())
    }

    // ── Institutions ─────────────────────────────────────────────────────────

    pub async fn list_institutions(
        &self,
        actor: &Actor,
    ) -> Result<Vec<InstitutionRecord>, PortalError> {
        require_admin(actor, "list institutions")?;
        Ok(self.storage.list_institutions().await?)
    }

    pub async fn get_institution(
        &self,
        actor: &Actor,
        id: i64,
    ) -> Result<InstitutionRecord, PortalError> {
        require_admin(actor, "view institutions")?;
        Ok(self.storage.get_institution(id).await?)
    }

    pub async fn create_institution(
        &self,
        actor: &Actor,
        input: InstitutionInput,
    ) -> Result<InstitutionRecord, PortalError> {
        require_admin(actor, "create institutions")?;
        input.require_complete()?;
        let c = input.change;
        let institution = self
            .storage
            .insert_institution(NewInstitution {
                name: c.name.unwrap_or_default(),
                city: c.city.unwrap_or_default(),
                address: c.address.unwrap_or_default(),
                email: c.email.flatten(),
            })
            .await?;
        tracing::info!(institution_id = institution.id, actor = actor.id, "institution created");
        Ok(institution)
    }

    pub async fn update_institution(
        &self,
        actor: &Actor,
        id: i64,
        input: InstitutionInput,
    ) -> Result<InstitutionRecord, PortalError> {
        require_admin(actor, "update institutions")?;
        let institution = self.storage.update_institution(id, input.change).await?;
        tracing::info!(institution_id = id, actor = actor.id, "institution updated");
        Ok(institution)
    }

    pub async fn delete_institution(&self, actor: &Actor, id: i64) -> Result<(), PortalError> {
        require_admin(actor, "delete institutions")?;
        let removed = self.storage.delete_institution(id).await?;
        tracing::info!(
            institution_id = id,
            actor = actor.id,
            removed_requests = removed,
            "institution deleted"
        );
        Ok(())
    }

    // ── Types ────────────────────────────────────────────────────────────────

    pub async fn list_types(&self) -> Result<Vec<TypeRecord>, PortalError> {
        Ok(self.storage.list_types().await?)
    }

    pub async fn get_type(&self, id: i64) -> Result<TypeRecord, PortalError> {
        Ok(self.storage.get_type(id).await?)
    }

    pub async fn create_type(
        &self,
        actor: &Actor,
        input: TypeInput,
    ) -> Result<TypeRecord, PortalError> {
        require_admin(actor, "create types")?;
        input.require_complete()?;
        let c = input.change;
        let service_type = self
            .storage
            .insert_type(NewType {
                name: c.name.unwrap_or_default(),
                description: c.description.flatten(),
            })
            .await?;
        tracing::info!(type_id = service_type.id, actor = actor.id, "type created");
        Ok(service_type)
    }

    pub async fn update_type(
        &self,
        actor: &Actor,
        id: i64,
        input: TypeInput,
    ) -> Result<TypeRecord, PortalError> {
        require_admin(actor, "update types")?;
        let service_type = self.storage.update_type(id, input.change).await?;
        tracing::info!(type_id = id, actor = actor.id, "type updated");
        Ok(service_type)
    }

    pub async fn delete_type(&self, actor: &Actor, id: i64) -> Result<(), PortalError> {
        require_admin(actor, "delete types")?;
        let removed = self.storage.delete_type(id).await?;
        tracing::info!(
            type_id = id,
            actor = actor.id,
            removed_requests = removed,
            "type deleted"
        );
        Ok(())
    }
}

pub(crate) fn require_admin(actor: &Actor, what: &str) -> Result<(), PortalError> {
    if actor.role == Role::Admin {
        Ok(())
    } else {
        Err(PortalError::Forbidden(format!(
            "only administrators may {what}"
        )))
    }
}

/// A dangling institution or type reference in a service body is a field error.
fn reference_error(e: StorageError) -> PortalError {
    match e {
        StorageError::InstitutionNotFound { .. } => {
            PortalError::invalid_field("institution_id", "the selected institution_id is invalid")
        }
        StorageError::TypeNotFound { .. } => {
            PortalError::invalid_field("type_id", "the selected type_id is invalid")
        }
        other => other.into(),
    }
}
