//! In-process `PortalStorage` backend.
//!
//! All tables live behind one mutex, so every trait method is a single
//! critical section. That makes each conditional write atomic in the same
//! way a single `UPDATE ... WHERE` is in a relational backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{
    timestamp_now, InstitutionChange, InstitutionRecord, NewInstitution, NewRequest, NewService,
    NewType, NewUser, RequestChange, RequestFilter, RequestGuard, RequestId, RequestRecord,
    RequestStatus, Role, ServiceChange, ServiceFilter, ServiceId, ServiceRecord, TypeChange,
    TypeRecord, UserId, UserRecord,
};
use crate::traits::PortalStorage;

#[derive(Default)]
struct Tables {
    next_id: i64,
    requests: BTreeMap<RequestId, RequestRecord>,
    institutions: BTreeMap<i64, InstitutionRecord>,
    types: BTreeMap<i64, TypeRecord>,
    services: BTreeMap<ServiceId, ServiceRecord>,
    users: BTreeMap<UserId, UserRecord>,
    sessions: HashMap<String, UserId>,
}

impl Tables {
    /// Ids are drawn from one sequence shared by all tables.
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_unique_service_name(
        &self,
        name: &str,
        except: Option<ServiceId>,
    ) -> Result<(), StorageError> {
        let taken = self
            .services
            .values()
            .any(|s| s.name == name && Some(s.id) != except);
        if taken {
            return Err(StorageError::Duplicate {
                field: "name",
                value: name.to_string(),
            });
        }
        Ok(())
    }

    fn check_unique_type_name(&self, name: &str, except: Option<i64>) -> Result<(), StorageError> {
        if self
            .types
            .values()
            .any(|t| t.name == name && Some(t.id) != except)
        {
            return Err(StorageError::Duplicate {
                field: "name",
                value: name.to_string(),
            });
        }
        Ok(())
    }

    /// Drop the services matching `doomed` and every request filed against
    /// them. Returns how many requests went.
    fn remove_services(&mut self, doomed: impl Fn(&ServiceRecord) -> bool) -> usize {
        let ids: Vec<ServiceId> = self
            .services
            .values()
            .filter(|s| doomed(s))
            .map(|s| s.id)
            .collect();
        self.services.retain(|id, _| !ids.contains(id));
        let before = self.requests.len();
        self.requests.retain(|_, r| !ids.contains(&r.service_id));
        before - self.requests.len()
    }

    fn check_catalog_refs(&self, institution_id: i64, type_id: i64) -> Result<(), StorageError> {
        if !self.institutions.contains_key(&institution_id) {
            return Err(StorageError::InstitutionNotFound { institution_id });
        }
        if !self.types.contains_key(&type_id) {
            return Err(StorageError::TypeNotFound { type_id });
        }
        Ok(())
    }
}

/// Thread-safe in-memory backend, used for development and tests.
#[derive(Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|_| StorageError::Backend("memory storage lock poisoned".to_string()))
    }
}

fn by_name<T>(mut items: Vec<T>, name: impl Fn(&T) -> &str) -> Vec<T> {
    items.sort_by(|a, b| name(a).cmp(name(b)));
    items
}

#[async_trait]
impl PortalStorage for MemoryStorage {
    async fn insert_request(&self, request: NewRequest) -> Result<RequestRecord, StorageError> {
        let mut tables = self.tables()?;
        let now = timestamp_now()?;
        let id = tables.next_id();
        let record = RequestRecord {
            id,
            owner_id: request.owner_id,
            service_id: request.service_id,
            assignee_id: None,
            status: RequestStatus::Draft,
            citizen_note: request.citizen_note,
            officer_note: None,
            attachment: request.attachment,
            form_data: request.form_data,
            payment_status: request.payment_status,
            payment_date: None,
            created_at: now.clone(),
            updated_at: now,
        };
        tables.requests.insert(id, record.clone());
        Ok(record)
    }

    async fn get_request(&self, id: RequestId) -> Result<RequestRecord, StorageError> {
        self.tables()?
            .requests
            .get(&id)
            .cloned()
            .ok_or(StorageError::RequestNotFound { request_id: id })
    }

    async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<RequestRecord>, StorageError> {
        // Ids grow with insertion order, so reverse id order is newest first.
        Ok(self
            .tables()?
            .requests
            .values()
            .rev()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn update_request(
        &self,
        id: RequestId,
        guard: &RequestGuard,
        change: RequestChange,
    ) -> Result<RequestRecord, StorageError> {
        let mut tables = self.tables()?;
        let record = tables
            .requests
            .get_mut(&id)
            .ok_or(StorageError::RequestNotFound { request_id: id })?;
        if !guard.matches(record) {
            return Err(StorageError::ConditionFailed { request_id: id });
        }
        change.apply_to(record, timestamp_now()?);
        Ok(record.clone())
    }

    async fn delete_request(
        &self,
        id: RequestId,
        guard: &RequestGuard,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables()?;
        let record = tables
            .requests
            .get(&id)
            .ok_or(StorageError::RequestNotFound { request_id: id })?;
        if !guard.matches(record) {
            return Err(StorageError::ConditionFailed { request_id: id });
        }
        tables.requests.remove(&id);
        Ok(())
    }

    async fn insert_institution(
        &self,
        institution: NewInstitution,
    ) -> Result<InstitutionRecord, StorageError> {
        let mut tables = self.tables()?;
        let id = tables.next_id();
        let record = InstitutionRecord {
            id,
            name: institution.name,
            city: institution.city,
            address: institution.address,
            email: institution.email,
        };
        tables.institutions.insert(id, record.clone());
        Ok(record)
    }

    async fn get_institution(&self, id: i64) -> Result<InstitutionRecord, StorageError> {
        self.tables()?
            .institutions
            .get(&id)
            .cloned()
            .ok_or(StorageError::InstitutionNotFound { institution_id: id })
    }

    async fn list_institutions(&self) -> Result<Vec<InstitutionRecord>, StorageError> {
        let items: Vec<InstitutionRecord> = self.tables()?.institutions.values().cloned().collect();
        Ok(by_name(items, |i| i.name.as_str()))
    }

    async fn update_institution(
        &self,
        id: i64,
        change: InstitutionChange,
    ) -> Result<InstitutionRecord, StorageError> {
        let mut tables = self.tables()?;
        let record = tables
            .institutions
            .get_mut(&id)
            .ok_or(StorageError::InstitutionNotFound { institution_id: id })?;
        change.apply_to(record);
        Ok(record.clone())
    }

    async fn delete_institution(&self, id: i64) -> Result<usize, StorageError> {
        let mut tables = self.tables()?;
        if tables.institutions.remove(&id).is_none() {
            return Err(StorageError::InstitutionNotFound { institution_id: id });
        }
        Ok(tables.remove_services(|s| s.institution_id == id))
    }

    async fn insert_type(&self, service_type: NewType) -> Result<TypeRecord, StorageError> {
        let mut tables = self.tables()?;
        tables.check_unique_type_name(&service_type.name, None)?;
        let id = tables.next_id();
        let record = TypeRecord {
            id,
            name: service_type.name,
            description: service_type.description,
        };
        tables.types.insert(id, record.clone());
        Ok(record)
    }

    async fn get_type(&self, id: i64) -> Result<TypeRecord, StorageError> {
        self.tables()?
            .types
            .get(&id)
            .cloned()
            .ok_or(StorageError::TypeNotFound { type_id: id })
    }

    async fn list_types(&self) -> Result<Vec<TypeRecord>, StorageError> {
        let items: Vec<TypeRecord> = self.tables()?.types.values().cloned().collect();
        Ok(by_name(items, |t| t.name.as_str()))
    }

    async fn update_type(&self, id: i64, change: TypeChange) -> Result<TypeRecord, StorageError> {
        let mut tables = self.tables()?;
        if !tables.types.contains_key(&id) {
            return Err(StorageError::TypeNotFound { type_id: id });
        }
        if let Some(name) = &change.name {
            tables.check_unique_type_name(name, Some(id))?;
        }
        let record = tables
            .types
            .get_mut(&id)
            .ok_or(StorageError::TypeNotFound { type_id: id })?;
        change.apply_to(record);
        Ok(record.clone())
    }

    async fn delete_type(&self, id: i64) -> Result<usize, StorageError> {
        let mut tables = self.tables()?;
        if tables.types.remove(&id).is_none() {
            return Err(StorageError::TypeNotFound { type_id: id });
        }
        Ok(tables.remove_services(|s| s.type_id == id))
    }

    async fn insert_service(&self, service: NewService) -> Result<ServiceRecord, StorageError> {
        let mut tables = self.tables()?;
        tables.check_catalog_refs(service.institution_id, service.type_id)?;
        tables.check_unique_service_name(&service.name, None)?;
        let id = tables.next_id();
        let record = ServiceRecord {
            id,
            institution_id: service.institution_id,
            type_id: service.type_id,
            name: service.name,
            description: service.description,
            fee: service.fee,
            requires_attachment: service.requires_attachment,
            status: service.status,
        };
        tables.services.insert(id, record.clone());
        Ok(record)
    }

    async fn get_service(&self, id: ServiceId) -> Result<ServiceRecord, StorageError> {
        self.tables()?
            .services
            .get(&id)
            .cloned()
            .ok_or(StorageError::ServiceNotFound { service_id: id })
    }

    async fn list_services(
        &self,
        filter: &ServiceFilter,
    ) -> Result<Vec<ServiceRecord>, StorageError> {
        let items: Vec<ServiceRecord> = self
            .tables()?
            .services
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        Ok(by_name(items, |s| s.name.as_str()))
    }

    async fn update_service(
        &self,
        id: ServiceId,
        change: ServiceChange,
    ) -> Result<ServiceRecord, StorageError> {
        let mut tables = self.tables()?;
        let current = tables
            .services
            .get(&id)
            .cloned()
            .ok_or(StorageError::ServiceNotFound { service_id: id })?;
        tables.check_catalog_refs(
            change.institution_id.unwrap_or(current.institution_id),
            change.type_id.unwrap_or(current.type_id),
        )?;
        if let Some(name) = &change.name {
            tables.check_unique_service_name(name, Some(id))?;
        }

        let mut updated = current;
        if let Some(v) = change.institution_id {
            updated.institution_id = v;
        }
        if let Some(v) = change.type_id {
            updated.type_id = v;
        }
        if let Some(v) = change.name {
            updated.name = v;
        }
        if let Some(v) = change.description {
            updated.description = v;
        }
        if let Some(v) = change.fee {
            updated.fee = v;
        }
        if let Some(v) = change.requires_attachment {
            updated.requires_attachment = v;
        }
        if let Some(v) = change.status {
            updated.status = v;
        }
        tables.services.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_service(&self, id: ServiceId) -> Result<usize, StorageError> {
        let mut tables = self.tables()?;
        if !tables.services.contains_key(&id) {
            return Err(StorageError::ServiceNotFound { service_id: id });
        }
        Ok(tables.remove_services(|s| s.id == id))
    }

    async fn insert_user(&self, user: NewUser) -> Result<UserRecord, StorageError> {
        let mut tables = self.tables()?;
        for existing in tables.users.values() {
            if existing.email.eq_ignore_ascii_case(&user.email) {
                return Err(StorageError::Duplicate {
                    field: "email",
                    value: user.email,
                });
            }
            if existing.jmbg == user.jmbg {
                return Err(StorageError::Duplicate {
                    field: "jmbg",
                    value: user.jmbg,
                });
            }
        }
        let created_at = timestamp_now()?;
        let id = tables.next_id();
        let record = UserRecord {
            id,
            name: user.name,
            email: user.email,
            date_of_birth: user.date_of_birth,
            jmbg: user.jmbg,
            role: user.role,
            password_hash: user.password_hash,
            created_at,
        };
        tables.users.insert(id, record.clone());
        Ok(record)
    }

    async fn get_user(&self, id: UserId) -> Result<UserRecord, StorageError> {
        self.tables()?
            .users
            .get(&id)
            .cloned()
            .ok_or(StorageError::UserNotFound { user_id: id })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StorageError> {
        Ok(self
            .tables()?
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StorageError> {
        let items: Vec<UserRecord> = self.tables()?.users.values().cloned().collect();
        Ok(by_name(items, |u| u.name.as_str()))
    }

    async fn update_user_role(&self, id: UserId, role: Role) -> Result<UserRecord, StorageError> {
        let mut tables = self.tables()?;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or(StorageError::UserNotFound { user_id: id })?;
        user.role = role;
        Ok(user.clone())
    }

    async fn delete_user(&self, id: UserId) -> Result<usize, StorageError> {
        let mut tables = self.tables()?;
        if !tables.users.contains_key(&id) {
            return Err(StorageError::UserNotFound { user_id: id });
        }
        let reviewing = tables
            .requests
            .values()
            .any(|r| r.assignee_id == Some(id) && r.status == RequestStatus::InReview);
        if reviewing {
            return Err(StorageError::StillReferenced {
                entity: "user",
                id,
                reason: "they are reviewing a service request",
            });
        }

        tables.users.remove(&id);
        tables.sessions.retain(|_, user_id| *user_id != id);
        for request in tables.requests.values_mut() {
            if request.assignee_id == Some(id) {
                request.assignee_id = None;
            }
        }
        let before = tables.requests.len();
        tables.requests.retain(|_, r| r.owner_id != id);
        Ok(before - tables.requests.len())
    }

    async fn insert_session(
        &self,
        token_digest: &str,
        user_id: UserId,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables()?;
        if !tables.users.contains_key(&user_id) {
            return Err(StorageError::UserNotFound { user_id });
        }
        tables.sessions.insert(token_digest.to_string(), user_id);
        Ok(())
    }

    async fn find_session(&self, token_digest: &str) -> Result<Option<UserId>, StorageError> {
        Ok(self.tables()?.sessions.get(token_digest).copied())
    }

    async fn delete_session(&self, token_digest: &str) -> Result<(), StorageError> {
        self.tables()?.sessions.remove(token_digest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::run_conformance_suite;

    #[tokio::test]
    async fn memory_storage_passes_conformance_suite() {
        let report = run_conformance_suite(|| async { MemoryStorage::new() }).await;
        assert_eq!(report.failed, 0, "{report}");
        assert!(report.total > 0);
    }
}
