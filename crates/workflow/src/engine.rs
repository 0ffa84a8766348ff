//! The service-request lifecycle.
//!
//! Every mutating operation runs the same pipeline:
//!
//! 1. load the record (`NotFound`)
//! 2. look up the caller's rule and relationship (`Forbidden`)
//! 3. validate input (`ValidationFailed`)
//! 4. check the current state (`PreconditionFailed`)
//! 5. write with a guard that re-asserts step 2 and 4 atomically
//!
//! A guard that no longer holds at write time means another caller won the
//! race; it surfaces as `PreconditionFailed` like any stale-state error.

use std::sync::Arc;

use euprava_storage::{
    timestamp_now, NewRequest, PortalStorage, RequestChange, RequestFilter, RequestGuard,
    RequestId, RequestRecord, RequestStatus, ServiceRecord, ServiceStatus, StorageError,
};

use crate::error::PortalError;
use crate::identity::Actor;
use crate::input::{CreateInput, DecideInput, EditInput, ListQuery, PaymentInput};
use crate::lifecycle;
use crate::payment;
use crate::policy::{self, Rule, Transition};
use crate::visibility;

pub struct Workflow<S> {
    storage: Arc<S>,
}

impl<S> Clone for Workflow<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<S: PortalStorage> Workflow<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Open a new `DRAFT` request on an active service.
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateInput,
    ) -> Result<RequestRecord, PortalError> {
        traced(Transition::Create, None, actor, self.create_checked(actor, input).await)
    }

    /// One request, if the caller's visibility scope admits it.
    pub async fn get(&self, actor: &Actor, id: RequestId) -> Result<RequestRecord, PortalError> {
        let record = self.storage.get_request(id).await?;
        visibility::ensure_visible(actor, &record)?;
        Ok(record)
    }

    /// The caller's visible requests, newest first.
    pub async fn list(
        &self,
        actor: &Actor,
        query: ListQuery,
    ) -> Result<Vec<RequestRecord>, PortalError> {
        let filter = RequestFilter {
            scope: visibility::scope_for(actor),
            status: query.status,
            service_id: query.service_id,
        };
        Ok(self.storage.list_requests(&filter).await?)
    }

    pub async fn edit(
        &self,
        actor: &Actor,
        id: RequestId,
        input: EditInput,
    ) -> Result<RequestRecord, PortalError> {
        traced(Transition::Edit, Some(id), actor, self.edit_checked(actor, id, input).await)
    }

    pub async fn submit(&self, actor: &Actor, id: RequestId) -> Result<RequestRecord, PortalError> {
        traced(Transition::Submit, Some(id), actor, self.submit_checked(actor, id).await)
    }

    /// Take an unassigned `SUBMITTED` request into review. Of several
    /// concurrent callers exactly one succeeds.
    pub async fn assign(&self, actor: &Actor, id: RequestId) -> Result<RequestRecord, PortalError> {
        traced(Transition::Assign, Some(id), actor, self.assign_checked(actor, id).await)
    }

    pub async fn decide(
        &self,
        actor: &Actor,
        id: RequestId,
        input: DecideInput,
    ) -> Result<RequestRecord, PortalError> {
        traced(Transition::Decide, Some(id), actor, self.decide_checked(actor, id, input).await)
    }

    pub async fn update_payment(
        &self,
        actor: &Actor,
        id: RequestId,
        input: PaymentInput,
    ) -> Result<RequestRecord, PortalError> {
        traced(
            Transition::UpdatePayment,
            Some(id),
            actor,
            self.update_payment_checked(actor, id, input).await,
        )
    }

    pub async fn delete(&self, actor: &Actor, id: RequestId) -> Result<(), PortalError> {
        traced(Transition::Delete, Some(id), actor, self.delete_checked(actor, id).await)
    }

    // ── Pipelines ────────────────────────────────────────────────────────────

    async fn create_checked(
        &self,
        actor: &Actor,
        input: CreateInput,
    ) -> Result<RequestRecord, PortalError> {
        policy::authorize_role(actor, Transition::Create)?;
        let service = match self.storage.get_service(input.service_id).await {
            Ok(service) => service,
            Err(StorageError::ServiceNotFound { .. }) => {
                return Err(PortalError::invalid_field(
                    "service_id",
                    "the selected service_id is invalid",
                ))
            }
            Err(e) => return Err(e.into()),
        };
        if service.status != ServiceStatus::Active {
            return Err(PortalError::PreconditionFailed(format!(
                "service {} is not accepting requests",
                service.id
            )));
        }
        let record = self
            .storage
            .insert_request(NewRequest {
                owner_id: actor.id,
                service_id: service.id,
                citizen_note: input.citizen_note,
                attachment: input.attachment,
                form_data: input.form_data,
                payment_status: payment::initial_status(&service),
            })
            .await?;
        tracing::info!(
            request_id = record.id,
            actor = actor.id,
            service_id = service.id,
            payment_status = %record.payment_status,
            "service request created"
        );
        Ok(record)
    }

    async fn edit_checked(
        &self,
        actor: &Actor,
        id: RequestId,
        input: EditInput,
    ) -> Result<RequestRecord, PortalError> {
        let (rule, record) = self.load_authorized(actor, Transition::Edit, id).await?;
        policy::check_status(rule, &record)?;
        let change = RequestChange {
            citizen_note: input.citizen_note,
            attachment: input.attachment,
            form_data: input.form_data,
            ..Default::default()
        };
        self.write(actor, rule, &record, policy::guard_for(rule, actor), change)
            .await
    }

    async fn submit_checked(
        &self,
        actor: &Actor,
        id: RequestId,
    ) -> Result<RequestRecord, PortalError> {
        let (rule, record) = self.load_authorized(actor, Transition::Submit, id).await?;
        policy::check_status(rule, &record)?;
        let service = self.service_of(&record).await?;
        let has_attachment = record
            .attachment
            .as_deref()
            .is_some_and(|a| !a.trim().is_empty());
        if service.requires_attachment && !has_attachment {
            return Err(PortalError::invalid_field(
                "attachment",
                format!("the service \"{}\" requires an attachment", service.name),
            ));
        }
        let change = step(&record, RequestStatus::Submitted)?;
        self.write(actor, rule, &record, policy::guard_for(rule, actor), change)
            .await
    }

    async fn assign_checked(
        &self,
        actor: &Actor,
        id: RequestId,
    ) -> Result<RequestRecord, PortalError> {
        let (rule, record) = self.load_authorized(actor, Transition::Assign, id).await?;
        policy::check_status(rule, &record)?;
        let change = RequestChange {
            assignee_id: Some(actor.id),
            ..step(&record, RequestStatus::InReview)?
        };
        self.write(actor, rule, &record, policy::guard_for(rule, actor), change)
            .await
    }

    async fn decide_checked(
        &self,
        actor: &Actor,
        id: RequestId,
        input: DecideInput,
    ) -> Result<RequestRecord, PortalError> {
        let (rule, record) = self.load_authorized(actor, Transition::Decide, id).await?;
        policy::check_status(rule, &record)?;
        let change = RequestChange {
            officer_note: input.officer_note.map(Some),
            ..step(&record, input.decision.status())?
        };
        self.write(actor, rule, &record, policy::guard_for(rule, actor), change)
            .await
    }

    async fn update_payment_checked(
        &self,
        actor: &Actor,
        id: RequestId,
        input: PaymentInput,
    ) -> Result<RequestRecord, PortalError> {
        let (rule, record) = self
            .load_authorized(actor, Transition::UpdatePayment, id)
            .await?;
        policy::check_status(rule, &record)?;
        let payment = payment::plan_update(
            record.payment_status,
            input.payment_status,
            &timestamp_now()?,
        )?;
        let guard = policy::guard_for(rule, actor).payment_status(record.payment_status);
        let change = RequestChange {
            payment: Some(payment),
            ..Default::default()
        };
        self.write(actor, rule, &record, guard, change).await
    }

    async fn delete_checked(&self, actor: &Actor, id: RequestId) -> Result<(), PortalError> {
        let (rule, record) = self.load_authorized(actor, Transition::Delete, id).await?;
        policy::check_status(rule, &record)?;
        self.storage
            .delete_request(id, &policy::guard_for(rule, actor))
            .await?;
        tracing::info!(
            request_id = id,
            actor = actor.id,
            status = %record.status,
            "service request deleted"
        );
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    async fn load_authorized(
        &self,
        actor: &Actor,
        transition: Transition,
        id: RequestId,
    ) -> Result<(&'static Rule, RequestRecord), PortalError> {
        let record = self.storage.get_request(id).await?;
        let rule = policy::authorize(actor, transition, &record)?;
        Ok((rule, record))
    }

    async fn service_of(&self, record: &RequestRecord) -> Result<ServiceRecord, PortalError> {
        Ok(self.storage.get_service(record.service_id).await?)
    }

    async fn write(
        &self,
        actor: &Actor,
        rule: &Rule,
        before: &RequestRecord,
        guard: RequestGuard,
        change: RequestChange,
    ) -> Result<RequestRecord, PortalError> {
        let after = self
            .storage
            .update_request(before.id, &guard, change)
            .await?;
        tracing::info!(
            request_id = after.id,
            actor = actor.id,
            role = %actor.role,
            transition = rule.transition.as_str(),
            from = %before.status,
            to = %after.status,
            payment_status = %after.payment_status,
            "transition applied"
        );
        Ok(after)
    }
}

/// A status change along the lifecycle graph.
fn step(
    record: &RequestRecord,
    to: RequestStatus,
) -> Result<RequestChange, PortalError> {
    if !lifecycle::can_transition(record.status, to) {
        return Err(PortalError::PreconditionFailed(format!(
            "cannot move service request {} from {} to {}",
            record.id, record.status, to
        )));
    }
    Ok(RequestChange {
        status: Some(to),
        ..Default::default()
    })
}

fn traced<T>(
    transition: Transition,
    id: Option<RequestId>,
    actor: &Actor,
    result: Result<T, PortalError>,
) -> Result<T, PortalError> {
    if let Err(e) = &result {
        match e {
            PortalError::Storage(_) => tracing::warn!(
                transition = transition.as_str(),
                request_id = ?id,
                actor = actor.id,
                error = %e,
                "storage failure"
            ),
            _ => tracing::debug!(
                transition = transition.as_str(),
                request_id = ?id,
                actor = actor.id,
                error = %e,
                "transition rejected"
            ),
        }
    }
    result
}
