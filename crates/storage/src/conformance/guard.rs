use std::future::Future;

use super::{make_new_request, seed_service, TestResult};
use crate::record::{AssigneeGuard, RequestChange, RequestGuard, RequestRecord, RequestStatus};
use crate::{PortalStorage, StorageError};

pub(super) async fn run_guard_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "guard",
        "update_with_matching_guard_applies",
        update_with_matching_guard_applies(factory).await,
    ));
    results.push(TestResult::from_result(
        "guard",
        "update_with_stale_status_is_condition_failed",
        update_with_stale_status_is_condition_failed(factory).await,
    ));
    results.push(TestResult::from_result(
        "guard",
        "failed_guard_writes_nothing",
        failed_guard_writes_nothing(factory).await,
    ));
    results.push(TestResult::from_result(
        "guard",
        "second_assign_is_condition_failed",
        second_assign_is_condition_failed(factory).await,
    ));
    results.push(TestResult::from_result(
        "guard",
        "owner_guard_rejects_foreign_owner",
        owner_guard_rejects_foreign_owner(factory).await,
    ));
    results.push(TestResult::from_result(
        "guard",
        "update_nonexistent_is_not_found",
        update_nonexistent_is_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "guard",
        "delete_with_matching_guard_removes",
        delete_with_matching_guard_removes(factory).await,
    ));
    results.push(TestResult::from_result(
        "guard",
        "delete_with_failed_guard_keeps_record",
        delete_with_failed_guard_keeps_record(factory).await,
    ));

    results
}

async fn draft<S: PortalStorage>(storage: &S) -> Result<RequestRecord, String> {
    let service = seed_service(storage, "Passport").await?;
    storage
        .insert_request(make_new_request(100, service.id))
        .await
        .map_err(|e| format!("insert: {e}"))
}

fn submit() -> RequestChange {
    RequestChange {
        status: Some(RequestStatus::Submitted),
        ..Default::default()
    }
}

fn assign_to(officer: i64) -> RequestChange {
    RequestChange {
        status: Some(RequestStatus::InReview),
        assignee_id: Some(officer),
        ..Default::default()
    }
}

fn assign_guard() -> RequestGuard {
    RequestGuard::any()
        .status(RequestStatus::Submitted)
        .assignee(AssigneeGuard::Unassigned)
}

async fn update_with_matching_guard_applies<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let record = draft(&storage).await?;
    let updated = storage
        .update_request(
            record.id,
            &RequestGuard::any().status(RequestStatus::Draft).owner(100),
            submit(),
        )
        .await
        .map_err(|e| format!("update: {e}"))?;
    if updated.status != RequestStatus::Submitted {
        return Err(format!("expected SUBMITTED, got {}", updated.status));
    }
    Ok(())
}

async fn update_with_stale_status_is_condition_failed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let record = draft(&storage).await?;
    match storage
        .update_request(
            record.id,
            &RequestGuard::any().status(RequestStatus::Submitted),
            assign_to(7),
        )
        .await
    {
        Err(StorageError::ConditionFailed { request_id }) if request_id == record.id => Ok(()),
        other => Err(format!("expected ConditionFailed, got {other:?}")),
    }
}

async fn failed_guard_writes_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let record = draft(&storage).await?;
    let _ = storage
        .update_request(record.id, &assign_guard(), assign_to(7))
        .await;
    let reread = storage
        .get_request(record.id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if reread != record {
        return Err(format!("record changed despite failed guard: {reread:?}"));
    }
    Ok(())
}

async fn second_assign_is_condition_failed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let record = draft(&storage).await?;
    storage
        .update_request(record.id, &RequestGuard::any(), submit())
        .await
        .map_err(|e| format!("submit: {e}"))?;
    storage
        .update_request(record.id, &assign_guard(), assign_to(7))
        .await
        .map_err(|e| format!("first assign: {e}"))?;
    match storage
        .update_request(record.id, &assign_guard(), assign_to(8))
        .await
    {
        Err(StorageError::ConditionFailed { .. }) => {}
        other => return Err(format!("expected ConditionFailed, got {other:?}")),
    }
    let reread = storage
        .get_request(record.id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if reread.assignee_id != Some(7) {
        return Err(format!("assignee overwritten: {:?}", reread.assignee_id));
    }
    Ok(())
}

async fn owner_guard_rejects_foreign_owner<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let record = draft(&storage).await?;
    match storage
        .update_request(record.id, &RequestGuard::any().owner(200), submit())
        .await
    {
        Err(StorageError::ConditionFailed { .. }) => Ok(()),
        other => Err(format!("expected ConditionFailed, got {other:?}")),
    }
}

async fn update_nonexistent_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    match storage
        .update_request(4242, &RequestGuard::any(), submit())
        .await
    {
        Err(StorageError::RequestNotFound { request_id: 4242 }) => Ok(()),
        other => Err(format!("expected RequestNotFound, got {other:?}")),
    }
}

async fn delete_with_matching_guard_removes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let record = draft(&storage).await?;
    storage
        .delete_request(
            record.id,
            &RequestGuard::any().status(RequestStatus::Draft).owner(100),
        )
        .await
        .map_err(|e| format!("delete: {e}"))?;
    match storage.get_request(record.id).await {
        Err(StorageError::RequestNotFound { .. }) => {}
        other => return Err(format!("expected RequestNotFound after delete, got {other:?}")),
    }
    match storage
        .delete_request(record.id, &RequestGuard::any())
        .await
    {
        Err(StorageError::RequestNotFound { .. }) => Ok(()),
        other => Err(format!("second delete: expected RequestNotFound, got {other:?}")),
    }
}

async fn delete_with_failed_guard_keeps_record<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let record = draft(&storage).await?;
    storage
        .update_request(record.id, &RequestGuard::any(), submit())
        .await
        .map_err(|e| format!("submit: {e}"))?;
    match storage
        .delete_request(record.id, &RequestGuard::any().status(RequestStatus::Draft))
        .await
    {
        Err(StorageError::ConditionFailed { .. }) => {}
        other => return Err(format!("expected ConditionFailed, got {other:?}")),
    }
    storage
        .get_request(record.id)
        .await
        .map(|_| ())
        .map_err(|e| format!("record should survive failed delete: {e}"))
}
