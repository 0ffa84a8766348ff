use std::future::Future;

use super::{make_new_request, seed_service, TestResult};
use crate::record::{
    PaymentStatus, RequestChange, RequestFilter, RequestGuard, RequestScope, RequestStatus,
};
use crate::{PortalStorage, StorageError};

pub(super) async fn run_request_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "requests",
        "insert_starts_in_draft_unassigned",
        insert_starts_in_draft_unassigned(factory).await,
    ));
    results.push(TestResult::from_result(
        "requests",
        "insert_assigns_distinct_ids",
        insert_assigns_distinct_ids(factory).await,
    ));
    results.push(TestResult::from_result(
        "requests",
        "get_returns_inserted_fields",
        get_returns_inserted_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "requests",
        "get_nonexistent_is_not_found",
        get_nonexistent_is_not_found(factory).await,
    ));
    results.push(TestResult::from_result(
        "requests",
        "list_owned_by_returns_only_owner_records",
        list_owned_by_returns_only_owner_records(factory).await,
    ));
    results.push(TestResult::from_result(
        "requests",
        "list_officer_queue_matches_inbox_and_assigned",
        list_officer_queue_matches_inbox_and_assigned(factory).await,
    ));
    results.push(TestResult::from_result(
        "requests",
        "list_status_filter_narrows_scope",
        list_status_filter_narrows_scope(factory).await,
    ));
    results.push(TestResult::from_result(
        "requests",
        "list_is_newest_first",
        list_is_newest_first(factory).await,
    ));
    results.push(TestResult::from_result(
        "requests",
        "update_changes_status_and_payment_together",
        update_changes_status_and_payment_together(factory).await,
    ));

    results
}

async fn insert_starts_in_draft_unassigned<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let service = seed_service(&storage, "Passport").await?;
    let record = storage
        .insert_request(make_new_request(100, service.id))
        .await
        .map_err(|e| format!("insert: {e}"))?;

    if record.status != RequestStatus::Draft {
        return Err(format!("expected DRAFT, got {}", record.status));
    }
    if record.assignee_id.is_some() {
        return Err("new request must be unassigned".to_string());
    }
    if record.payment_date.is_some() {
        return Err("new request must have no payment date".to_string());
    }
    if record.created_at.is_empty() || record.updated_at.is_empty() {
        return Err("timestamps must be set".to_string());
    }
    Ok(())
}

async fn insert_assigns_distinct_ids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let service = seed_service(&storage, "Passport").await?;
    let a = storage
        .insert_request(make_new_request(100, service.id))
        .await
        .map_err(|e| format!("insert a: {e}"))?;
    let b = storage
        .insert_request(make_new_request(100, service.id))
        .await
        .map_err(|e| format!("insert b: {e}"))?;
    if a.id == b.id {
        return Err(format!("both requests got id {}", a.id));
    }
    Ok(())
}

async fn get_returns_inserted_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let service = seed_service(&storage, "Passport").await?;
    let inserted = storage
        .insert_request(make_new_request(100, service.id))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let fetched = storage
        .get_request(inserted.id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if fetched != inserted {
        return Err(format!("fetched {fetched:?} differs from inserted {inserted:?}"));
    }
    if fetched.form_data.get("purpose") != Some(&serde_json::json!("travel")) {
        return Err("form_data not preserved".to_string());
    }
    Ok(())
}

async fn get_nonexistent_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    match storage.get_request(9999).await {
        Err(StorageError::RequestNotFound { request_id: 9999 }) => Ok(()),
        other => Err(format!("expected RequestNotFound(9999), got {other:?}")),
    }
}

async fn list_owned_by_returns_only_owner_records<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let service = seed_service(&storage, "Passport").await?;
    for owner in [100, 100, 200] {
        storage
            .insert_request(make_new_request(owner, service.id))
            .await
            .map_err(|e| format!("insert: {e}"))?;
    }
    let mine = storage
        .list_requests(&RequestFilter::scoped(RequestScope::OwnedBy(100)))
        .await
        .map_err(|e| format!("list: {e}"))?;
    if mine.len() != 2 || mine.iter().any(|r| r.owner_id != 100) {
        return Err(format!("expected 2 records owned by 100, got {mine:?}"));
    }
    Ok(())
}

async fn list_officer_queue_matches_inbox_and_assigned<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let service = seed_service(&storage, "Passport").await?;

    let mut ids = Vec::new();
    for _ in 0..4 {
        let r = storage
            .insert_request(make_new_request(100, service.id))
            .await
            .map_err(|e| format!("insert: {e}"))?;
        ids.push(r.id);
    }
    // ids[0]: DRAFT (invisible), ids[1]: SUBMITTED unassigned (inbox),
    // ids[2]: IN_REVIEW by 7 (mine), ids[3]: IN_REVIEW by 8 (someone else's).
    for (id, assignee) in [(ids[1], None), (ids[2], Some(7)), (ids[3], Some(8))] {
        let change = RequestChange {
            status: Some(match assignee {
                None => RequestStatus::Submitted,
                Some(_) => RequestStatus::InReview,
            }),
            assignee_id: assignee,
            ..Default::default()
        };
        storage
            .update_request(id, &RequestGuard::any(), change)
            .await
            .map_err(|e| format!("update {id}: {e}"))?;
    }

    let queue = storage
        .list_requests(&RequestFilter::scoped(RequestScope::OfficerQueue(7)))
        .await
        .map_err(|e| format!("list: {e}"))?;
    let mut got: Vec<i64> = queue.iter().map(|r| r.id).collect();
    got.sort_unstable();
    let mut want = vec![ids[1], ids[2]];
    want.sort_unstable();
    if got != want {
        return Err(format!("officer queue: expected {want:?}, got {got:?}"));
    }
    Ok(())
}

async fn list_status_filter_narrows_scope<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let service = seed_service(&storage, "Passport").await?;
    let draft = storage
        .insert_request(make_new_request(100, service.id))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let submitted = storage
        .insert_request(make_new_request(100, service.id))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .update_request(
            submitted.id,
            &RequestGuard::any(),
            RequestChange {
                status: Some(RequestStatus::Submitted),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| format!("update: {e}"))?;

    let mut filter = RequestFilter::scoped(RequestScope::All);
    filter.status = Some(RequestStatus::Draft);
    let drafts = storage
        .list_requests(&filter)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if drafts.len() != 1 || drafts[0].id != draft.id {
        return Err(format!("expected only request {}, got {drafts:?}", draft.id));
    }

    filter.status = None;
    filter.service_id = Some(service.id + 1000);
    let none = storage
        .list_requests(&filter)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if !none.is_empty() {
        return Err(format!("service filter should exclude all, got {none:?}"));
    }
    Ok(())
}

async fn list_is_newest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let service = seed_service(&storage, "Passport").await?;
    let first = storage
        .insert_request(make_new_request(100, service.id))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let second = storage
        .insert_request(make_new_request(100, service.id))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let all = storage
        .list_requests(&RequestFilter::scoped(RequestScope::All))
        .await
        .map_err(|e| format!("list: {e}"))?;
    let ids: Vec<i64> = all.iter().map(|r| r.id).collect();
    if ids != vec![second.id, first.id] {
        return Err(format!(
            "expected [{}, {}], got {ids:?}",
            second.id, first.id
        ));
    }
    Ok(())
}

async fn update_changes_status_and_payment_together<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let service = seed_service(&storage, "Passport").await?;
    let record = storage
        .insert_request(make_new_request(100, service.id))
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let paid_at = "2025-03-01T10:00:00Z".to_string();
    let updated = storage
        .update_request(
            record.id,
            &RequestGuard::any().payment_status(PaymentStatus::NotPaid),
            RequestChange {
                payment: Some((PaymentStatus::Paid, Some(paid_at.clone()))),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| format!("update: {e}"))?;
    if updated.payment_status != PaymentStatus::Paid || updated.payment_date != Some(paid_at) {
        return Err(format!("payment pair not written: {updated:?}"));
    }

    let reread = storage
        .get_request(record.id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if reread != updated {
        return Err("returned record differs from stored record".to_string());
    }
    Ok(())
}
