use std::future::Future;

use super::{make_new_request, make_new_user, seed_service, TestResult};
use crate::record::{RequestChange, RequestFilter, RequestGuard, RequestScope, RequestStatus, Role};
use crate::{PortalStorage, StorageError};

pub(super) async fn run_user_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "users",
        "email_is_unique_case_insensitive",
        email_is_unique_case_insensitive(factory).await,
    ));
    results.push(TestResult::from_result(
        "users",
        "jmbg_is_unique",
        jmbg_is_unique(factory).await,
    ));
    results.push(TestResult::from_result(
        "users",
        "role_update_persists",
        role_update_persists(factory).await,
    ));
    results.push(TestResult::from_result(
        "users",
        "session_lifecycle",
        session_lifecycle(factory).await,
    ));
    results.push(TestResult::from_result(
        "users",
        "delete_user_cascades",
        delete_user_cascades(factory).await,
    ));
    results.push(TestResult::from_result(
        "users",
        "delete_user_refused_while_reviewing",
        delete_user_refused_while_reviewing(factory).await,
    ));

    results
}

async fn email_is_unique_case_insensitive<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    storage
        .insert_user(make_new_user("Ana", "ana@example.rs", "0101990710001", Role::Citizen))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    match storage
        .insert_user(make_new_user("Ana 2", "ANA@example.rs", "0101990710002", Role::Citizen))
        .await
    {
        Err(StorageError::Duplicate { field: "email", .. }) => {}
        other => return Err(format!("expected Duplicate(email), got {other:?}")),
    }
    let found = storage
        .find_user_by_email("Ana@Example.rs")
        .await
        .map_err(|e| format!("find: {e}"))?;
    if found.map(|u| u.name) != Some("Ana".to_string()) {
        return Err("case-insensitive lookup failed".to_string());
    }
    Ok(())
}

async fn jmbg_is_unique<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    storage
        .insert_user(make_new_user("Ana", "ana@example.rs", "0101990710001", Role::Citizen))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    match storage
        .insert_user(make_new_user("Marko", "marko@example.rs", "0101990710001", Role::Citizen))
        .await
    {
        Err(StorageError::Duplicate { field: "jmbg", .. }) => Ok(()),
        other => Err(format!("expected Duplicate(jmbg), got {other:?}")),
    }
}

async fn role_update_persists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let user = storage
        .insert_user(make_new_user("Ana", "ana@example.rs", "0101990710001", Role::Citizen))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .update_user_role(user.id, Role::Officer)
        .await
        .map_err(|e| format!("update role: {e}"))?;
    let reread = storage
        .get_user(user.id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if reread.role != Role::Officer {
        return Err(format!("expected OFFICER, got {}", reread.role));
    }
    match storage.update_user_role(9999, Role::Admin).await {
        Err(StorageError::UserNotFound { user_id: 9999 }) => Ok(()),
        other => Err(format!("expected UserNotFound, got {other:?}")),
    }
}

async fn session_lifecycle<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let user = storage
        .insert_user(make_new_user("Ana", "ana@example.rs", "0101990710001", Role::Citizen))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .insert_session("digest-1", user.id)
        .await
        .map_err(|e| format!("insert session: {e}"))?;
    let found = storage
        .find_session("digest-1")
        .await
        .map_err(|e| format!("find: {e}"))?;
    if found != Some(user.id) {
        return Err(format!("expected session for {}, got {found:?}", user.id));
    }
    storage
        .delete_session("digest-1")
        .await
        .map_err(|e| format!("delete: {e}"))?;
    let gone = storage
        .find_session("digest-1")
        .await
        .map_err(|e| format!("find after delete: {e}"))?;
    if gone.is_some() {
        return Err("session survived revocation".to_string());
    }
    Ok(())
}

fn move_to(status: RequestStatus, assignee_id: Option<i64>) -> RequestChange {
    RequestChange {
        status: Some(status),
        assignee_id,
        ..Default::default()
    }
}

async fn delete_user_cascades<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let service = seed_service(&storage, "Passport").await?;
    let citizen = storage
        .insert_user(make_new_user("Ana", "ana@example.rs", "0101990710001", Role::Citizen))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let officer = storage
        .insert_user(make_new_user("Jelena", "jelena@example.rs", "0101990710002", Role::Officer))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .insert_session("digest-officer", officer.id)
        .await
        .map_err(|e| format!("insert session: {e}"))?;

    // One decided request reviewed by the officer, one request the officer owns.
    let decided = storage
        .insert_request(make_new_request(citizen.id, service.id))
        .await
        .map_err(|e| format!("insert request: {e}"))?;
    for change in [
        move_to(RequestStatus::Submitted, None),
        move_to(RequestStatus::InReview, Some(officer.id)),
        move_to(RequestStatus::Approved, None),
    ] {
        storage
            .update_request(decided.id, &RequestGuard::any(), change)
            .await
            .map_err(|e| format!("advance: {e}"))?;
    }
    storage
        .insert_request(make_new_request(officer.id, service.id))
        .await
        .map_err(|e| format!("insert request: {e}"))?;

    let removed = storage
        .delete_user(officer.id)
        .await
        .map_err(|e| format!("delete: {e}"))?;
    if removed != 1 {
        return Err(format!("expected 1 owned request removed, got {removed}"));
    }
    match storage.get_user(officer.id).await {
        Err(StorageError::UserNotFound { .. }) => {}
        other => return Err(format!("expected UserNotFound, got {other:?}")),
    }
    let session = storage
        .find_session("digest-officer")
        .await
        .map_err(|e| format!("find session: {e}"))?;
    if session.is_some() {
        return Err("session outlived its user".to_string());
    }
    let kept = storage
        .get_request(decided.id)
        .await
        .map_err(|e| format!("decided request went with its reviewer: {e}"))?;
    if kept.status != RequestStatus::Approved || kept.assignee_id.is_some() {
        return Err(format!("expected APPROVED with no assignee, got {kept:?}"));
    }
    let left = storage
        .list_requests(&RequestFilter::scoped(RequestScope::All))
        .await
        .map_err(|e| format!("list: {e}"))?;
    if left.len() != 1 {
        return Err(format!("expected one request left, got {left:?}"));
    }
    Ok(())
}

async fn delete_user_refused_while_reviewing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let service = seed_service(&storage, "Passport").await?;
    let officer = storage
        .insert_user(make_new_user("Jelena", "jelena@example.rs", "0101990710002", Role::Officer))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let request = storage
        .insert_request(make_new_request(100, service.id))
        .await
        .map_err(|e| format!("insert request: {e}"))?;
    for change in [
        move_to(RequestStatus::Submitted, None),
        move_to(RequestStatus::InReview, Some(officer.id)),
    ] {
        storage
            .update_request(request.id, &RequestGuard::any(), change)
            .await
            .map_err(|e| format!("advance: {e}"))?;
    }

    match storage.delete_user(officer.id).await {
        Err(StorageError::StillReferenced { entity: "user", .. }) => {}
        other => return Err(format!("expected StillReferenced, got {other:?}")),
    }
    storage
        .get_user(officer.id)
        .await
        .map_err(|e| format!("refused delete still removed the user: {e}"))?;
    match storage.delete_user(9999).await {
        Err(StorageError::UserNotFound { user_id: 9999 }) => Ok(()),
        other => Err(format!("expected UserNotFound, got {other:?}")),
    }
}
