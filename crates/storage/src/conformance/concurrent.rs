use std::future::Future;
use std::sync::Arc;

use super::{make_new_request, seed_service, TestResult};
use crate::record::{
    AssigneeGuard, PaymentStatus, RequestChange, RequestGuard, RequestStatus,
};
use crate::{PortalStorage, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_assign_exactly_one_wins",
        concurrent_assign_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_payment_updates_exactly_one_wins",
        concurrent_payment_updates_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_assign_different_requests_all_succeed",
        concurrent_assign_different_requests_all_succeed(factory).await,
    ));

    results
}

fn assign_guard() -> RequestGuard {
    RequestGuard::any()
        .status(RequestStatus::Submitted)
        .assignee(AssigneeGuard::Unassigned)
}

fn assign_to(officer: i64) -> RequestChange {
    RequestChange {
        status: Some(RequestStatus::InReview),
        assignee_id: Some(officer),
        ..Default::default()
    }
}

/// Insert a request and move it to SUBMITTED, unassigned.
async fn submitted_request<S: PortalStorage>(storage: &S, service_id: i64) -> Result<i64, String> {
    let record = storage
        .insert_request(make_new_request(100, service_id))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .update_request(
            record.id,
            &RequestGuard::any(),
            RequestChange {
                status: Some(RequestStatus::Submitted),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| format!("submit: {e}"))?;
    Ok(record.id)
}

/// Tally task outcomes: Ok(true) is a win, Ok(false) a lost race.
async fn count_winners(
    handles: Vec<tokio::task::JoinHandle<Result<bool, StorageError>>>,
) -> Result<(usize, usize), String> {
    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }
    Ok((winners, losers))
}

// ── Concurrent assign: exactly one wins ─────────────────────────────────────

/// N officers race to assign the same SUBMITTED, unassigned request. Exactly
/// one conditional write succeeds; the rest must get ConditionFailed and the
/// stored assignee must be the winner.
async fn concurrent_assign_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let service = seed_service(storage.as_ref(), "Passport").await?;
    let id = submitted_request(storage.as_ref(), service.id).await?;

    let mut handles = Vec::new();
    for officer in 0..N as i64 {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            match s
                .update_request(id, &assign_guard(), assign_to(1000 + officer))
                .await
            {
                Ok(_) => Ok(true),
                Err(StorageError::ConditionFailed { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let (winners, losers) = count_winners(handles).await?;
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }

    let record = storage
        .get_request(id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    if record.status != RequestStatus::InReview || record.assignee_id.is_none() {
        return Err(format!("final state inconsistent: {record:?}"));
    }
    Ok(())
}

// ── Concurrent payment update guarded on observed payment status ────────────

async fn concurrent_payment_updates_exactly_one_wins<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let service = seed_service(storage.as_ref(), "Passport").await?;
    let record = storage
        .insert_request(make_new_request(100, service.id))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    let id = record.id;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let target = if i % 2 == 0 {
                (PaymentStatus::Paid, Some("2025-03-01T10:00:00Z".to_string()))
            } else {
                (PaymentStatus::Pending, None)
            };
            match s
                .update_request(
                    id,
                    &RequestGuard::any().payment_status(PaymentStatus::NotPaid),
                    RequestChange {
                        payment: Some(target),
                        ..Default::default()
                    },
                )
                .await
            {
                Ok(_) => Ok(true),
                Err(StorageError::ConditionFailed { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let (winners, _) = count_winners(handles).await?;
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }

    let record = storage
        .get_request(id)
        .await
        .map_err(|e| format!("get: {e}"))?;
    let consistent = match record.payment_status {
        PaymentStatus::Paid => record.payment_date.is_some(),
        _ => record.payment_date.is_none(),
    };
    if !consistent {
        return Err(format!("payment pair torn: {record:?}"));
    }
    Ok(())
}

// ── Different requests: no false conflicts ──────────────────────────────────

async fn concurrent_assign_different_requests_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    let service = seed_service(storage.as_ref(), "Passport").await?;
    let mut ids = Vec::new();
    for _ in 0..N {
        ids.push(submitted_request(storage.as_ref(), service.id).await?);
    }

    let mut handles = Vec::new();
    for (officer, id) in ids.into_iter().enumerate() {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            match s
                .update_request(id, &assign_guard(), assign_to(1000 + officer as i64))
                .await
            {
                Ok(_) => Ok(true),
                Err(StorageError::ConditionFailed { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let (winners, losers) = count_winners(handles).await?;
    if winners != N || losers != 0 {
        return Err(format!(
            "expected {N} successes, got {winners} successes and {losers} conflicts"
        ));
    }
    Ok(())
}
