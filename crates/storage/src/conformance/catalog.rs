use std::future::Future;

use rust_decimal::Decimal;

use super::{make_new_request, make_new_service, seed_service, TestResult};
use crate::record::{
    InstitutionChange, NewType, RequestFilter, RequestScope, ServiceChange, ServiceFilter,
    ServiceStatus, TypeChange,
};
use crate::{PortalStorage, StorageError};

pub(super) async fn run_catalog_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "catalog",
        "service_requires_existing_institution_and_type",
        service_requires_existing_institution_and_type(factory).await,
    ));
    results.push(TestResult::from_result(
        "catalog",
        "service_name_is_unique",
        service_name_is_unique(factory).await,
    ));
    results.push(TestResult::from_result(
        "catalog",
        "active_only_filter_hides_inactive",
        active_only_filter_hides_inactive(factory).await,
    ));
    results.push(TestResult::from_result(
        "catalog",
        "update_service_is_partial",
        update_service_is_partial(factory).await,
    ));
    results.push(TestResult::from_result(
        "catalog",
        "update_institution_is_partial",
        update_institution_is_partial(factory).await,
    ));
    results.push(TestResult::from_result(
        "catalog",
        "type_rename_keeps_names_unique",
        type_rename_keeps_names_unique(factory).await,
    ));
    results.push(TestResult::from_result(
        "catalog",
        "delete_service_removes_its_requests",
        delete_service_removes_its_requests(factory).await,
    ));
    results.push(TestResult::from_result(
        "catalog",
        "delete_institution_cascades_to_services",
        delete_institution_cascades_to_services(factory).await,
    ));
    results.push(TestResult::from_result(
        "catalog",
        "delete_type_cascades_to_services",
        delete_type_cascades_to_services(factory).await,
    ));

    results
}

async fn service_requires_existing_institution_and_type<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    match storage
        .insert_service(make_new_service(77, 78, "Orphan"))
        .await
    {
        Err(StorageError::InstitutionNotFound { institution_id: 77 }) => Ok(()),
        other => Err(format!("expected InstitutionNotFound, got {other:?}")),
    }
}

async fn service_name_is_unique<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let existing = seed_service(&storage, "Passport").await?;
    match storage
        .insert_service(make_new_service(
            existing.institution_id,
            existing.type_id,
            "Passport",
        ))
        .await
    {
        Err(StorageError::Duplicate { field: "name", .. }) => Ok(()),
        other => Err(format!("expected Duplicate(name), got {other:?}")),
    }
}

async fn active_only_filter_hides_inactive<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let active = seed_service(&storage, "Passport").await?;
    let mut inactive = make_new_service(active.institution_id, active.type_id, "Archive");
    inactive.status = ServiceStatus::Inactive;
    storage
        .insert_service(inactive)
        .await
        .map_err(|e| format!("insert inactive: {e}"))?;

    let all = storage
        .list_services(&ServiceFilter::default())
        .await
        .map_err(|e| format!("list: {e}"))?;
    if all.len() != 2 || all[0].name != "Archive" {
        return Err(format!("expected both services ordered by name, got {all:?}"));
    }
    let visible = storage
        .list_services(&ServiceFilter {
            active_only: true,
            ..Default::default()
        })
        .await
        .map_err(|e| format!("list: {e}"))?;
    if visible.len() != 1 || visible[0].id != active.id {
        return Err(format!("expected only the active service, got {visible:?}"));
    }
    Ok(())
}

async fn update_service_is_partial<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let service = seed_service(&storage, "Passport").await?;
    let updated = storage
        .update_service(
            service.id,
            ServiceChange {
                fee: Some(Decimal::ZERO),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| format!("update: {e}"))?;
    if updated.fee != Decimal::ZERO || updated.name != service.name {
        return Err(format!("unexpected update result: {updated:?}"));
    }
    Ok(())
}

async fn update_institution_is_partial<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let service = seed_service(&storage, "Passport").await?;
    let updated = storage
        .update_institution(
            service.institution_id,
            InstitutionChange {
                city: Some("Kragujevac".to_string()),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| format!("update: {e}"))?;
    if updated.city != "Kragujevac" || updated.name != "Passport institution" {
        return Err(format!("unexpected update result: {updated:?}"));
    }
    match storage
        .update_institution(9999, InstitutionChange::default())
        .await
    {
        Err(StorageError::InstitutionNotFound { institution_id: 9999 }) => Ok(()),
        other => Err(format!("expected InstitutionNotFound, got {other:?}")),
    }
}

async fn type_rename_keeps_names_unique<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let permits = storage
        .insert_type(NewType {
            name: "Permits".to_string(),
            description: None,
        })
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .insert_type(NewType {
            name: "Certificates".to_string(),
            description: None,
        })
        .await
        .map_err(|e| format!("insert: {e}"))?;

    let rename = |name: &str| TypeChange {
        name: Some(name.to_string()),
        description: None,
    };
    match storage.update_type(permits.id, rename("Certificates")).await {
        Err(StorageError::Duplicate { field: "name", .. }) => {}
        other => return Err(format!("expected Duplicate(name), got {other:?}")),
    }
    // Keeping its own name is not a clash.
    storage
        .update_type(permits.id, rename("Permits"))
        .await
        .map_err(|e| format!("self rename: {e}"))?;
    Ok(())
}

async fn delete_service_removes_its_requests<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let doomed = seed_service(&storage, "Passport").await?;
    let kept = storage
        .insert_service(make_new_service(
            doomed.institution_id,
            doomed.type_id,
            "Identity card",
        ))
        .await
        .map_err(|e| format!("insert service: {e}"))?;
    for service_id in [doomed.id, doomed.id, kept.id] {
        storage
            .insert_request(make_new_request(100, service_id))
            .await
            .map_err(|e| format!("insert request: {e}"))?;
    }

    let removed = storage
        .delete_service(doomed.id)
        .await
        .map_err(|e| format!("delete: {e}"))?;
    if removed != 2 {
        return Err(format!("expected 2 requests removed, got {removed}"));
    }
    let left = storage
        .list_requests(&RequestFilter::scoped(RequestScope::All))
        .await
        .map_err(|e| format!("list: {e}"))?;
    if left.len() != 1 || left[0].service_id != kept.id {
        return Err(format!("expected only the kept service's request, got {left:?}"));
    }
    match storage.get_service(doomed.id).await {
        Err(StorageError::ServiceNotFound { .. }) => {}
        other => return Err(format!("expected ServiceNotFound, got {other:?}")),
    }
    match storage.delete_service(doomed.id).await {
        Err(StorageError::ServiceNotFound { .. }) => Ok(()),
        other => Err(format!("expected ServiceNotFound on second delete, got {other:?}")),
    }
}

async fn delete_institution_cascades_to_services<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let doomed = seed_service(&storage, "Passport").await?;
    let other = seed_service(&storage, "Identity card").await?;
    storage
        .insert_request(make_new_request(100, doomed.id))
        .await
        .map_err(|e| format!("insert request: {e}"))?;

    let removed = storage
        .delete_institution(doomed.institution_id)
        .await
        .map_err(|e| format!("delete: {e}"))?;
    if removed != 1 {
        return Err(format!("expected 1 request removed, got {removed}"));
    }
    let services = storage
        .list_services(&ServiceFilter::default())
        .await
        .map_err(|e| format!("list: {e}"))?;
    if services.len() != 1 || services[0].id != other.id {
        return Err(format!("expected only the other institution's service, got {services:?}"));
    }
    match storage.get_institution(doomed.institution_id).await {
        Err(StorageError::InstitutionNotFound { .. }) => Ok(()),
        other => Err(format!("expected InstitutionNotFound, got {other:?}")),
    }
}

async fn delete_type_cascades_to_services<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    let doomed = seed_service(&storage, "Passport").await?;
    storage
        .insert_request(make_new_request(100, doomed.id))
        .await
        .map_err(|e| format!("insert request: {e}"))?;

    let removed = storage
        .delete_type(doomed.type_id)
        .await
        .map_err(|e| format!("delete: {e}"))?;
    if removed != 1 {
        return Err(format!("expected 1 request removed, got {removed}"));
    }
    if storage.get_service(doomed.id).await.is_ok() {
        return Err("service survived deletion of its type".to_string());
    }
    // The institution is not part of the cascade.
    storage
        .get_institution(doomed.institution_id)
        .await
        .map_err(|e| format!("institution went with the type: {e}"))?;
    match storage.delete_type(doomed.type_id).await {
        Err(StorageError::TypeNotFound { .. }) => Ok(()),
        other => Err(format!("expected TypeNotFound on second delete, got {other:?}")),
    }
}
