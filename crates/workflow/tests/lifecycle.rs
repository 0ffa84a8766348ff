//! End-to-end lifecycle scenarios against the in-memory backend.

use std::sync::Arc;

use euprava_storage::{
    MemoryStorage, NewInstitution, NewService, NewType, NewUser, PaymentStatus, PortalStorage,
    RequestStatus, Role, ServiceStatus,
};
use euprava_workflow::input::{
    CreateInput, DecideInput, Decision, EditInput, ListQuery, PaymentInput,
};
use euprava_workflow::{Actor, PortalError, Users, Workflow};
use rust_decimal::Decimal;
use serde_json::json;

const CITIZEN: Actor = Actor {
    id: 1001,
    role: Role::Citizen,
};
const OTHER_CITIZEN: Actor = Actor {
    id: 1002,
    role: Role::Citizen,
};
const OFFICER: Actor = Actor {
    id: 2001,
    role: Role::Officer,
};
const OTHER_OFFICER: Actor = Actor {
    id: 2002,
    role: Role::Officer,
};
const ADMIN: Actor = Actor {
    id: 3001,
    role: Role::Admin,
};

struct Fixture {
    storage: Arc<MemoryStorage>,
    workflow: Workflow<MemoryStorage>,
    paid_service: i64,
    free_service: i64,
}

async fn fixture() -> Fixture {
    let storage = Arc::new(MemoryStorage::new());
    let inst = storage
        .insert_institution(NewInstitution {
            name: "Opština Novi Sad".to_string(),
            city: "Novi Sad".to_string(),
            address: "Žarka Zrenjanina 2".to_string(),
            email: Some("info@novisad.rs".to_string()),
        })
        .await
        .unwrap();
    let ty = storage
        .insert_type(NewType {
            name: "Certificates".to_string(),
            description: None,
        })
        .await
        .unwrap();
    let mut ids = Vec::new();
    for (name, fee) in [
        ("Building permit", Decimal::new(50000, 2)),
        ("Birth certificate", Decimal::ZERO),
    ] {
        let service = storage
            .insert_service(NewService {
                institution_id: inst.id,
                type_id: ty.id,
                name: name.to_string(),
                description: None,
                fee,
                requires_attachment: false,
                status: ServiceStatus::Active,
            })
            .await
            .unwrap();
        ids.push(service.id);
    }
    Fixture {
        workflow: Workflow::new(Arc::clone(&storage)),
        storage,
        paid_service: ids[0],
        free_service: ids[1],
    }
}

fn create(service_id: i64) -> CreateInput {
    CreateInput::from_json(&json!({
        "service_id": service_id,
        "citizen_note": "please process",
        "form_data": {"purpose": "construction"}
    }))
    .unwrap()
}

fn decide(decision: Decision, note: Option<&str>) -> DecideInput {
    DecideInput {
        decision,
        officer_note: note.map(str::to_string),
    }
}

fn pay(status: PaymentStatus) -> PaymentInput {
    PaymentInput {
        payment_status: status,
    }
}

/// Create and submit as `CITIZEN`, then assign to `OFFICER`.
async fn in_review(fx: &Fixture, service_id: i64) -> i64 {
    let draft = fx.workflow.create(&CITIZEN, create(service_id)).await.unwrap();
    fx.workflow.submit(&CITIZEN, draft.id).await.unwrap();
    fx.workflow.assign(&OFFICER, draft.id).await.unwrap();
    draft.id
}

#[tokio::test]
async fn paid_service_full_lifecycle() {
    let fx = fixture().await;
    let draft = fx
        .workflow
        .create(&CITIZEN, create(fx.paid_service))
        .await
        .unwrap();
    assert_eq!(draft.status, RequestStatus::Draft);
    assert_eq!(draft.payment_status, PaymentStatus::NotPaid);
    assert_eq!(draft.assignee_id, None);

    let submitted = fx.workflow.submit(&CITIZEN, draft.id).await.unwrap();
    assert_eq!(submitted.status, RequestStatus::Submitted);

    let assigned = fx.workflow.assign(&OFFICER, draft.id).await.unwrap();
    assert_eq!(assigned.status, RequestStatus::InReview);
    assert_eq!(assigned.assignee_id, Some(OFFICER.id));

    let approved = fx
        .workflow
        .decide(&OFFICER, draft.id, decide(Decision::Approved, Some("all documents in order")))
        .await
        .unwrap();
    assert_eq!(approved.status, RequestStatus::Approved);
    assert_eq!(approved.officer_note.as_deref(), Some("all documents in order"));
    assert_eq!(approved.assignee_id, Some(OFFICER.id));

    let pending = fx
        .workflow
        .update_payment(&OFFICER, draft.id, pay(PaymentStatus::Pending))
        .await
        .unwrap();
    assert_eq!(pending.payment_status, PaymentStatus::Pending);
    assert_eq!(pending.payment_date, None);

    let paid = fx
        .workflow
        .update_payment(&OFFICER, draft.id, pay(PaymentStatus::Paid))
        .await
        .unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert!(paid.payment_date.is_some());
    assert_eq!(paid.status, RequestStatus::Approved);
}

#[tokio::test]
async fn leaving_paid_clears_payment_date() {
    let fx = fixture().await;
    let id = in_review(&fx, fx.paid_service).await;
    let paid = fx
        .workflow
        .update_payment(&ADMIN, id, pay(PaymentStatus::Paid))
        .await
        .unwrap();
    assert!(paid.payment_date.is_some());
    let unpaid = fx
        .workflow
        .update_payment(&ADMIN, id, pay(PaymentStatus::NotPaid))
        .await
        .unwrap();
    assert_eq!(unpaid.payment_status, PaymentStatus::NotPaid);
    assert_eq!(unpaid.payment_date, None);
}

#[tokio::test]
async fn free_service_rejects_payable_targets() {
    let fx = fixture().await;
    let id = in_review(&fx, fx.free_service).await;
    let record = fx.workflow.get(&OFFICER, id).await.unwrap();
    assert_eq!(record.payment_status, PaymentStatus::NotRequired);

    for target in [PaymentStatus::NotPaid, PaymentStatus::Pending, PaymentStatus::Paid] {
        let err = fx
            .workflow
            .update_payment(&OFFICER, id, pay(target))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::PreconditionFailed(_)), "{target}: {err:?}");
    }
    let unchanged = fx.workflow.get(&OFFICER, id).await.unwrap();
    assert_eq!(unchanged.payment_status, PaymentStatus::NotRequired);
    assert_eq!(unchanged.payment_date, None);
}

#[tokio::test]
async fn submit_twice_is_precondition_failed() {
    let fx = fixture().await;
    let draft = fx
        .workflow
        .create(&CITIZEN, create(fx.free_service))
        .await
        .unwrap();
    fx.workflow.submit(&CITIZEN, draft.id).await.unwrap();
    let err = fx.workflow.submit(&CITIZEN, draft.id).await.unwrap_err();
    assert!(matches!(err, PortalError::PreconditionFailed(_)));
}

#[tokio::test]
async fn citizen_cannot_touch_foreign_request() {
    let fx = fixture().await;
    let draft = fx
        .workflow
        .create(&CITIZEN, create(fx.free_service))
        .await
        .unwrap();

    assert!(matches!(
        fx.workflow.get(&OTHER_CITIZEN, draft.id).await,
        Err(PortalError::Forbidden(_))
    ));
    assert!(matches!(
        fx.workflow
            .edit(&OTHER_CITIZEN, draft.id, EditInput::default())
            .await,
        Err(PortalError::Forbidden(_))
    ));
    assert!(matches!(
        fx.workflow.delete(&OTHER_CITIZEN, draft.id).await,
        Err(PortalError::Forbidden(_))
    ));
    assert!(matches!(
        fx.workflow.submit(&OTHER_CITIZEN, draft.id).await,
        Err(PortalError::Forbidden(_))
    ));
    assert!(fx
        .workflow
        .list(&OTHER_CITIZEN, ListQuery::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn citizen_edits_and_deletes_only_drafts() {
    let fx = fixture().await;
    let draft = fx
        .workflow
        .create(&CITIZEN, create(fx.free_service))
        .await
        .unwrap();
    let edited = fx
        .workflow
        .edit(
            &CITIZEN,
            draft.id,
            EditInput::from_json(&json!({"citizenNote": null, "form_data": {"purpose": "school"}}))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(edited.citizen_note, None);
    assert_eq!(edited.form_data.get("purpose"), Some(&json!("school")));
    assert_eq!(edited.status, RequestStatus::Draft);

    fx.workflow.submit(&CITIZEN, draft.id).await.unwrap();
    assert!(matches!(
        fx.workflow
            .edit(&CITIZEN, draft.id, EditInput::default())
            .await,
        Err(PortalError::PreconditionFailed(_))
    ));
    assert!(matches!(
        fx.workflow.delete(&CITIZEN, draft.id).await,
        Err(PortalError::PreconditionFailed(_))
    ));

    // Admins may still edit and delete.
    fx.workflow
        .edit(
            &ADMIN,
            draft.id,
            EditInput {
                attachment: Some(Some("https://files.example.rs/a.pdf".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    fx.workflow.delete(&ADMIN, draft.id).await.unwrap();
    assert!(matches!(
        fx.workflow.get(&ADMIN, draft.id).await,
        Err(PortalError::NotFound(_))
    ));
}

#[tokio::test]
async fn officer_decides_only_own_assignment() {
    let fx = fixture().await;
    let id = in_review(&fx, fx.paid_service).await;

    let err = fx
        .workflow
        .decide(&OTHER_OFFICER, id, decide(Decision::Rejected, None))
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::Forbidden(_)));
    assert!(matches!(
        fx.workflow.get(&OTHER_OFFICER, id).await,
        Err(PortalError::Forbidden(_))
    ));

    let rejected = fx
        .workflow
        .decide(&OFFICER, id, decide(Decision::Rejected, Some("missing documents")))
        .await
        .unwrap();
    assert_eq!(rejected.status, RequestStatus::Rejected);

    // Terminal: no second decision, no re-open.
    assert!(matches!(
        fx.workflow
            .decide(&OFFICER, id, decide(Decision::Approved, None))
            .await,
        Err(PortalError::PreconditionFailed(_))
    ));
}

#[tokio::test]
async fn roles_outside_the_table_are_forbidden() {
    let fx = fixture().await;
    assert!(matches!(
        fx.workflow.create(&OFFICER, create(fx.free_service)).await,
        Err(PortalError::Forbidden(_))
    ));
    let draft = fx
        .workflow
        .create(&CITIZEN, create(fx.free_service))
        .await
        .unwrap();
    fx.workflow.submit(&CITIZEN, draft.id).await.unwrap();
    assert!(matches!(
        fx.workflow.assign(&CITIZEN, draft.id).await,
        Err(PortalError::Forbidden(_))
    ));
    assert!(matches!(
        fx.workflow
            .update_payment(&CITIZEN, draft.id, pay(PaymentStatus::Paid))
            .await,
        Err(PortalError::Forbidden(_))
    ));
}

#[tokio::test]
async fn officer_queue_lists_inbox_and_own_work() {
    let fx = fixture().await;
    let mine = in_review(&fx, fx.paid_service).await;

    let draft = fx
        .workflow
        .create(&CITIZEN, create(fx.paid_service))
        .await
        .unwrap();
    let inbox = fx
        .workflow
        .create(&CITIZEN, create(fx.free_service))
        .await
        .unwrap();
    fx.workflow.submit(&CITIZEN, inbox.id).await.unwrap();

    let ids: Vec<i64> = fx
        .workflow
        .list(&OFFICER, ListQuery::default())
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![inbox.id, mine]);

    let other: Vec<i64> = fx
        .workflow
        .list(&OTHER_OFFICER, ListQuery::default())
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(other, vec![inbox.id]);

    let filtered = fx
        .workflow
        .list(
            &CITIZEN,
            ListQuery {
                status: Some(RequestStatus::Draft),
                service_id: Some(fx.paid_service),
            },
        )
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].id, draft.id);
}

#[tokio::test]
async fn concurrent_assign_exactly_one_wins() {
    let fx = fixture().await;
    let draft = fx
        .workflow
        .create(&CITIZEN, create(fx.paid_service))
        .await
        .unwrap();
    fx.workflow.submit(&CITIZEN, draft.id).await.unwrap();
    let id = draft.id;

    let mut handles = Vec::new();
    for i in 0..10 {
        let workflow = fx.workflow.clone();
        let officer = Actor::new(5000 + i, Role::Officer);
        handles.push(tokio::spawn(
            async move { workflow.assign(&officer, id).await },
        ));
    }

    let mut winners = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(record) => winners.push(record.assignee_id),
            Err(PortalError::PreconditionFailed(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(winners.len(), 1, "exactly one assign must win");

    let stored = fx.workflow.get(&ADMIN, id).await.unwrap();
    assert_eq!(stored.status, RequestStatus::InReview);
    assert_eq!(stored.assignee_id, winners[0]);
}

#[tokio::test]
async fn inactive_service_rejects_new_requests() {
    let storage = Arc::new(MemoryStorage::new());
    let inst = storage
        .insert_institution(NewInstitution {
            name: "RGZ".to_string(),
            city: "Beograd".to_string(),
            address: "Bulevar vojvode Mišića 39".to_string(),
            email: None,
        })
        .await
        .unwrap();
    let ty = storage
        .insert_type(NewType {
            name: "Cadastre".to_string(),
            description: None,
        })
        .await
        .unwrap();
    let service = storage
        .insert_service(NewService {
            institution_id: inst.id,
            type_id: ty.id,
            name: "Parcel extract".to_string(),
            description: None,
            fee: Decimal::ZERO,
            requires_attachment: false,
            status: ServiceStatus::Inactive,
        })
        .await
        .unwrap();
    let workflow = Workflow::new(storage);
    assert!(matches!(
        workflow.create(&CITIZEN, create(service.id)).await,
        Err(PortalError::PreconditionFailed(_))
    ));
}

#[tokio::test]
async fn reviewer_account_survives_until_review_ends() {
    let fx = fixture().await;
    let users = Users::new(Arc::clone(&fx.storage));
    let officer = fx
        .storage
        .insert_user(NewUser {
            name: "Jelena Jović".to_string(),
            email: "jelena@euprava.rs".to_string(),
            date_of_birth: "1988-03-14".to_string(),
            jmbg: "1403988715006".to_string(),
            role: Role::Officer,
            password_hash: String::new(),
        })
        .await
        .unwrap();
    let reviewer = Actor::from(&officer);

    let draft = fx
        .workflow
        .create(&CITIZEN, create(fx.free_service))
        .await
        .unwrap();
    fx.workflow.submit(&CITIZEN, draft.id).await.unwrap();
    fx.workflow.assign(&reviewer, draft.id).await.unwrap();
    assert!(matches!(
        users.delete(&ADMIN, officer.id).await,
        Err(PortalError::PreconditionFailed(_))
    ));

    fx.workflow
        .decide(&reviewer, draft.id, decide(Decision::Approved, None))
        .await
        .unwrap();
    users.delete(&ADMIN, officer.id).await.unwrap();
    let decided = fx.workflow.get(&ADMIN, draft.id).await.unwrap();
    assert_eq!(decided.status, RequestStatus::Approved);
    assert_eq!(decided.assignee_id, None);
}
