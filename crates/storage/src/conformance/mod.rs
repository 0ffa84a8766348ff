//! Conformance test suite for `PortalStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `PortalStorage` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Requests**: insertion defaults, lookups, scoped and filtered listing
//! - **Guards**: conditional updates and deletes apply only when the guard holds
//! - **Concurrency**: racing conditional writes have exactly one winner
//! - **Catalog**: referential checks and unique names
//! - **Users**: unique email/jmbg, sessions
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use euprava_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_storage().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod catalog;
mod concurrent;
mod guard;
mod requests;
mod users;

use std::fmt;
use std::future::Future;

use rust_decimal::Decimal;

use crate::record::{
    FormData, NewInstitution, NewRequest, NewService, NewType, NewUser, PaymentStatus, Role,
    ServiceRecord, ServiceStatus, UserId,
};
use crate::PortalStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "requests", "guard", "concurrent").
    pub category: String,
    /// Test name (e.g. "insert_starts_in_draft_unassigned").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: PortalStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(requests::run_request_tests(&factory).await);
    results.extend(guard::run_guard_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);
    results.extend(catalog::run_catalog_tests(&factory).await);
    results.extend(users::run_user_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: fixtures with sensible defaults ─────────────────────────────────

/// Insert one institution, one type and one active service.
async fn seed_service<S: PortalStorage>(storage: &S, name: &str) -> Result<ServiceRecord, String> {
    let institution = storage
        .insert_institution(NewInstitution {
            name: format!("{name} institution"),
            city: "Beograd".to_string(),
            address: "Nemanjina 11".to_string(),
            email: None,
        })
        .await
        .map_err(|e| format!("insert institution: {e}"))?;
    let service_type = storage
        .insert_type(NewType {
            name: format!("{name} type"),
            description: None,
        })
        .await
        .map_err(|e| format!("insert type: {e}"))?;
    storage
        .insert_service(make_new_service(institution.id, service_type.id, name))
        .await
        .map_err(|e| format!("insert service: {e}"))
}

fn make_new_service(institution_id: i64, type_id: i64, name: &str) -> NewService {
    NewService {
        institution_id,
        type_id,
        name: name.to_string(),
        description: None,
        fee: Decimal::new(50000, 2),
        requires_attachment: false,
        status: ServiceStatus::Active,
    }
}

fn make_new_request(owner_id: UserId, service_id: i64) -> NewRequest {
    NewRequest {
        owner_id,
        service_id,
        citizen_note: Some("please process".to_string()),
        attachment: None,
        form_data: FormData::from([("purpose".to_string(), serde_json::json!("travel"))]),
        payment_status: PaymentStatus::NotPaid,
    }
}

fn make_new_user(name: &str, email: &str, jmbg: &str, role: Role) -> NewUser {
    NewUser {
        name: name.to_string(),
        email: email.to_string(),
        date_of_birth: "1990-05-17".to_string(),
        jmbg: jmbg.to_string(),
        role,
        password_hash: "salt$digest".to_string(),
    }
}
