//! Decoding of JSON request bodies and query strings into typed inputs.
//!
//! Every decoder collects all field problems before failing, so a client
//! gets one `ValidationFailed` listing each bad field. Body fields are
//! snake_case; the camelCase spelling is accepted as an alias.

use std::collections::HashMap;

use euprava_storage::{
    FormData, InstitutionChange, PaymentStatus, RequestStatus, Role, ServiceChange, ServiceId,
    ServiceStatus, TypeChange,
};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use time::macros::format_description;
use time::Date;

use crate::error::{FieldErrors, PortalError};

/// Longest accepted attachment reference.
const MAX_ATTACHMENT_LEN: usize = 2048;

/// Longest accepted short text (names, emails).
const MAX_NAME_LEN: usize = 255;

/// Field accessor over a JSON object body.
struct Fields<'a> {
    obj: Option<&'a Map<String, Value>>,
    errors: FieldErrors,
}

impl<'a> Fields<'a> {
    fn new(body: &'a Value) -> Self {
        let mut errors = FieldErrors::new();
        let obj = body.as_object();
        if obj.is_none() && !body.is_null() {
            errors.add("body", "the request body must be a JSON object");
        }
        Self { obj, errors }
    }

    /// `(snake_case, camelCase)` lookup. The error key is always the first name.
    fn lookup(&self, names: &[&str]) -> Option<&'a Value> {
        let obj = self.obj?;
        names.iter().find_map(|n| obj.get(*n))
    }

    fn required_id(&mut self, names: &[&str]) -> Option<i64> {
        match self.lookup(names) {
            None | Some(Value::Null) => {
                self.errors.add(names[0], format!("the {} field is required", names[0]));
                None
            }
            Some(v) => match v.as_i64() {
                Some(id) => Some(id),
                None => {
                    self.errors.add(names[0], format!("the {} must be an integer", names[0]));
                    None
                }
            },
        }
    }

    fn optional_id(&mut self, names: &[&str]) -> Option<i64> {
        match self.lookup(names) {
            None => None,
            Some(_) => self.required_id(names),
        }
    }

    /// Absent: `None`. Explicit null: `Some(None)`. String: `Some(Some(_))`.
    fn optional_text(&mut self, names: &[&str], max_len: Option<usize>) -> Option<Option<String>> {
        match self.lookup(names)? {
            Value::Null => Some(None),
            Value::String(s) => {
                if max_len.is_some_and(|max| s.chars().count() > max) {
                    self.errors.add(
                        names[0],
                        format!(
                            "the {} may not be greater than {} characters",
                            names[0],
                            max_len.unwrap_or_default()
                        ),
                    );
                    return None;
                }
                Some(Some(s.clone()))
            }
            _ => {
                self.errors.add(names[0], format!("the {} must be a string", names[0]));
                None
            }
        }
    }

    fn required_text(&mut self, names: &[&str], max_len: Option<usize>) -> Option<String> {
        match self.optional_text(names, max_len) {
            Some(Some(s)) if !s.trim().is_empty() => Some(s),
            Some(_) => {
                self.errors.add(names[0], format!("the {} field is required", names[0]));
                None
            }
            None => {
                if self.errors.get(names[0]).is_none() {
                    self.errors.add(names[0], format!("the {} field is required", names[0]));
                }
                None
            }
        }
    }

    /// [`Fields::required_text`] for a field that may be left out entirely.
    fn present_text(&mut self, names: &[&str], max_len: Option<usize>) -> Option<String> {
        self.lookup(names)?;
        self.required_text(names, max_len)
    }

    fn optional_bool(&mut self, names: &[&str]) -> Option<bool> {
        match self.lookup(names)? {
            Value::Bool(b) => Some(*b),
            _ => {
                self.errors.add(names[0], format!("the {} field must be true or false", names[0]));
                None
            }
        }
    }

    /// Absent: `None`. Null: empty map. Object: its entries.
    fn form_data(&mut self, names: &[&str]) -> Option<FormData> {
        match self.lookup(names)? {
            Value::Null => Some(FormData::new()),
            Value::Object(map) => Some(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            _ => {
                self.errors.add(names[0], format!("the {} must be an object", names[0]));
                None
            }
        }
    }

    /// Required upper-case enum value parsed with `parse`.
    fn required_enum<T>(
        &mut self,
        names: &[&str],
        allowed: &[&str],
        parse: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        let raw = self.required_text(names, None)?;
        self.enum_value(names[0], &raw, allowed, parse)
    }

    fn optional_enum<T>(
        &mut self,
        names: &[&str],
        allowed: &[&str],
        parse: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        self.lookup(names)?;
        self.required_enum(names, allowed, parse)
    }

    fn enum_value<T>(
        &mut self,
        field: &str,
        raw: &str,
        allowed: &[&str],
        parse: impl Fn(&str) -> Option<T>,
    ) -> Option<T> {
        match parse(raw) {
            Some(v) if allowed.contains(&raw) => Some(v),
            _ => {
                self.errors.add(
                    field,
                    format!("the selected {field} is invalid (expected one of {})", allowed.join(", ")),
                );
                None
            }
        }
    }

    fn optional_fee(&mut self, names: &[&str]) -> Option<Decimal> {
        let raw = self.lookup(names)?;
        let parsed = match raw {
            Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
            Value::String(s) => s.trim().parse::<Decimal>().ok(),
            _ => None,
        };
        match parsed {
            Some(fee) if fee >= Decimal::ZERO => Some(fee.round_dp(2)),
            Some(_) => {
                self.errors.add(names[0], format!("the {} must be at least 0", names[0]));
                None
            }
            None => {
                self.errors.add(names[0], format!("the {} must be a number", names[0]));
                None
            }
        }
    }

    fn finish(self) -> Result<(), PortalError> {
        self.errors.into_result()
    }
}

fn all_str<T: Copy>(values: &[T], as_str: impl Fn(T) -> &'static str) -> Vec<&'static str> {
    values.iter().map(|v| as_str(*v)).collect()
}

// ── Service requests ─────────────────────────────────────────────────────────

/// Body of `POST /service-requests`.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateInput {
    pub service_id: ServiceId,
    pub citizen_note: Option<String>,
    pub attachment: Option<String>,
    pub form_data: FormData,
}

impl CreateInput {
    pub fn from_json(body: &Value) -> Result<Self, PortalError> {
        let mut f = Fields::new(body);
        let service_id = f.required_id(&["service_id", "serviceId"]);
        let citizen_note = f.optional_text(&["citizen_note", "citizenNote"], None);
        let attachment = f.optional_text(&["attachment"], Some(MAX_ATTACHMENT_LEN));
        let form_data = f.form_data(&["form_data", "formData"]);
        f.finish()?;
        Ok(Self {
            service_id: service_id.unwrap_or_default(),
            citizen_note: citizen_note.flatten(),
            attachment: attachment.flatten(),
            form_data: form_data.unwrap_or_default(),
        })
    }
}

/// Body of `PUT /service-requests/{id}`. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditInput {
    pub citizen_note: Option<Option<String>>,
    pub attachment: Option<Option<String>>,
    pub form_data: Option<FormData>,
}

impl EditInput {
    pub fn from_json(body: &Value) -> Result<Self, PortalError> {
        let mut f = Fields::new(body);
        let citizen_note = f.optional_text(&["citizen_note", "citizenNote"], None);
        let attachment = f.optional_text(&["attachment"], Some(MAX_ATTACHMENT_LEN));
        let form_data = f.form_data(&["form_data", "formData"]);
        f.finish()?;
        Ok(Self {
            citizen_note,
            attachment,
            form_data,
        })
    }
}

/// Officer decision on an `IN_REVIEW` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn status(self) -> RequestStatus {
        match self {
            Decision::Approved => RequestStatus::Approved,
            Decision::Rejected => RequestStatus::Rejected,
        }
    }
}

/// Body of `PATCH /service-requests/{id}/status`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecideInput {
    pub decision: Decision,
    pub officer_note: Option<String>,
}

impl DecideInput {
    pub fn from_json(body: &Value) -> Result<Self, PortalError> {
        let mut f = Fields::new(body);
        let decision = f.required_enum(&["status"], &["APPROVED", "REJECTED"], |s| match s {
            "APPROVED" => Some(Decision::Approved),
            "REJECTED" => Some(Decision::Rejected),
            _ => None,
        });
        let officer_note = f.optional_text(&["officer_note", "officerNote"], None);
        f.finish()?;
        Ok(Self {
            decision: decision.unwrap_or(Decision::Rejected),
            officer_note: officer_note.flatten(),
        })
    }
}

/// Body of `PATCH /service-requests/{id}/payment`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentInput {
    pub payment_status: PaymentStatus,
}

impl PaymentInput {
    pub fn from_json(body: &Value) -> Result<Self, PortalError> {
        let mut f = Fields::new(body);
        let allowed = all_str(PaymentStatus::ALL, PaymentStatus::as_str);
        let payment_status = f.required_enum(
            &["payment_status", "paymentStatus"],
            &allowed,
            PaymentStatus::parse,
        );
        f.finish()?;
        Ok(Self {
            payment_status: payment_status.unwrap_or(PaymentStatus::NotRequired),
        })
    }
}

/// Query string of `GET /service-requests`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub status: Option<RequestStatus>,
    pub service_id: Option<ServiceId>,
}

impl ListQuery {
    /// Empty values are treated as absent.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, PortalError> {
        let mut errors = FieldErrors::new();
        let status = match params.get("status").map(|s| s.trim()).filter(|s| !s.is_empty()) {
            None => None,
            Some(raw) => match RequestStatus::parse(raw) {
                Some(s) => Some(s),
                None => {
                    errors.add("status", "the selected status is invalid");
                    None
                }
            },
        };
        let service_id = parse_id_param(params, "service_id", &mut errors);
        errors.into_result()?;
        Ok(Self { status, service_id })
    }
}

fn parse_id_param(
    params: &HashMap<String, String>,
    name: &str,
    errors: &mut FieldErrors,
) -> Option<i64> {
    let raw = params.get(name).map(|s| s.trim()).filter(|s| !s.is_empty())?;
    match raw.parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(name, format!("the {name} must be an integer"));
            None
        }
    }
}

// ── Catalog ──────────────────────────────────────────────────────────────────

/// Query string of `GET /services`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceQuery {
    pub institution_id: Option<i64>,
    pub type_id: Option<i64>,
}

impl ServiceQuery {
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, PortalError> {
        let mut errors = FieldErrors::new();
        let institution_id = parse_id_param(params, "institution_id", &mut errors);
        let type_id = parse_id_param(params, "type_id", &mut errors);
        errors.into_result()?;
        Ok(Self {
            institution_id,
            type_id,
        })
    }
}

/// Body of `POST /services` and `PUT /services/{id}`.
///
/// Decoded as a partial change; [`ServiceInput::require_complete`] enforces
/// the fields a new service must have.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceInput {
    pub change: ServiceChange,
}

impl ServiceInput {
    pub fn from_json(body: &Value) -> Result<Self, PortalError> {
        let mut f = Fields::new(body);
        let institution_id = f.optional_id(&["institution_id", "institutionId"]);
        let type_id = f.optional_id(&["type_id", "typeId"]);
        let name = f.present_text(&["name"], Some(MAX_NAME_LEN));
        let description = f.optional_text(&["description"], None);
        let fee = f.optional_fee(&["fee"]);
        let requires_attachment = f.optional_bool(&["requires_attachment", "requiresAttachment"]);
        let allowed = all_str(ServiceStatus::ALL, ServiceStatus::as_str);
        let status = f.optional_enum(&["status"], &allowed, ServiceStatus::parse);
        f.finish()?;
        Ok(Self {
            change: ServiceChange {
                institution_id,
                type_id,
                name,
                description,
                fee,
                requires_attachment,
                status,
            },
        })
    }

    /// Fields required when creating a service.
    pub fn require_complete(&self) -> Result<(), PortalError> {
        let mut errors = FieldErrors::new();
        let c = &self.change;
        if c.institution_id.is_none() {
            errors.add("institution_id", "the institution_id field is required");
        }
        if c.type_id.is_none() {
            errors.add("type_id", "the type_id field is required");
        }
        if c.name.is_none() {
            errors.add("name", "the name field is required");
        }
        if c.fee.is_none() {
            errors.add("fee", "the fee field is required");
        }
        if c.requires_attachment.is_none() {
            errors.add("requires_attachment", "the requires_attachment field is required");
        }
        if c.status.is_none() {
            errors.add("status", "the status field is required");
        }
        errors.into_result()
    }
}

/// Body of `POST /institutions` and `PUT /institutions/{id}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstitutionInput {
    pub change: InstitutionChange,
}

impl InstitutionInput {
    pub fn from_json(body: &Value) -> Result<Self, PortalError> {
        let mut f = Fields::new(body);
        let name = f.present_text(&["name"], Some(MAX_NAME_LEN));
        let city = f.present_text(&["city"], Some(MAX_NAME_LEN));
        let address = f.present_text(&["address"], Some(MAX_NAME_LEN));
        let email = f.optional_text(&["email"], Some(MAX_NAME_LEN));
        if let Some(Some(email)) = &email {
            if !is_email(email) {
                f.errors.add("email", "the email must be a valid email address");
            }
        }
        f.finish()?;
        Ok(Self {
            change: InstitutionChange {
                name,
                city,
                address,
                email,
            },
        })
    }

    /// Fields required when creating an institution.
    pub fn require_complete(&self) -> Result<(), PortalError> {
        let mut errors = FieldErrors::new();
        let c = &self.change;
        for (field, value) in [("name", &c.name), ("city", &c.city), ("address", &c.address)] {
            if value.is_none() {
                errors.add(field, format!("the {field} field is required"));
            }
        }
        errors.into_result()
    }
}

/// Body of `POST /types` and `PUT /types/{id}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeInput {
    pub change: TypeChange,
}

impl TypeInput {
    pub fn from_json(body: &Value) -> Result<Self, PortalError> {
        let mut f = Fields::new(body);
        let name = f.present_text(&["name"], Some(MAX_NAME_LEN));
        let description = f.optional_text(&["description"], None);
        f.finish()?;
        Ok(Self {
            change: TypeChange { name, description },
        })
    }

    pub fn require_complete(&self) -> Result<(), PortalError> {
        if self.change.name.is_none() {
            return Err(PortalError::invalid_field("name", "the name field is required"));
        }
        Ok(())
    }
}

// ── Identity ─────────────────────────────────────────────────────────────────

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub date_of_birth: String,
    pub jmbg: String,
}

impl RegisterInput {
    pub fn from_json(body: &Value) -> Result<Self, PortalError> {
        let mut f = Fields::new(body);
        let name = f.required_text(&["name"], Some(MAX_NAME_LEN));
        let email = f.required_text(&["email"], Some(MAX_NAME_LEN));
        let password = f.required_text(&["password"], None);
        let date_of_birth = f.required_text(&["date_of_birth", "dateOfBirth"], None);
        let jmbg = f.required_text(&["jmbg"], None);

        if let Some(email) = &email {
            if !is_email(email) {
                f.errors.add("email", "the email must be a valid email address");
            }
        }
        if let Some(password) = &password {
            if password.chars().count() < 6 {
                f.errors.add("password", "the password must be at least 6 characters");
            }
        }
        if let Some(dob) = &date_of_birth {
            if Date::parse(dob, format_description!("[year]-[month]-[day]")).is_err() {
                f.errors.add("date_of_birth", "the date_of_birth is not a valid date");
            }
        }
        if let Some(jmbg) = &jmbg {
            if jmbg.len() != 13 || !jmbg.bytes().all(|b| b.is_ascii_digit()) {
                f.errors.add("jmbg", "the jmbg must be exactly 13 digits");
            }
        }
        f.finish()?;
        Ok(Self {
            name: name.unwrap_or_default(),
            email: email.unwrap_or_default(),
            password: password.unwrap_or_default(),
            date_of_birth: date_of_birth.unwrap_or_default(),
            jmbg: jmbg.unwrap_or_default(),
        })
    }
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl LoginInput {
    pub fn from_json(body: &Value) -> Result<Self, PortalError> {
        let mut f = Fields::new(body);
        let email = f.required_text(&["email"], Some(MAX_NAME_LEN));
        let password = f.required_text(&["password"], None);
        f.finish()?;
        Ok(Self {
            email: email.unwrap_or_default(),
            password: password.unwrap_or_default(),
        })
    }
}

/// Body of `PATCH /users/{id}/role`.
pub fn role_from_json(body: &Value) -> Result<Role, PortalError> {
    let mut f = Fields::new(body);
    let allowed = all_str(Role::ALL, Role::as_str);
    let role = f.required_enum(&["role"], &allowed, Role::parse);
    f.finish()?;
    Ok(role.unwrap_or(Role::Citizen))
}

fn is_email(s: &str) -> bool {
    let mut parts = s.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && !domain.is_empty() && !s.contains(char::is_whitespace)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field_errors(err: PortalError) -> FieldErrors {
        match err {
            PortalError::ValidationFailed { errors, .. } => errors,
            other => panic!("expected ValidationFailed, got {other:?}"),
        }
    }

    #[test]
    fn create_requires_service_id() {
        let errors = field_errors(CreateInput::from_json(&json!({"citizen_note": "x"})).unwrap_err());
        assert!(errors.get("service_id").is_some());
    }

    #[test]
    fn create_accepts_camel_case_aliases() {
        let input = CreateInput::from_json(&json!({
            "serviceId": 3,
            "citizenNote": "hello",
            "formData": {"purpose": "travel", "children": [1, 2]}
        }))
        .unwrap();
        assert_eq!(input.service_id, 3);
        assert_eq!(input.citizen_note.as_deref(), Some("hello"));
        assert_eq!(input.form_data.len(), 2);
    }

    #[test]
    fn create_reports_every_bad_field() {
        let errors = field_errors(
            CreateInput::from_json(&json!({
                "service_id": "abc",
                "attachment": 12,
                "form_data": [1, 2]
            }))
            .unwrap_err(),
        );
        assert!(errors.get("service_id").is_some());
        assert!(errors.get("attachment").is_some());
        assert!(errors.get("form_data").is_some());
    }

    #[test]
    fn edit_distinguishes_absent_from_null() {
        let input = EditInput::from_json(&json!({"attachment": null})).unwrap();
        assert_eq!(input.attachment, Some(None));
        assert_eq!(input.citizen_note, None);
        assert_eq!(input.form_data, None);
    }

    #[test]
    fn decide_only_accepts_terminal_statuses() {
        let ok = DecideInput::from_json(&json!({"status": "APPROVED", "officer_note": "ok"})).unwrap();
        assert_eq!(ok.decision, Decision::Approved);
        let errors =
            field_errors(DecideInput::from_json(&json!({"status": "IN_REVIEW"})).unwrap_err());
        assert!(errors.get("status").is_some());
    }

    #[test]
    fn payment_rejects_unknown_status() {
        let errors = field_errors(
            PaymentInput::from_json(&json!({"payment_status": "REFUNDED"})).unwrap_err(),
        );
        assert!(errors.get("payment_status").is_some());
        let ok = PaymentInput::from_json(&json!({"paymentStatus": "PENDING"})).unwrap();
        assert_eq!(ok.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn list_query_validates_status() {
        let mut params = HashMap::new();
        params.insert("status".to_string(), "SUBMITTED".to_string());
        params.insert("service_id".to_string(), "".to_string());
        let q = ListQuery::from_params(&params).unwrap();
        assert_eq!(q.status, Some(RequestStatus::Submitted));
        assert_eq!(q.service_id, None);

        params.insert("status".to_string(), "OPEN".to_string());
        assert!(ListQuery::from_params(&params).is_err());
    }

    #[test]
    fn register_checks_jmbg_and_date() {
        let errors = field_errors(
            RegisterInput::from_json(&json!({
                "name": "Ana",
                "email": "ana@example.rs",
                "password": "secret1",
                "date_of_birth": "1990-13-40",
                "jmbg": "12345"
            }))
            .unwrap_err(),
        );
        assert!(errors.get("jmbg").is_some());
        assert!(errors.get("date_of_birth").is_some());
        assert!(errors.get("email").is_none());
    }

    #[test]
    fn service_fee_must_be_non_negative() {
        let errors = field_errors(ServiceInput::from_json(&json!({"fee": -1})).unwrap_err());
        assert!(errors.get("fee").is_some());
        let input = ServiceInput::from_json(&json!({"fee": "500.00"})).unwrap();
        assert_eq!(input.change.fee, Some(Decimal::new(50000, 2)));
        assert!(input.require_complete().is_err());
    }

    #[test]
    fn institution_bodies_are_partial_until_created() {
        let input = InstitutionInput::from_json(&json!({"city": "Niš", "email": null})).unwrap();
        assert_eq!(input.change.city.as_deref(), Some("Niš"));
        assert_eq!(input.change.email, Some(None));
        assert_eq!(input.change.name, None);
        let errors = field_errors(input.require_complete().unwrap_err());
        assert!(errors.get("name").is_some());
        assert!(errors.get("address").is_some());
        assert!(errors.get("city").is_none());

        let errors = field_errors(
            InstitutionInput::from_json(&json!({"name": "  ", "email": "not-an-email"}))
                .unwrap_err(),
        );
        assert!(errors.get("name").is_some());
        assert!(errors.get("email").is_some());
    }

    #[test]
    fn type_name_is_required_on_create() {
        let input = TypeInput::from_json(&json!({"description": "Licences"})).unwrap();
        assert!(input.require_complete().is_err());
        let input = TypeInput::from_json(&json!({"name": "Permits"})).unwrap();
        assert!(input.require_complete().is_ok());
        assert_eq!(input.change.description, None);
    }
}
