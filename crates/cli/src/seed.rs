//! Populate a fresh backend from the `[seed]` configuration section.

use std::collections::HashMap;

use euprava_storage::{NewInstitution, NewService, NewType, NewUser, PortalStorage};
use euprava_workflow::identity::hash_password;
use euprava_workflow::Identity;

use crate::config::{ConfigError, SeedConfig};

/// What a seed run created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub institutions: usize,
    pub types: usize,
    pub services: usize,
    pub users: usize,
    pub tokens: usize,
}

pub async fn apply<S: PortalStorage>(
    seed: &SeedConfig,
    storage: &S,
    identity: &Identity<S>,
) -> Result<SeedSummary, ConfigError> {
    let fail = |what: String, e: &dyn std::fmt::Display| {
        ConfigError::Invalid(format!("seeding {what} failed: {e}"))
    };
    let mut summary = SeedSummary::default();

    let mut institutions = HashMap::new();
    for inst in &seed.institutions {
        let record = storage
            .insert_institution(NewInstitution {
                name: inst.name.clone(),
                city: inst.city.clone(),
                address: inst.address.clone(),
                email: inst.email.clone(),
            })
            .await
            .map_err(|e| fail(format!("institution '{}'", inst.name), &e))?;
        institutions.insert(inst.name.as_str(), record.id);
        summary.institutions += 1;
    }

    let mut types = HashMap::new();
    for ty in &seed.types {
        let record = storage
            .insert_type(NewType {
                name: ty.name.clone(),
                description: ty.description.clone(),
            })
            .await
            .map_err(|e| fail(format!("type '{}'", ty.name), &e))?;
        types.insert(ty.name.as_str(), record.id);
        summary.types += 1;
    }

    for service in &seed.services {
        let (Some(&institution_id), Some(&type_id)) = (
            institutions.get(service.institution.as_str()),
            types.get(service.type_name.as_str()),
        ) else {
            return Err(ConfigError::Invalid(format!(
                "service '{}' references an unseeded institution or type",
                service.name
            )));
        };
        storage
            .insert_service(NewService {
                institution_id,
                type_id,
                name: service.name.clone(),
                description: service.description.clone(),
                fee: service.fee,
                requires_attachment: service.requires_attachment,
                status: service.status,
            })
            .await
            .map_err(|e| fail(format!("service '{}'", service.name), &e))?;
        summary.services += 1;
    }

    for user in &seed.users {
        let record = storage
            .insert_user(NewUser {
                name: user.name.clone(),
                email: user.email.clone(),
                date_of_birth: user.date_of_birth.clone(),
                jmbg: user.jmbg.clone(),
                role: user.role,
                password_hash: hash_password(&user.password),
            })
            .await
            .map_err(|e| fail(format!("user '{}'", user.email), &e))?;
        summary.users += 1;
        if let Some(token) = &user.token {
            identity
                .install_token(record.id, token)
                .await
                .map_err(|e| fail(format!("token for '{}'", user.email), &e))?;
            summary.tokens += 1;
        }
    }

    tracing::info!(
        institutions = summary.institutions,
        types = summary.types,
        services = summary.services,
        users = summary.users,
        "seed data loaded"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SeedInstitution, SeedService, SeedType, SeedUser};
    use euprava_storage::{MemoryStorage, Role, ServiceFilter, ServiceStatus};
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn seed() -> SeedConfig {
        SeedConfig {
            institutions: vec![SeedInstitution {
                name: "MUP".to_string(),
                city: "Beograd".to_string(),
                address: "Kneza Miloša 103".to_string(),
                email: None,
            }],
            types: vec![SeedType {
                name: "Documents".to_string(),
                description: None,
            }],
            services: vec![SeedService {
                name: "Passport".to_string(),
                institution: "MUP".to_string(),
                type_name: "Documents".to_string(),
                description: None,
                fee: Decimal::new(50000, 2),
                requires_attachment: false,
                status: ServiceStatus::Active,
            }],
            users: vec![SeedUser {
                name: "Officer".to_string(),
                email: "officer@euprava.rs".to_string(),
                password: "officer123".to_string(),
                date_of_birth: "1980-02-02".to_string(),
                jmbg: "0202980710005".to_string(),
                role: Role::Officer,
                token: Some("officer-token".to_string()),
            }],
        }
    }

    #[tokio::test]
    async fn seeds_catalog_users_and_tokens() {
        let storage = Arc::new(MemoryStorage::new());
        let identity = Identity::new(Arc::clone(&storage));
        let summary = apply(&seed(), storage.as_ref(), &identity).await.unwrap();
        assert_eq!(summary.services, 1);
        assert_eq!(summary.tokens, 1);

        let services = storage
            .list_services(&ServiceFilter::default())
            .await
            .unwrap();
        assert_eq!(services[0].name, "Passport");

        let actor = identity.authenticate("officer-token").await.unwrap();
        assert_eq!(actor.role, Role::Officer);
    }

    #[tokio::test]
    async fn duplicate_users_fail_the_seed() {
        let mut config = seed();
        config.users.push(config.users[0].clone());
        let storage = Arc::new(MemoryStorage::new());
        let identity = Identity::new(Arc::clone(&storage));
        let err = apply(&config, storage.as_ref(), &identity).await.unwrap_err();
        assert!(err.to_string().contains("officer@euprava.rs"));
    }
}
