use std::sync::Arc;

use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use crate::database::models::{Lecturer, Student};
use crate::database::IdentityStore;
use crate::types::Role;

/// A resolved caller: role plus whichever profile the role implies
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
    pub student: Option<Student>,
    pub lecturer: Option<Lecturer>,
}

impl Caller {
    pub fn require_student(&self) -> ServiceResult<&Student> {
        if self.role != Role::Student {
            return Err(ServiceError::forbidden("only students can perform this action"));
        }
        self.student
            .as_ref()
            .ok_or_else(|| ServiceError::missing_profile("student profile not found for this user"))
    }

    pub fn require_advisor(&self) -> ServiceResult<&Lecturer> {
        if self.role != Role::Advisor {
            return Err(ServiceError::forbidden("only advisors can perform this action"));
        }
        self.lecturer
            .as_ref()
            .ok_or_else(|| ServiceError::missing_profile("lecturer profile not found for this user"))
    }
}

pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn IdentityStore> {
        &self.store
    }

    pub async fn resolve(&self, user_id: Uuid, role_id: Uuid) -> ServiceResult<Caller> {
        let role_name = self
            .store
            .role_name(role_id)
            .await?
            .ok_or_else(|| ServiceError::forbidden("unknown role"))?;
        let role = Role::from_role_name(&role_name)
            .ok_or_else(|| ServiceError::forbidden(format!("role '{}' has no access", role_name)))?;

        let (student, lecturer) = match role {
            Role::Student => (self.store.student_by_user(user_id).await?, None),
            Role::Advisor => (None, self.store.lecturer_by_user(user_id).await?),
            Role::Admin => (None, None),
        };

        tracing::debug!(%user_id, role = %role_name, "resolved caller");
        Ok(Caller {
            user_id,
            role,
            student,
            lecturer,
        })
    }

    /// Display name for audit fields. Lookup failures degrade to `None`.
    pub async fn full_name(&self, user_id: Uuid) -> Option<String> {
        match self.store.user_full_name(user_id).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "user name lookup failed");
                None
            }
        }
    }
}
