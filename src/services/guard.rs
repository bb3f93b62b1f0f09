//! Authorization guard: role checks against verified claims

use crate::{
    error::{AppError, AppResult},
    models::{user::UserClaims, Role},
};

/// Succeeds when the claimed role may act as `required`
pub fn authorize(claims: &UserClaims, required: Role) -> AppResult<()> {
    if claims.role.can_act_as(required) {
        Ok(())
    } else {
        Err(AppError::Authorization(format!(
            "{} role required, caller has {}",
            required, claims.role
        )))
    }
}

impl UserClaims {
    pub fn require(&self, role: Role) -> AppResult<()> {
        authorize(self, role)
    }

    /// Owner of the resource, or anyone holding `role`
    pub fn require_self_or(&self, user_id: i32, role: Role) -> AppResult<()> {
        if self.id == user_id {
            return Ok(());
        }
        authorize(self, role)
    }

    /// Account management: staff at least, and never over a higher role
    pub fn require_manager_of(&self, target: Role) -> AppResult<()> {
        authorize(self, Role::Staff)?;
        authorize(self, target)
    }
}
