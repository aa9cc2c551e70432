//! Role gating shared by every cell.
//!
//! Cells resolve the caller's [`Role`] from the profile row and check it here
//! before running an operation.

use shared_models::error::AppError;
use shared_models::role::Role;

pub fn has_role(role: Role, allowed: &[Role]) -> bool {
    allowed.contains(&role)
}

pub fn require_role(role: Role, allowed: &[Role]) -> Result<(), AppError> {
    if has_role(role, allowed) {
        return Ok(());
    }

    let names: Vec<&str> = allowed.iter().map(Role::as_str).collect();
    Err(AppError::Forbidden(format!(
        "Operación permitida solo para: {}",
        names.join(", ")
    )))
}

/// True when the caller owns the resource or holds one of the privileged roles.
pub fn is_owner_or_role(caller_id: &str, owner_id: &str, role: Role, privileged: &[Role]) -> bool {
    caller_id == owner_id || has_role(role, privileged)
}

pub fn require_owner_or_role(
    caller_id: &str,
    owner_id: &str,
    role: Role,
    privileged: &[Role],
) -> Result<(), AppError> {
    if is_owner_or_role(caller_id, owner_id, role, privileged) {
        Ok(())
    } else {
        Err(AppError::Forbidden("No tienes permiso para acceder a este recurso".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn require_role_lists_allowed_roles() {
        assert!(require_role(Role::Administrator, &[Role::Administrator]).is_ok());
        let err = require_role(Role::Patient, &[Role::Specialist, Role::Administrator]).unwrap_err();
        assert_matches!(err, AppError::Forbidden(ref msg) if msg.contains("especialista, administrador"));
    }

    #[test]
    fn owner_or_privileged() {
        assert!(is_owner_or_role("u1", "u1", Role::Patient, &[Role::Administrator]));
        assert!(is_owner_or_role("u2", "u1", Role::Administrator, &[Role::Administrator]));
        assert!(!is_owner_or_role("u2", "u1", Role::Specialist, &[Role::Administrator]));
        assert!(require_owner_or_role("u2", "u1", Role::Patient, &[]).is_err());
    }
}
