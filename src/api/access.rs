//! Role gate shared by every protected handler.

use crate::db::Role;

use super::auth::UserContext;
use super::error::ApiError;

/// Allow the request if the caller's role satisfies `required`
pub fn authorize(user: &UserContext, required: Role) -> Result<(), ApiError> {
    if user.role.satisfies(required) {
        return Ok(());
    }
    tracing::debug!(user_id = %user.id, role = %user.role, required = %required, "Access denied");
    Err(ApiError::forbidden(format!("{} access required", required)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(role: Role) -> UserContext {
        UserContext {
            id: "u1".into(),
            email: "u@x.com".into(),
            name: "U".into(),
            role,
        }
    }

    #[test]
    fn test_admin_satisfies_every_gate() {
        assert!(authorize(&context(Role::Admin), Role::Admin).is_ok());
        assert!(authorize(&context(Role::Admin), Role::User).is_ok());
    }

    #[test]
    fn test_user_is_forbidden_from_admin_gate() {
        assert!(authorize(&context(Role::User), Role::User).is_ok());
        let err = authorize(&context(Role::User), Role::Admin).unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
    }
}
