use crate::auth::{AuthenticatedUser, ADMIN_ROLE};
use crate::error::{AppError, AppResult};

/// Authorization guard for checking if user is authenticated
pub fn require_auth(user: &Option<AuthenticatedUser>) -> AppResult<&AuthenticatedUser> {
    user.as_ref().ok_or(AppError::Unauthenticated)
}

/// Authorization guard for checking a named role
pub fn require_role<'a>(
    user: &'a Option<AuthenticatedUser>,
    role: &str,
) -> AppResult<&'a AuthenticatedUser> {
    let user = require_auth(user)?;
    if !user.has_role(role) {
        return Err(AppError::Forbidden(format!("Role '{}' required", role)));
    }
    Ok(user)
}

/// Authorization guard for admin endpoints
pub fn require_admin(user: &Option<AuthenticatedUser>) -> AppResult<&AuthenticatedUser> {
    require_role(user, ADMIN_ROLE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user_with(roles: &[&str]) -> Option<AuthenticatedUser> {
        Some(AuthenticatedUser {
            id: Uuid::new_v4(),
            email: "u@example.com".into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        })
    }

    #[test]
    fn anonymous_callers_are_unauthenticated() {
        assert!(matches!(require_auth(&None), Err(AppError::Unauthenticated)));
    }

    #[test]
    fn admin_role_matches_case_insensitively() {
        assert!(require_admin(&user_with(&["admin"])).is_ok());
        assert!(matches!(
            require_admin(&user_with(&["Viewer"])),
            Err(AppError::Forbidden(_))
        ));
    }
}
