use caltrack_core::types::RequestContext;

use crate::types::User;

/// Access level a handler requires. Checked explicitly at the top of every
/// handler body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Any logged-in user.
    Authenticated,
    /// Department management and reminder dispatch.
    Admin,
}

/// Why a request was turned away. Callers pattern-match this to pick the
/// status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denied {
    /// No valid session.
    Unauthorized,
    Forbidden { reason: String },
}

/// Evaluate `access` for the session's user, if any.
pub fn check(user: Option<&User>, access: Access) -> Result<RequestContext, Denied> {
    let Some(user) = user else {
        return Err(Denied::Unauthorized);
    };
    match access {
        Access::Authenticated => Ok(user.context()),
        Access::Admin if user.role.is_admin() => Ok(user.context()),
        Access::Admin => Err(Denied::Forbidden {
            reason: "admin role required".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caltrack_core::types::{UserId, UserRole};

    fn user(role: UserRole) -> User {
        User {
            id: UserId::from("u-1"),
            username: "dana".to_string(),
            email: "dana@lab.io".to_string(),
            role,
            department: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn anonymous_is_unauthorized_at_every_level() {
        assert_eq!(check(None, Access::Authenticated), Err(Denied::Unauthorized));
        assert_eq!(check(None, Access::Admin), Err(Denied::Unauthorized));
    }

    #[test]
    fn plain_user_cannot_reach_admin_routes() {
        let u = user(UserRole::User);
        let ctx = check(Some(&u), Access::Authenticated).unwrap();
        assert_eq!(ctx.username, "dana");
        assert!(!ctx.is_admin());
        assert!(matches!(
            check(Some(&u), Access::Admin),
            Err(Denied::Forbidden { .. })
        ));
    }

    #[test]
    fn admin_passes_both_levels() {
        let u = user(UserRole::Admin);
        assert!(check(Some(&u), Access::Authenticated).unwrap().is_admin());
        assert_eq!(check(Some(&u), Access::Admin).unwrap().user_id.as_str(), "u-1");
    }
}
