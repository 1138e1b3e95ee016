//! Role and ownership checks applied before mutations.
//!
//! Failures are `Forbidden`: the caller has a valid identity but lacks the
//! privilege. Missing or invalid identities never reach these checks.

use uuid::Uuid;

use quill_types::models::Role;

use crate::error::ApiError;
use crate::middleware::Session;

pub fn is_admin(session: &Session) -> bool {
    session.role == Role::Admin
}

pub fn is_owner_or_admin(session: &Session, owner_id: Uuid) -> bool {
    session.user_id == owner_id || is_admin(session)
}

pub fn ensure_admin(session: &Session) -> Result<(), ApiError> {
    if is_admin(session) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not authorized as admin".into()))
    }
}

pub fn ensure_owner_or_admin(session: &Session, owner_id: Uuid) -> Result<(), ApiError> {
    if is_owner_or_admin(session, owner_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not authorized".into()))
    }
}

/// Comments can only be changed by whoever wrote them; admins moderate
/// through status updates and the moderation delete instead.
pub fn ensure_author(session: &Session, author_id: Uuid) -> Result<(), ApiError> {
    if session.user_id == author_id {
        Ok(())
    } else {
        Err(ApiError::Forbidden("Not authorized".into()))
    }
}

/// Admin account actions may not target the acting admin.
pub fn ensure_not_self(session: &Session, target_id: Uuid) -> Result<(), ApiError> {
    if session.user_id == target_id {
        Err(ApiError::Forbidden(
            "You cannot perform this action on your own account".into(),
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: Role) -> Session {
        Session {
            user_id: Uuid::new_v4(),
            name: "someone".into(),
            email: "someone@example.com".into(),
            role,
        }
    }

    #[test]
    fn owners_and_admins_pass_ownership_checks() {
        let owner = session(Role::User);
        let stranger = session(Role::User);
        let admin = session(Role::Admin);

        assert!(is_owner_or_admin(&owner, owner.user_id));
        assert!(is_owner_or_admin(&admin, owner.user_id));
        assert!(!is_owner_or_admin(&stranger, owner.user_id));
        assert!(matches!(
            ensure_owner_or_admin(&stranger, owner.user_id),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn admins_do_not_bypass_comment_authorship() {
        let author = session(Role::User);
        let admin = session(Role::Admin);

        assert!(ensure_author(&author, author.user_id).is_ok());
        assert!(ensure_author(&admin, author.user_id).is_err());
    }

    #[test]
    fn admin_checks() {
        assert!(ensure_admin(&session(Role::Admin)).is_ok());
        assert!(matches!(ensure_admin(&session(Role::User)), Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn self_targeting_is_rejected() {
        let admin = session(Role::Admin);
        assert!(ensure_not_self(&admin, admin.user_id).is_err());
        assert!(ensure_not_self(&admin, Uuid::new_v4()).is_ok());
    }
}
