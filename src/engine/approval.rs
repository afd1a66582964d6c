//! Account approval and role administration.

use crate::db::{ApprovalStatus, Role, StoreError, User};

/// States from which an account may move to `target`
pub fn allowed_sources(target: ApprovalStatus) -> &'static [ApprovalStatus] {
    match target {
        ApprovalStatus::Approved => &[ApprovalStatus::Pending, ApprovalStatus::Rejected],
        ApprovalStatus::Rejected => &[ApprovalStatus::Pending, ApprovalStatus::Approved],
        ApprovalStatus::Pending => &[],
    }
}

/// Move a user to `target`. Returns the current record and whether it changed.
///
/// Re-applying the current status is a no-op. The update is guarded on the
/// current status so concurrent admins cannot both apply conflicting moves.
pub async fn set_approval(
    db: &sqlx::SqlitePool,
    user_id: &str,
    target: ApprovalStatus,
) -> Result<(User, bool), StoreError> {
    let changed = User::set_approval_status(db, user_id, target, allowed_sources(target)).await?;
    let user = User::find_by_id(db, user_id)
        .await?
        .ok_or(StoreError::NotFound("User"))?;

    if changed {
        tracing::info!(user_id = %user.id, to = %target, "User approval status changed");
        return Ok((user, true));
    }
    if user.approval_status == target {
        return Ok((user, false));
    }
    Err(StoreError::InvalidTransition {
        from: user.approval_status.to_string(),
        to: target.to_string(),
    })
}

/// Promote or demote an approved user. An admin can never change their own role.
pub async fn set_role(
    db: &sqlx::SqlitePool,
    acting_user_id: &str,
    user_id: &str,
    role: Role,
) -> Result<(User, bool), StoreError> {
    if acting_user_id == user_id {
        return Err(StoreError::validation("role", "You cannot change your own role"));
    }

    let user = User::find_by_id(db, user_id)
        .await?
        .ok_or(StoreError::NotFound("User"))?;
    if user.approval_status != ApprovalStatus::Approved {
        return Err(StoreError::validation(
            "role",
            format!("Cannot change the role of a {} user", user.approval_status),
        ));
    }
    if user.role == role {
        return Ok((user, false));
    }

    if !User::set_role(db, user_id, role).await? {
        // Approval was revoked between the read and the update
        return Err(StoreError::validation("role", "User is no longer approved"));
    }
    let user = User::find_by_id(db, user_id)
        .await?
        .ok_or(StoreError::NotFound("User"))?;
    tracing::info!(user_id = %user.id, role = %role, "User role changed");
    Ok((user, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_in_memory, NewUser};

    async fn pending_user(db: &sqlx::SqlitePool, email: &str) -> User {
        User::create(
            db,
            NewUser {
                email,
                password_hash: "unused",
                name: "Pending",
                role: Role::User,
                approval_status: ApprovalStatus::Pending,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_approval_lifecycle() {
        let db = init_in_memory().await.unwrap();
        let user = pending_user(&db, "p@x.com").await;

        let (rejected, changed) = set_approval(&db, &user.id, ApprovalStatus::Rejected).await.unwrap();
        assert!(changed);
        assert_eq!(rejected.approval_status, ApprovalStatus::Rejected);

        let (_, changed) = set_approval(&db, &user.id, ApprovalStatus::Rejected).await.unwrap();
        assert!(!changed);

        let (approved, changed) = set_approval(&db, &user.id, ApprovalStatus::Approved).await.unwrap();
        assert!(changed);
        assert_eq!(approved.approval_status, ApprovalStatus::Approved);

        let (revoked, _) = set_approval(&db, &user.id, ApprovalStatus::Rejected).await.unwrap();
        assert_eq!(revoked.approval_status, ApprovalStatus::Rejected);
    }

    #[tokio::test]
    async fn test_back_to_pending_is_invalid() {
        let db = init_in_memory().await.unwrap();
        let user = pending_user(&db, "q@x.com").await;
        set_approval(&db, &user.id, ApprovalStatus::Approved).await.unwrap();

        let err = set_approval(&db, &user.id, ApprovalStatus::Pending).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        let missing = set_approval(&db, "nope", ApprovalStatus::Approved).await.unwrap_err();
        assert!(matches!(missing, StoreError::NotFound("User")));
    }

    #[tokio::test]
    async fn test_role_change_rules() {
        let db = init_in_memory().await.unwrap();
        let admin = pending_user(&db, "admin@x.com").await;
        let user = pending_user(&db, "u@x.com").await;

        let err = set_role(&db, &admin.id, &user.id, Role::Admin).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation { field: "role", .. }));

        set_approval(&db, &user.id, ApprovalStatus::Approved).await.unwrap();
        let (promoted, changed) = set_role(&db, &admin.id, &user.id, Role::Admin).await.unwrap();
        assert!(changed);
        assert_eq!(promoted.role, Role::Admin);

        let own = set_role(&db, &user.id, &user.id, Role::User).await.unwrap_err();
        assert!(matches!(own, StoreError::Validation { .. }));
    }
}
