//! Role-based access rules.
//!
//! Children have full control over their own folders and notes. Parents can read,
//! never write, the content of the children that named them at signup.

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::Role,
    repository::Repository,
};

/// Rejects anyone but a child. Used in front of every create operation.
pub fn require_child(user: &AuthUser, detail: &'static str) -> AppResult<()> {
    match user.role {
        Role::Child => Ok(()),
        Role::Parent => Err(AppError::Forbidden(detail)),
    }
}

/// Usernames whose content `user` may list: themselves for a child, every linked
/// child for a parent.
pub async fn visible_owners(user: &AuthUser, repo: &dyn Repository) -> AppResult<Vec<String>> {
    match user.role {
        Role::Child => Ok(vec![user.username.clone()]),
        Role::Parent => Ok(repo.list_children(&user.username).await?),
    }
}

/// Read access to a single record owned by `owner_username`.
pub async fn ensure_can_read(
    user: &AuthUser,
    owner_username: &str,
    repo: &dyn Repository,
) -> AppResult<()> {
    let allowed = match user.role {
        Role::Child => owner_username == user.username,
        Role::Parent => repo
            .find_user(owner_username)
            .await?
            .is_some_and(|owner| owner.parent_username.as_deref() == Some(user.username.as_str())),
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not allowed"))
    }
}

/// Write access: only the owning child, regardless of any parent link.
pub fn ensure_can_write(
    user: &AuthUser,
    owner_username: &str,
    detail: &'static str,
) -> AppResult<()> {
    if user.role == Role::Child && user.username == owner_username {
        Ok(())
    } else {
        Err(AppError::Forbidden(detail))
    }
}
