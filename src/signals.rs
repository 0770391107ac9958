//! Post-save receivers for [`User`].
//!
//! Receivers run on the connection of the transaction that wrote the user,
//! so the user row and its profile commit (or roll back) together. Every
//! account therefore has exactly one profile as soon as it is visible.

use log::debug;
use sqlx::SqliteConnection;

use crate::error::Result;
use crate::models::{User, UserProfile};
use crate::orm::BoxFuture;

/// A receiver called after a user row is inserted (`created == true`) or
/// updated (`created == false`).
pub type UserPostSave =
    for<'c> fn(&'c mut SqliteConnection, &'c User, bool) -> BoxFuture<'c, Result<()>>;

/// Receivers in dispatch order.
pub const USER_POST_SAVE: &[UserPostSave] = &[create_user_profile, save_user_profile];

/// Dispatches every user post-save receiver in order, stopping at the first error.
pub async fn user_post_save(conn: &mut SqliteConnection, user: &User, created: bool) -> Result<()> {
    for receiver in USER_POST_SAVE {
        receiver(&mut *conn, user, created).await?;
    }
    Ok(())
}

/// Creates the profile of a freshly inserted user.
pub fn create_user_profile<'c>(
    conn: &'c mut SqliteConnection,
    user: &'c User,
    created: bool,
) -> BoxFuture<'c, Result<()>> {
    Box::pin(async move {
        if created {
            let profile = UserProfile::create_for(conn, user.id).await?;
            debug!("created profile id={} for user id={}", profile.id, user.id);
        }
        Ok(())
    })
}

/// Re-saves the user's profile. Users that never got one (rows loaded
/// straight into the table) get it here.
pub fn save_user_profile<'c>(
    conn: &'c mut SqliteConnection,
    user: &'c User,
    _created: bool,
) -> BoxFuture<'c, Result<()>> {
    Box::pin(async move {
        let profile = UserProfile::resave_for(conn, user.id).await?;
        debug!("saved profile id={} for user id={}", profile.id, user.id);
        Ok(())
    })
}
