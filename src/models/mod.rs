//! Database-backed record types.
//!
//! Each model implements [`crate::orm::Model`] and registers its migration
//! with `inventory`, so [`crate::orm::auto_migrate`] picks it up.

mod laundry_item;
mod laundry_log;
mod user;
mod user_profile;

pub use laundry_item::{ITEM_NAME_MAX_LENGTH, ItemUpdate, LaundryItem, NewLaundryItem};
pub use laundry_log::{ACTION_MAX_LENGTH, LaundryLog, NewLaundryLog};
pub use user::{EMAIL_MAX_LENGTH, NewUser, USERNAME_MAX_LENGTH, User};
pub use user_profile::{ADDRESS_MAX_LENGTH, PHONE_NUMBER_MAX_LENGTH, ProfileUpdate, UserProfile};
