//! Laundry tracking backend: users, laundry items, wash logs and user
//! profiles over SQLite, served as a JSON API.

pub mod admin;
pub mod error;
pub mod logging;
pub mod models;
pub mod orm;
pub mod router;
pub mod settings;
pub mod signals;

pub use error::{Error, Result, ValidationError};
pub use models::{LaundryItem, LaundryLog, User, UserProfile};
pub use orm::Db;
pub use settings::Settings;
