pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod helpers;
pub mod inbox;
pub mod integrations;
pub mod jobs;

pub use database::LocalStore;
pub use error::{ApiError, StoreError};
pub use inbox::{Inbox, InboxEvent};
pub use integrations::BackendClient;
