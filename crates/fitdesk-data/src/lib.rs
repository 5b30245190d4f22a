pub mod auth;
pub mod config;
pub mod manager;
pub mod messaging;
pub mod notify;
pub mod workouts;

pub use auth::{Authorizer, Session};
pub use config::Config;
pub use manager::{DataManager, ManagerContext};
pub use messaging::MessagingManager;
pub use notify::Notifier;
pub use workouts::WorkoutsManager;
