//! HTTP API handlers for idlink-server

pub mod contacts;
pub mod health;
pub mod identify;

pub use contacts::{delete_all_contacts, delete_contact, list_contacts};
pub use health::{health_routes, test_db};
pub use identify::identify;
