pub mod auth;
pub mod catalog_import;
pub mod health;
pub mod orders;
pub mod products;
pub mod settings;
