// Catalog
pub mod catalog;
pub mod catalog_import;

// Ordering
pub mod dispatch;
pub mod orders;

// Store-wide settings
pub mod settings;
