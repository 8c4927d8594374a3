pub mod addons;
pub mod downloads;
