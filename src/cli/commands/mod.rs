pub mod admin;
pub mod locations;
pub mod migrate;
