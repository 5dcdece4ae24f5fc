// Library root: re-exports all modules so the binary, integration tests and
// external consumers can access the crate's public API.

pub mod access;
pub mod aggregate;
pub mod config;
pub mod db;
pub mod events;
pub mod player;
pub mod query;
pub mod season;
pub mod shifts;
