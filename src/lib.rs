pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod hooks;
pub mod models;
pub mod records;
pub mod routes;
pub mod s3;
pub mod schema;
pub mod state;
pub mod storage;

pub use hooks::default_registry;
