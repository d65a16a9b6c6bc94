pub mod auth;
pub mod docs;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod storage;
