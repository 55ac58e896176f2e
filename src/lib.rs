//! docvault — a document vault and sharing server.
//!
//! Users register with email and password, prove control of their address
//! with a one-time code, upload documents into a content store, and grant
//! other registered users view or edit access. See the `server` module for
//! the HTTP surface and `db` for the registry and sharing rules.

pub mod auth;
pub mod config;
pub mod db;
pub mod models;
pub mod server;
