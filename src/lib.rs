pub mod auth;
pub mod config;
pub mod crud;
pub mod db;
pub mod error;
pub mod mail;
pub mod models;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;
