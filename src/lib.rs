//! HTTP service that loads departments, jobs and employees from CSV uploads
//! into PostgreSQL and reports hiring figures over them.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod utils;
