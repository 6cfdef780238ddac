pub mod domain;
pub mod error;
pub mod infra;
pub mod server;
pub mod transfer;
