pub mod action;
pub mod bridge;
pub mod provider;
pub mod yaml_config;
