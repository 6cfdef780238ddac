pub mod aws;
pub mod filesystem;
pub mod memory;
pub mod registry;
