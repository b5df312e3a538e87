pub mod common;
pub mod connectors;
pub mod error;
pub mod fixture;
