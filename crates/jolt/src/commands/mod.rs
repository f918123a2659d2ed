pub mod build;
pub mod dev;
