//! Bundler invocation for the jolt dev harness.
//!
//! The dev server treats bundling as an opaque operation: hand a
//! [`BuildConfiguration`] to a [`Bundler`] and learn whether it worked.

pub mod builder;
pub mod command;

pub use builder::{BuildConfiguration, BuildError, BuildReport, Bundler, Target};
pub use command::CommandBundler;
