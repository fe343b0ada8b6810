pub mod application;
pub mod archive;
pub mod builder;
pub mod bundle;
pub mod command;
pub mod config;
pub mod errors;
pub mod installer;
pub mod linker;
pub mod loader;
pub mod module;
pub mod radix;
pub mod runtime;

pub use errors::BundleError;
