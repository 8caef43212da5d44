// Library surface for the CLI, headless/integration tests and reuse.
pub mod app_dirs;
pub mod config;
pub mod geo;
pub mod geodesy;
pub mod quiz;
pub mod runtime;
pub mod scoring;
pub mod selection;
pub mod session;
pub mod stats;
pub mod summary;
