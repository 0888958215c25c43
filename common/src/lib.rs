//! Command line and logging plumbing shared by the lookup-gen binaries.

pub mod cli;
pub mod logging;

pub use cli::GlobalOpts;
