//! Settings come from a TOML file (`--settings`, or the per-profile default)
//! with `WAYPOINT__SECTION__KEY` environment overrides on top.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
