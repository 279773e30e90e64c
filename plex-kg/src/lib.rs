pub mod cli;
pub mod fuseki;
pub mod load_config;
pub mod plex;

pub use cli::{run, Cli, Commands};
