mod commands;
mod paths;

pub use commands::background_command;
pub use paths::{AppPaths, AppPathsError};
