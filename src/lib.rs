pub mod cargo_config;
pub mod catalog;
pub mod commands;
pub mod doctor;
pub mod env_store;
pub mod error;
pub mod fs_utils;
pub mod history;
pub mod logging;
pub mod overrides;
pub mod paths;
pub mod switch;
pub mod ui;

#[cfg(test)]
pub mod test_utils;
