pub mod adb;
pub mod config;
pub mod device;
pub mod endpoints;
pub mod error;
pub mod fitness;
pub mod logging;
pub mod models;
pub mod properties;
pub mod scheduler;
pub mod server;
pub mod timeout;

#[cfg(test)]
pub(crate) mod testing;
