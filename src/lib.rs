pub mod api;
pub mod cli;
pub mod config;
pub mod database;
pub mod descriptor;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod types;

#[cfg(test)]
pub mod testing;
