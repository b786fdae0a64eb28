pub mod bronze;
pub mod clean;
pub mod config;
pub mod error;
pub mod gold;
pub mod http_client;
pub mod pipeline;
pub mod read_model;
pub mod silver;
pub mod stats_api;
