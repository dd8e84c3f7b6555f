pub mod api_sports;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod fixtures;
pub mod forest;
pub mod form;
pub mod http_cache;
pub mod http_client;
pub mod pipeline;
pub mod predictor;
