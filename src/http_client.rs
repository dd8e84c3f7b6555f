use anyhow::{Context, Result};
use reqwest::blocking::Client;

use crate::config::ApiConfig;

pub fn http_client(config: &ApiConfig) -> Result<Client> {
    Client::builder()
        .timeout(config.timeout)
        .build()
        .context("failed to build http client")
}
