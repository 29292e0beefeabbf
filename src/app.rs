use crate::auth::Authorizer;
use crate::config::Config;
use crate::gmail::GmailClient;
use crate::pipeline::{PassReport, Pipeline};
use crate::scheduler::PassRunner;
use anyhow::{Context, Result};
use async_trait::async_trait;

/// Authorizes and runs one pipeline pass per tick.
pub struct AutoReplier {
    authorizer: Authorizer,
    pipeline: Pipeline,
}

impl AutoReplier {
    pub fn new(config: &Config) -> Self {
        Self {
            authorizer: Authorizer::new(&config.credentials_path, &config.token_path),
            pipeline: Pipeline::from_config(config),
        }
    }

    pub async fn run_once(&mut self) -> Result<PassReport> {
        let credential = self
            .authorizer
            .authorize()
            .await
            .context("Authorization failed")?;
        let client = GmailClient::new(&credential)?;
        Ok(self.pipeline.run_pass(&client).await)
    }
}

#[async_trait]
impl PassRunner for AutoReplier {
    async fn run_pass(&mut self) -> Result<()> {
        self.run_once().await.map(|_| ())
    }
}
