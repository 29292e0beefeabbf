use crate::config::Config;
use crate::error::MailError;
use crate::gmail::MailService;
use crate::models::MessageRef;
use tracing::{debug, info};

/// Finds unread incoming messages that may need an answer.
#[derive(Debug, Clone)]
pub struct Scanner {
    query: String,
    max_results: u32,
    max_pages: u32,
}

impl Scanner {
    pub fn new(query: impl Into<String>, max_results: u32, max_pages: u32) -> Self {
        Self {
            query: query.into(),
            max_results,
            max_pages: max_pages.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.query.clone(), config.max_results, config.max_pages)
    }

    /// Returns message refs in the order the service listed them. Any request
    /// error aborts the scan; the caller decides how to report it.
    pub async fn list_unreplied_candidates(
        &self,
        service: &dyn MailService,
    ) -> Result<Vec<MessageRef>, MailError> {
        let mut found = Vec::new();
        let mut page_token = None;

        for page in 0..self.max_pages {
            let result = service
                .search(&self.query, self.max_results, page_token.take())
                .await?;

            debug!(
                page,
                listed = result.messages.len(),
                estimate = ?result.result_size_estimate,
                "search page"
            );
            found.extend(result.messages);

            match result.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        if found.is_empty() {
            info!("No emails found.");
        } else {
            info!(count = found.len(), "Found unread emails");
        }

        Ok(found)
    }
}
