use crate::auth::{Connector, Credential};
use crate::error::MailError;
use crate::models::{Header, Label, MessageRef, SearchResult, Thread, ThreadMessage};
use anyhow::Context;
use async_trait::async_trait;
use google_gmail1::Gmail;
use google_gmail1::api::{self, ModifyThreadRequest, Scope};
use std::io::Cursor;
use tracing::debug;

const USER_ID: &str = "me";

/// Headers requested when fetching a thread; nothing else is inspected.
pub const THREAD_HEADERS: [&str; 3] = ["Subject", "From", "Message-ID"];

/// The mailbox operations the responder pipeline needs.
#[async_trait]
pub trait MailService: Send + Sync {
    async fn search(
        &self,
        query: &str,
        max_results: u32,
        page_token: Option<String>,
    ) -> Result<SearchResult, MailError>;

    async fn get_thread(&self, thread_id: &str) -> Result<Thread, MailError>;

    /// Creates a visible label. Returns `MailError::Conflict` when a label
    /// with the same name already exists.
    async fn create_label(&self, name: &str) -> Result<Label, MailError>;

    async fn list_labels(&self) -> Result<Vec<Label>, MailError>;

    async fn modify_thread_labels(
        &self,
        thread_id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<(), MailError>;

    /// The address of the authorized account, used as the reply's `From`.
    async fn account_address(&self) -> Result<String, MailError>;

    /// Sends an RFC 822 message as part of `thread_id`. Returns the new message id.
    async fn send_message(&self, thread_id: &str, raw: Vec<u8>) -> Result<String, MailError>;
}

#[derive(Clone)]
pub struct GmailClient {
    hub: Gmail<Connector>,
}

impl GmailClient {
    pub fn new(credential: &Credential) -> anyhow::Result<Self> {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .context("Failed to load native roots")?
            .https_only()
            .enable_http1()
            .build();
        let hub = Gmail::new(
            hyper::Client::builder().build(connector),
            credential.authenticator(),
        );
        Ok(Self { hub })
    }
}

#[async_trait]
impl MailService for GmailClient {
    async fn search(
        &self,
        query: &str,
        max_results: u32,
        page_token: Option<String>,
    ) -> Result<SearchResult, MailError> {
        let mut req = self
            .hub
            .users()
            .messages_list(USER_ID)
            .q(query)
            .max_results(max_results)
            .add_scope(Scope::Modify);

        if let Some(token) = &page_token {
            req = req.page_token(token);
        }

        let (_, list) = req.doit().await?;
        Ok(search_result_from_api(list))
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Thread, MailError> {
        let mut req = self
            .hub
            .users()
            .threads_get(USER_ID, thread_id)
            .format("metadata")
            .add_scope(Scope::Modify);

        for name in THREAD_HEADERS {
            req = req.add_metadata_headers(name);
        }

        let (_, thread) = req.doit().await?;
        Ok(thread_from_api(thread))
    }

    async fn create_label(&self, name: &str) -> Result<Label, MailError> {
        let label = api::Label {
            name: Some(name.to_string()),
            label_list_visibility: Some("labelShow".to_string()),
            message_list_visibility: Some("show".to_string()),
            ..Default::default()
        };

        let (_, created) = self
            .hub
            .users()
            .labels_create(label, USER_ID)
            .add_scope(Scope::Modify)
            .doit()
            .await?;

        label_from_api(created)
            .ok_or_else(|| MailError::Invalid("created label has no id".to_string()))
    }

    async fn list_labels(&self) -> Result<Vec<Label>, MailError> {
        let (_, list) = self
            .hub
            .users()
            .labels_list(USER_ID)
            .add_scope(Scope::Modify)
            .doit()
            .await?;

        Ok(list
            .labels
            .unwrap_or_default()
            .into_iter()
            .filter_map(label_from_api)
            .collect())
    }

    async fn modify_thread_labels(
        &self,
        thread_id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<(), MailError> {
        debug!(thread_id, ?add, ?remove, "modifying thread labels");
        let req = ModifyThreadRequest {
            add_label_ids: (!add.is_empty()).then(|| add.to_vec()),
            remove_label_ids: (!remove.is_empty()).then(|| remove.to_vec()),
        };
        self.hub
            .users()
            .threads_modify(req, USER_ID, thread_id)
            .add_scope(Scope::Modify)
            .doit()
            .await?;
        Ok(())
    }

    async fn account_address(&self) -> Result<String, MailError> {
        let (_, profile) = self
            .hub
            .users()
            .get_profile(USER_ID)
            .add_scope(Scope::Modify)
            .doit()
            .await?;

        profile
            .email_address
            .ok_or_else(|| MailError::Invalid("profile has no email address".to_string()))
    }

    async fn send_message(&self, thread_id: &str, raw: Vec<u8>) -> Result<String, MailError> {
        debug!(thread_id, bytes = raw.len(), "sending message");
        let metadata = api::Message {
            thread_id: Some(thread_id.to_string()),
            ..Default::default()
        };
        let mime = "message/rfc822"
            .parse()
            .map_err(|e| MailError::Invalid(format!("bad mime type: {}", e)))?;

        let (_, sent) = self
            .hub
            .users()
            .messages_send(metadata, USER_ID)
            .add_scope(Scope::Modify)
            .upload(Cursor::new(raw), mime)
            .await?;

        Ok(sent.id.unwrap_or_default())
    }
}

fn search_result_from_api(list: api::ListMessagesResponse) -> SearchResult {
    let messages = list
        .messages
        .unwrap_or_default()
        .into_iter()
        .filter_map(|m| {
            Some(MessageRef {
                id: m.id?,
                thread_id: m.thread_id?,
            })
        })
        .collect();

    SearchResult {
        messages,
        result_size_estimate: list.result_size_estimate,
        next_page_token: list.next_page_token,
    }
}

fn thread_from_api(thread: api::Thread) -> Thread {
    Thread {
        id: thread.id.unwrap_or_default(),
        messages: thread
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(message_from_api)
            .collect(),
    }
}

fn message_from_api(msg: api::Message) -> ThreadMessage {
    let headers = msg
        .payload
        .and_then(|p| p.headers)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|h| {
            Some(Header {
                name: h.name?,
                value: h.value.unwrap_or_default(),
            })
        })
        .collect();

    ThreadMessage {
        id: msg.id.unwrap_or_default(),
        headers,
        label_ids: msg.label_ids.unwrap_or_default(),
    }
}

fn label_from_api(label: api::Label) -> Option<Label> {
    Some(Label {
        id: label.id?,
        name: label.name.unwrap_or_default(),
    })
}
