use crate::config::Config;
use crate::error::{MailError, ReplyError};
use crate::gmail::MailService;
use crate::inspector::Candidate;
use lettre::Message;
use lettre::message::{Mailbox, SinglePart};
use mail_parser::MessageParser;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

const UNREAD: &str = "UNREAD";

/// An outgoing reply to the first message of a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyDraft {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub in_reply_to: Option<String>,
    pub body: String,
}

impl ReplyDraft {
    pub fn new(from: &str, candidate: &Candidate, body: &str) -> Self {
        Self {
            from: single_line(from),
            to: single_line(&candidate.sender),
            subject: format!("Re: {}", single_line(&candidate.subject)),
            in_reply_to: candidate.message_id.as_deref().map(single_line),
            body: body.to_string(),
        }
    }

    pub fn to_message(&self) -> Result<Message, ReplyError> {
        let from: Mailbox = self.from.parse().map_err(|e| {
            ReplyError::Compose(format!("bad account address '{}': {}", self.from, e))
        })?;

        let mut builder = Message::builder().from(from).subject(self.subject.clone());
        for mailbox in recipients(&self.to)? {
            builder = builder.to(mailbox);
        }
        if let Some(message_id) = &self.in_reply_to {
            builder = builder
                .in_reply_to(message_id.clone())
                .references(message_id.clone());
        }

        builder
            .singlepart(SinglePart::plain(self.body.clone()))
            .map_err(|e| ReplyError::Compose(e.to_string()))
    }

    /// The reply as RFC 822 bytes, ready for upload.
    pub fn to_rfc822(&self) -> Result<Vec<u8>, ReplyError> {
        Ok(self.to_message()?.formatted())
    }
}

/// Header values never span lines; folding whitespace is collapsed.
fn single_line(value: &str) -> String {
    value
        .split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every mailbox listed in a `From` value, with display names decoded.
fn recipients(sender: &str) -> Result<Vec<Mailbox>, ReplyError> {
    let header = format!("From: {}\r\n\r\n", sender);
    let parsed = MessageParser::default().parse(header.as_bytes());
    let Some(from) = parsed.as_ref().and_then(|message| message.from()) else {
        return Err(ReplyError::Compose(format!("no address in sender '{}'", sender)));
    };

    let mut mailboxes = Vec::new();
    for addr in from.iter() {
        let Some(address) = addr.address() else {
            continue;
        };
        let email: lettre::Address = address.parse().map_err(|e| {
            ReplyError::Compose(format!("bad sender address '{}': {}", address, e))
        })?;
        mailboxes.push(Mailbox::new(addr.name().map(str::to_string), email));
    }

    if mailboxes.is_empty() {
        return Err(ReplyError::Compose(format!("no address in sender '{}'", sender)));
    }
    Ok(mailboxes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReply {
    pub thread_id: String,
    pub message_id: String,
    pub subject: String,
}

/// Labels a thread and answers it with the canned body.
#[derive(Debug)]
pub struct Responder {
    label_name: String,
    body: String,
    mark_read: bool,
    // Looked up on the first reply and reused for the life of the process.
    account: OnceCell<String>,
}

impl Responder {
    pub fn new(label_name: impl Into<String>, body: impl Into<String>, mark_read: bool) -> Self {
        Self {
            label_name: label_name.into(),
            body: body.into(),
            mark_read,
            account: OnceCell::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.label_name.clone(),
            config.reply_body.clone(),
            config.mark_read,
        )
    }

    pub async fn respond(
        &self,
        service: &dyn MailService,
        thread_id: &str,
        candidate: &Candidate,
    ) -> Result<SentReply, ReplyError> {
        match self.try_respond(service, thread_id, candidate).await {
            Ok(sent) => {
                info!(thread_id, "Reply sent.");
                Ok(sent)
            }
            Err(e) => {
                error!(thread_id, "Error creating label or sending message: {}", e);
                Err(e)
            }
        }
    }

    async fn try_respond(
        &self,
        service: &dyn MailService,
        thread_id: &str,
        candidate: &Candidate,
    ) -> Result<SentReply, ReplyError> {
        let from = self
            .account
            .get_or_try_init(|| service.account_address())
            .await
            .map_err(ReplyError::Account)?;
        let draft = ReplyDraft::new(from, candidate, &self.body);
        let raw = draft.to_rfc822()?;

        let label_id = self.ensure_label(service).await?;
        service
            .modify_thread_labels(thread_id, &[label_id], &[])
            .await
            .map_err(ReplyError::Tag)?;

        let message_id = service
            .send_message(thread_id, raw)
            .await
            .map_err(ReplyError::Send)?;

        if self.mark_read {
            if let Err(e) = service
                .modify_thread_labels(thread_id, &[], &[UNREAD.to_string()])
                .await
            {
                warn!(thread_id, error = %e, "Reply sent but thread could not be marked read");
            }
        }

        Ok(SentReply {
            thread_id: thread_id.to_string(),
            message_id,
            subject: draft.subject,
        })
    }

    /// Returns the label id, creating the label if needed. A conflict means
    /// the label already exists and is resolved by name.
    pub async fn ensure_label(&self, service: &dyn MailService) -> Result<String, ReplyError> {
        let label_error = |source: MailError| ReplyError::Label {
            label: self.label_name.clone(),
            source,
        };

        match service.create_label(&self.label_name).await {
            Ok(label) => {
                debug!(label_id = %label.id, "created label");
                Ok(label.id)
            }
            Err(e) if e.is_conflict() => {
                debug!(label = %self.label_name, "label already exists");
                let labels = service.list_labels().await.map_err(label_error)?;
                labels
                    .into_iter()
                    .find(|l| l.name.eq_ignore_ascii_case(&self.label_name))
                    .map(|l| l.id)
                    .ok_or_else(|| {
                        label_error(MailError::Invalid(
                            "label reported as existing but not listed".to_string(),
                        ))
                    })
            }
            Err(e) => Err(label_error(e)),
        }
    }
}
