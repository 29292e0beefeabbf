use serde_json::Value;
use thiserror::Error;

/// Failures coming back from the mail service.
#[derive(Debug, Error)]
pub enum MailError {
    /// HTTP 409. For label creation this means the label already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("api error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("http failure with status {0}")]
    Http(u16),

    #[error("authorization failed: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    Invalid(String),
}

impl MailError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, MailError::Conflict(_))
    }

    /// Classify a Google JSON error body (`{"error": {"code": .., "message": ..}}`).
    pub fn from_error_body(body: &Value) -> Self {
        let error = body.get("error");
        let code = error
            .and_then(|e| e.get("code"))
            .and_then(Value::as_i64)
            .unwrap_or(400);
        let message = error
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());

        if code == 409 {
            MailError::Conflict(message)
        } else {
            MailError::Api { code, message }
        }
    }

    pub fn from_status(status: u16) -> Self {
        if status == 409 {
            MailError::Conflict(format!("http status {}", status))
        } else {
            MailError::Http(status)
        }
    }
}

impl From<google_gmail1::Error> for MailError {
    fn from(err: google_gmail1::Error) -> Self {
        match err {
            google_gmail1::Error::BadRequest(body) => MailError::from_error_body(&body),
            google_gmail1::Error::Failure(response) => {
                MailError::from_status(response.status().as_u16())
            }
            google_gmail1::Error::MissingToken(e) => MailError::Auth(e.to_string()),
            other => MailError::Transport(other.to_string()),
        }
    }
}

/// Why a reply could not be delivered for one thread.
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("failed to look up the sending account: {0}")]
    Account(#[source] MailError),

    #[error("failed to compose reply: {0}")]
    Compose(String),

    #[error("failed to ensure label '{label}': {source}")]
    Label {
        label: String,
        #[source]
        source: MailError,
    },

    #[error("failed to label thread: {0}")]
    Tag(#[source] MailError),

    #[error("failed to send reply: {0}")]
    Send(#[source] MailError),
}
