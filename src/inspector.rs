use crate::gmail::MailService;
use crate::models::Thread;
use tracing::{debug, error, info, warn};

/// What the responder needs from an unanswered thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub subject: String,
    pub sender: String,
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyReplied { messages: usize },
    EmptyThread,
    MissingHeader(&'static str),
    FetchFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inspection {
    Candidate(Candidate),
    Skip(SkipReason),
}

/// Fetches a thread and decides whether it still needs an answer. Errors are
/// logged here and reported as a skip so the pass can move on.
pub async fn inspect(service: &dyn MailService, thread_id: &str) -> Inspection {
    let thread = match service.get_thread(thread_id).await {
        Ok(thread) => thread,
        Err(e) => {
            error!(thread_id, "An error occurred: {}", e);
            return Inspection::Skip(SkipReason::FetchFailed(e.to_string()));
        }
    };

    let inspection = classify(&thread);
    match &inspection {
        Inspection::Candidate(candidate) => {
            info!(thread_id, "Subject: {}", candidate.subject);
            info!(thread_id, "Sender Email: {}", candidate.sender);
        }
        Inspection::Skip(SkipReason::MissingHeader(name)) => {
            warn!(thread_id, header = name, "Skipping thread without required header");
        }
        Inspection::Skip(reason) => {
            debug!(thread_id, ?reason, "Skipping thread");
        }
    }
    inspection
}

fn classify(thread: &Thread) -> Inspection {
    let first = match thread.messages.first() {
        Some(first) if thread.is_unreplied() => first,
        Some(_) => {
            return Inspection::Skip(SkipReason::AlreadyReplied {
                messages: thread.messages.len(),
            });
        }
        None => return Inspection::Skip(SkipReason::EmptyThread),
    };

    let Some(subject) = first.header("Subject") else {
        return Inspection::Skip(SkipReason::MissingHeader("Subject"));
    };
    let Some(sender) = first.header("From") else {
        return Inspection::Skip(SkipReason::MissingHeader("From"));
    };

    Inspection::Candidate(Candidate {
        subject: subject.to_string(),
        sender: sender.to_string(),
        message_id: first.header("Message-ID").map(str::to_string),
    })
}
