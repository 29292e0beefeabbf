use serde::{Deserialize, Serialize};

/// A message id as returned by a mailbox search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub id: String,
    pub thread_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    pub messages: Vec<MessageRef>,
    /// Approximate only; the API may report 0 with a non-empty page.
    pub result_size_estimate: Option<u32>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadMessage {
    pub id: String,
    pub headers: Vec<Header>,
    pub label_ids: Vec<String>,
}

impl ThreadMessage {
    /// Header lookup. Names are compared case-insensitively (RFC 5322).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Thread {
    pub id: String,
    pub messages: Vec<ThreadMessage>,
}

impl Thread {
    /// A thread nobody has answered yet holds exactly one message.
    pub fn is_unreplied(&self) -> bool {
        self.messages.len() == 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(headers: &[(&str, &str)]) -> ThreadMessage {
        ThreadMessage {
            id: "m1".to_string(),
            headers: headers
                .iter()
                .map(|(n, v)| Header {
                    name: n.to_string(),
                    value: v.to_string(),
                })
                .collect(),
            label_ids: vec![],
        }
    }

    #[test]
    fn header_lookup_ignores_case() {
        let msg = message(&[("subject", "Hello"), ("FROM", "a@example.com")]);
        assert_eq!(msg.header("Subject"), Some("Hello"));
        assert_eq!(msg.header("From"), Some("a@example.com"));
        assert_eq!(msg.header("To"), None);
    }

    #[test]
    fn first_matching_header_wins() {
        let msg = message(&[("Subject", "first"), ("Subject", "second")]);
        assert_eq!(msg.header("Subject"), Some("first"));
    }

    #[test]
    fn only_single_message_threads_are_unreplied() {
        let mut thread = Thread {
            id: "t1".to_string(),
            messages: vec![],
        };
        assert!(!thread.is_unreplied());

        thread.messages.push(message(&[]));
        assert!(thread.is_unreplied());

        thread.messages.push(message(&[]));
        assert!(!thread.is_unreplied());
    }
}
