//! In-memory `MailService` used by the unit tests.

use crate::error::MailError;
use crate::gmail::MailService;
use crate::models::{Header, Label, MessageRef, SearchResult, Thread, ThreadMessage};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Search { query: String, page_token: Option<String> },
    GetThread(String),
    CreateLabel(String),
    ListLabels,
    Modify { thread_id: String, add: Vec<String>, remove: Vec<String> },
    AccountAddress,
    Send { thread_id: String, raw: String },
}

/// Failure to inject on the next call of an operation.
#[derive(Debug, Clone, Copy)]
pub enum Fail {
    Conflict,
    Server,
}

impl Fail {
    fn error(self) -> MailError {
        match self {
            Fail::Conflict => MailError::Conflict("Label name exists or conflicts".to_string()),
            Fail::Server => MailError::Api {
                code: 500,
                message: "backend error".to_string(),
            },
        }
    }
}

#[derive(Default)]
struct State {
    pages: VecDeque<Result<SearchResult, Fail>>,
    threads: HashMap<String, Thread>,
    failing_threads: HashMap<String, Fail>,
    labels: Vec<Label>,
    create_label_failure: Option<Fail>,
    modify_failure: Option<Fail>,
    send_failure: Option<Fail>,
    calls: Vec<Call>,
}

#[derive(Default)]
pub struct FakeMailService {
    state: Mutex<State>,
}

impl FakeMailService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one search page. Searches beyond the queue return an empty page.
    pub fn push_page(&self, messages: Vec<MessageRef>, next_page_token: Option<&str>) {
        let estimate = messages.len() as u32;
        self.state().pages.push_back(Ok(SearchResult {
            messages,
            result_size_estimate: Some(estimate),
            next_page_token: next_page_token.map(str::to_string),
        }));
    }

    pub fn push_raw_page(&self, page: SearchResult) {
        self.state().pages.push_back(Ok(page));
    }

    pub fn fail_search(&self) {
        self.state().pages.push_back(Err(Fail::Server));
    }

    /// Registers a thread whose messages carry the given headers.
    pub fn add_thread(&self, thread_id: &str, messages: &[&[(&str, &str)]]) {
        let messages = messages
            .iter()
            .enumerate()
            .map(|(i, headers)| ThreadMessage {
                id: format!("{}-m{}", thread_id, i),
                headers: headers
                    .iter()
                    .map(|(name, value)| Header {
                        name: name.to_string(),
                        value: value.to_string(),
                    })
                    .collect(),
                label_ids: vec!["UNREAD".to_string(), "INBOX".to_string()],
            })
            .collect();

        self.state().threads.insert(
            thread_id.to_string(),
            Thread {
                id: thread_id.to_string(),
                messages,
            },
        );
    }

    pub fn fail_thread(&self, thread_id: &str) {
        self.state()
            .failing_threads
            .insert(thread_id.to_string(), Fail::Server);
    }

    pub fn add_label(&self, id: &str, name: &str) {
        self.state().labels.push(Label {
            id: id.to_string(),
            name: name.to_string(),
        });
    }

    pub fn fail_create_label(&self, fail: Fail) {
        self.state().create_label_failure = Some(fail);
    }

    pub fn fail_modify(&self) {
        self.state().modify_failure = Some(Fail::Server);
    }

    pub fn fail_send(&self) {
        self.state().send_failure = Some(Fail::Server);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send { thread_id, raw } => Some((thread_id, raw)),
                _ => None,
            })
            .collect()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

/// Formatted log output collected from the current thread.
#[derive(Clone, Default)]
pub struct LogCapture {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    /// Routes events to a fresh capture until the guard is dropped.
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

pub fn message_ref(id: &str, thread_id: &str) -> MessageRef {
    MessageRef {
        id: id.to_string(),
        thread_id: thread_id.to_string(),
    }
}

#[async_trait]
impl MailService for FakeMailService {
    async fn search(
        &self,
        query: &str,
        _max_results: u32,
        page_token: Option<String>,
    ) -> Result<SearchResult, MailError> {
        let mut state = self.state();
        state.calls.push(Call::Search {
            query: query.to_string(),
            page_token,
        });
        match state.pages.pop_front() {
            Some(Ok(page)) => Ok(page),
            Some(Err(fail)) => Err(fail.error()),
            None => Ok(SearchResult::default()),
        }
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Thread, MailError> {
        let mut state = self.state();
        state.calls.push(Call::GetThread(thread_id.to_string()));
        if let Some(fail) = state.failing_threads.get(thread_id) {
            return Err(fail.error());
        }
        state
            .threads
            .get(thread_id)
            .cloned()
            .ok_or_else(|| MailError::Api {
                code: 404,
                message: "Requested entity was not found.".to_string(),
            })
    }

    async fn create_label(&self, name: &str) -> Result<Label, MailError> {
        let mut state = self.state();
        state.calls.push(Call::CreateLabel(name.to_string()));
        if let Some(fail) = state.create_label_failure {
            return Err(fail.error());
        }
        if state.labels.iter().any(|l| l.name == name) {
            return Err(Fail::Conflict.error());
        }
        let label = Label {
            id: format!("Label_{}", state.labels.len() + 1),
            name: name.to_string(),
        };
        state.labels.push(label.clone());
        Ok(label)
    }

    async fn list_labels(&self) -> Result<Vec<Label>, MailError> {
        let mut state = self.state();
        state.calls.push(Call::ListLabels);
        Ok(state.labels.clone())
    }

    async fn modify_thread_labels(
        &self,
        thread_id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<(), MailError> {
        let mut state = self.state();
        state.calls.push(Call::Modify {
            thread_id: thread_id.to_string(),
            add: add.to_vec(),
            remove: remove.to_vec(),
        });
        match state.modify_failure {
            Some(fail) => Err(fail.error()),
            None => Ok(()),
        }
    }

    async fn account_address(&self) -> Result<String, MailError> {
        self.state().calls.push(Call::AccountAddress);
        Ok("me@example.com".to_string())
    }

    async fn send_message(&self, thread_id: &str, raw: Vec<u8>) -> Result<String, MailError> {
        let mut state = self.state();
        state.calls.push(Call::Send {
            thread_id: thread_id.to_string(),
            raw: String::from_utf8_lossy(&raw).into_owned(),
        });
        match state.send_failure {
            Some(fail) => Err(fail.error()),
            None => Ok(format!("sent-{}", thread_id)),
        }
    }
}
