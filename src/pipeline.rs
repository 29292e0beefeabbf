use crate::config::Config;
use crate::gmail::MailService;
use crate::inspector::{self, Inspection};
use crate::responder::Responder;
use crate::scanner::Scanner;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub listed: usize,
    pub replied: usize,
    pub skipped: usize,
    pub failed: usize,
    /// The scan itself failed and no thread was looked at.
    pub aborted: bool,
}

/// Answered thread ids remembered between passes by default.
pub const REPLIED_MEMORY: usize = 10_000;

/// One scan-inspect-respond pass over the mailbox.
pub struct Pipeline {
    scanner: Scanner,
    responder: Responder,
    replied: RepliedThreads,
}

impl Pipeline {
    pub fn new(scanner: Scanner, responder: Responder) -> Self {
        Self {
            scanner,
            responder,
            replied: RepliedThreads::new(REPLIED_MEMORY),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(Scanner::from_config(config), Responder::from_config(config))
            .with_replied_memory(config.replied_memory)
    }

    /// Caps how many answered threads are remembered across passes.
    pub fn with_replied_memory(mut self, capacity: usize) -> Self {
        self.replied = RepliedThreads::new(capacity);
        self
    }

    pub async fn run_pass(&mut self, service: &dyn MailService) -> PassReport {
        let mut report = PassReport::default();

        let messages = match self.scanner.list_unreplied_candidates(service).await {
            Ok(messages) => messages,
            Err(e) => {
                error!("An error occurred: {}", e);
                report.aborted = true;
                return report;
            }
        };
        report.listed = messages.len();

        let mut seen = HashSet::new();
        for message in messages {
            let thread_id = message.thread_id;
            if !seen.insert(thread_id.clone()) {
                continue;
            }
            if self.replied.contains(&thread_id) {
                debug!(thread_id = %thread_id, "already answered earlier, skipping");
                report.skipped += 1;
                continue;
            }

            let candidate = match inspector::inspect(service, &thread_id).await {
                Inspection::Candidate(candidate) => candidate,
                Inspection::Skip(_) => {
                    report.skipped += 1;
                    continue;
                }
            };

            match self.responder.respond(service, &thread_id, &candidate).await {
                Ok(_) => {
                    self.replied.remember(thread_id);
                    report.replied += 1;
                }
                Err(_) => report.failed += 1,
            }
        }

        info!(
            listed = report.listed,
            replied = report.replied,
            skipped = report.skipped,
            failed = report.failed,
            remembered = self.replied.len(),
            "Pass finished"
        );
        report
    }
}

/// Threads answered since startup, oldest forgotten first once `capacity`
/// is reached. Guards against a second reply when a thread still matches
/// the query on a later pass (`mark_read = false`); with `mark_read` on,
/// the query itself already excludes answered threads.
struct RepliedThreads {
    ids: HashSet<String>,
    order: VecDeque<String>,
    capacity: usize,
}

impl RepliedThreads {
    fn new(capacity: usize) -> Self {
        Self {
            ids: HashSet::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn contains(&self, thread_id: &str) -> bool {
        self.ids.contains(thread_id)
    }

    fn remember(&mut self, thread_id: String) {
        if self.capacity == 0 || !self.ids.insert(thread_id.clone()) {
            return;
        }
        self.order.push_back(thread_id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.ids.len()
    }
}
