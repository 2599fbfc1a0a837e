use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub issue: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum TicketReceipt {
    Created(Ticket),
    /// A ticket already exists for the session; nothing new was opened.
    Duplicate(Ticket),
}

impl TicketReceipt {
    pub fn status(&self) -> &'static str {
        match self {
            TicketReceipt::Created(_) => "created",
            TicketReceipt::Duplicate(_) => "duplicate",
        }
    }

    pub fn ticket(&self) -> &Ticket {
        match self {
            TicketReceipt::Created(ticket) | TicketReceipt::Duplicate(ticket) => ticket,
        }
    }
}

#[derive(Debug, Default)]
struct Ledger {
    tickets: Vec<Ticket>,
    by_session: HashMap<String, usize>,
}

/// In-process ticket backend behind the `create_ticket` tool.
///
/// At most one ticket is opened per session id; tickets without a session id
/// are never deduplicated.
#[derive(Debug, Default)]
pub struct TicketDesk {
    ledger: Mutex<Ledger>,
}

impl TicketDesk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, issue: &str, session_id: Option<&str>, intent: Option<&str>) -> TicketReceipt {
        let mut ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(sid) = session_id {
            if let Some(&index) = ledger.by_session.get(sid) {
                return TicketReceipt::Duplicate(ledger.tickets[index].clone());
            }
        }

        let ticket = Ticket {
            ticket_id: format!("TCK-{}", Uuid::now_v7().simple()),
            issue: issue.to_string(),
            session_id: session_id.map(str::to_string),
            intent: intent.map(str::to_string),
            created_at: Utc::now(),
        };
        let index = ledger.tickets.len();
        ledger.tickets.push(ticket.clone());
        if let Some(sid) = session_id {
            ledger.by_session.insert(sid.to_string(), index);
        }
        TicketReceipt::Created(ticket)
    }

    pub fn find(&self, ticket_id: &str) -> Option<Ticket> {
        let ledger = self.ledger.lock().unwrap_or_else(|e| e.into_inner());
        ledger
            .tickets
            .iter()
            .find(|t| t.ticket_id == ticket_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner()).tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_ticket_for_same_session_is_duplicate() {
        let desk = TicketDesk::new();
        let first = desk.open("refund missing", Some("s-1"), Some("billing"));
        let second = desk.open("refund still missing", Some("s-1"), Some("billing"));

        assert_eq!(first.status(), "created");
        assert_eq!(second.status(), "duplicate");
        assert_eq!(first.ticket().ticket_id, second.ticket().ticket_id);
        assert_eq!(second.ticket().issue, "refund missing");
        assert_eq!(desk.len(), 1);
    }

    #[test]
    fn tickets_without_session_are_not_deduplicated() {
        let desk = TicketDesk::new();
        desk.open("a", None, None);
        desk.open("a", None, None);
        assert_eq!(desk.len(), 2);
    }

    #[test]
    fn find_returns_opened_ticket() {
        let desk = TicketDesk::new();
        let receipt = desk.open("printer on fire", Some("s-9"), None);
        let found = desk.find(&receipt.ticket().ticket_id).unwrap();
        assert_eq!(found.session_id.as_deref(), Some("s-9"));
        assert!(desk.find("TCK-missing").is_none());
    }
}
