use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub type MessageId = u64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipients {
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub bcc: Vec<String>,
}

impl Recipients {
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .map(String::as_str)
    }
}

/// A row of `GET /messages/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: MessageId,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub recipients: Recipients,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Deserialize)]
pub struct MessageListing {
    pub messages: Vec<MessageSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default, rename = "type")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub href: Option<String>,
}

/// `GET /messages/<id>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageDetail {
    #[serde(flatten)]
    pub summary: MessageSummary,
    #[serde(default)]
    pub formats: BTreeMap<String, String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl MessageDetail {
    pub fn has_format(&self, format: MessageFormat) -> bool {
        self.formats.contains_key(format.as_str())
    }

    /// `preferred` when the message carries it, else the richest available body.
    pub fn pick_format(&self, preferred: MessageFormat) -> MessageFormat {
        if self.has_format(preferred) {
            return preferred;
        }
        MessageFormat::ALL
            .into_iter()
            .find(|format| self.has_format(*format))
            .unwrap_or(MessageFormat::Source)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MessageFormat {
    #[default]
    Html,
    Plain,
    Source,
}

impl MessageFormat {
    pub const ALL: [MessageFormat; 3] = [MessageFormat::Html, MessageFormat::Plain, MessageFormat::Source];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageFormat::Html => "html",
            MessageFormat::Plain => "plain",
            MessageFormat::Source => "source",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MessageFormat::Html => "HTML",
            MessageFormat::Plain => "Plain text",
            MessageFormat::Source => "Source",
        }
    }

    pub fn next(self) -> Self {
        match self {
            MessageFormat::Html => MessageFormat::Plain,
            MessageFormat::Plain => MessageFormat::Source,
            MessageFormat::Source => MessageFormat::Html,
        }
    }
}

impl fmt::Display for MessageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Previous,
    Next,
}

/// Rendered message rows in arrival order, plus the filter and selection over them.
#[derive(Debug, Default, Clone)]
pub struct MessageList {
    rows: Vec<MessageSummary>,
    filter: String,
    selected: Option<MessageId>,
}

impl MessageList {
    pub fn replace_all(&mut self, mut rows: Vec<MessageSummary>) {
        rows.sort_by_key(|row| row.id);
        rows.dedup_by_key(|row| row.id);
        self.rows = rows;
        if let Some(selected) = self.selected {
            if self.position(selected).is_none() {
                self.selected = None;
            }
        }
    }

    /// Inserts a row; an id that is already listed is left alone.
    pub fn insert(&mut self, row: MessageSummary) -> bool {
        match self.rows.binary_search_by_key(&row.id, |existing| existing.id) {
            Ok(_) => false,
            Err(index) => {
                self.rows.insert(index, row);
                true
            }
        }
    }

    pub fn remove(&mut self, id: MessageId) -> Option<MessageSummary> {
        let index = self.position(id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some(self.rows.remove(index))
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.selected = None;
    }

    pub fn get(&self, id: MessageId) -> Option<&MessageSummary> {
        self.position(id).map(|index| &self.rows[index])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// `term` is expected to be trimmed and lowercased already.
    pub fn set_filter(&mut self, term: &str) {
        self.filter = term.to_string();
    }

    pub fn is_visible(&self, row: &MessageSummary) -> bool {
        if self.filter.is_empty() {
            return true;
        }
        let term = self.filter.as_str();
        row.sender.to_lowercase().contains(term)
            || row.subject.to_lowercase().contains(term)
            || row.recipients.all().any(|r| r.to_lowercase().contains(term))
    }

    pub fn visible(&self) -> impl Iterator<Item = &MessageSummary> {
        self.rows.iter().filter(|row| self.is_visible(row))
    }

    pub fn selected(&self) -> Option<MessageId> {
        self.selected
    }

    pub fn select(&mut self, id: MessageId) -> bool {
        if self.position(id).is_none() {
            return false;
        }
        self.selected = Some(id);
        true
    }

    pub fn deselect(&mut self) -> Option<MessageId> {
        self.selected.take()
    }

    pub fn edge(&self, edge: Edge) -> Option<MessageId> {
        match edge {
            Edge::First => self.visible().next().map(|row| row.id),
            Edge::Last => self.visible().last().map(|row| row.id),
        }
    }

    /// Nearest visible row before or after `id`. `id` itself may be filtered out.
    pub fn neighbor(&self, id: MessageId, step: Step) -> Option<MessageId> {
        let index = self.position(id)?;
        match step {
            Step::Previous => self.rows[..index]
                .iter()
                .rev()
                .find(|row| self.is_visible(row))
                .map(|row| row.id),
            Step::Next => self.rows[index + 1..]
                .iter()
                .find(|row| self.is_visible(row))
                .map(|row| row.id),
        }
    }

    fn position(&self, id: MessageId) -> Option<usize> {
        self.rows.binary_search_by_key(&id, |row| row.id).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::summary;

    fn list(rows: &[(MessageId, &str, &str)]) -> MessageList {
        let mut list = MessageList::default();
        list.replace_all(
            rows.iter()
                .map(|(id, sender, subject)| summary(*id, sender, subject))
                .collect(),
        );
        list
    }

    #[test]
    fn rows_stay_in_id_order() {
        let mut list = list(&[(3, "c@x", "third"), (1, "a@x", "first")]);
        assert!(list.insert(summary(2, "b@x", "second")));
        assert!(!list.insert(summary(2, "b@x", "again")));

        let ids: Vec<_> = list.visible().map(|row| row.id).collect();
        assert_eq!(ids, [1, 2, 3]);
        assert_eq!(list.get(2).map(|row| row.subject.as_str()), Some("second"));
    }

    #[test]
    fn filter_matches_sender_subject_and_recipients() {
        let mut list = list(&[(1, "alice@x", "Invoice"), (2, "bob@x", "Lunch")]);
        let mut with_cc = summary(3, "carol@x", "Notes");
        with_cc.recipients.cc.push("Dave <dave@x>".into());
        list.insert(with_cc);

        list.set_filter("invoice");
        assert_eq!(list.visible().map(|r| r.id).collect::<Vec<_>>(), [1]);
        list.set_filter("bob");
        assert_eq!(list.visible().map(|r| r.id).collect::<Vec<_>>(), [2]);
        list.set_filter("dave");
        assert_eq!(list.visible().map(|r| r.id).collect::<Vec<_>>(), [3]);
        list.set_filter("");
        assert_eq!(list.visible().count(), 3);
    }

    #[test]
    fn navigation_skips_hidden_rows() {
        let mut list = list(&[
            (1, "a@x", "keep"),
            (2, "b@x", "drop"),
            (3, "c@x", "keep"),
            (4, "d@x", "drop"),
        ]);
        list.set_filter("keep");

        assert_eq!(list.edge(Edge::First), Some(1));
        assert_eq!(list.edge(Edge::Last), Some(3));
        assert_eq!(list.neighbor(1, Step::Next), Some(3));
        assert_eq!(list.neighbor(3, Step::Next), None);
        // A hidden selection still navigates relative to its position.
        assert_eq!(list.neighbor(2, Step::Previous), Some(1));
        assert_eq!(list.neighbor(4, Step::Previous), Some(3));
    }

    #[test]
    fn removing_selected_row_clears_selection() {
        let mut list = list(&[(1, "a@x", "one"), (2, "b@x", "two")]);
        assert!(list.select(2));
        assert!(!list.select(9));
        assert_eq!(list.selected(), Some(2));

        assert!(list.remove(2).is_some());
        assert_eq!(list.selected(), None);

        list.select(1);
        list.replace_all(vec![summary(5, "e@x", "five")]);
        assert_eq!(list.selected(), None);
    }

    #[test]
    fn detail_parses_server_json_and_picks_format() {
        let raw = r#"{
            "id": 12,
            "sender": "alice@example.com",
            "recipients": {"to": ["bob@example.com"], "cc": [], "bcc": []},
            "subject": "Hi",
            "created_at": "2024-03-01 10:00:00",
            "size": 512,
            "type": "text/plain",
            "href": "/messages/12.eml",
            "formats": {"source": "/messages/12.source", "plain": "/messages/12.plain"},
            "attachments": [{"filename": "a.txt", "type": "text/plain", "size": 3, "cid": "x", "href": "/messages/12/parts/x"}]
        }"#;
        let detail: MessageDetail = serde_json::from_str(raw).unwrap();

        assert_eq!(detail.summary.id, 12);
        assert_eq!(detail.summary.recipients.to, ["bob@example.com"]);
        assert_eq!(detail.attachments[0].filename.as_deref(), Some("a.txt"));
        assert_eq!(detail.pick_format(MessageFormat::Html), MessageFormat::Plain);
        assert_eq!(detail.pick_format(MessageFormat::Source), MessageFormat::Source);
    }
}
