//! The message list the viewer renders, and the operations the rest of the viewer drives it with.

mod model;
mod remote;

pub use model::{
    Attachment, Edge, MessageDetail, MessageFormat, MessageId, MessageList, MessageListing,
    MessageSummary, Recipients, Step,
};
pub use remote::{BodyState, DetailView, RemoteMessageStore, StoreSnapshot};

/// Message list collaborator. Calls never block on the network; remote work
/// runs in the background and lands in the list when it completes.
pub trait MessageStore: Send + Sync {
    /// Replaces the list with the server's current messages.
    fn load_all(&self);
    /// Fetches one message and adds it, raising a notification when `notify` is set.
    fn load(&self, id: MessageId, notify: bool);
    /// Drops every row locally.
    fn delete_all(&self);
    fn get(&self, id: MessageId) -> Option<MessageSummary>;
    fn selected(&self) -> Option<MessageId>;
    fn select(&self, id: MessageId);
    fn deselect(&self);
    /// `remote` asks the server to delete; otherwise the row is only dropped locally.
    fn delete(&self, id: MessageId, remote: bool);
    fn apply_filter(&self, term: &str);
    fn update_format(&self, format: MessageFormat);
    fn close_notifications(&self);
    fn edge_row(&self, edge: Edge) -> Option<MessageId>;
    fn visible_neighbor(&self, id: MessageId, step: Step) -> Option<MessageId>;
}
