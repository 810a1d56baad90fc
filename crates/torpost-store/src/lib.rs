// In-memory per-peer mailboxes and the append-only activity log.

pub mod activity;
pub mod error;
pub mod mailbox;

pub use activity::ActivityLog;
pub use error::{Result, StoreError};
pub use mailbox::{Mailbox, StoredMessage};
