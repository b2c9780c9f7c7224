mod controller;
mod entry;

pub use controller::PreviewListController;
pub use entry::{EntryId, LocalFile, PreviewEntry, RemovalTicket};
