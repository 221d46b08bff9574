//! Service layer: item sources and notification sinks.

pub mod extract;
pub mod listing;
pub mod notify;
pub mod source;

// Re-export for convenience
pub use listing::ListingSource;
pub use notify::{FanoutNotifier, Notifier, ServerChanNotifier, TelegramNotifier};
pub use source::{ItemSource, JsonFileSource};
