//! Chat notifications.

mod telegram;
mod types;

pub use telegram::TelegramNotifier;
pub use types::*;
