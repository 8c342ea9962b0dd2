/// Telegram message to event mapping
pub mod inbound;
/// Reply delivery through the Bot API
pub mod outbound;

pub use inbound::{extract_event, sender_id};
pub use outbound::TelegramOutbound;
