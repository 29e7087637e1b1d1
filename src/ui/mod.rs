pub mod embeds;
pub mod messages;

pub use messages::{send_message, Notice, RetryPolicy};
