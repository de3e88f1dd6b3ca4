pub mod client;
pub mod messages;
pub mod source;

pub use client::NatsClient;
pub use messages::TranscriptMessage;
pub use source::{spawn_event_publisher, NatsRecognitionSource, NatsSourceFactory};
