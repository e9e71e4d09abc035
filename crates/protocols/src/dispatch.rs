use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use rand::random;
use tracing::{debug, error, trace};
use waku_message::{Envelope, Message, MessageDecoder};

/// Application callback receiving decoded messages.
pub type Callback = Arc<dyn Fn(Message) + Send + Sync>;

/// Decodes `envelope` with the first decoder bound to its content topic that
/// accepts it. Failures of individual decoders are not errors: they mean the
/// envelope belongs to someone else.
pub(crate) fn decode_first(
    decoders: &[Arc<dyn MessageDecoder>],
    envelope: &Envelope,
) -> Option<Message> {
    let mut candidates = decoders
        .iter()
        .filter(|decoder| decoder.content_topic() == &envelope.content_topic)
        .peekable();

    if candidates.peek().is_none() {
        trace!(content_topic = %envelope.content_topic, "No decoder for content topic");
        return None;
    }

    candidates.find_map(|decoder| match decoder.decode(envelope) {
        Ok(message) => Some(message),
        Err(err) => {
            debug!(content_topic = %envelope.content_topic, %err, "Decoder rejected message");
            None
        }
    })
}

/// Runs an application callback, containing any panic so one faulty
/// callback cannot take down delivery to the others.
pub(crate) fn invoke(callback: &Callback, message: Message) {
    let content_topic = message.content_topic.clone();

    if catch_unwind(AssertUnwindSafe(|| callback(message))).is_err() {
        error!(%content_topic, "Message callback panicked");
    }
}

pub(crate) fn new_request_id() -> String {
    hex::encode(random::<[u8; 16]>())
}
