use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::identity::GeoPoint;
use crate::models::message::{ASSISTANT_SENDER, ChatMessage, GroundingLink};
use crate::state::AppState;
use crate::store::Collection;

pub const ASSISTANT_NAME: &str = "Dispatch Assistant";

/// Customer phrases that pull the assistant into a thread. Best-effort: a
/// missed trigger only means no automated reply, never a lost message.
const TRIGGER_KEYWORDS: &[&str] = &[
    "where", "late", "delay", "track", "status", "eta", "arrive", "location", "lost",
];

pub fn wants_assistant(text: &str) -> bool {
    let lowered = text.to_lowercase();
    TRIGGER_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

#[derive(Debug, Clone)]
pub struct AssistantReply {
    pub text: String,
    pub links: Vec<GroundingLink>,
}

/// Opaque, possibly-slow, possibly-failing natural-language service. The
/// caller owns timeout and failure policy.
pub trait Assistant: Send + Sync {
    fn reply(
        &self,
        prompt: String,
        location_hint: Option<GeoPoint>,
    ) -> BoxFuture<'_, Result<AssistantReply, AppError>>;
}

/// Deterministic in-tree implementation used by default and in tests.
pub struct CannedAssistant;

impl Assistant for CannedAssistant {
    fn reply(
        &self,
        prompt: String,
        location_hint: Option<GeoPoint>,
    ) -> BoxFuture<'_, Result<AssistantReply, AppError>> {
        Box::pin(async move {
            let lowered = prompt.to_lowercase();
            let text = if lowered.contains("where") || lowered.contains("track") {
                "Your rider's live position is on the tracking map; the marker updates as they move.".to_string()
            } else if lowered.contains("late") || lowered.contains("delay") {
                "Sorry about the wait. Your delivery is still in motion and the quoted time is being rechecked.".to_string()
            } else {
                "Thanks for reaching out. An agent will pick this thread up shortly.".to_string()
            };

            let links = location_hint
                .map(|point| {
                    vec![GroundingLink {
                        title: "Your area on the map".to_string(),
                        uri: format!("https://maps.google.com/?q={},{}", point.lat, point.lng),
                    }]
                })
                .unwrap_or_default();

            Ok(AssistantReply { text, links })
        })
    }
}

/// Runs the assistant for a triggering customer message and stores its reply.
/// The triggering message is already persisted before this is spawned, so
/// every failure path here is logged, counted, and dropped.
pub async fn run_assistant(
    state: Arc<AppState>,
    thread_id: Uuid,
    prompt: String,
    location_hint: Option<GeoPoint>,
) {
    let outcome = tokio::time::timeout(
        state.assistant_timeout,
        state.assistant.reply(prompt, location_hint),
    )
    .await;

    let reply = match outcome {
        Ok(Ok(reply)) => reply,
        Ok(Err(err)) => {
            warn!(error = %err, thread_id = %thread_id, "assistant call failed");
            state
                .metrics
                .assistant_replies_total
                .with_label_values(&["error"])
                .inc();
            return;
        }
        Err(_) => {
            warn!(thread_id = %thread_id, "assistant call timed out");
            state
                .metrics
                .assistant_replies_total
                .with_label_values(&["timeout"])
                .inc();
            return;
        }
    };

    let message = ChatMessage {
        id: Uuid::nil(),
        thread_id,
        sender_id: ASSISTANT_SENDER,
        sender_name: ASSISTANT_NAME.to_string(),
        text: reply.text,
        is_admin: true,
        sent_at: Some(chrono::Utc::now()),
        links: reply.links,
    };

    match serde_json::to_value(&message)
        .map_err(|err| AppError::Internal(err.to_string()))
        .and_then(|doc| state.store.create(Collection::Messages, doc))
    {
        Ok(id) => {
            info!(message_id = %id, thread_id = %thread_id, "assistant replied");
            state
                .metrics
                .assistant_replies_total
                .with_label_values(&["success"])
                .inc();
        }
        Err(err) => {
            warn!(error = %err, thread_id = %thread_id, "failed to store assistant reply");
            state
                .metrics
                .assistant_replies_total
                .with_label_values(&["error"])
                .inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_scan_triggers_on_tracking_questions() {
        assert!(wants_assistant("Where is my package?"));
        assert!(wants_assistant("the rider is LATE again"));
        assert!(wants_assistant("what's the ETA"));
        assert!(!wants_assistant("thank you, all good"));
    }

    #[tokio::test]
    async fn canned_assistant_grounds_replies_in_the_location_hint() {
        let reply = CannedAssistant
            .reply(
                "where is my order".to_string(),
                Some(GeoPoint { lat: 6.2, lng: 6.7 }),
            )
            .await
            .unwrap();

        assert!(!reply.text.is_empty());
        assert_eq!(reply.links.len(), 1);
        assert!(reply.links[0].uri.contains("6.2"));
    }

    #[tokio::test]
    async fn canned_assistant_omits_links_without_a_hint() {
        let reply = CannedAssistant
            .reply("hello".to_string(), None)
            .await
            .unwrap();
        assert!(reply.links.is_empty());
    }
}
