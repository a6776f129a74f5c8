use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::identity::Identity;
use crate::models::message::{ChatMessage, Thread};

pub const GUEST_LABEL: &str = "Guest";

fn message_order(message: &ChatMessage) -> (DateTime<Utc>, Uuid) {
    // Unresolved server stamps sort as time zero, i.e. before everything.
    (
        message.sent_at.unwrap_or(DateTime::<Utc>::MIN_UTC),
        message.id,
    )
}

/// Groups a flat message list into conversation threads. Pure and
/// deterministic: the same input set yields the same names, order and
/// previews regardless of input ordering.
pub fn resolve_threads(messages: &[ChatMessage]) -> Vec<Thread> {
    let mut ordered: Vec<&ChatMessage> = messages.iter().collect();
    ordered.sort_by_key(|m| message_order(m));

    // The thread's display name comes from the participant who owns it:
    // messages whose sender is the thread id itself. Admin and assistant
    // replies never rename a thread.
    let mut names: HashMap<Uuid, String> = HashMap::new();
    let mut threads: HashMap<Uuid, Thread> = HashMap::new();

    for message in ordered {
        if message.sender_id == message.thread_id {
            names.insert(message.thread_id, message.sender_name.clone());
        }

        let entry = threads.entry(message.thread_id).or_insert_with(|| Thread {
            id: message.thread_id,
            name: String::new(),
            last_text: String::new(),
            last_at: None,
        });
        entry.last_text = message.text.clone();
        entry.last_at = message.sent_at;
    }

    let mut list: Vec<Thread> = threads
        .into_values()
        .map(|mut thread| {
            thread.name = names
                .get(&thread.id)
                .cloned()
                .unwrap_or_else(|| GUEST_LABEL.to_string());
            thread
        })
        .collect();

    list.sort_by(|a, b| {
        let a_at = a.last_at.unwrap_or(DateTime::<Utc>::MIN_UTC);
        let b_at = b.last_at.unwrap_or(DateTime::<Utc>::MIN_UTC);
        b_at.cmp(&a_at).then(a.id.cmp(&b.id))
    });
    list
}

/// One thread's messages, oldest first.
pub fn thread_messages(messages: &[ChatMessage], thread_id: Uuid) -> Vec<ChatMessage> {
    let mut own: Vec<ChatMessage> = messages
        .iter()
        .filter(|m| m.thread_id == thread_id)
        .cloned()
        .collect();
    own.sort_by_key(message_order);
    own
}

/// A non-admin only ever has their own thread; an admin with no explicit
/// selection lands on the most recent one.
pub fn default_active_thread(viewer: &Identity, threads: &[Thread]) -> Option<Uuid> {
    if viewer.role.is_admin() {
        threads.first().map(|t| t.id)
    } else {
        Some(viewer.id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::identity::Role;
    use crate::models::message::ASSISTANT_SENDER;

    fn at(minute: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2026, 8, 1, 12, minute, 0).unwrap())
    }

    fn msg(
        seed: u128,
        thread: u128,
        sender: Uuid,
        name: &str,
        text: &str,
        sent_at: Option<DateTime<Utc>>,
    ) -> ChatMessage {
        ChatMessage {
            id: Uuid::from_u128(seed),
            thread_id: Uuid::from_u128(thread),
            sender_id: sender,
            sender_name: name.to_string(),
            text: text.to_string(),
            is_admin: false,
            sent_at,
            links: Vec::new(),
        }
    }

    #[test]
    fn threads_take_their_name_from_the_originating_sender() {
        let ngozi = Uuid::from_u128(1);
        let admin = Uuid::from_u128(50);

        let messages = vec![
            msg(10, 1, ngozi, "Ngozi", "where is my order", at(1)),
            msg(11, 1, admin, "Ops", "checking now", at(2)),
            msg(12, 1, ASSISTANT_SENDER, "Dispatch Assistant", "on the way", at(3)),
        ];

        let threads = resolve_threads(&messages);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].name, "Ngozi");
        assert_eq!(threads[0].last_text, "on the way");
        assert_eq!(threads[0].last_at, at(3));
    }

    #[test]
    fn threads_without_a_canonical_message_fall_back_to_guest() {
        let admin = Uuid::from_u128(50);
        let messages = vec![msg(10, 7, admin, "Ops", "hello?", at(1))];

        let threads = resolve_threads(&messages);
        assert_eq!(threads[0].name, GUEST_LABEL);
    }

    #[test]
    fn threads_order_by_recency_and_messages_ascend() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);

        let messages = vec![
            msg(10, 1, a, "A", "old thread", at(1)),
            msg(11, 2, b, "B", "newer thread", at(5)),
            msg(12, 1, a, "A", "follow-up", at(3)),
        ];

        let threads = resolve_threads(&messages);
        assert_eq!(threads[0].id, Uuid::from_u128(2));
        assert_eq!(threads[1].id, Uuid::from_u128(1));
        assert_eq!(threads[1].last_text, "follow-up");

        let in_thread = thread_messages(&messages, Uuid::from_u128(1));
        assert_eq!(in_thread.len(), 2);
        assert_eq!(in_thread[0].text, "old thread");
        assert_eq!(in_thread[1].text, "follow-up");
    }

    #[test]
    fn unstamped_messages_sort_first_and_never_clobber_the_preview() {
        let a = Uuid::from_u128(1);
        let messages = vec![
            msg(10, 1, a, "A", "stamped", at(2)),
            msg(11, 1, a, "A", "pending write", None),
        ];

        let in_thread = thread_messages(&messages, Uuid::from_u128(1));
        assert_eq!(in_thread[0].text, "pending write");

        let threads = resolve_threads(&messages);
        assert_eq!(threads[0].last_text, "stamped");
    }

    #[test]
    fn resolution_is_deterministic_under_input_reordering() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let mut messages = vec![
            msg(10, 1, a, "A", "one", at(1)),
            msg(11, 2, b, "B", "two", at(2)),
            msg(12, 1, a, "A", "three", at(3)),
        ];

        let forward = resolve_threads(&messages);
        messages.reverse();
        let backward = resolve_threads(&messages);

        assert_eq!(forward, backward);
        assert_eq!(forward, resolve_threads(&messages));
    }

    #[test]
    fn non_admins_default_to_their_own_thread() {
        let mut customer = Identity::new("Ngozi", "0801", Role::Customer, "1234");
        customer.id = Uuid::from_u128(1);
        assert_eq!(
            default_active_thread(&customer, &[]),
            Some(Uuid::from_u128(1))
        );

        let mut admin = Identity::new("Ops", "0800", Role::Admin, "1111");
        admin.id = Uuid::from_u128(9);
        let threads = vec![
            Thread {
                id: Uuid::from_u128(2),
                name: "B".to_string(),
                last_text: "newest".to_string(),
                last_at: at(5),
            },
            Thread {
                id: Uuid::from_u128(1),
                name: "A".to_string(),
                last_text: "older".to_string(),
                last_at: at(1),
            },
        ];
        assert_eq!(default_active_thread(&admin, &threads), Some(Uuid::from_u128(2)));
        assert_eq!(default_active_thread(&admin, &[]), None);
    }
}
