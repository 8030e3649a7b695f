//! Room conversation rendering for model prompts

use crate::persistence::{ChatMessage, RoomUsers};
use crate::types::{ConversationMessage, ConversationRole};

const MENTION: &str = "@agent";

/// Convert stored chat messages into model turns. Messages sent by `agent_sender` become
/// assistant turns.
pub fn to_conversation(messages: &[ChatMessage], agent_sender: &str) -> Vec<ConversationMessage> {
    messages
        .iter()
        .map(|m| {
            let role = if m.sender.id() == agent_sender {
                ConversationRole::Assistant
            } else {
                ConversationRole::User
            };
            ConversationMessage {
                role,
                content: m.content.clone(),
                created_at: m.created_at.clone(),
                sender: Some(m.sender.display_name().to_string()),
            }
        })
        .collect()
}

/// Remove every `@agent` mention from a live query
pub fn strip_mention(query: &str) -> String {
    query.replace(MENTION, "").trim().to_string()
}

/// Render a transcript between `CONVERSATION START` and `CONVERSATION END` markers, one
/// `Role [timestamp]: content` line per message.
pub fn format_conversation(messages: &[ConversationMessage], show_username: bool) -> String {
    let mut out = String::from("CONVERSATION START\n\n");
    for message in messages {
        let mut label = message.role.as_str().to_string();
        if show_username {
            if let Some(sender) = message.sender.as_deref().filter(|s| !s.is_empty()) {
                label.push_str(&format!(" ({})", sender));
            }
        }
        let timestamp = match message.created_at.as_deref() {
            Some(ts) if !ts.is_empty() => format!(" [{}]", ts),
            _ => String::new(),
        };
        let content = match message.content.strip_prefix(MENTION) {
            Some(rest) => rest.trim(),
            None => message.content.as_str(),
        };
        out.push_str(&format!("{}{}: {}\n", capitalize(&label), timestamp, content));
    }
    out.push_str("\nCONVERSATION END");
    out
}

/// Render room membership for the administrative prompt
pub fn format_room_users(room_users: &RoomUsers) -> String {
    if room_users.users.is_empty() {
        return "No users found in this room.".to_string();
    }
    let lines: Vec<String> = room_users
        .users
        .iter()
        .map(|u| format!("• {} (ID: {})", u.username, u.user_id))
        .collect();
    format!("Room participants ({}):\n{}", room_users.total(), lines.join("\n"))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{Pagination, SenderRef, UserRecord};
    use pretty_assertions::assert_eq;

    fn chat(sender: &str, content: &str, ts: Option<&str>) -> ChatMessage {
        ChatMessage {
            id: None,
            sender: SenderRef::Id(sender.to_string()),
            content: content.to_string(),
            created_at: ts.map(|s| s.to_string()),
        }
    }

    #[test]
    fn agent_messages_become_assistant_turns() {
        let turns = to_conversation(
            &[chat("u1", "hi", None), chat("agent", "hello", None)],
            "agent",
        );
        assert_eq!(turns[0].role, ConversationRole::User);
        assert_eq!(turns[1].role, ConversationRole::Assistant);
    }

    #[test]
    fn transcript_format() {
        let mut turns = to_conversation(
            &[
                chat("u1", "@agent what is the weather?", Some("2025-01-01T08:00:00+08:00")),
                chat("agent", "Sunny.", None),
            ],
            "agent",
        );
        turns.push(ConversationMessage::user(strip_mention("@agent thanks")));

        assert_eq!(
            format_conversation(&turns, false),
            "CONVERSATION START\n\n\
             User [2025-01-01T08:00:00+08:00]: what is the weather?\n\
             Assistant: Sunny.\n\
             User: thanks\n\
             \nCONVERSATION END"
        );
    }

    #[test]
    fn usernames_are_shown_for_admin_transcripts() {
        let turns = to_conversation(&[chat("Bob", "remove step 2", None)], "agent");
        assert_eq!(
            format_conversation(&turns, true),
            "CONVERSATION START\n\nUser (Bob): remove step 2\n\nCONVERSATION END"
        );
    }

    #[test]
    fn room_users_render() {
        let users = RoomUsers {
            users: vec![UserRecord {
                user_id: "u1".to_string(),
                username: "alice".to_string(),
                ..UserRecord::default()
            }],
            pagination: Some(Pagination { total: Some(3) }),
        };
        assert_eq!(format_room_users(&users), "Room participants (3):\n• alice (ID: u1)");
        assert_eq!(format_room_users(&RoomUsers::default()), "No users found in this room.");
    }
}
