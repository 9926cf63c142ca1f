use uuid::Uuid;

use crate::config::{NEW_CHAT_WELCOME_MESSAGE, PLACEHOLDER_CHAT_NAME};
use crate::models::{Chat, Message};

/// In-memory chat sessions, newest first. The active chat is tracked by id
/// only, so removing a chat can never leave a dangling reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationStore {
    chats: Vec<Chat>,
    active_chat_id: Option<String>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from persisted chats. The remembered active id is kept
    /// only if it still names a chat; otherwise the first chat is active.
    pub fn from_parts(chats: Vec<Chat>, last_active: Option<String>) -> Self {
        let active_chat_id = last_active
            .filter(|id| chats.iter().any(|c| &c.id == id))
            .or_else(|| chats.first().map(|c| c.id.clone()));
        Self {
            chats,
            active_chat_id,
        }
    }

    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    pub fn active_chat_id(&self) -> Option<&str> {
        self.active_chat_id.as_deref()
    }

    pub fn active_chat(&self) -> Option<&Chat> {
        self.active_chat_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn get(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == chat_id)
    }

    fn get_mut(&mut self, chat_id: &str) -> Option<&mut Chat> {
        self.chats.iter_mut().find(|c| c.id == chat_id)
    }

    /// Prepend a new chat seeded with the welcome message and make it active.
    pub fn create_chat(&mut self, now: i64) -> &Chat {
        let id = Uuid::new_v4().to_string();
        let welcome = Message::ai(
            format!("{}-welcome", id),
            Some(NEW_CHAT_WELCOME_MESSAGE.to_string()),
            None,
            now,
        );
        let chat = Chat {
            id: id.clone(),
            name: PLACEHOLDER_CHAT_NAME.to_string(),
            messages: vec![welcome],
            created_at: now,
        };
        self.chats.insert(0, chat);
        self.active_chat_id = Some(id);
        &self.chats[0]
    }

    /// Returns `false` and leaves the active chat unchanged if `chat_id` is unknown.
    pub fn select_chat(&mut self, chat_id: &str) -> bool {
        if self.get(chat_id).is_none() {
            return false;
        }
        self.active_chat_id = Some(chat_id.to_string());
        true
    }

    pub fn delete_chat(&mut self, chat_id: &str) -> bool {
        let before = self.chats.len();
        self.chats.retain(|c| c.id != chat_id);
        if self.chats.len() == before {
            return false;
        }
        if self.active_chat_id.as_deref() == Some(chat_id) {
            self.active_chat_id = self.chats.first().map(|c| c.id.clone());
        }
        true
    }

    pub fn append_messages(&mut self, chat_id: &str, messages: Vec<Message>) -> bool {
        match self.get_mut(chat_id) {
            Some(chat) => {
                chat.messages.extend(messages);
                true
            }
            None => false,
        }
    }

    pub fn rename_chat(&mut self, chat_id: &str, name: &str) -> bool {
        match self.get_mut(chat_id) {
            Some(chat) => {
                chat.name = name.to_string();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sender;

    #[test]
    fn test_create_chat_seeds_welcome_and_activates() {
        let mut store = ConversationStore::new();
        let chat = store.create_chat(10);
        let id = chat.id.clone();
        assert_eq!(chat.name, PLACEHOLDER_CHAT_NAME);
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(chat.messages[0].sender, Sender::Ai);
        assert_eq!(chat.messages[0].id, format!("{}-welcome", id));
        assert_eq!(chat.created_at, 10);
        assert_eq!(store.active_chat_id(), Some(id.as_str()));
    }

    #[test]
    fn test_new_chats_are_prepended() {
        let mut store = ConversationStore::new();
        let first = store.create_chat(1).id.clone();
        let second = store.create_chat(2).id.clone();
        assert_eq!(store.chats()[0].id, second);
        assert_eq!(store.chats()[1].id, first);
        assert_eq!(store.active_chat_id(), Some(second.as_str()));
    }

    #[test]
    fn test_delete_only_chat_empties_store() {
        let mut store = ConversationStore::new();
        let id = store.create_chat(1).id.clone();
        assert!(store.delete_chat(&id));
        assert!(store.is_empty());
        assert!(store.active_chat_id().is_none());
        assert!(store.active_chat().is_none());
    }

    #[test]
    fn test_delete_active_falls_back_to_first() {
        let mut store = ConversationStore::new();
        let older = store.create_chat(1).id.clone();
        let newer = store.create_chat(2).id.clone();
        assert!(store.delete_chat(&newer));
        assert_eq!(store.active_chat_id(), Some(older.as_str()));
    }

    #[test]
    fn test_delete_inactive_keeps_active() {
        let mut store = ConversationStore::new();
        let older = store.create_chat(1).id.clone();
        let newer = store.create_chat(2).id.clone();
        assert!(store.delete_chat(&older));
        assert_eq!(store.active_chat_id(), Some(newer.as_str()));
        assert!(!store.delete_chat("missing"));
    }

    #[test]
    fn test_select_unknown_is_noop() {
        let mut store = ConversationStore::new();
        let older = store.create_chat(1).id.clone();
        let newer = store.create_chat(2).id.clone();
        assert!(!store.select_chat("missing"));
        assert_eq!(store.active_chat_id(), Some(newer.as_str()));
        assert!(store.select_chat(&older));
        assert_eq!(store.active_chat_id(), Some(older.as_str()));
    }

    #[test]
    fn test_append_and_rename() {
        let mut store = ConversationStore::new();
        let id = store.create_chat(1).id.clone();
        let msg = Message::user("u1".into(), "hello".into(), 2);
        assert!(store.append_messages(&id, vec![msg.clone()]));
        assert!(!store.append_messages("missing", vec![msg]));
        assert!(store.rename_chat(&id, "Door Script"));
        assert!(!store.rename_chat("missing", "x"));

        let chat = store.get(&id).unwrap();
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.user_message_count(), 1);
        assert_eq!(chat.name, "Door Script");
    }

    #[test]
    fn test_from_parts_restores_active() {
        let mut source = ConversationStore::new();
        let older = source.create_chat(1).id.clone();
        let newer = source.create_chat(2).id.clone();
        let chats = source.chats().to_vec();

        let restored = ConversationStore::from_parts(chats.clone(), Some(older.clone()));
        assert_eq!(restored.active_chat_id(), Some(older.as_str()));

        let stale = ConversationStore::from_parts(chats, Some("gone".into()));
        assert_eq!(stale.active_chat_id(), Some(newer.as_str()));

        let empty = ConversationStore::from_parts(Vec::new(), Some(older));
        assert!(empty.active_chat_id().is_none());
    }
}
