use anyhow::Result;

use super::database::Database;
use super::store::ConversationStore;
use crate::config::{ACTIVE_CHAT_KEY, CHATS_KEY};
use crate::models::Chat;

/// Mirrors the conversation store into durable storage.
#[derive(Debug, Clone)]
pub struct Persistence {
    db: Database,
}

impl Persistence {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Load the stored chats. Corrupt data never blocks startup: it is logged
    /// and an empty store is returned instead.
    pub async fn load(&self) -> ConversationStore {
        let chats = match self.db.get(CHATS_KEY).await {
            Ok(Some(json)) => match serde_json::from_str::<Vec<Chat>>(&json) {
                Ok(chats) => chats,
                Err(e) => {
                    tracing::error!("Failed to parse stored chats, starting empty: {}", e);
                    return ConversationStore::new();
                }
            },
            Ok(None) => return ConversationStore::new(),
            Err(e) => {
                tracing::error!("Failed to read stored chats, starting empty: {}", e);
                return ConversationStore::new();
            }
        };

        let last_active = match self.db.get(ACTIVE_CHAT_KEY).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to read last active chat: {}", e);
                None
            }
        };

        tracing::debug!(count = chats.len(), "Loaded stored chats");
        ConversationStore::from_parts(chats, last_active)
    }

    /// Write the full chat collection, or delete the entry when there are no chats.
    pub async fn save_chats(&self, store: &ConversationStore) -> Result<()> {
        if store.is_empty() {
            return self.db.remove(CHATS_KEY).await;
        }
        let json = serde_json::to_string(store.chats())?;
        self.db.set(CHATS_KEY, &json).await
    }

    pub async fn save_active(&self, store: &ConversationStore) -> Result<()> {
        match store.active_chat_id() {
            Some(id) => self.db.set(ACTIVE_CHAT_KEY, id).await,
            None => self.db.remove(ACTIVE_CHAT_KEY).await,
        }
    }

    /// Persist both the collection and the active pointer. Failures are logged
    /// and swallowed so a storage problem never interrupts the conversation.
    pub async fn save(&self, store: &ConversationStore) {
        if let Err(e) = self.save_chats(store).await {
            tracing::error!("Failed to persist chats: {}", e);
        }
        if let Err(e) = self.save_active(store).await {
            tracing::error!("Failed to persist active chat: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;

    #[tokio::test]
    async fn test_empty_store_removes_entry() {
        let db = Database::new_in_memory().unwrap();
        let persistence = Persistence::new(db.clone());

        let mut store = ConversationStore::new();
        let id = store.create_chat(1).id.clone();
        persistence.save(&store).await;
        assert!(db.get(CHATS_KEY).await.unwrap().is_some());
        assert_eq!(db.get(ACTIVE_CHAT_KEY).await.unwrap(), Some(id.clone()));

        store.delete_chat(&id);
        persistence.save(&store).await;
        assert!(db.get(CHATS_KEY).await.unwrap().is_none());
        assert!(db.get(ACTIVE_CHAT_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let db = Database::new_in_memory().unwrap();
        let persistence = Persistence::new(db);

        let mut store = ConversationStore::new();
        let older = store.create_chat(1).id.clone();
        store.create_chat(2);
        store.append_messages(
            &older,
            vec![Message::ai("a".into(), Some("t".into()), Some("print(1)".into()), 3)],
        );
        store.select_chat(&older);
        persistence.save(&store).await;

        let loaded = persistence.load().await;
        assert_eq!(loaded, store);
        assert_eq!(loaded.active_chat_id(), Some(older.as_str()));
    }

    #[tokio::test]
    async fn test_corrupt_data_fails_open() {
        let db = Database::new_in_memory().unwrap();
        db.set(CHATS_KEY, "{not json").await.unwrap();
        db.set(ACTIVE_CHAT_KEY, "whatever").await.unwrap();

        let loaded = Persistence::new(db).load().await;
        assert!(loaded.is_empty());
        assert!(loaded.active_chat_id().is_none());
    }

    #[tokio::test]
    async fn test_missing_data_loads_empty() {
        let db = Database::new_in_memory().unwrap();
        let loaded = Persistence::new(db).load().await;
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_reads_stored_browser_shape() {
        let db = Database::new_in_memory().unwrap();
        let json = r#"[{"id":"c1","name":"Door","createdAt":1,"messages":[
            {"id":"c1-welcome","sender":"ai","text":"Hi!","timestamp":1,"isLoading":false,"isError":false},
            {"id":"2","sender":"user","text":"open a door","timestamp":2}
        ]}]"#;
        db.set(CHATS_KEY, json).await.unwrap();

        let loaded = Persistence::new(db).load().await;
        assert_eq!(loaded.chats().len(), 1);
        assert_eq!(loaded.active_chat_id(), Some("c1"));
        assert_eq!(loaded.chats()[0].user_message_count(), 1);
    }
}
