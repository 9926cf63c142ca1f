use std::collections::HashSet;

use uuid::Uuid;

use super::context::SessionContext;
use super::generation::GenerationClient;
use super::persistence::Persistence;
use super::store::ConversationStore;
use crate::config::{ERROR_ANALYSIS_CHAT_NAME, PLACEHOLDER_CHAT_NAME};
use crate::models::{now_millis, Chat, Message};

/// How a chat gets its title when a send goes out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Naming {
    Keep,
    Generate(String),
    Fixed(String),
}

/// A send that has been accepted and is waiting for the model.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub chat_id: String,
    pub prompt: String,
    pub history: Vec<Message>,
    pub naming: Naming,
}

/// Build the prompt for an error-log analysis request.
pub fn error_analysis_prompt(question: &str, error_log: &str) -> String {
    let question = question.trim();
    let mut prompt = String::from("User Query: ");
    if question.is_empty() {
        prompt.push_str("(No specific query provided with the error)\n\n");
    } else {
        prompt.push_str(question);
        prompt.push_str("\n\n");
    }
    prompt.push_str(&format!(
        "Error Log:\n```\n{}\n```\n\nPlease analyze this Roblox Lua error.",
        error_log.trim()
    ));
    prompt
}

/// Drives user actions against the store and the generation client.
///
/// Each chat is either idle or awaiting a response. Only one request per chat
/// may be outstanding; further sends to that chat are ignored until it settles.
pub struct SessionController {
    store: ConversationStore,
    persistence: Persistence,
    generation: GenerationClient,
    context: SessionContext,
    awaiting: HashSet<String>,
}

impl SessionController {
    pub async fn load(
        persistence: Persistence,
        generation: GenerationClient,
        context: SessionContext,
    ) -> Self {
        let store = persistence.load().await;
        Self {
            store,
            persistence,
            generation,
            context,
            awaiting: HashSet::new(),
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn active_chat(&self) -> Option<&Chat> {
        self.store.active_chat()
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut SessionContext {
        &mut self.context
    }

    pub fn is_loading(&self, chat_id: &str) -> bool {
        self.awaiting.contains(chat_id)
    }

    /// Whether this session may talk to the model at all.
    pub fn can_send(&self) -> bool {
        self.context.has_credential()
            && self.generation.has_credential()
            && self.context.is_unlocked()
    }

    async fn persist(&self) {
        self.persistence.save(&self.store).await;
    }

    pub async fn new_chat(&mut self) -> Option<String> {
        if !self.can_send() {
            tracing::debug!("New chat ignored: sending is disabled");
            return None;
        }
        let id = self.store.create_chat(now_millis()).id.clone();
        self.persist().await;
        Some(id)
    }

    pub async fn select_chat(&mut self, chat_id: &str) -> bool {
        let changed = self.store.select_chat(chat_id);
        if changed {
            self.persist().await;
        }
        changed
    }

    pub async fn delete_chat(&mut self, chat_id: &str) -> bool {
        let removed = self.store.delete_chat(chat_id);
        if removed {
            self.awaiting.remove(chat_id);
            self.persist().await;
        }
        removed
    }

    pub async fn rename_chat(&mut self, chat_id: &str, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let renamed = self.store.rename_chat(chat_id, name);
        if renamed {
            self.persist().await;
        }
        renamed
    }

    /// Accept a send for the active chat: append the user message right away
    /// and mark the chat as awaiting a response.
    ///
    /// Returns `None` when there is no active chat, sending is disabled, the
    /// text is blank, or the chat already has a request in flight.
    pub async fn begin_send(&mut self, text: &str, error_analysis: bool) -> Option<PendingTurn> {
        let text = text.trim();
        if text.is_empty() || !self.can_send() {
            return None;
        }

        let chat = self.store.active_chat()?;
        if self.awaiting.contains(&chat.id) {
            tracing::debug!(chat_id = %chat.id, "Send ignored: response still outstanding");
            return None;
        }

        let first_user_message = chat.user_message_count() == 0;
        let unnamed = first_user_message || chat.name == PLACEHOLDER_CHAT_NAME;
        let naming = if error_analysis && unnamed {
            Naming::Fixed(ERROR_ANALYSIS_CHAT_NAME.to_string())
        } else if first_user_message {
            Naming::Generate(text.to_string())
        } else {
            Naming::Keep
        };

        let pending = PendingTurn {
            chat_id: chat.id.clone(),
            prompt: text.to_string(),
            history: chat.messages.clone(),
            naming,
        };

        let user_message =
            Message::user(Uuid::new_v4().to_string(), text.to_string(), now_millis());
        self.store.append_messages(&pending.chat_id, vec![user_message]);
        self.awaiting.insert(pending.chat_id.clone());
        self.persist().await;

        Some(pending)
    }

    /// Settle a pending send: apply the title, append the reply, and return
    /// the chat to idle. Runs the same way for successful and error replies.
    pub async fn complete_send(
        &mut self,
        turn: PendingTurn,
        reply: Message,
        title: Option<String>,
    ) {
        if let Some(title) = title {
            self.store.rename_chat(&turn.chat_id, &title);
        }
        self.store.append_messages(&turn.chat_id, vec![reply]);
        self.awaiting.remove(&turn.chat_id);
        self.persist().await;
    }

    /// Run a pending turn against the model. Title generation for the first
    /// message runs alongside the conversation request.
    pub async fn run_turn(&self, turn: &PendingTurn) -> (Message, Option<String>) {
        match &turn.naming {
            Naming::Generate(seed) => {
                let (title, reply) = tokio::join!(
                    self.generation.generate_title(seed),
                    self.generation.converse(&turn.prompt, &turn.history)
                );
                (reply, Some(title))
            }
            Naming::Fixed(name) => {
                let reply = self.generation.converse(&turn.prompt, &turn.history).await;
                (reply, Some(name.clone()))
            }
            Naming::Keep => {
                let reply = self.generation.converse(&turn.prompt, &turn.history).await;
                (reply, None)
            }
        }
    }

    /// Send a chat message to the active chat. Returns `false` if the send was
    /// rejected.
    pub async fn send_message(&mut self, text: &str) -> bool {
        self.send(text, false).await
    }

    /// Submit an error log, with an optional question, for analysis.
    pub async fn analyze_error(&mut self, question: &str, error_log: &str) -> bool {
        if error_log.trim().is_empty() {
            return false;
        }
        let prompt = error_analysis_prompt(question, error_log);
        self.send(&prompt, true).await
    }

    async fn send(&mut self, text: &str, error_analysis: bool) -> bool {
        let Some(turn) = self.begin_send(text, error_analysis).await else {
            return false;
        };
        let (reply, title) = self.run_turn(&turn).await;
        self.complete_send(turn, reply, title).await;
        true
    }
}
