use std::path::PathBuf;

pub const APP_ID: &str = "com.robocoach.RoboCoach";
pub const APP_NAME: &str = "RoboCoach";

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Name a chat carries until its first real message is sent.
pub const PLACEHOLDER_CHAT_NAME: &str = "New Scripting Chat";
/// Title used when title generation fails or returns nothing usable.
pub const DEFAULT_CHAT_TITLE: &str = "Chat";
pub const ERROR_ANALYSIS_CHAT_NAME: &str = "Error Analysis";

pub const MISSING_CREDENTIAL_ERROR: &str = "GEMINI_API_KEY is not set or the provided key is invalid. RoboCoach needs a valid API key to function.";
pub const SERVER_OVERLOAD_ERROR_MESSAGE: &str = "Servers are full, please try again later.";
pub const UNPARSEABLE_RESPONSE_MESSAGE: &str =
    "I'm not sure how to respond to that. Could you try rephrasing?";

pub const INITIAL_WELCOME_MESSAGE: &str = "Hello there, I'm RoboCoach! Your Roblox Lua scripting and debugging assistant. Start a new chat or use the error analysis tool to get started!";
pub const NEW_CHAT_WELCOME_MESSAGE: &str = "Hi! I'm RoboCoach, your dedicated assistant for this chat. What Roblox Lua script can I help you with today? Feel free to ask about coding, game logic, or paste an error for me to analyze!";

pub const SYSTEM_INSTRUCTION: &str = r#"You are RoboCoach, an expert Roblox Studio Lua game development assistant.
You are incredibly knowledgeable and can help with any Roblox Lua scripting task, game design concepts, and debugging errors.
Your personality is confident, friendly, and helpful. You always refer to yourself as RoboCoach.

When a user asks you to write Lua code, provide ONLY the Lua code itself, correctly enclosed in Markdown code blocks like this, and nothing else (no explanations unless explicitly asked):
```lua
-- Lua code here
print("Hello from Roblox!")
```

If a user provides a Lua error message from Roblox Studio (often formatted by the application with "Error Log:" and/or "User Query:"), you MUST meticulously analyze it.
1. Explain what the error means in simple terms.
2. Identify the likely cause(s) of the error in the context of Roblox Lua scripting.
3. Provide specific suggestions on how to fix the Lua code.
4. If the error is ambiguous or lacks context, you can ask clarifying questions about the surrounding code or what the user was trying to achieve.
When providing code fixes, use Lua Markdown code blocks.

You remember the entire conversation history within the current chat.
Never say you are an AI, a language model, or that you cannot perform a task you are programmed for. You are RoboCoach.
Focus on providing clear, actionable advice and code for Roblox development.
Keep your text responses concise and to the point unless asked for detailed explanations.
If you cannot fulfill a request that is outside of Roblox development (e.g., asking for Python code), politely state that you specialize in Roblox Lua scripting and development help.
"#;

pub fn title_prompt(first_message: &str) -> String {
    format!(
        "\nGenerate a very short and concise title (2-4 words maximum, ideally 2-3 words) for a chat conversation that starts with the following user message.\n\
         Output ONLY the title itself, with no prefixes like \"Title:\", no quotation marks, and no extra explanation.\n\
         User message: \"{}\"\n\
         Title:",
        first_message
    )
}

// Durable storage keys
pub const CHATS_KEY: &str = "robocoach-chats";
pub const ACTIVE_CHAT_KEY: &str = "robocoach-last-active-chat-id";
pub const ACCESS_KEY_KEY: &str = "robocoach-access-key";
pub const DEVICE_ID_KEY: &str = "robocoach-device-id";
pub const KEY_CLAIMS_KEY: &str = "robocoach-key-claims";

#[derive(Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub data_dir: PathBuf,
    pub access_keys: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_blank("GEMINI_API_KEY")
            .or_else(|| non_blank("ROBOCOACH_API_KEY"))
            .map(|k| k.trim().to_string());

        let data_dir = non_blank("ROBOCOACH_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let base = non_blank("XDG_DATA_HOME")
                    .map(PathBuf::from)
                    .or_else(|| non_blank("HOME").map(|h| PathBuf::from(h).join(".local/share")))
                    .unwrap_or_else(|| PathBuf::from("."));
                base.join("robocoach")
            });

        let access_keys = non_blank("ROBOCOACH_ACCESS_KEYS")
            .map(|keys| {
                keys.split(',')
                    .map(|k| k.trim().to_string())
                    .filter(|k| !k.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            api_key,
            model: non_blank("ROBOCOACH_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: non_blank("ROBOCOACH_BASE_URL"),
            temperature: non_blank("ROBOCOACH_TEMPERATURE")
                .and_then(|t| t.trim().parse::<f32>().ok())
                .filter(|t| (0.0..=2.0).contains(t)),
            data_dir,
            access_keys,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("robocoach.db")
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("data_dir", &self.data_dir)
            .field("access_keys", &format!("[{} keys]", self.access_keys.len()))
            .finish()
    }
}
