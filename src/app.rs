use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};

use robocoach::config::{APP_NAME, INITIAL_WELCOME_MESSAGE, MISSING_CREDENTIAL_ERROR};
use robocoach::models::{Chat, Message, Sender};
use robocoach::services::parser::fence_code;
use robocoach::services::SessionController;

const HELP: &str = "Commands:
  /new                  start a new chat
  /list                 list chats
  /select <n>           switch to chat n
  /delete <n>           delete chat n
  /rename <n> <name>    rename chat n
  /analyze [question]   paste an error log, end with a line containing only '.'
  /key <access key>     unlock this device
  /quit                 exit
Anything else is sent to the active chat.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    New,
    List,
    Select(usize),
    Delete(usize),
    Rename(usize, String),
    Analyze(String),
    Key(String),
    Help,
    Quit,
    Send(String),
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(Command::Send(line.to_string()));
        };

        let (name, args) = rest.split_once(' ').unwrap_or((rest, ""));
        let args = args.trim();
        let index = |s: &str| s.parse::<usize>().ok().filter(|n| *n > 0);

        let cmd = match name {
            "new" => Command::New,
            "list" => Command::List,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "analyze" => Command::Analyze(args.to_string()),
            "key" if args.is_empty() => Command::Invalid("usage: /key <access key>".into()),
            "key" => Command::Key(args.to_string()),
            "select" => match index(args) {
                Some(n) => Command::Select(n),
                None => Command::Invalid("usage: /select <n>".into()),
            },
            "delete" => match index(args) {
                Some(n) => Command::Delete(n),
                None => Command::Invalid("usage: /delete <n>".into()),
            },
            "rename" => {
                let (n, name) = args.split_once(' ').unwrap_or((args, ""));
                match (index(n), name.trim()) {
                    (Some(n), name) if !name.is_empty() => Command::Rename(n, name.to_string()),
                    _ => Command::Invalid("usage: /rename <n> <name>".into()),
                }
            }
            other => Command::Invalid(format!("unknown command /{}, try /help", other)),
        };
        Some(cmd)
    }
}

pub fn render_message(msg: &Message) -> String {
    let label = match (msg.sender, msg.is_error) {
        (Sender::User, _) => "you".to_string(),
        (Sender::Ai, false) => APP_NAME.to_string(),
        (Sender::Ai, true) => format!("{} (error)", APP_NAME),
    };
    let mut out = format!("[{}]", label);
    if let Some(text) = &msg.text {
        out.push('\n');
        out.push_str(text);
    }
    if let Some(code) = &msg.code {
        out.push('\n');
        out.push_str(&fence_code(code));
    }
    out
}

fn render_chat_list(chats: &[Chat], active: Option<&str>) -> String {
    if chats.is_empty() {
        return "No chats yet. Use /new to start one.".to_string();
    }
    chats
        .iter()
        .enumerate()
        .map(|(i, chat)| {
            let marker = if Some(chat.id.as_str()) == active { '*' } else { ' ' };
            format!("{} {}. {} ({} messages)", marker, i + 1, chat.name, chat.messages.len())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct App {
    controller: SessionController,
    input: Lines<BufReader<Stdin>>,
    out: Stdout,
}

impl App {
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller,
            input: BufReader::new(tokio::io::stdin()).lines(),
            out: tokio::io::stdout(),
        }
    }

    async fn print(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await?;
        Ok(())
    }

    fn chat_id_at(&self, n: usize) -> Option<String> {
        self.controller
            .store()
            .chats()
            .get(n - 1)
            .map(|c| c.id.clone())
    }

    async fn print_active_chat(&mut self) -> Result<()> {
        let rendered = match self.controller.active_chat() {
            Some(chat) => {
                let mut lines = vec![format!("== {} ==", chat.name)];
                lines.extend(chat.messages.iter().map(render_message));
                lines.join("\n\n")
            }
            None => INITIAL_WELCOME_MESSAGE.to_string(),
        };
        self.print(&rendered).await
    }

    async fn print_last_reply(&mut self) -> Result<()> {
        let rendered = self
            .controller
            .active_chat()
            .and_then(|c| c.messages.last())
            .map(render_message);
        if let Some(rendered) = rendered {
            self.print(&rendered).await?;
        }
        Ok(())
    }

    async fn read_error_log(&mut self) -> Result<String> {
        self.print("Paste the error log, then a line with a single '.':").await?;
        let mut log = Vec::new();
        while let Some(line) = self.input.next_line().await? {
            if line.trim() == "." {
                break;
            }
            log.push(line);
        }
        Ok(log.join("\n"))
    }

    pub async fn run(mut self) -> Result<()> {
        if !self.controller.context().has_credential() {
            self.print(MISSING_CREDENTIAL_ERROR).await?;
        } else if !self.controller.context().is_unlocked() {
            self.print("This device is locked. Enter an access key with /key <key>.").await?;
        }
        self.print_active_chat().await?;
        self.print(HELP).await?;

        while let Some(line) = self.input.next_line().await? {
            let Some(command) = Command::parse(&line) else {
                continue;
            };

            match command {
                Command::Quit => break,
                Command::Help => self.print(HELP).await?,
                Command::Invalid(msg) => self.print(&msg).await?,
                Command::List => {
                    let store = self.controller.store();
                    let listing = render_chat_list(store.chats(), store.active_chat_id());
                    self.print(&listing).await?;
                }
                Command::New => match self.controller.new_chat().await {
                    Some(_) => self.print_active_chat().await?,
                    None => self.print("Cannot start a chat: sending is disabled.").await?,
                },
                Command::Select(n) => match self.chat_id_at(n) {
                    Some(id) => {
                        self.controller.select_chat(&id).await;
                        self.print_active_chat().await?;
                    }
                    None => self.print("No such chat.").await?,
                },
                Command::Delete(n) => match self.chat_id_at(n) {
                    Some(id) => {
                        self.controller.delete_chat(&id).await;
                        self.print("Chat deleted.").await?;
                    }
                    None => self.print("No such chat.").await?,
                },
                Command::Rename(n, name) => match self.chat_id_at(n) {
                    Some(id) => {
                        self.controller.rename_chat(&id, &name).await;
                    }
                    None => self.print("No such chat.").await?,
                },
                Command::Key(key) => {
                    let result = self.controller.context_mut().claim_access_key(&key).await;
                    match result {
                        Ok(()) => self.print("Access key accepted.").await?,
                        Err(e) => self.print(&e.to_string()).await?,
                    }
                }
                Command::Analyze(question) => {
                    let log = self.read_error_log().await?;
                    if self.controller.analyze_error(&question, &log).await {
                        self.print_last_reply().await?;
                    } else {
                        self.print("Nothing sent: an error log and an active chat are required.")
                            .await?;
                    }
                }
                Command::Send(text) => {
                    if self.controller.send_message(&text).await {
                        self.print_last_reply().await?;
                    } else {
                        self.print("Nothing sent: start a chat with /new first.").await?;
                    }
                }
            }
        }

        Ok(())
    }
}
