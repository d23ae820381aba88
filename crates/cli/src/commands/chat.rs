use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use cleanerio_core::config::{AppConfig, LoadOptions};
use cleanerio_core::{ChatSession, Role};
use cleanerio_store::JsonFileConversationStore;

use crate::client::HttpEnquiryClient;
use crate::commands::CommandResult;

const ASSISTANT_NAME: &str = "Robin";

const HELP: &str = "commands:
  /new [label]     start a conversation (default label `Conversation N`)
  /select <label>  switch to a conversation
  /delete <label>  delete a conversation
  /list            list conversations
  /export          write every conversation to `<active label>_history.json`
  /quit            leave the chat
anything else is sent to the assistant";

/// User id accepted at login. The password is required but not verified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    user_id: String,
}

impl Credentials {
    pub fn check(user_id: &str, password: &str) -> Result<Self, String> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err("a user id is required".to_string());
        }
        if password.trim().is_empty() {
            return Err("a password is required".to_string());
        }
        Ok(Self { user_id: user_id.to_string() })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShellCommand {
    Message(String),
    New(Option<String>),
    Select(String),
    Delete(String),
    List,
    Export,
    Help,
    Quit,
}

impl ShellCommand {
    /// `None` for blank input.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Some(Self::Message(line.to_string()));
        };

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };
        let command = match (name, argument) {
            ("new", "") => Self::New(None),
            ("new", label) => Self::New(Some(label.to_string())),
            ("select", label) if !label.is_empty() => Self::Select(label.to_string()),
            ("delete", label) if !label.is_empty() => Self::Delete(label.to_string()),
            ("list", _) => Self::List,
            ("export", _) => Self::Export,
            ("quit" | "exit", _) => Self::Quit,
            _ => Self::Help,
        };
        Some(command)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShellOutput {
    pub text: String,
    pub quit: bool,
}

impl ShellOutput {
    fn say(text: impl Into<String>) -> Self {
        Self { text: text.into(), quit: false }
    }
}

/// Line-oriented front end over one [`ChatSession`].
pub struct ChatShell {
    session: ChatSession,
    export_dir: PathBuf,
}

impl ChatShell {
    pub fn new(session: ChatSession, export_dir: impl Into<PathBuf>) -> Self {
        Self { session, export_dir: export_dir.into() }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Active label followed by its transcript.
    pub fn banner(&self) -> String {
        let mut lines = vec![format!("[{}]", self.session.active_label())];
        if let Some(conversation) = self.session.active_conversation() {
            for turn in conversation.turns() {
                let speaker = match turn.role {
                    Role::Assistant => ASSISTANT_NAME,
                    Role::User => self.session.user_id(),
                };
                lines.push(format!("{speaker}: {}", turn.content));
            }
        }
        lines.join("\n")
    }

    pub async fn handle(&mut self, command: ShellCommand) -> ShellOutput {
        match command {
            ShellCommand::Message(text) => match self.session.submit_and_reply(text).await {
                Ok(outcome) => ShellOutput::say(format!("{ASSISTANT_NAME}: {}", outcome.reply)),
                Err(error) => ShellOutput::say(format!("error: {error}")),
            },
            ShellCommand::New(label) => {
                let created = match label {
                    Some(label) => {
                        self.session.create_conversation(label.clone()).map(|()| label)
                    }
                    None => self.session.create_next_conversation(),
                };
                match created {
                    Ok(_) => self.persisted(self.banner()).await,
                    Err(error) => ShellOutput::say(format!("error: {error}")),
                }
            }
            ShellCommand::Select(label) => match self.session.select_conversation(&label) {
                Ok(()) => ShellOutput::say(self.banner_with_pending_reply().await),
                Err(error) => ShellOutput::say(format!("error: {error}")),
            },
            ShellCommand::Delete(label) => match self.session.delete_conversation(&label) {
                Ok(()) => {
                    let banner = self.banner_with_pending_reply().await;
                    self.persisted(format!("deleted `{label}`\n{banner}")).await
                }
                Err(error) => ShellOutput::say(format!("error: {error}")),
            },
            ShellCommand::List => ShellOutput::say(self.render_labels()),
            ShellCommand::Export => match self.export(&self.export_dir).await {
                Ok(path) => ShellOutput::say(format!("exported to {}", path.display())),
                Err(error) => ShellOutput::say(format!("error: {error}")),
            },
            ShellCommand::Help => ShellOutput::say(HELP),
            ShellCommand::Quit => {
                self.session.close();
                ShellOutput { text: "bye".to_string(), quit: true }
            }
        }
    }

    /// Banner, plus the answer to a trailing user turn left unanswered.
    pub async fn banner_with_pending_reply(&mut self) -> String {
        let banner = self.banner();
        match self.answer_pending().await {
            Some(reply) => format!("{banner}\n{reply}"),
            None => banner,
        }
    }

    async fn answer_pending(&mut self) -> Option<String> {
        if !self.session.needs_reply() {
            return None;
        }
        let line = match self.session.generate_reply().await {
            Ok(outcome) => format!("{ASSISTANT_NAME}: {}", outcome.reply),
            Err(error) => format!("error: {error}"),
        };
        Some(line)
    }

    async fn persisted(&self, text: String) -> ShellOutput {
        match self.session.persist().await {
            Ok(()) => ShellOutput::say(text),
            Err(error) => ShellOutput::say(format!("{text}\nwarning: not saved: {error}")),
        }
    }

    fn render_labels(&self) -> String {
        self.session
            .conversations()
            .labels()
            .map(|label| {
                let marker = if label == self.session.active_label() { "*" } else { " " };
                format!("{marker} {label}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn export(&self, dir: &Path) -> Result<PathBuf, String> {
        let (file_name, body) = self.session.export_active().map_err(|error| error.to_string())?;
        let mut components = Path::new(&file_name).components();
        let plain =
            matches!((components.next(), components.next()), (Some(Component::Normal(_)), None));
        if !plain || file_name.contains(['/', '\\', '\0']) {
            return Err(format!(
                "label `{}` cannot be used as a file name; rename it without path separators",
                self.session.active_label()
            ));
        }
        let path = dir.join(file_name);
        tokio::fs::write(&path, body)
            .await
            .map_err(|error| format!("could not write `{}`: {error}", path.display()))?;
        Ok(path)
    }
}

pub fn run(user_id: &str, password: &str, export_dir: Option<PathBuf>) -> CommandResult {
    let credentials = match Credentials::check(user_id, password) {
        Ok(credentials) => credentials,
        Err(message) => return CommandResult::failure("chat", "credentials", message, 2),
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    crate::init_logging(&config);

    let client = match HttpEnquiryClient::from_config(&config.client) {
        Ok(client) => client,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "client_init",
                format!("failed to build enquiry client: {error}"),
                3,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let store = Arc::new(JsonFileConversationStore::new(config.storage.conversations_dir.clone()));
    let export_dir = export_dir.unwrap_or_else(|| PathBuf::from("."));

    let result = runtime.block_on(async {
        let session = ChatSession::open(credentials.user_id(), Arc::new(client), store)
            .await
            .map_err(|error| ("persistence", error.to_string(), 4u8))?;
        let mut shell = ChatShell::new(session, export_dir);
        repl(&mut shell).await.map_err(|error| ("terminal", error.to_string(), 5u8))?;
        Ok::<usize, (&'static str, String, u8)>(shell.session().conversations().len())
    });

    match result {
        Ok(conversations) => CommandResult::success(
            "chat",
            format!("chat ended for `{}` with {conversations} conversation(s) saved", credentials.user_id()),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}

async fn repl(shell: &mut ChatShell) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let banner = shell.banner_with_pending_reply().await;
    write_block(&mut stdout, &format!("{banner}\n(type /help for commands)")).await?;
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            shell.session().close();
            return Ok(());
        };
        let Some(command) = ShellCommand::parse(&line) else {
            continue;
        };

        let output = shell.handle(command).await;
        write_block(&mut stdout, &output.text).await?;
        if output.quit {
            return Ok(());
        }
    }
}

async fn write_block(stdout: &mut tokio::io::Stdout, text: &str) -> std::io::Result<()> {
    stdout.write_all(text.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use cleanerio_core::{
        ChatSession, Conversation, ConversationSet, ConversationStore, DispatchError, Reply,
        ReplyDispatcher, Turn, FALLBACK_REPLY, GREETING,
    };
    use cleanerio_store::InMemoryConversationStore;

    use super::{ChatShell, Credentials, ShellCommand};

    struct Echo;

    #[async_trait]
    impl ReplyDispatcher for Echo {
        async fn dispatch(
            &self,
            text: &str,
            _cancel: &CancellationToken,
        ) -> Result<Reply, DispatchError> {
            Ok(Reply::new(format!("echo: {text}")))
        }
    }

    struct Down;

    #[async_trait]
    impl ReplyDispatcher for Down {
        async fn dispatch(
            &self,
            _text: &str,
            _cancel: &CancellationToken,
        ) -> Result<Reply, DispatchError> {
            Err(DispatchError::OracleUnavailable("connection refused".to_string()))
        }
    }

    async fn shell(dispatcher: Arc<dyn ReplyDispatcher>, export_dir: &std::path::Path) -> ChatShell {
        let session =
            ChatSession::open("alice", dispatcher, Arc::new(InMemoryConversationStore::default()))
                .await
                .expect("session");
        ChatShell::new(session, export_dir)
    }

    #[test]
    fn credentials_require_user_and_password() {
        assert!(Credentials::check("", "secret").is_err());
        assert!(Credentials::check("alice", "  ").is_err());
        let credentials = Credentials::check(" alice ", "secret").expect("accepted");
        assert_eq!(credentials.user_id(), "alice");
    }

    #[test]
    fn parse_recognises_commands_and_messages() {
        assert_eq!(ShellCommand::parse("   "), None);
        assert_eq!(
            ShellCommand::parse("I need a cleaner"),
            Some(ShellCommand::Message("I need a cleaner".to_string()))
        );
        assert_eq!(ShellCommand::parse("/new"), Some(ShellCommand::New(None)));
        assert_eq!(
            ShellCommand::parse("/new Kitchen deep clean"),
            Some(ShellCommand::New(Some("Kitchen deep clean".to_string())))
        );
        assert_eq!(
            ShellCommand::parse("/select Conversation 2"),
            Some(ShellCommand::Select("Conversation 2".to_string()))
        );
        assert_eq!(ShellCommand::parse("/select"), Some(ShellCommand::Help));
        assert_eq!(ShellCommand::parse("/exit"), Some(ShellCommand::Quit));
    }

    #[tokio::test]
    async fn banner_shows_greeting_for_new_user() {
        let dir = tempfile::tempdir().expect("tempdir");
        let shell = shell(Arc::new(Echo), dir.path()).await;

        let banner = shell.banner();

        assert!(banner.starts_with("[Conversation 1]"));
        assert!(banner.contains("Robin: Hello, I am Robin from Cleaner.io."));
    }

    #[tokio::test]
    async fn message_gets_assistant_reply() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut shell = shell(Arc::new(Echo), dir.path()).await;

        let output = shell.handle(ShellCommand::Message("hello".to_string())).await;

        assert_eq!(output.text, "Robin: echo: hello");
        let conversation = shell.session().active_conversation().expect("active");
        assert_eq!(conversation.len(), 3);
    }

    #[tokio::test]
    async fn outage_prints_apology() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut shell = shell(Arc::new(Down), dir.path()).await;

        let output = shell.handle(ShellCommand::Message("hello".to_string())).await;

        assert_eq!(output.text, format!("Robin: {FALLBACK_REPLY}"));
    }

    #[tokio::test]
    async fn new_list_and_delete_conversations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut shell = shell(Arc::new(Echo), dir.path()).await;

        shell.handle(ShellCommand::New(None)).await;
        assert_eq!(shell.session().active_label(), "Conversation 2");

        let listing = shell.handle(ShellCommand::List).await;
        assert_eq!(listing.text, "  Conversation 1\n* Conversation 2");

        let missing = shell.handle(ShellCommand::Select("Conversation 9".to_string())).await;
        assert!(missing.text.starts_with("error:"));
        assert_eq!(shell.session().active_label(), "Conversation 2");

        shell.handle(ShellCommand::Delete("Conversation 2".to_string())).await;
        assert_eq!(shell.session().active_label(), "Conversation 1");
    }

    async fn shell_with_pending(dispatcher: Arc<dyn ReplyDispatcher>) -> ChatShell {
        let mut stored = ConversationSet::seeded();
        stored
            .insert(
                "Pending",
                Conversation::from_turns(vec![Turn::assistant(GREETING), Turn::user("price?")]),
            )
            .expect("insert pending");
        let store = Arc::new(InMemoryConversationStore::default());
        store.save("alice", &stored).await.expect("seed store");
        let session = ChatSession::open("alice", dispatcher, store).await.expect("session");
        ChatShell::new(session, std::env::temp_dir())
    }

    #[tokio::test]
    async fn selecting_unanswered_conversation_answers_it() {
        let mut shell = shell_with_pending(Arc::new(Echo)).await;

        let output = shell.handle(ShellCommand::Select("Pending".to_string())).await;

        assert!(output.text.starts_with("[Pending]"));
        assert!(output.text.ends_with("alice: price?\nRobin: echo: price?"));
        assert!(!shell.session().needs_reply());

        let next = shell.handle(ShellCommand::Message("hello?".to_string())).await;
        assert_eq!(next.text, "Robin: echo: hello?");
        let conversation = shell.session().active_conversation().expect("active");
        assert_eq!(conversation.len(), 5);
    }

    #[tokio::test]
    async fn opening_on_unanswered_conversation_answers_it() {
        let mut stored = ConversationSet::default();
        stored
            .insert(
                "Pending",
                Conversation::from_turns(vec![Turn::assistant(GREETING), Turn::user("price?")]),
            )
            .expect("insert pending");
        let store = Arc::new(InMemoryConversationStore::default());
        store.save("alice", &stored).await.expect("seed store");
        let session =
            ChatSession::open("alice", Arc::new(Echo), store.clone()).await.expect("session");
        let mut shell = ChatShell::new(session, std::env::temp_dir());
        assert!(shell.session().needs_reply());

        let banner = shell.banner_with_pending_reply().await;

        assert!(banner.ends_with("Robin: echo: price?"));
        let saved = store.load("alice").await.expect("reload");
        let last = saved.get("Pending").and_then(Conversation::last_turn).cloned();
        assert_eq!(last, Some(Turn::assistant("echo: price?")));
    }

    #[tokio::test]
    async fn deleting_onto_unanswered_conversation_answers_it() {
        let mut shell = shell_with_pending(Arc::new(Down)).await;

        let output = shell.handle(ShellCommand::Delete("Conversation 1".to_string())).await;

        assert_eq!(shell.session().active_label(), "Pending");
        assert!(output.text.contains(&format!("Robin: {FALLBACK_REPLY}")));
        assert!(!shell.session().needs_reply());
    }

    #[tokio::test]
    async fn export_writes_every_conversation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut shell = shell(Arc::new(Echo), dir.path()).await;
        shell.handle(ShellCommand::Message("hello".to_string())).await;
        shell.handle(ShellCommand::New(Some("Kitchen".to_string()))).await;

        let output = shell.handle(ShellCommand::Export).await;

        let path = dir.path().join("Kitchen_history.json");
        assert_eq!(output.text, format!("exported to {}", path.display()));
        let raw = std::fs::read_to_string(&path).expect("export file");
        let exported: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(exported["Conversation 1"].as_array().map(Vec::len), Some(3));
        assert_eq!(exported["Kitchen"].as_array().map(Vec::len), Some(1));
        assert!(raw.contains("\n    \"Conversation 1\": ["));
    }

    #[tokio::test]
    async fn export_refuses_labels_that_leave_the_directory() {
        let root = tempfile::tempdir().expect("tempdir");
        let export_dir = root.path().join("exports");
        std::fs::create_dir(&export_dir).expect("export dir");
        let mut shell = shell(Arc::new(Echo), &export_dir).await;

        for label in ["../escape", "nested/inside", "..\\escape"] {
            shell.handle(ShellCommand::New(Some(label.to_string()))).await;
            let output = shell.handle(ShellCommand::Export).await;
            assert!(output.text.starts_with("error: label"), "{label}: {}", output.text);
        }

        assert!(!root.path().join("escape_history.json").exists());
        assert_eq!(std::fs::read_dir(&export_dir).expect("list exports").count(), 0);
    }

    #[tokio::test]
    async fn quit_closes_session() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut shell = shell(Arc::new(Echo), dir.path()).await;
        let token = shell.session().cancellation_token();

        let output = shell.handle(ShellCommand::Quit).await;

        assert!(output.quit);
        assert!(token.is_cancelled());
    }
}
