//! Interactive chat session.
//!
//! One line is handled completely, network round-trip included, before the
//! next one is read. A reply is committed to the transcript only after it has
//! fully arrived; a failed or interrupted turn leaves whatever was already
//! printed on screen and nothing in the transcript.

use crate::commands::{Command, CommandDispatcher, handler};
use crate::config::{Config, Provider};
use crate::core::error::ChatError;
use crate::display;
use crate::input::{InputEvent, LineSource};
use crate::providers::{ChatRequest, ChatTransport};
use crate::stream::{DeltaAggregator, ServiceUsage, decode_stream};
use crate::transcript::{Message, Transcript, UsageEstimate};
use futures::StreamExt;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Settings fixed when the session is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub provider: Provider,
    pub model: String,
    pub stream: bool,
    pub system_prompt: Option<String>,
    /// Model to use after switching to a provider. Providers without an
    /// entry fall back to their stock default.
    pub provider_models: HashMap<Provider, String>,
}

/// How the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// `/exit` or `/quit`.
    Exited,
    /// The input source reached its end.
    InputClosed,
    /// Ctrl-C, at the prompt or mid-turn.
    Interrupted,
}

/// Resolves once the interrupt flag is raised. Never resolves if the sender
/// is gone.
async fn interrupted(interrupt: &mut watch::Receiver<bool>) {
    if interrupt.wait_for(|raised| *raised).await.is_err() {
        std::future::pending::<()>().await;
    }
}

pub struct ChatSession<W: Write> {
    transport: Box<dyn ChatTransport>,
    out: W,
    interrupt: watch::Receiver<bool>,
    dispatcher: CommandDispatcher,
    transcript: Transcript,
    provider: Provider,
    model: String,
    model_pinned: bool,
    provider_models: HashMap<Provider, String>,
    stream: bool,
    history_dir: PathBuf,
    last_reply: Option<UsageEstimate>,
    last_usage: Option<ServiceUsage>,
}

impl<W: Write> ChatSession<W> {
    pub fn new(
        config: SessionConfig,
        transport: Box<dyn ChatTransport>,
        out: W,
        interrupt: watch::Receiver<bool>,
    ) -> Self {
        Self {
            transport,
            out,
            interrupt,
            dispatcher: CommandDispatcher::new(),
            transcript: Transcript::new(config.system_prompt.as_deref()),
            provider: config.provider,
            model: config.model,
            model_pinned: false,
            provider_models: config.provider_models,
            stream: config.stream,
            history_dir: Config::history_dir(),
            last_reply: None,
            last_usage: None,
        }
    }

    /// Directory `/save` writes into.
    #[cfg(test)]
    pub fn with_history_dir(mut self, dir: PathBuf) -> Self {
        self.history_dir = dir;
        self
    }

    #[cfg(test)]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[cfg(test)]
    pub fn provider(&self) -> Provider {
        self.provider
    }

    #[cfg(test)]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[cfg(test)]
    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        self.dispatcher.command_names()
    }

    /// Runs until `/exit`, end of input or an interrupt.
    ///
    /// Only a broken input source (or a broken output sink) is returned as an
    /// error; every other failure is reported and the loop continues.
    pub async fn run<L>(&mut self, mut input: L) -> Result<SessionOutcome, ChatError>
    where
        L: LineSource + Send + 'static,
    {
        display::display_banner(&mut self.out, self.provider, &self.model, self.stream)?;

        let outcome = loop {
            let mut interrupt = self.interrupt.clone();
            let read = tokio::task::spawn_blocking(move || {
                let event = input.read_line();
                (input, event)
            });

            let (returned, event) = tokio::select! {
                joined = read => joined
                    .map_err(|e| ChatError::FatalInput(format!("input reader failed: {}", e)))?,
                _ = interrupted(&mut interrupt) => {
                    // the reader is still blocked and is left to the process teardown
                    return Ok(SessionOutcome::Interrupted);
                }
            };
            input = returned;

            let line = match event? {
                InputEvent::Line(line) => line,
                InputEvent::Interrupted => break SessionOutcome::Interrupted,
                InputEvent::Closed => break SessionOutcome::InputClosed,
            };

            if let Some(outcome) = self.handle_line(&line).await? {
                break outcome;
            }
        };

        if let Err(e) = input.finish() {
            warn!("failed to close input: {}", e);
        }
        info!(?outcome, messages = self.transcript.len(), "session ended");
        Ok(outcome)
    }

    /// Handles one input line. `Some` ends the session.
    pub async fn handle_line(&mut self, line: &str) -> Result<Option<SessionOutcome>, ChatError> {
        let command = match self.dispatcher.dispatch(line) {
            Ok(command) => command,
            Err(e) => {
                display::display_error(&mut self.out, &e)?;
                return Ok(None);
            }
        };

        let result = self.execute(command).await;
        self.dispatcher.complete();

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("turn failed: {}", e);
                display::display_error(&mut self.out, &e)?;
                Ok(None)
            }
        }
    }

    async fn execute(&mut self, command: Command) -> Result<Option<SessionOutcome>, ChatError> {
        match command {
            Command::Help => {
                display::display_notice(&mut self.out, &handler::help_text())?;
            }
            Command::Exit => return Ok(Some(SessionOutcome::Exited)),
            Command::ClearHistory => {
                self.transcript.clear(true);
                self.last_reply = None;
                self.last_usage = None;
                display::display_notice(&mut self.out, "Chat history cleared.")?;
            }
            Command::ShowProvider => {
                let text = format!("Current provider: {} (model: {})", self.provider, self.model);
                display::display_notice(&mut self.out, &text)?;
            }
            Command::SwitchProvider(name) => {
                let provider: Provider = name.parse()?;
                info!(from = %self.provider, to = %provider, "switching provider");
                self.provider = provider;
                let text = if self.model_pinned {
                    format!("Provider changed to: {} (model kept: {})", provider, self.model)
                } else {
                    self.model = self
                        .provider_models
                        .get(&provider)
                        .cloned()
                        .unwrap_or_else(|| provider.default_model().to_string());
                    format!("Provider changed to: {} (model: {})", provider, self.model)
                };
                display::display_notice(&mut self.out, &text)?;
            }
            Command::ShowModel => {
                let text = format!("Current model: {}", self.model);
                display::display_notice(&mut self.out, &text)?;
            }
            Command::SwitchModel(model) => {
                info!(from = %self.model, to = %model, "switching model");
                self.model = model;
                self.model_pinned = true;
                let text = format!("Model changed to: {}", self.model);
                display::display_notice(&mut self.out, &text)?;
            }
            Command::ShowTokens => {
                let text = handler::tokens_report(&self.transcript, self.last_reply, self.last_usage);
                display::display_notice(&mut self.out, &text)?;
            }
            Command::History => {
                display::display_notice(&mut self.out, &handler::history_text(&self.transcript))?;
            }
            Command::Save(filename) => {
                let path =
                    handler::save_transcript(&self.transcript, &self.history_dir, filename.as_deref())?;
                let text = format!("History saved to: {}", path.display());
                display::display_notice(&mut self.out, &text)?;
            }
            Command::UnknownCommand(raw) => return Err(ChatError::UnknownCommand(raw)),
            Command::ChatTurn(text) => {
                if !self.chat_turn(text).await? {
                    return Ok(Some(SessionOutcome::Interrupted));
                }
            }
        }
        Ok(None)
    }

    /// Sends the transcript and commits the reply. Returns `false` when the
    /// turn was interrupted.
    ///
    /// The user message stays in the transcript even when the call fails, so
    /// the next turn still carries it as context.
    async fn chat_turn(&mut self, text: String) -> Result<bool, ChatError> {
        self.transcript.append(Message::user(text));

        let request = ChatRequest {
            provider: self.provider,
            model: self.model.clone(),
            messages: self.transcript.snapshot(),
            system_prompt: self.transcript.system_prompt().map(str::to_owned),
        };

        let reply = if self.stream {
            self.stream_reply(&request).await?
        } else {
            self.await_reply(&request).await?
        };

        let Some(content) = reply else {
            info!("turn interrupted; nothing committed");
            return Ok(false);
        };

        if content.trim().is_empty() {
            warn!("service returned an empty reply");
        }
        self.last_reply = Some(UsageEstimate::of_text(&content));
        self.transcript.append(Message::assistant(content));
        debug!(messages = self.transcript.len(), "assistant reply committed");
        Ok(true)
    }

    /// Streams a reply through a decoder and aggregator owned by this call.
    async fn stream_reply(&mut self, request: &ChatRequest) -> Result<Option<String>, ChatError> {
        let mut interrupt = self.interrupt.clone();

        let chunks = tokio::select! {
            chunks = self.transport.send_streaming(request) => chunks?,
            _ = interrupted(&mut interrupt) => return Ok(None),
        };

        let mut records = decode_stream(chunks);
        let mut aggregator = DeltaAggregator::new();

        loop {
            let next = tokio::select! {
                next = records.next() => next,
                _ = interrupted(&mut interrupt) => {
                    display::finish_stream(&mut self.out, aggregator.response())?;
                    return Ok(None);
                }
            };

            let pushed = match next {
                Some(Ok(record)) => aggregator.push(&record, &mut self.out),
                Some(Err(e)) => Err(e),
                None => break,
            };
            if let Err(e) = pushed {
                display::finish_stream(&mut self.out, aggregator.response())?;
                return Err(e);
            }
        }

        display::finish_stream(&mut self.out, aggregator.response())?;
        let response = aggregator.finish();
        if response.usage.is_some() {
            self.last_usage = response.usage;
        }
        debug!(
            fragments = response.fragments,
            skipped = response.skipped,
            "stream complete"
        );
        Ok(Some(response.content))
    }

    async fn await_reply(&mut self, request: &ChatRequest) -> Result<Option<String>, ChatError> {
        let mut interrupt = self.interrupt.clone();
        let content = tokio::select! {
            content = self.transport.send(request) => content?,
            _ = interrupted(&mut interrupt) => return Ok(None),
        };
        display::display_response(&mut self.out, &content)?;
        Ok(Some(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ChunkStream;
    use crate::transcript::Role;
    use bytes::Bytes;
    use futures::stream;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    enum Reply {
        Chunks(Vec<Result<Bytes, ChatError>>),
        /// Chunks, then a stream that never yields again.
        Stall(Vec<Result<Bytes, ChatError>>),
        Text(String),
        Fail(ChatError),
    }

    #[derive(Clone, Default)]
    struct ScriptedTransport {
        replies: Arc<Mutex<VecDeque<Reply>>>,
        requests: Arc<Mutex<Vec<ChatRequest>>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies.into())),
                requests: Arc::default(),
            }
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn next_reply(&self, request: &ChatRequest) -> Reply {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("transport called more often than scripted")
        }
    }

    #[async_trait::async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(&self, request: &ChatRequest) -> Result<String, ChatError> {
            match self.next_reply(request) {
                Reply::Text(text) => Ok(text),
                Reply::Fail(e) => Err(e),
                _ => panic!("streaming reply scripted for a non-streaming call"),
            }
        }

        async fn send_streaming(&self, request: &ChatRequest) -> Result<ChunkStream, ChatError> {
            match self.next_reply(request) {
                Reply::Chunks(chunks) => Ok(stream::iter(chunks).boxed()),
                Reply::Stall(chunks) => Ok(stream::iter(chunks).chain(stream::pending()).boxed()),
                Reply::Fail(e) => Err(e),
                Reply::Text(_) => panic!("text reply scripted for a streaming call"),
            }
        }
    }

    struct Script(VecDeque<Result<InputEvent, ChatError>>);

    impl Script {
        fn lines(lines: &[&str]) -> Self {
            Script(
                lines
                    .iter()
                    .map(|line| Ok(InputEvent::Line(line.to_string())))
                    .collect(),
            )
        }
    }

    impl LineSource for Script {
        fn read_line(&mut self) -> Result<InputEvent, ChatError> {
            self.0.pop_front().unwrap_or(Ok(InputEvent::Closed))
        }
    }

    fn chunk(text: &str) -> Result<Bytes, ChatError> {
        Ok(Bytes::from(text.to_string()))
    }

    fn delta(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({ "choices": [{ "delta": { "content": content } }] })
        )
    }

    fn config(system_prompt: Option<&str>, stream: bool) -> SessionConfig {
        SessionConfig {
            provider: Provider::OpenAI,
            model: "gpt-4.1-mini".to_string(),
            stream,
            system_prompt: system_prompt.map(str::to_string),
            provider_models: HashMap::from([(
                Provider::OpenRouter,
                "meta-llama/llama-3.3-70b-instruct".to_string(),
            )]),
        }
    }

    fn session(
        config: SessionConfig,
        transport: &ScriptedTransport,
    ) -> (ChatSession<Vec<u8>>, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let session = ChatSession::new(config, Box::new(transport.clone()), Vec::new(), rx);
        (session, tx)
    }

    fn printed(session: &ChatSession<Vec<u8>>) -> String {
        String::from_utf8_lossy(session.output()).into_owned()
    }

    #[tokio::test]
    async fn fragments_split_mid_payload_commit_as_one_reply() {
        let transport = ScriptedTransport::new(vec![Reply::Chunks(vec![
            chunk("data: {\"choices\":[{\"delta\":{\"content\":\"Hel"),
            chunk("lo\"}}]}\n\ndata: [DONE]\n"),
        ])]);
        let (mut session, _tx) = session(config(None, true), &transport);

        let outcome = session.run(Script::lines(&["hi"])).await.unwrap();

        assert_eq!(outcome, SessionOutcome::InputClosed);
        assert_eq!(
            session.transcript().messages(),
            &[Message::user("hi"), Message::assistant("Hello")]
        );
        assert!(printed(&session).contains("Hello\n"));
    }

    #[tokio::test]
    async fn blank_input_is_rejected_and_prompt_reissued() {
        let transport = ScriptedTransport::new(vec![]);
        let (mut session, _tx) = session(config(Some("You are terse."), true), &transport);

        let outcome = session.run(Script::lines(&["   ", "/tokens"])).await.unwrap();

        assert_eq!(outcome, SessionOutcome::InputClosed);
        assert_eq!(session.transcript().len(), 1);
        let out = printed(&session);
        assert!(out.contains("empty input"));
        assert!(out.contains("Conversation: ~4 tokens"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn clear_keeps_only_the_system_prompt() {
        let transport = ScriptedTransport::new(vec![
            Reply::Chunks(vec![chunk(&delta("one")), chunk("data: [DONE]\n")]),
            Reply::Chunks(vec![chunk(&delta("two")), chunk("data: [DONE]\n")]),
        ]);
        let (mut session, _tx) = session(config(Some("You are terse."), true), &transport);

        session
            .run(Script::lines(&["first", "second", "/clear"]))
            .await
            .unwrap();

        assert_eq!(
            session.transcript().messages(),
            &[Message::system("You are terse.")]
        );
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(transport.requests()[1].messages.len(), 4);
    }

    #[tokio::test]
    async fn failed_stream_shows_partial_output_but_commits_nothing() {
        let transport = ScriptedTransport::new(vec![
            Reply::Chunks(vec![
                chunk(&delta("Par")),
                Err(ChatError::StreamTransport("connection reset".into())),
            ]),
            Reply::Chunks(vec![chunk(&delta("Sure.")), chunk("data: [DONE]\n")]),
        ]);
        let (mut session, _tx) = session(config(None, true), &transport);

        session.handle_line("tell me").await.unwrap();

        assert!(printed(&session).contains("Par\n"));
        assert!(printed(&session).contains("connection reset"));
        assert_eq!(session.transcript().messages(), &[Message::user("tell me")]);

        session.handle_line("again").await.unwrap();
        let second = &transport.requests()[1];
        assert_eq!(
            second.messages,
            vec![Message::user("tell me"), Message::user("again")]
        );
        assert_eq!(
            session.transcript().messages().last(),
            Some(&Message::assistant("Sure."))
        );
    }

    #[tokio::test]
    async fn failed_call_before_streaming_commits_nothing() {
        let transport = ScriptedTransport::new(vec![Reply::Fail(ChatError::Call(
            "401 Unauthorized".into(),
        ))]);
        let (mut session, _tx) = session(config(None, true), &transport);

        let outcome = session.handle_line("hello").await.unwrap();

        assert_eq!(outcome, None);
        assert_eq!(session.transcript().messages(), &[Message::user("hello")]);
        assert!(printed(&session).contains("401 Unauthorized"));
    }

    #[tokio::test]
    async fn every_turn_gets_a_fresh_decoder() {
        let transport = ScriptedTransport::new(vec![
            Reply::Chunks(vec![
                chunk("data: {\"choices\":[{\"delta\":{\"content\":\"dang"),
                Err(ChatError::StreamTransport("dropped".into())),
            ]),
            Reply::Chunks(vec![chunk(&delta("clean")), chunk("data: [DONE]\n")]),
        ]);
        let (mut session, _tx) = session(config(None, true), &transport);

        session.handle_line("one").await.unwrap();
        session.handle_line("two").await.unwrap();

        assert_eq!(
            session.transcript().messages().last(),
            Some(&Message::assistant("clean"))
        );
    }

    #[tokio::test]
    async fn tokens_and_clear_never_touch_the_transport() {
        let transport = ScriptedTransport::new(vec![]);
        let (mut session, _tx) = session(config(Some("sys"), true), &transport);

        session.handle_line("/tokens").await.unwrap();
        assert_eq!(session.transcript().messages(), &[Message::system("sys")]);
        session.handle_line("/clear").await.unwrap();
        session.handle_line("/help").await.unwrap();
        session.handle_line("/history").await.unwrap();

        assert!(transport.requests().is_empty());
        assert_eq!(session.transcript().len(), 1);
    }

    #[tokio::test]
    async fn provider_switch_applies_to_later_turns_only() {
        let transport = ScriptedTransport::new(vec![Reply::Text("ok".into())]);
        let (mut session, _tx) = session(config(None, false), &transport);

        session.handle_line("/provider deepseek").await.unwrap();
        assert_eq!(session.provider(), Provider::DeepSeek);
        assert_eq!(session.model(), "deepseek-chat");
        assert!(session.transcript().is_empty());

        session.handle_line("/provider gemini").await.unwrap();
        assert_eq!(session.provider(), Provider::DeepSeek);
        assert!(printed(&session).contains("Unsupported provider: gemini"));

        session.handle_line("hi").await.unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.provider, Provider::DeepSeek);
        assert_eq!(request.model, "deepseek-chat");
        assert_eq!(
            session.transcript().messages(),
            &[Message::user("hi"), Message::assistant("ok")]
        );
    }

    #[tokio::test]
    async fn provider_switch_uses_the_configured_model() {
        let transport = ScriptedTransport::new(vec![]);
        let (mut session, _tx) = session(config(None, true), &transport);

        session.handle_line("/provider openrouter").await.unwrap();

        assert_eq!(session.model(), "meta-llama/llama-3.3-70b-instruct");
    }

    #[tokio::test]
    async fn explicit_model_survives_a_provider_switch() {
        let transport = ScriptedTransport::new(vec![]);
        let (mut session, _tx) = session(config(None, true), &transport);

        session.handle_line("/model my-local-model").await.unwrap();
        session.handle_line("/provider deepseek").await.unwrap();

        assert_eq!(session.provider(), Provider::DeepSeek);
        assert_eq!(session.model(), "my-local-model");
        assert!(printed(&session).contains("model kept: my-local-model"));
    }

    #[tokio::test]
    async fn unknown_command_is_reported_and_ignored() {
        let transport = ScriptedTransport::new(vec![]);
        let (mut session, _tx) = session(config(None, true), &transport);

        let outcome = session.handle_line("/frobnicate").await.unwrap();

        assert_eq!(outcome, None);
        assert!(printed(&session).contains("Unknown command: /frobnicate"));
        assert!(session.transcript().is_empty());
    }

    #[tokio::test]
    async fn exit_stops_reading_input() {
        let transport = ScriptedTransport::new(vec![]);
        let (mut session, _tx) = session(config(None, true), &transport);

        let outcome = session
            .run(Script::lines(&["/EXIT", "never sent"]))
            .await
            .unwrap();

        assert_eq!(outcome, SessionOutcome::Exited);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn interrupt_mid_stream_ends_session_without_commit() {
        let transport =
            ScriptedTransport::new(vec![Reply::Stall(vec![chunk(&delta("Par"))])]);
        let (mut session, tx) = session(config(None, true), &transport);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(true);
        });
        let outcome = session.run(Script::lines(&["go", "unreached"])).await.unwrap();

        assert_eq!(outcome, SessionOutcome::Interrupted);
        assert!(printed(&session).contains("Par"));
        assert_eq!(session.transcript().messages(), &[Message::user("go")]);
    }

    #[tokio::test]
    async fn fatal_input_error_ends_the_loop() {
        let transport = ScriptedTransport::new(vec![]);
        let (mut session, _tx) = session(config(None, true), &transport);

        let script = Script(
            vec![
                Ok(InputEvent::Line("/tokens".into())),
                Err(ChatError::FatalInput("terminal gone".into())),
            ]
            .into(),
        );
        let err = session.run(script).await.unwrap_err();

        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn non_streaming_reply_is_committed_whole() {
        let transport = ScriptedTransport::new(vec![Reply::Text("4".into())]);
        let (mut session, _tx) = session(config(Some("Answer with a number."), false), &transport);

        session.handle_line("2+2?").await.unwrap();

        let roles: Vec<Role> = session.transcript().messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert!(printed(&session).contains("4\n"));
    }

    #[tokio::test]
    async fn blank_reply_is_committed_as_sent_without_streaming() {
        let transport = ScriptedTransport::new(vec![Reply::Text("   ".into())]);
        let (mut session, _tx) = session(config(None, false), &transport);

        session.handle_line("hi").await.unwrap();

        assert_eq!(
            session.transcript().messages(),
            &[Message::user("hi"), Message::assistant("   ")]
        );
    }

    #[tokio::test]
    async fn blank_reply_is_committed_as_sent_when_streaming() {
        let transport = ScriptedTransport::new(vec![Reply::Chunks(vec![
            chunk("data: {not json\n\n"),
            chunk("data: [DONE]\n"),
        ])]);
        let (mut session, _tx) = session(config(None, true), &transport);

        session.handle_line("hi").await.unwrap();

        assert_eq!(
            session.transcript().messages(),
            &[Message::user("hi"), Message::assistant("")]
        );
    }

    #[tokio::test]
    async fn save_writes_into_the_history_dir() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new(vec![]);
        let (session, _tx) = session(config(Some("sys"), true), &transport);
        let mut session = session.with_history_dir(dir.path().to_path_buf());

        session.handle_line("/save chat.json").await.unwrap();

        assert!(dir.path().join("chat.json").exists());
        assert_eq!(session.transcript().len(), 1);
    }

    #[tokio::test]
    async fn save_refuses_paths_outside_the_history_dir() {
        let root = tempfile::tempdir().unwrap();
        let history = root.path().join("history");
        let transport = ScriptedTransport::new(vec![]);
        let (session, _tx) = session(config(None, true), &transport);
        let mut session = session.with_history_dir(history.clone());

        let outcome = session.handle_line("/save ../escaped.json").await.unwrap();

        assert_eq!(outcome, None);
        assert!(!root.path().join("escaped.json").exists());
        assert!(printed(&session).contains("escaped.json"));
    }

    #[tokio::test]
    async fn service_usage_shows_up_in_tokens_report() {
        let transport = ScriptedTransport::new(vec![Reply::Chunks(vec![
            chunk(&delta("hey")),
            chunk("data: {\"choices\":[],\"usage\":{\"prompt_tokens\":7,\"completion_tokens\":1,\"total_tokens\":8}}\n"),
            chunk("data: [DONE]\n"),
        ])]);
        let (mut session, _tx) = session(config(None, true), &transport);

        session.handle_line("hello").await.unwrap();
        session.handle_line("/tokens").await.unwrap();

        assert!(printed(&session).contains("7 prompt + 1 completion = 8 tokens"));
    }
}
