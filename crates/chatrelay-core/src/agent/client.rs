//! Agent client owning one conversation thread with a remote agent.
//!
//! Lifecycle: `new` -> `initialize` -> `create_or_get_thread` -> `invoke`
//! (any number of times) -> `close`. `invoke` posts the user message, then
//! drives the bounded retry loop until the agent's reply for this run is
//! available, and returns the reply with the token usage accumulated over
//! every attempt.

use std::sync::Arc;

use chatrelay_types::agent::{AgentInfo, AgentThread, MessageRole, TextAnnotation, ThreadMessage};
use chatrelay_types::chat::{
    ChatResponse, Citation, CitationRange, DEFAULT_AGENT_LABEL, TokenUsage,
};
use chatrelay_types::error::{AgentError, RuntimeError};
use chrono::Utc;
use tracing::{Instrument, Span, debug, error, info_span, warn};

use super::retry::{AttemptError, RetryPolicy};
use super::runtime::AgentRuntime;

/// Result of one successful invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub response: ChatResponse,
    /// One accumulated entry for this invocation.
    pub token_usage: Vec<TokenUsage>,
    pub thread_id: String,
}

/// Client for a single agent thread.
pub struct AgentClient<R: AgentRuntime> {
    runtime: Arc<R>,
    agent_id: String,
    requested_thread_id: Option<String>,
    session: Option<AgentInfo>,
    thread: Option<AgentThread>,
    policy: RetryPolicy,
    agent_label: String,
}

impl<R: AgentRuntime> AgentClient<R> {
    /// Create a client for `agent_id`, optionally re-attaching to `thread_id`.
    pub fn new(
        runtime: Arc<R>,
        agent_id: impl Into<String>,
        thread_id: Option<String>,
    ) -> Result<Self, AgentError> {
        let agent_id = agent_id.into();
        if agent_id.trim().is_empty() {
            return Err(AgentError::MissingAgentId);
        }

        Ok(Self {
            runtime,
            agent_id,
            requested_thread_id: thread_id.filter(|t| !t.trim().is_empty()),
            session: None,
            thread: None,
            policy: RetryPolicy::default(),
            agent_label: DEFAULT_AGENT_LABEL.to_string(),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_agent_label(mut self, label: impl Into<String>) -> Self {
        self.agent_label = label.into();
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// The attached thread, once `create_or_get_thread` succeeded.
    pub fn thread_id(&self) -> Option<&str> {
        self.thread.as_ref().map(|t| t.id.as_str())
    }

    /// Authenticate against the runtime and resolve the agent.
    ///
    /// Fails with `AgentNotFound` when the runtime does not know the agent id.
    /// Calling it again after success is a no-op.
    pub async fn initialize(&mut self) -> Result<(), AgentError> {
        if self.session.is_some() {
            return Ok(());
        }

        if let Err(e) = self.runtime.authenticate().await {
            error!(agent_id = %self.agent_id, error = %e, "error creating agent client");
            return Err(e.into());
        }

        match self.runtime.get_agent(&self.agent_id).await {
            Ok(Some(agent)) => {
                debug!(agent_id = %agent.id, "agent client initialized");
                self.session = Some(agent);
                Ok(())
            }
            Ok(None) | Err(RuntimeError::Http { status: 404, .. }) => {
                error!(agent_id = %self.agent_id, "agent not found");
                Err(AgentError::AgentNotFound(self.agent_id.clone()))
            }
            Err(e) => {
                error!(agent_id = %self.agent_id, error = %e, "error resolving agent");
                Err(e.into())
            }
        }
    }

    /// Re-attach to the requested thread, or create a new one.
    pub async fn create_or_get_thread(&mut self) -> Result<(), AgentError> {
        if self.session.is_none() {
            return Err(AgentError::NotInitialized);
        }
        if self.thread.is_some() {
            return Ok(());
        }

        let result = match &self.requested_thread_id {
            Some(thread_id) => self.runtime.get_thread(thread_id).await,
            None => self.runtime.create_thread().await,
        };

        match result {
            Ok(thread) => {
                if self.requested_thread_id.is_some() {
                    debug!(thread_id = %thread.id, "using existing thread");
                } else {
                    debug!(thread_id = %thread.id, "thread created");
                }
                self.thread = Some(thread);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "error creating or getting thread");
                Err(e.into())
            }
        }
    }

    /// Send `message` and return the agent's reply.
    pub async fn invoke(&self, message: &str) -> Result<Invocation, AgentError> {
        let span = info_span!(
            "gen_ai.invoke_agent",
            gen_ai.operation.name = "invoke_agent",
            gen_ai.agent.id = %self.agent_id,
            gen_ai.thread.id = self.thread_id().unwrap_or_default(),
            gen_ai.usage.input_tokens = tracing::field::Empty,
            gen_ai.usage.output_tokens = tracing::field::Empty,
            retries = tracing::field::Empty,
        );

        let result = self.invoke_inner(message).instrument(span).await;
        if let Err(e) = &result {
            error!(agent_id = %self.agent_id, error = %e, "error getting agent response");
        }
        result
    }

    async fn invoke_inner(&self, message: &str) -> Result<Invocation, AgentError> {
        if self.session.is_none() {
            return Err(AgentError::NotInitialized);
        }
        let thread_id = self
            .thread
            .as_ref()
            .map(|t| t.id.clone())
            .ok_or(AgentError::ThreadNotInitialized)?;
        if message.trim().is_empty() {
            return Err(AgentError::EmptyMessage);
        }

        self.runtime
            .create_message(&thread_id, MessageRole::User, message)
            .await
            .inspect_err(|e| error!(%thread_id, error = %e, "error sending message"))?;

        let (usage, reply, retries) = self.retryable_run(&thread_id).await?;

        let span = Span::current();
        span.record("gen_ai.usage.input_tokens", usage.prompt_tokens);
        span.record("gen_ai.usage.output_tokens", usage.completion_tokens);
        span.record("retries", retries);

        let text = reply.text_messages().next().ok_or(AgentError::EmptyResponse)?;

        let response = ChatResponse {
            turn: "assistant".to_string(),
            task_id: reply.run_id.clone(),
            task_status: Some(reply.status.clone().unwrap_or_else(|| "completed".to_string())),
            agent_id: reply.agent_id.clone(),
            agent: self.agent_label.clone(),
            content: text.value.clone(),
            citations: extract_citations(&text.annotations),
            safety_alert: None,
            retries,
            datetime: Utc::now(),
        };

        Ok(Invocation {
            response,
            token_usage: vec![usage],
            thread_id,
        })
    }

    /// Run the agent over the thread until a reply for that run is available.
    ///
    /// Returns the usage accumulated over all attempts, the reply, and the
    /// number of attempts consumed before the successful one.
    async fn retryable_run(
        &self,
        thread_id: &str,
    ) -> Result<(TokenUsage, ThreadMessage, u32), AgentError> {
        let mut usage = TokenUsage::new(&self.agent_id);
        let mut retry = self.policy.start();

        loop {
            match self.run_attempt(thread_id, &mut usage).await {
                Ok(reply) => return Ok((usage, reply, retry.retries())),
                Err(err) => retry.on_failure(err).await?,
            }
        }
    }

    async fn run_attempt(
        &self,
        thread_id: &str,
        usage: &mut TokenUsage,
    ) -> Result<ThreadMessage, AttemptError> {
        let agent_id = self.agent_id.as_str();

        let run = self
            .runtime
            .create_and_process_run(thread_id, agent_id)
            .await
            .map_err(|e| {
                error!(%thread_id, error = %e, "error creating agent run");
                if e.is_remote_http() {
                    AttemptError::Transient(e.to_string())
                } else {
                    AttemptError::Fatal(e.into())
                }
            })?;

        if let Some(run_usage) = &run.usage {
            usage.add(run_usage);
        }

        let reply = match self
            .runtime
            .last_message_by_role(thread_id, MessageRole::Agent)
            .await
        {
            Ok(reply) => reply,
            Err(e) if e.is_rate_limited() => {
                warn!(%thread_id, error = %e, "rate limited while fetching agent reply");
                return Err(AttemptError::Transient(format!("rate limit reached: {e}")));
            }
            Err(e) if e.is_remote_http() => {
                error!(%thread_id, error = %e, "HTTP error retrieving last message");
                return Err(AttemptError::Transient(e.to_string()));
            }
            Err(e) => {
                error!(%thread_id, error = %e, "unreadable reply from agent runtime");
                return Err(AttemptError::Fatal(e.into()));
            }
        };

        let reply = match reply {
            Some(reply) if !reply.is_failed() => reply,
            _ => {
                warn!(%thread_id, run_status = %run.status, "no response from agent or message failed");
                return Err(AttemptError::Transient(
                    "rate limit reached or message failed".to_string(),
                ));
            }
        };

        if reply.run_id.as_deref().is_some_and(|id| id != run.id) {
            warn!(%thread_id, run_id = %run.id, "latest agent message belongs to an earlier run");
            return Err(AttemptError::Transient(format!("no reply yet for run {}", run.id)));
        }

        if reply.agent_id.as_deref() != Some(agent_id) {
            let got = reply.agent_id.as_deref().unwrap_or("<none>");
            warn!(%thread_id, expected = %agent_id, %got, "agent mismatch");
            return Err(AttemptError::Validation(format!(
                "agent id mismatch: expected {agent_id}, got {got}"
            )));
        }

        Ok(reply)
    }

    /// Release the session. Safe to call more than once.
    pub async fn close(&mut self) {
        if self.session.take().is_some() {
            self.thread = None;
            debug!(agent_id = %self.agent_id, "agent client closed");
        } else {
            warn!("agent client was not initialized, nothing to close");
        }
    }
}

/// Map text annotations to citations. The file range is kept only when both
/// offsets are present.
fn extract_citations(annotations: &[TextAnnotation]) -> Option<Vec<Citation>> {
    if annotations.is_empty() {
        return None;
    }

    let citations = annotations
        .iter()
        .map(|a| Citation {
            kind: a.kind.clone().filter(|k| !k.is_empty()),
            position_in_response: a.text.clone().filter(|t| !t.is_empty()),
            citation_range_in_file: match (a.start_index, a.end_index) {
                (Some(start), Some(end)) => Some(CitationRange { start, end }),
                _ => None,
            },
            citation_title: a.url_citation.as_ref().and_then(|u| u.title.clone()),
            citation_url: a
                .file_citation
                .as_ref()
                .and_then(|f| f.file_id.clone())
                .or_else(|| a.url_citation.as_ref().map(|u| u.url.clone())),
            abstract_text: a.file_citation.as_ref().and_then(|f| f.quote.clone()),
        })
        .collect();

    Some(citations)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use chatrelay_types::agent::{
        AgentRun, FileCitation, MessageContent, MessageText, RunUsage, UrlCitation,
    };

    // --- Mock runtime ---

    /// Scripted runtime: each run/reply call pops the next scripted result.
    #[derive(Default)]
    pub(crate) struct MockRuntime {
        pub agents: Vec<String>,
        pub runs: Mutex<VecDeque<Result<AgentRun, RuntimeError>>>,
        pub replies: Mutex<VecDeque<Result<Option<ThreadMessage>, RuntimeError>>>,
        pub posted: Mutex<Vec<(String, MessageRole, String)>>,
        pub threads_created: AtomicU32,
        pub threads_fetched: AtomicU32,
        pub run_calls: AtomicU32,
    }

    impl MockRuntime {
        pub fn with_agent(agent_id: &str) -> Self {
            Self {
                agents: vec![agent_id.to_string()],
                ..Default::default()
            }
        }

        pub fn push_run(&self, run: Result<AgentRun, RuntimeError>) {
            self.runs.lock().unwrap().push_back(run);
        }

        pub fn push_reply(&self, reply: Result<Option<ThreadMessage>, RuntimeError>) {
            self.replies.lock().unwrap().push_back(reply);
        }

        /// Script one attempt that completes with a reply from `agent_id`.
        pub fn push_success(&self, run_id: &str, agent_id: &str, text: &str, usage: RunUsage) {
            self.push_run(Ok(run(run_id, usage)));
            self.push_reply(Ok(Some(reply(run_id, agent_id, text))));
        }
    }

    impl AgentRuntime for MockRuntime {
        async fn authenticate(&self) -> Result<(), RuntimeError> {
            Ok(())
        }

        async fn get_agent(&self, agent_id: &str) -> Result<Option<AgentInfo>, RuntimeError> {
            Ok(self.agents.iter().any(|a| a == agent_id).then(|| AgentInfo {
                id: agent_id.to_string(),
                name: Some("Status agent".to_string()),
                model: None,
            }))
        }

        async fn create_thread(&self) -> Result<AgentThread, RuntimeError> {
            let n = self.threads_created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AgentThread {
                id: format!("thread_new_{n}"),
                created_at: None,
            })
        }

        async fn get_thread(&self, thread_id: &str) -> Result<AgentThread, RuntimeError> {
            self.threads_fetched.fetch_add(1, Ordering::SeqCst);
            if thread_id == "thread_missing" {
                return Err(RuntimeError::Http {
                    status: 404,
                    message: "thread not found".to_string(),
                });
            }
            Ok(AgentThread {
                id: thread_id.to_string(),
                created_at: None,
            })
        }

        async fn create_message(
            &self,
            thread_id: &str,
            role: MessageRole,
            content: &str,
        ) -> Result<(), RuntimeError> {
            self.posted
                .lock()
                .unwrap()
                .push((thread_id.to_string(), role, content.to_string()));
            Ok(())
        }

        async fn create_and_process_run(
            &self,
            _thread_id: &str,
            _agent_id: &str,
        ) -> Result<AgentRun, RuntimeError> {
            self.run_calls.fetch_add(1, Ordering::SeqCst);
            self.runs
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RuntimeError::Transport("run script exhausted".to_string())))
        }

        async fn last_message_by_role(
            &self,
            _thread_id: &str,
            _role: MessageRole,
        ) -> Result<Option<ThreadMessage>, RuntimeError> {
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RuntimeError::Transport("reply script exhausted".to_string())))
        }
    }

    pub(crate) fn run(id: &str, usage: RunUsage) -> AgentRun {
        AgentRun {
            id: id.to_string(),
            thread_id: None,
            agent_id: None,
            status: "completed".to_string(),
            usage: Some(usage),
            last_error: None,
        }
    }

    pub(crate) fn reply(run_id: &str, agent_id: &str, text: &str) -> ThreadMessage {
        ThreadMessage {
            id: format!("msg_{run_id}"),
            thread_id: None,
            run_id: Some(run_id.to_string()),
            agent_id: Some(agent_id.to_string()),
            role: MessageRole::Agent,
            status: None,
            content: vec![MessageContent::Text {
                text: MessageText {
                    value: text.to_string(),
                    annotations: Vec::new(),
                },
            }],
        }
    }

    fn usage(prompt: u64, completion: u64) -> RunUsage {
        RunUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }

    async fn ready_client(runtime: Arc<MockRuntime>) -> AgentClient<MockRuntime> {
        let mut client = AgentClient::new(runtime, "A1", None).unwrap();
        client.initialize().await.unwrap();
        client.create_or_get_thread().await.unwrap();
        client
    }

    // --- Lifecycle ---

    #[test]
    fn test_new_rejects_empty_agent_id() {
        let runtime = Arc::new(MockRuntime::default());
        let err = AgentClient::new(runtime, "  ", None).err().unwrap();
        assert!(matches!(err, AgentError::MissingAgentId));
    }

    #[tokio::test]
    async fn test_initialize_unknown_agent_is_not_found() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        let mut client = AgentClient::new(runtime, "B2", None).unwrap();
        let err = client.initialize().await.unwrap_err();
        assert!(matches!(err, AgentError::AgentNotFound(ref id) if id == "B2"));
    }

    #[tokio::test]
    async fn test_thread_requires_initialize() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        let mut client = AgentClient::new(runtime, "A1", None).unwrap();
        let err = client.create_or_get_thread().await.unwrap_err();
        assert!(matches!(err, AgentError::NotInitialized));
    }

    #[tokio::test]
    async fn test_creates_new_thread_without_id() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        let client = ready_client(runtime.clone()).await;
        assert_eq!(client.thread_id(), Some("thread_new_1"));
        assert_eq!(runtime.threads_created.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.threads_fetched.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reattaches_existing_thread() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        let mut client =
            AgentClient::new(runtime.clone(), "A1", Some("thread_42".to_string())).unwrap();
        client.initialize().await.unwrap();
        client.create_or_get_thread().await.unwrap();
        assert_eq!(client.thread_id(), Some("thread_42"));
        assert_eq!(runtime.threads_created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_thread_surfaces_runtime_error() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        let mut client =
            AgentClient::new(runtime, "A1", Some("thread_missing".to_string())).unwrap();
        client.initialize().await.unwrap();
        let err = client.create_or_get_thread().await.unwrap_err();
        assert!(matches!(err, AgentError::Runtime(RuntimeError::Http { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_invoke_requires_thread() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        let mut client = AgentClient::new(runtime, "A1", None).unwrap();
        assert!(matches!(
            client.invoke("hi").await.unwrap_err(),
            AgentError::NotInitialized
        ));
        client.initialize().await.unwrap();
        assert!(matches!(
            client.invoke("hi").await.unwrap_err(),
            AgentError::ThreadNotInitialized
        ));
    }

    #[tokio::test]
    async fn test_invoke_rejects_empty_message() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        let client = ready_client(runtime.clone()).await;
        let err = client.invoke("   ").await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyMessage));
        assert!(runtime.posted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        let mut client = ready_client(runtime).await;
        client.close().await;
        assert!(client.thread_id().is_none());
        client.close().await;
        assert!(matches!(
            client.invoke("hi").await.unwrap_err(),
            AgentError::NotInitialized
        ));
    }

    // --- Invoke ---

    #[tokio::test]
    async fn test_invoke_first_attempt_success() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        runtime.push_success("run_1", "A1", "Everything is green.", usage(12, 8));
        let client = ready_client(runtime.clone()).await;

        let result = client.invoke("What is the status?").await.unwrap();
        assert_eq!(result.thread_id, "thread_new_1");
        assert_eq!(result.response.content, "Everything is green.");
        assert_eq!(result.response.task_id.as_deref(), Some("run_1"));
        assert_eq!(result.response.task_status.as_deref(), Some("completed"));
        assert_eq!(result.response.agent_id.as_deref(), Some("A1"));
        assert_eq!(result.response.agent, "RAG agent");
        assert_eq!(result.response.retries, 0);
        assert!(result.response.citations.is_none());

        assert_eq!(result.token_usage.len(), 1);
        let tokens = &result.token_usage[0];
        assert_eq!(tokens.agent_id, "A1");
        assert_eq!(tokens.prompt_tokens, 12);
        assert_eq!(tokens.completion_tokens, 8);
        assert_eq!(tokens.total_tokens, 20);

        let posted = runtime.posted.lock().unwrap();
        assert_eq!(posted.len(), 1);
        assert_eq!(posted[0].1, MessageRole::User);
        assert_eq!(posted[0].2, "What is the status?");
    }

    #[tokio::test(start_paused = true)]
    async fn test_usage_summed_when_only_last_attempt_succeeds() {
        for attempts in 1..=10u64 {
            let runtime = Arc::new(MockRuntime::with_agent("A1"));
            for i in 1..attempts {
                runtime.push_run(Ok(run(&format!("run_{i}"), usage(i, 2 * i))));
                runtime.push_reply(Ok(None));
            }
            runtime.push_success(
                &format!("run_{attempts}"),
                "A1",
                "done",
                usage(attempts, 2 * attempts),
            );
            let client = ready_client(runtime.clone()).await;

            let result = client.invoke("status?").await.unwrap();
            let expected_prompt: u64 = (1..=attempts).sum();
            let tokens = &result.token_usage[0];
            assert_eq!(tokens.prompt_tokens, expected_prompt, "attempts={attempts}");
            assert_eq!(tokens.completion_tokens, 2 * expected_prompt);
            assert_eq!(tokens.total_tokens, 3 * expected_prompt);
            assert_eq!(result.response.retries as u64, attempts - 1);
            assert_eq!(runtime.run_calls.load(Ordering::SeqCst) as u64, attempts);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_http_errors_retried_until_exhaustion() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        for i in 1..=10 {
            runtime.push_run(Err(RuntimeError::Http {
                status: 503,
                message: format!("unavailable {i}"),
            }));
        }
        let client = ready_client(runtime.clone()).await;

        let err = client.invoke("status?").await.unwrap_err();
        match err {
            AgentError::RetriesExhausted { attempts, last_error } => {
                assert_eq!(attempts, 10);
                assert!(last_error.contains("unavailable 10"));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(runtime.run_calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_on_attempt_nine_recovers() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        for i in 1..=9 {
            runtime.push_run(Ok(run(&format!("run_{i}"), usage(1, 1))));
            runtime.push_reply(Err(RuntimeError::Http {
                status: 429,
                message: "too many requests".to_string(),
            }));
        }
        runtime.push_success("run_10", "A1", "finally", usage(1, 1));
        let client = ready_client(runtime).await;

        let result = client.invoke("status?").await.unwrap();
        assert_eq!(result.response.content, "finally");
        assert_eq!(result.response.retries, 9);
        assert_eq!(result.token_usage[0].total_tokens, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_agent_mismatch_is_retried() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        runtime.push_success("run_1", "B2", "wrong agent", usage(3, 3));
        runtime.push_success("run_2", "A1", "right agent", usage(3, 3));
        let client = ready_client(runtime).await;

        let result = client.invoke("status?").await.unwrap();
        assert_eq!(result.response.content, "right agent");
        assert_eq!(result.response.retries, 1);
        assert_eq!(result.token_usage[0].total_tokens, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_agent_mismatch_never_succeeds() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        for i in 1..=10 {
            runtime.push_success(&format!("run_{i}"), "B2", "cross-talk", usage(1, 0));
        }
        let client = ready_client(runtime).await;

        let err = client.invoke("status?").await.unwrap_err();
        match err {
            AgentError::RetriesExhausted { last_error, .. } => {
                assert!(last_error.contains("agent id mismatch"));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_message_is_retried() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        runtime.push_run(Ok(run("run_1", usage(5, 0))));
        let mut failed = reply("run_1", "A1", "partial");
        failed.status = Some("failed".to_string());
        runtime.push_reply(Ok(Some(failed)));
        runtime.push_success("run_2", "A1", "ok", usage(5, 5));
        let client = ready_client(runtime).await;

        let result = client.invoke("status?").await.unwrap();
        assert_eq!(result.response.content, "ok");
        assert_eq!(result.response.retries, 1);
        assert_eq!(result.token_usage[0].prompt_tokens, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_reply_from_earlier_run_is_retried() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        runtime.push_run(Ok(run("run_2", usage(1, 0))));
        runtime.push_reply(Ok(Some(reply("run_1", "A1", "previous turn"))));
        runtime.push_success("run_3", "A1", "this turn", usage(1, 1));
        let client = ready_client(runtime).await;

        let result = client.invoke("status?").await.unwrap();
        assert_eq!(result.response.content, "this turn");
        assert_eq!(result.response.retries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_on_fetch_recovers_on_last_attempt() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        for i in 1..=9 {
            runtime.push_run(Ok(run(&format!("run_{i}"), usage(1, 1))));
            runtime.push_reply(Err(RuntimeError::Http {
                status: 503,
                message: "unavailable".to_string(),
            }));
        }
        runtime.push_success("run_10", "A1", "recovered", usage(1, 1));
        let client = ready_client(runtime.clone()).await;

        let result = client.invoke("status?").await.unwrap();
        assert_eq!(result.response.content, "recovered");
        assert_eq!(result.response.retries, 9);
        assert_eq!(runtime.run_calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_on_every_fetch_exhausts_retries() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        for i in 1..=10 {
            runtime.push_run(Ok(run(&format!("run_{i}"), usage(1, 1))));
            runtime.push_reply(Err(RuntimeError::Http {
                status: 500,
                message: format!("internal {i}"),
            }));
        }
        let client = ready_client(runtime.clone()).await;

        let err = client.invoke("status?").await.unwrap_err();
        match err {
            AgentError::RetriesExhausted { attempts, last_error } => {
                assert_eq!(attempts, 10);
                assert!(last_error.contains("internal 10"));
            }
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
        assert_eq!(runtime.run_calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_undecodable_reply_is_fatal() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        runtime.push_run(Ok(run("run_1", usage(1, 1))));
        runtime.push_reply(Err(RuntimeError::Deserialization("bad message".to_string())));
        let client = ready_client(runtime.clone()).await;

        let err = client.invoke("status?").await.unwrap_err();
        assert!(matches!(err, AgentError::Runtime(RuntimeError::Deserialization(_))));
        assert_eq!(runtime.run_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_decode_error_is_fatal() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        runtime.push_run(Err(RuntimeError::Deserialization("bad run".to_string())));
        let client = ready_client(runtime.clone()).await;

        let err = client.invoke("status?").await.unwrap_err();
        assert!(matches!(err, AgentError::Runtime(RuntimeError::Deserialization(_))));
        assert_eq!(runtime.run_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reply_without_text_is_empty_response() {
        let runtime = Arc::new(MockRuntime::with_agent("A1"));
        runtime.push_run(Ok(run("run_1", usage(1, 1))));
        let mut image_only = reply("run_1", "A1", "");
        image_only.content = vec![MessageContent::Unsupported];
        runtime.push_reply(Ok(Some(image_only)));
        let client = ready_client(runtime).await;

        let err = client.invoke("status?").await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyResponse));
    }

    // --- Citations ---

    #[test]
    fn test_extract_citations_range_requires_both_offsets() {
        let annotations = vec![
            TextAnnotation {
                kind: Some("file_citation".to_string()),
                text: Some("【4:0†source】".to_string()),
                start_index: Some(10),
                end_index: Some(22),
                file_citation: Some(FileCitation {
                    file_id: Some("assistant-abc".to_string()),
                    quote: Some("quoted text".to_string()),
                }),
                url_citation: None,
            },
            TextAnnotation {
                kind: Some("url_citation".to_string()),
                text: Some("【1†web】".to_string()),
                start_index: Some(30),
                end_index: None,
                file_citation: None,
                url_citation: Some(UrlCitation {
                    url: "https://example.com/report".to_string(),
                    title: Some("Report".to_string()),
                }),
            },
        ];

        let citations = extract_citations(&annotations).unwrap();
        assert_eq!(citations.len(), 2);
        assert_eq!(
            citations[0].citation_range_in_file,
            Some(CitationRange { start: 10, end: 22 })
        );
        assert_eq!(citations[0].citation_url.as_deref(), Some("assistant-abc"));
        assert_eq!(citations[0].abstract_text.as_deref(), Some("quoted text"));
        assert!(citations[1].citation_range_in_file.is_none());
        assert_eq!(citations[1].citation_url.as_deref(), Some("https://example.com/report"));
        assert_eq!(citations[1].citation_title.as_deref(), Some("Report"));
    }

    #[test]
    fn test_extract_citations_empty() {
        assert!(extract_citations(&[]).is_none());
    }
}
