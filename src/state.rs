use crate::agent::{Agent, AgentError, AgentFactory, LlmAgentFactory};
use crate::config::AppConfig;
use crate::db::Database;
use crate::error::Result;
use crate::llm::CompletionClient;
use crate::session::SessionState;
use crate::table::DataTable;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

pub struct AppState {
    pub db: Database,
    pub config: AppConfig,
    pub session: tokio::sync::Mutex<SessionState>,
    /// The question currently being answered, if any.
    inflight: Mutex<Option<Inflight>>,
    next_request: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct Inflight {
    pub id: u64,
    pub token: CancellationToken,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> Self {
        Self {
            db,
            config,
            session: tokio::sync::Mutex::new(SessionState::new()),
            inflight: Mutex::new(None),
            next_request: AtomicU64::new(1),
        }
    }

    /// Environment configuration with stored settings layered on top.
    pub fn effective_config(&self) -> Result<AppConfig> {
        Ok(self.config.clone().with_stored_settings(&self.db)?)
    }

    /// Factory for agents created from now on. Settings are read and a client
    /// is built only when an agent is actually needed; agents that already
    /// exist keep the client they were built with.
    pub fn agent_factory(&self) -> SettingsAgentFactory<'_> {
        SettingsAgentFactory { state: self }
    }

    /// Register a new in-flight question, cancelling any previous one.
    pub fn begin_request(&self) -> Inflight {
        let request = Inflight {
            id: self.next_request.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        };
        if let Some(previous) = self.inflight().replace(request.clone()) {
            previous.token.cancel();
        }
        request
    }

    /// Clear the in-flight slot if it still holds `request`.
    pub fn finish_request(&self, request: &Inflight) {
        let mut inflight = self.inflight();
        if inflight.as_ref().is_some_and(|r| r.id == request.id) {
            *inflight = None;
        }
    }

    /// Cancel the in-flight question. Returns false when nothing was running.
    pub fn cancel_inflight(&self) -> bool {
        match self.inflight().take() {
            Some(request) => {
                request.token.cancel();
                true
            }
            None => false,
        }
    }

    fn inflight(&self) -> MutexGuard<'_, Option<Inflight>> {
        self.inflight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Builds agents from the settings in effect at creation time.
pub struct SettingsAgentFactory<'a> {
    state: &'a AppState,
}

impl AgentFactory for SettingsAgentFactory<'_> {
    fn create(&self, dataset: &str, table: &DataTable) -> std::result::Result<Box<dyn Agent>, AgentError> {
        let config = self
            .state
            .effective_config()
            .map_err(|err| AgentError::Unavailable(err.to_string()))?;
        let client = CompletionClient::new(&config.llm)?;
        LlmAgentFactory::new(Arc::new(client)).create(dataset, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::Answer;
    use crate::auth;
    use crate::config::LlmSettings;
    use crate::error::AppError;
    use crate::llm::LlmError;
    use crate::orchestrator::AskOutcome;
    use async_trait::async_trait;

    fn state() -> AppState {
        AppState::new(Database::open_in_memory().unwrap(), AppConfig::default())
    }

    #[test]
    fn new_request_cancels_previous() {
        let state = state();
        let first = state.begin_request();
        let second = state.begin_request();
        assert!(first.token.is_cancelled());
        assert!(!second.token.is_cancelled());
        assert!(state.cancel_inflight());
        assert!(second.token.is_cancelled());
        assert!(!state.cancel_inflight());
    }

    #[test]
    fn finishing_a_stale_request_keeps_the_current_one() {
        let state = state();
        let first = state.begin_request();
        let second = state.begin_request();
        state.finish_request(&first);
        assert!(state.cancel_inflight());
        assert!(second.token.is_cancelled());

        let third = state.begin_request();
        state.finish_request(&third);
        assert!(!state.cancel_inflight());
        assert!(!third.token.is_cancelled());
    }

    #[test]
    fn agent_factory_needs_an_api_key() {
        let state = state();
        let table = DataTable::from_upload(b"a\n1\n").unwrap();
        let factory = state.agent_factory();
        assert!(matches!(
            factory.create("t.csv", &table),
            Err(AgentError::Llm(LlmError::MissingApiKey))
        ));
        state.db.set_setting("api_key", "gsk_test").unwrap();
        assert!(factory.create("t.csv", &table).is_ok());
        assert_eq!(state.effective_config().unwrap().llm.model, LlmSettings::default().model);
    }

    struct EchoAgent;

    #[async_trait]
    impl Agent for EchoAgent {
        async fn chat(&mut self, question: &str, _cancel: &CancellationToken) -> std::result::Result<Answer, AgentError> {
            Ok(Answer::Text(question.to_uppercase()))
        }
    }

    #[tokio::test]
    async fn asking_without_a_new_agent_needs_no_api_key() {
        let state = state();
        auth::register(&state.db, "ada", "pw", "Ada").unwrap();
        let cancel = CancellationToken::new();
        let mut session = state.session.lock().await;
        session.login(&state.db, "ada", "pw").unwrap();
        session.upload("t.csv", b"a\n1\n").unwrap();

        let blank = session.ask(&state.agent_factory(), "   ", &cancel).await.unwrap();
        assert_eq!(blank, AskOutcome::Blank);
        assert!(!session.current().unwrap().has_agent());

        session.current_mut().unwrap().agent = Some(Box::new(EchoAgent));
        let outcome = session.ask(&state.agent_factory(), "hi", &cancel).await.unwrap();
        assert!(matches!(outcome, AskOutcome::Answered { .. }));
        assert_eq!(session.current().unwrap().chat_history.len(), 1);
    }

    #[tokio::test]
    async fn first_question_without_an_api_key_fails_cleanly() {
        let state = state();
        auth::register(&state.db, "ada", "pw", "Ada").unwrap();
        let mut session = state.session.lock().await;
        session.login(&state.db, "ada", "pw").unwrap();
        session.upload("t.csv", b"a\n1\n").unwrap();

        let result = session
            .ask(&state.agent_factory(), "hi", &CancellationToken::new())
            .await;
        assert!(matches!(
            result,
            Err(AppError::Agent(AgentError::Llm(LlmError::MissingApiKey)))
        ));
        assert!(session.current().unwrap().chat_history.is_empty());
    }
}
