//! Conversation orchestration for one file session.

use crate::agent::{AgentError, AgentFactory};
use crate::answer::{self, ChatEntry};
use crate::session::FileSession;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AskOutcome {
    Answered { entry: ChatEntry },
    /// Same question as the last one in history; nothing was asked.
    Duplicate,
    Blank,
}

/// Ask the session's agent one question and record the answer.
///
/// The agent is created on first use and kept for the life of the session,
/// even if the table changes afterwards. A repeat of the previous question is
/// ignored without invoking the agent. Failures leave the history untouched
/// and are not retried here.
pub async fn ask(
    session: &mut FileSession,
    factory: &dyn AgentFactory,
    question: &str,
    cancel: &CancellationToken,
) -> Result<AskOutcome, AgentError> {
    let question = question.trim();
    if question.is_empty() {
        return Ok(AskOutcome::Blank);
    }
    if session.last_question() == Some(question) {
        debug!(file_id = %session.file_id, "ignoring repeated question");
        return Ok(AskOutcome::Duplicate);
    }

    let agent = match session.agent {
        Some(ref mut agent) => agent,
        None => session
            .agent
            .insert(factory.create(&session.name, &session.table)?),
    };

    let answer = match agent.chat(question, cancel).await {
        Ok(answer) => answer,
        Err(err) => {
            warn!(file_id = %session.file_id, error = %err, "question failed");
            return Err(err);
        }
    };

    // Consumes the live answer; any chart bytes are dropped here.
    let stored = answer::normalize(answer);
    let entry = ChatEntry::new(question, stored);
    session.chat_history.push(entry.clone());
    info!(
        file_id = %session.file_id,
        history = session.chat_history.len(),
        "question answered"
    );
    Ok(AskOutcome::Answered { entry })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::answer::{Answer, ChartImage, StoredAnswer, CHART_PLACEHOLDER};
    use crate::llm::LlmError;
    use crate::table::DataTable;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Counters {
        created: AtomicUsize,
        asked: AtomicUsize,
    }

    struct ScriptedAgent {
        counters: Arc<Counters>,
        script: Arc<Mutex<VecDeque<Result<Answer, AgentError>>>>,
    }

    #[async_trait]
    impl Agent for ScriptedAgent {
        async fn chat(&mut self, _question: &str, _cancel: &CancellationToken) -> Result<Answer, AgentError> {
            self.counters.asked.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Answer::Text("ok".into())))
        }
    }

    struct ScriptedFactory {
        counters: Arc<Counters>,
        script: Arc<Mutex<VecDeque<Result<Answer, AgentError>>>>,
    }

    impl ScriptedFactory {
        fn new(script: Vec<Result<Answer, AgentError>>) -> Self {
            Self {
                counters: Arc::new(Counters::default()),
                script: Arc::new(Mutex::new(script.into())),
            }
        }
    }

    impl AgentFactory for ScriptedFactory {
        fn create(&self, _dataset: &str, _table: &DataTable) -> Result<Box<dyn Agent>, AgentError> {
            self.counters.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(ScriptedAgent {
                counters: self.counters.clone(),
                script: self.script.clone(),
            }))
        }
    }

    fn session() -> FileSession {
        let table = DataTable::from_csv(b"a\n1\n").unwrap();
        FileSession::new("abcd1234", "a.csv", table)
    }

    #[tokio::test]
    async fn appends_normalized_answer() {
        let factory = ScriptedFactory::new(vec![Ok(Answer::Text("one".into()))]);
        let mut s = session();
        let outcome = ask(&mut s, &factory, " first? ", &CancellationToken::new()).await.unwrap();
        let expected = ChatEntry::new("first?", StoredAnswer::text("one"));
        assert_eq!(outcome, AskOutcome::Answered { entry: expected.clone() });
        assert_eq!(s.chat_history, vec![expected]);
    }

    #[tokio::test]
    async fn repeated_question_does_not_reach_agent() {
        let factory = ScriptedFactory::new(vec![]);
        let mut s = session();
        let cancel = CancellationToken::new();
        ask(&mut s, &factory, "same", &cancel).await.unwrap();
        let outcome = ask(&mut s, &factory, "same", &cancel).await.unwrap();
        assert_eq!(outcome, AskOutcome::Duplicate);
        assert_eq!(factory.counters.asked.load(Ordering::SeqCst), 1);
        assert_eq!(s.chat_history.len(), 1);

        ask(&mut s, &factory, "different", &cancel).await.unwrap();
        ask(&mut s, &factory, "same", &cancel).await.unwrap();
        assert_eq!(factory.counters.asked.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn agent_is_created_once_and_reused() {
        let factory = ScriptedFactory::new(vec![]);
        let mut s = session();
        let cancel = CancellationToken::new();
        for q in ["a", "b", "c"] {
            ask(&mut s, &factory, q, &cancel).await.unwrap();
        }
        assert_eq!(factory.counters.created.load(Ordering::SeqCst), 1);
        assert!(s.has_agent());
    }

    #[tokio::test]
    async fn failure_leaves_history_untouched() {
        let factory = ScriptedFactory::new(vec![
            Ok(Answer::Text("fine".into())),
            Err(AgentError::Llm(LlmError::RateLimited { attempts: 3 })),
        ]);
        let mut s = session();
        let cancel = CancellationToken::new();
        ask(&mut s, &factory, "one", &cancel).await.unwrap();
        let err = ask(&mut s, &factory, "two", &cancel).await.unwrap_err();
        assert!(matches!(err, AgentError::Llm(LlmError::RateLimited { .. })));
        assert_eq!(s.chat_history.len(), 1);
        assert_eq!(factory.counters.asked.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn blank_question_is_ignored() {
        let factory = ScriptedFactory::new(vec![]);
        let mut s = session();
        let outcome = ask(&mut s, &factory, "   ", &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, AskOutcome::Blank);
        assert_eq!(factory.counters.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unrenderable_chart_still_records_an_entry() {
        let factory = ScriptedFactory::new(vec![Ok(Answer::ChartImage(ChartImage {
            bytes: vec![0, 1, 2],
        }))]);
        let mut s = session();
        ask(&mut s, &factory, "plot it", &CancellationToken::new()).await.unwrap();
        assert_eq!(s.chat_history[0].answer, StoredAnswer::text(CHART_PLACEHOLDER));
    }
}
