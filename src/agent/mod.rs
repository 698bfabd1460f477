//! The analysis agent: turns a question about one table into an [`Answer`].

pub mod analysis;
pub mod prompt;
pub mod reply;

use crate::answer::Answer;
use crate::llm::{CompletionClient, LlmError};
use crate::table::DataTable;
use async_trait::async_trait;
use prompt::Prompt;
use reply::Directive;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const CUSTOM_INSTRUCTIONS: &str = "Always provide clear, conversational answers.
Avoid raw data dumps. Prefer names, summaries, and charts.";

/// Exchanges kept as conversational context.
const MEMORY_SIZE: usize = 4;
const MEMORY_ANSWER_CHARS: usize = 300;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("agent unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Agent: Send {
    async fn chat(&mut self, question: &str, cancel: &CancellationToken) -> Result<Answer, AgentError>;
}

/// Builds the agent bound to a file session's table.
pub trait AgentFactory: Send + Sync {
    fn create(&self, dataset: &str, table: &DataTable) -> Result<Box<dyn Agent>, AgentError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

/// LLM-backed agent over a snapshot of the table taken at construction.
pub struct TableAgent {
    llm: Arc<CompletionClient>,
    dataset: String,
    table: DataTable,
    memory: VecDeque<Exchange>,
}

impl TableAgent {
    pub fn new(llm: Arc<CompletionClient>, dataset: impl Into<String>, table: DataTable) -> Self {
        Self {
            llm,
            dataset: dataset.into(),
            table,
            memory: VecDeque::with_capacity(MEMORY_SIZE),
        }
    }

    pub fn memory(&self) -> &VecDeque<Exchange> {
        &self.memory
    }

    fn interpret(&self, reply: &str) -> Answer {
        match reply::parse(reply) {
            Directive::Text(text) => Answer::Text(text),
            Directive::Chart(spec) => match analysis::build_figure(&self.table, &spec) {
                Ok(figure) => Answer::Figure(figure),
                Err(err) => Answer::Text(format!("I couldn't draw that chart: {}.", err)),
            },
            Directive::Aggregate(spec) => match analysis::aggregate(&self.table, &spec) {
                Ok(value) => Answer::Value(value),
                Err(err) => Answer::Text(format!("I couldn't compute that: {}.", err)),
            },
            Directive::Unanswerable(reason) => Answer::Fatal(reason),
        }
    }

    fn remember(&mut self, question: &str, answer: &Answer) {
        let mut summary = match answer {
            Answer::Text(text) | Answer::Fatal(text) => text.clone(),
            Answer::Value(value) => value.summary(),
            Answer::Figure(_) | Answer::ChartImage(_) | Answer::LegacyPath(_) => {
                "[chart shown]".to_string()
            }
        };
        if let Some((cut, _)) = summary.char_indices().nth(MEMORY_ANSWER_CHARS) {
            summary.truncate(cut);
        }
        if self.memory.len() == MEMORY_SIZE {
            self.memory.pop_front();
        }
        self.memory.push_back(Exchange {
            question: question.to_string(),
            answer: summary,
        });
    }
}

#[async_trait]
impl Agent for TableAgent {
    async fn chat(&mut self, question: &str, cancel: &CancellationToken) -> Result<Answer, AgentError> {
        let prompt = Prompt {
            instructions: CUSTOM_INSTRUCTIONS,
            dataset: &self.dataset,
            table: &self.table,
            memory: &self.memory,
            question,
        };
        let reply = self.llm.call(&prompt, None, cancel).await?;
        let answer = self.interpret(&reply);
        debug!(dataset = %self.dataset, "agent answered");
        self.remember(question, &answer);
        Ok(answer)
    }
}

/// Creates a [`TableAgent`] sharing one completion client.
pub struct LlmAgentFactory {
    llm: Arc<CompletionClient>,
}

impl LlmAgentFactory {
    pub fn new(llm: Arc<CompletionClient>) -> Self {
        Self { llm }
    }
}

impl AgentFactory for LlmAgentFactory {
    fn create(&self, dataset: &str, table: &DataTable) -> Result<Box<dyn Agent>, AgentError> {
        debug!(dataset, "creating agent");
        Ok(Box::new(TableAgent::new(
            self.llm.clone(),
            dataset,
            table.clone(),
        )))
    }
}
