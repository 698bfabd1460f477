use super::Exchange;
use crate::table::{ColumnKind, DataTable};
use std::collections::VecDeque;
use std::fmt;

const PREVIEW_ROWS: usize = 5;

const REPLY_PROTOCOL: &str = r#"Answer in plain text. When a chart or an exact computed number answers the question better, reply with only one fenced ```json block instead, using one of:
{"chart": {"kind": "line|bar|scatter|histogram|box", "x": "<column>", "y": "<column>", "title": "<title>"}}
{"aggregate": {"op": "count|sum|mean|min|max", "column": "<column>"}}
If the data cannot answer the question, reply with {"error": "<short reason>"}.
Use column names exactly as listed."#;

/// Everything the model sees for one question.
pub struct Prompt<'a> {
    pub instructions: &'a str,
    pub dataset: &'a str,
    pub table: &'a DataTable,
    pub memory: &'a VecDeque<Exchange>,
    pub question: &'a str,
}

impl fmt::Display for Prompt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (rows, cols) = self.table.shape();

        writeln!(f, "{}", self.instructions.trim())?;
        writeln!(f)?;
        writeln!(
            f,
            "You are a data analyst. The dataset \"{}\" has {} rows and {} columns:",
            self.dataset, rows, cols
        )?;
        for (i, column) in self.table.columns().iter().enumerate() {
            let kind = match self.table.column_kind(i) {
                ColumnKind::Integer => "integer",
                ColumnKind::Float => "number",
                ColumnKind::Text => "text",
                ColumnKind::Empty => "empty",
            };
            writeln!(f, "- {} ({})", column, kind)?;
        }
        writeln!(f)?;
        writeln!(f, "First rows:")?;
        writeln!(f, "{}", preview_csv(self.table))?;

        if !self.memory.is_empty() {
            writeln!(f, "Conversation so far:")?;
            for exchange in self.memory {
                writeln!(f, "Q: {}", exchange.question)?;
                writeln!(f, "A: {}", exchange.answer)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "{}", REPLY_PROTOCOL)?;
        writeln!(f)?;
        write!(f, "Question: {}", self.question.trim())
    }
}

fn preview_csv(table: &DataTable) -> String {
    DataTable::new(table.columns().to_vec(), table.head(PREVIEW_ROWS).to_vec())
        .and_then(|head| head.to_csv())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_table_memory_and_question() {
        let table = DataTable::from_csv(b"name,height\nAlice,170\nBob,180\n").unwrap();
        let mut memory = VecDeque::new();
        memory.push_back(Exchange {
            question: "who is tallest?".into(),
            answer: "Bob".into(),
        });
        let prompt = Prompt {
            instructions: "Be brief.",
            dataset: "people.csv",
            table: &table,
            memory: &memory,
            question: " average height? ",
        }
        .to_string();

        assert!(prompt.starts_with("Be brief."));
        assert!(prompt.contains("\"people.csv\" has 2 rows and 2 columns"));
        assert!(prompt.contains("- height (integer)"));
        assert!(prompt.contains("Alice,170"));
        assert!(prompt.contains("Q: who is tallest?\nA: Bob"));
        assert!(prompt.ends_with("Question: average height?"));
    }

    #[test]
    fn preview_is_limited() {
        let mut csv = String::from("n\n");
        for i in 0..20 {
            csv.push_str(&format!("{i}\n"));
        }
        let table = DataTable::from_csv(csv.as_bytes()).unwrap();
        assert_eq!(preview_csv(&table).lines().count(), PREVIEW_ROWS + 1);
    }
}
