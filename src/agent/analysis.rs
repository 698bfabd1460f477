//! Local computation of the charts and aggregates the model asks for.

use super::reply::{AggregateSpec, ChartSpec};
use crate::normalize::AnalysisValue;
use crate::table::{ColumnKind, DataTable};

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("there is no column named '{0}'")]
    UnknownColumn(String),
    #[error("column '{0}' has no numeric values")]
    NotNumeric(String),
    #[error("unsupported chart kind '{0}'")]
    UnsupportedChart(String),
    #[error("unsupported operation '{0}'")]
    UnsupportedOperation(String),
    #[error("a {0} chart needs a y column")]
    MissingAxis(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Line,
    Bar,
    Scatter,
    Histogram,
    Box,
}

impl ChartKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "line" => Some(ChartKind::Line),
            "bar" => Some(ChartKind::Bar),
            "scatter" => Some(ChartKind::Scatter),
            "histogram" | "hist" => Some(ChartKind::Histogram),
            "box" | "boxplot" => Some(ChartKind::Box),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
            ChartKind::Scatter => "scatter",
            ChartKind::Histogram => "histogram",
            ChartKind::Box => "box",
        }
    }

    fn trace_type(self) -> &'static str {
        match self {
            ChartKind::Line | ChartKind::Scatter => "scatter",
            other => other.name(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Count,
    Sum,
    Mean,
    Min,
    Max,
}

impl AggregateOp {
    pub fn parse(op: &str) -> Option<Self> {
        match op.trim().to_ascii_lowercase().as_str() {
            "count" => Some(AggregateOp::Count),
            "sum" | "total" => Some(AggregateOp::Sum),
            "mean" | "avg" | "average" => Some(AggregateOp::Mean),
            "min" | "minimum" => Some(AggregateOp::Min),
            "max" | "maximum" => Some(AggregateOp::Max),
            _ => None,
        }
    }
}

fn column<'t>(table: &'t DataTable, name: &str) -> Result<(usize, &'t str), AnalysisError> {
    let index = table
        .column_index(name)
        .ok_or_else(|| AnalysisError::UnknownColumn(name.to_string()))?;
    Ok((index, table.columns()[index].as_str()))
}

fn require_numeric(table: &DataTable, index: usize, name: &str) -> Result<ColumnKind, AnalysisError> {
    match table.column_kind(index) {
        kind @ (ColumnKind::Integer | ColumnKind::Float) => Ok(kind),
        _ => Err(AnalysisError::NotNumeric(name.to_string())),
    }
}

fn cell_value(kind: ColumnKind, cell: &str) -> AnalysisValue {
    let cell = cell.trim();
    if cell.is_empty() {
        return AnalysisValue::Null;
    }
    match kind {
        ColumnKind::Integer => cell
            .parse()
            .map(AnalysisValue::Int64)
            .unwrap_or(AnalysisValue::Null),
        ColumnKind::Float => cell
            .parse()
            .map(AnalysisValue::Float64)
            .unwrap_or(AnalysisValue::Null),
        _ => AnalysisValue::str(cell),
    }
}

fn series(table: &DataTable, index: usize) -> AnalysisValue {
    let kind = table.column_kind(index);
    AnalysisValue::Array(
        table
            .column_values(index)
            .map(|cell| cell_value(kind, cell))
            .collect(),
    )
}

fn titled(text: impl Into<String>) -> AnalysisValue {
    AnalysisValue::map([("title", AnalysisValue::map([("text", AnalysisValue::str(text))]))])
}

/// Plotly-style figure (`data` traces plus `layout`) for the requested chart.
pub fn build_figure(table: &DataTable, spec: &ChartSpec) -> Result<AnalysisValue, AnalysisError> {
    let kind = ChartKind::parse(&spec.kind)
        .ok_or_else(|| AnalysisError::UnsupportedChart(spec.kind.clone()))?;
    let (x_index, x_name) = column(table, &spec.x)?;

    let mut trace = vec![("type", AnalysisValue::str(kind.trace_type()))];
    let y_name = if kind == ChartKind::Histogram {
        require_numeric(table, x_index, x_name)?;
        trace.push(("x", series(table, x_index)));
        "count"
    } else {
        let y_spec = spec
            .y
            .as_deref()
            .filter(|y| !y.trim().is_empty())
            .ok_or(AnalysisError::MissingAxis(kind.name()))?;
        let (y_index, y_name) = column(table, y_spec)?;
        require_numeric(table, y_index, y_name)?;
        trace.push(("x", series(table, x_index)));
        trace.push(("y", series(table, y_index)));
        trace.push(("name", AnalysisValue::str(y_name)));
        match kind {
            ChartKind::Line => trace.push(("mode", AnalysisValue::str("lines"))),
            ChartKind::Scatter => trace.push(("mode", AnalysisValue::str("markers"))),
            _ => {}
        }
        y_name
    };

    let title = spec
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| match kind {
            ChartKind::Histogram => format!("Distribution of {}", x_name),
            _ => format!("{} by {}", y_name, x_name),
        });

    let layout = AnalysisValue::map([
        ("title", AnalysisValue::map([("text", AnalysisValue::str(title))])),
        ("xaxis", titled(x_name)),
        ("yaxis", titled(y_name)),
    ]);

    Ok(AnalysisValue::map([
        ("data", AnalysisValue::List(vec![AnalysisValue::map(trace)])),
        ("layout", layout),
    ]))
}

/// Compute a single-column aggregate, boxed like any other scalar result.
pub fn aggregate(table: &DataTable, spec: &AggregateSpec) -> Result<AnalysisValue, AnalysisError> {
    let op = AggregateOp::parse(&spec.op)
        .ok_or_else(|| AnalysisError::UnsupportedOperation(spec.op.clone()))?;
    let (index, name) = column(table, &spec.column)?;
    let cells = || table.column_values(index).map(str::trim).filter(|c| !c.is_empty());

    if op == AggregateOp::Count {
        return Ok(AnalysisValue::boxed(AnalysisValue::Int64(cells().count() as i64)));
    }

    let value = match require_numeric(table, index, name)? {
        ColumnKind::Integer => {
            let ints: Vec<i64> = cells().filter_map(|c| c.parse().ok()).collect();
            match op {
                AggregateOp::Sum => {
                    let total: i128 = ints.iter().map(|&v| v as i128).sum();
                    i64::try_from(total)
                        .map(AnalysisValue::Int64)
                        .unwrap_or(AnalysisValue::Float64(total as f64))
                }
                AggregateOp::Mean => AnalysisValue::Float64(
                    ints.iter().map(|&v| v as f64).sum::<f64>() / ints.len() as f64,
                ),
                AggregateOp::Min => ints.iter().min().copied().map_or(AnalysisValue::Null, AnalysisValue::Int64),
                AggregateOp::Max => ints.iter().max().copied().map_or(AnalysisValue::Null, AnalysisValue::Int64),
                AggregateOp::Count => AnalysisValue::Int64(ints.len() as i64),
            }
        }
        _ => {
            let floats: Vec<f64> = cells().filter_map(|c| c.parse().ok()).collect();
            match op {
                AggregateOp::Sum => AnalysisValue::Float64(floats.iter().sum()),
                AggregateOp::Mean => {
                    AnalysisValue::Float64(floats.iter().sum::<f64>() / floats.len() as f64)
                }
                AggregateOp::Min => AnalysisValue::Float64(floats.iter().copied().fold(f64::INFINITY, f64::min)),
                AggregateOp::Max => {
                    AnalysisValue::Float64(floats.iter().copied().fold(f64::NEG_INFINITY, f64::max))
                }
                AggregateOp::Count => AnalysisValue::Int64(floats.len() as i64),
            }
        }
    };
    Ok(AnalysisValue::boxed(value))
}
