pub mod columns;

use serde::Serialize;
use tracing::{debug, warn};

use crate::db::executor::{ExecutionResult, Record};
use crate::util::words::Words;
use columns::{compare_by, group_labels, label_and_value};

const PIE_MAX_ROWS: usize = 20;
const BAR_MAX_ROWS: usize = 50;
const RANKING_LIMIT: usize = 15;

const PIE_KEYWORDS: &[&str] = &["breakdown", "category", "type", "status", "state", "department"];
const TIME_KEYWORDS: &[&str] = &["monthly", "weekly", "daily", "trend", "volume"];
const TIME_COLUMN_HINTS: &[&str] = &["date", "time", "month", "week", "day", "year", "quarter"];
const RANKING_KEYWORDS: &[&str] = &["top", "highest", "largest"];
const RANKING_PHRASES: &[&str] = &["by company", "by department"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Pie,
    Line,
    Bar,
    None,
}

/// What to draw. `data` holds the rows in drawing order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub data: Vec<Record>,
}

impl ChartSpec {
    pub fn none() -> Self {
        Self {
            kind: ChartKind::None,
            x_field: None,
            y_field: None,
            group_field: None,
            title: None,
            data: Vec::new(),
        }
    }

    fn new(kind: ChartKind, x: &str, y: &str, title: String, data: Vec<Record>) -> Self {
        Self {
            kind,
            x_field: Some(x.to_string()),
            y_field: Some(y.to_string()),
            group_field: None,
            title: Some(title),
            data,
        }
    }
}

struct Input<'a> {
    question: &'a str,
    words: Words,
    result: &'a ExecutionResult,
}

struct ChartRule {
    name: &'static str,
    apply: fn(&Input) -> Option<ChartSpec>,
}

// Evaluated in order; the first rule producing a chart wins.
const RULES: &[ChartRule] = &[
    ChartRule { name: "unchartable", apply: unchartable },
    ChartRule { name: "pie", apply: pie },
    ChartRule { name: "time_series", apply: time_series },
    ChartRule { name: "ranking", apply: ranking },
    ChartRule { name: "bar", apply: default_bar },
];

/// Chooses a chart for a result. Pure: same input, same chart.
pub fn choose_chart(question: &str, result: &ExecutionResult) -> ChartSpec {
    let input = Input {
        question: question.trim(),
        words: Words::new(question),
        result,
    };

    for rule in RULES {
        if let Some(chart) = (rule.apply)(&input) {
            debug!("Chart rule {} chose {:?}", rule.name, chart.kind);
            return chart;
        }
    }
    ChartSpec::none()
}

fn unchartable(input: &Input) -> Option<ChartSpec> {
    let result = input.result;
    if result.error.is_some() || result.columns.len() < 2 || result.rows.is_empty() {
        Some(ChartSpec::none())
    } else {
        None
    }
}

fn pie(input: &Input) -> Option<ChartSpec> {
    if !input.words.has_any_word(PIE_KEYWORDS) || input.result.row_count > PIE_MAX_ROWS {
        return None;
    }
    let (names, values) = label_and_value(input.result)?;
    Some(ChartSpec::new(
        ChartKind::Pie,
        names,
        values,
        format!("Breakdown: {}", input.question),
        input.result.rows.clone(),
    ))
}

fn looks_temporal(input: &Input) -> bool {
    if input.words.has_any_word(TIME_KEYWORDS) || input.words.contains("over time") {
        return true;
    }
    input.result.columns.first().is_some_and(|c| {
        let c = c.to_lowercase();
        TIME_COLUMN_HINTS.iter().any(|hint| c.contains(hint))
    })
}

fn time_series(input: &Input) -> Option<ChartSpec> {
    if !looks_temporal(input) {
        return None;
    }
    let columns = &input.result.columns;
    let (x, y) = (&columns[0], &columns[1]);

    let mut data = input.result.rows.clone();
    data.sort_by(compare_by(x));

    let mut chart = ChartSpec::new(
        ChartKind::Line,
        x,
        y,
        format!("Time Series: {}", input.question),
        data,
    );

    if let Some(group) = columns.get(2) {
        match group_labels(&chart.data, group) {
            Ok(_) => {
                chart.title = Some(format!("Time Series by {}: {}", group, input.question));
                chart.group_field = Some(group.clone());
            }
            Err(e) => warn!("Drawing an ungrouped line: {}", e),
        }
    }
    Some(chart)
}

fn ranking(input: &Input) -> Option<ChartSpec> {
    let words = &input.words;
    if !words.has_any_word(RANKING_KEYWORDS) && !words.contains_any(RANKING_PHRASES) {
        return None;
    }
    let (label, value) = label_and_value(input.result)?;

    let mut data = input.result.rows.clone();
    let by_value = compare_by(value);
    data.sort_by(|a, b| by_value(b, a));
    data.truncate(RANKING_LIMIT);

    Some(ChartSpec::new(
        ChartKind::Bar,
        label,
        value,
        format!("Top {}: {}", RANKING_LIMIT, input.question),
        data,
    ))
}

fn default_bar(input: &Input) -> Option<ChartSpec> {
    if input.result.row_count > BAR_MAX_ROWS {
        return None;
    }
    let (label, value) = label_and_value(input.result)?;
    Some(ChartSpec::new(
        ChartKind::Bar,
        label,
        value,
        format!("Analysis: {}", input.question),
        input.result.rows.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn result(columns: &[&str], rows: Vec<Vec<Value>>) -> ExecutionResult {
        let columns: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        let rows = rows
            .into_iter()
            .map(|values| columns.iter().cloned().zip(values).collect::<Record>())
            .collect();
        ExecutionResult::success(columns, rows, 0.01)
    }

    fn column(chart: &ChartSpec, name: &str) -> Vec<Value> {
        chart.data.iter().map(|r| r[name].clone()).collect()
    }

    #[test]
    fn monthly_volumes_draw_a_sorted_line() {
        let result = result(
            &["month", "volume"],
            vec![
                vec![json!("2024-03-01"), json!(12)],
                vec![json!("2024-01-01"), json!(7)],
                vec![json!("2024-02-01"), json!(9)],
            ],
        );

        let chart = choose_chart("monthly volumes", &result);
        assert_eq!(chart.kind, ChartKind::Line);
        assert_eq!(chart.x_field.as_deref(), Some("month"));
        assert_eq!(chart.y_field.as_deref(), Some("volume"));
        assert_eq!(chart.group_field, None);
        assert_eq!(chart.title.as_deref(), Some("Time Series: monthly volumes"));
        assert_eq!(
            column(&chart, "month"),
            vec![json!("2024-01-01"), json!("2024-02-01"), json!("2024-03-01")]
        );
    }

    #[test]
    fn state_breakdown_draws_a_pie() {
        let result = result(
            &["state", "count"],
            vec![vec![json!("CA"), json!(10)], vec![json!("NY"), json!(4)]],
        );

        let chart = choose_chart("breakdown by state", &result);
        assert_eq!(chart.kind, ChartKind::Pie);
        assert_eq!(chart.x_field.as_deref(), Some("state"));
        assert_eq!(chart.y_field.as_deref(), Some("count"));
        assert_eq!(chart.title.as_deref(), Some("Breakdown: breakdown by state"));
        assert_eq!(chart.data, result.rows);
    }

    #[test]
    fn empty_or_failed_results_have_no_chart() {
        let empty = result(&["state", "count"], vec![]);
        for question in ["breakdown by state", "monthly volume", "top companies", ""] {
            assert_eq!(choose_chart(question, &empty), ChartSpec::none());
        }

        let failed = ExecutionResult::failure(
            &crate::error::ExecutionError::Query("syntax error".to_string()),
            0.0,
        );
        assert_eq!(choose_chart("breakdown by state", &failed).kind, ChartKind::None);

        let single = result(&["n"], vec![vec![json!(1)]]);
        assert_eq!(choose_chart("top", &single).kind, ChartKind::None);
    }

    #[test]
    fn large_breakdowns_are_not_pies() {
        let rows = (0..21).map(|i| vec![json!(format!("s{i:02}")), json!(i)]).collect();
        let chart = choose_chart("breakdown by state", &result(&["state", "count"], rows));
        assert_eq!(chart.kind, ChartKind::Bar);
        assert_eq!(chart.title.as_deref(), Some("Analysis: breakdown by state"));
    }

    #[test]
    fn date_like_first_column_means_time_series() {
        let result = result(
            &["created_date", "signups", "filing_state"],
            vec![
                vec![json!("2024-02-01"), json!(3), json!("NY")],
                vec![json!("2024-01-01"), json!(5), json!("CA")],
            ],
        );
        let chart = choose_chart("signups", &result);
        assert_eq!(chart.kind, ChartKind::Line);
        assert_eq!(chart.group_field.as_deref(), Some("filing_state"));
        assert_eq!(chart.title.as_deref(), Some("Time Series by filing_state: signups"));
        assert_eq!(column(&chart, "signups"), vec![json!(5), json!(3)]);
    }

    #[test]
    fn unlabelled_groups_degrade_to_a_plain_line() {
        let result = result(
            &["week", "volume", "segment"],
            vec![
                vec![json!("2024-01-08"), json!(3), json!(null)],
                vec![json!("2024-01-01"), json!(5), json!("smb")],
            ],
        );
        let chart = choose_chart("weekly volume", &result);
        assert_eq!(chart.kind, ChartKind::Line);
        assert_eq!(chart.group_field, None);
        assert_eq!(chart.x_field.as_deref(), Some("week"));
        assert_eq!(chart.title.as_deref(), Some("Time Series: weekly volume"));
    }

    #[test]
    fn rankings_sort_descending_and_keep_fifteen() {
        let rows = (0..30)
            .map(|i| vec![json!(format!("Company {i}")), json!((i * 7) % 30)])
            .collect();
        let result = result(&["name", "employees"], rows);

        let chart = choose_chart("Top companies by employees", &result);
        assert_eq!(chart.kind, ChartKind::Bar);
        assert_eq!(chart.x_field.as_deref(), Some("name"));
        assert_eq!(chart.y_field.as_deref(), Some("employees"));
        assert_eq!(chart.data.len(), 15);
        assert_eq!(chart.title.as_deref(), Some("Top 15: Top companies by employees"));
        let employees = column(&chart, "employees");
        assert_eq!(employees.first(), Some(&json!(29)));
        assert_eq!(employees.last(), Some(&json!(15)));
    }

    #[test]
    fn default_bar_needs_labels_and_few_rows() {
        let numbers = result(&["a", "b"], vec![vec![json!(1), json!(2)]]);
        assert_eq!(choose_chart("anything", &numbers).kind, ChartKind::None);

        let labelled = result(&["name", "total"], vec![vec![json!("x"), json!(2)]]);
        let chart = choose_chart("anything", &labelled);
        assert_eq!(chart.kind, ChartKind::Bar);
        assert_eq!(chart.title.as_deref(), Some("Analysis: anything"));

        let rows = (0..51).map(|i| vec![json!(format!("n{i}")), json!(i)]).collect();
        assert_eq!(
            choose_chart("anything", &result(&["name", "total"], rows)).kind,
            ChartKind::None
        );
    }

    #[test]
    fn choice_is_deterministic() {
        let result = result(
            &["department_name", "headcount"],
            vec![vec![json!("Risk"), json!(4)], vec![json!("Sales"), json!(9)]],
        );
        let first = choose_chart("headcount by department", &result);
        for _ in 0..5 {
            assert_eq!(choose_chart("headcount by department", &result), first);
        }
        assert_eq!(first.kind, ChartKind::Pie);
    }

    #[test]
    fn serializes_without_absent_fields() {
        let value = serde_json::to_value(ChartSpec::none()).unwrap();
        assert_eq!(value, json!({"kind": "none", "data": []}));
    }
}
