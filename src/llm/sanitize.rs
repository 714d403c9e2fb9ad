use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

fn opens_query(line: &str) -> bool {
    let upper = line.trim_start().to_uppercase();
    upper.starts_with("SELECT") || upper.starts_with("WITH")
}

/// Body of the first fenced block. An info string on the opening line
/// (`sql`, `SQL`, `postgresql`, ...) is dropped.
fn fenced_block(content: &str) -> Option<&str> {
    let start = content.find("```")? + 3;
    let mut body = &content[start..];

    if let Some(newline) = body.find('\n') {
        let tag = body[..newline].trim();
        let is_tag = tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-'));
        if is_tag && !opens_query(tag) {
            body = &body[newline + 1..];
        }
    }

    let end = body.find("```").unwrap_or(body.len());
    Some(body[..end].trim())
}

/// Pulls the statement out of a completion that may be wrapped in
/// Markdown fences or surrounded by prose.
pub fn strip_code_fences(content: &str) -> String {
    if let Some(block) = fenced_block(content) {
        debug!("Extracted SQL from code block");
        return block.to_string();
    }

    // No fences: from the first line that opens a query up to the first
    // line ending the statement
    let lines: Vec<&str> = content.lines().collect();
    if let Some(first) = lines.iter().position(|line| opens_query(line)) {
        let last = lines[first..]
            .iter()
            .position(|line| line.trim_end().ends_with(';'))
            .map_or(lines.len(), |offset| first + offset + 1);
        debug!("Extracted SQL using line scanning");
        return lines[first..last].join("\n").trim().to_string();
    }

    content.trim().to_string()
}

fn trailing_limit_pattern() -> &'static Regex {
    static LIMIT: OnceLock<Regex> = OnceLock::new();
    LIMIT.get_or_init(|| {
        Regex::new(r"(?i)\blimit\s+\d+(?:\s+offset\s+\d+)?\s*;?\s*$")
            .expect("limit pattern is valid")
    })
}

/// Drops a `--` comment unless it sits inside a string literal.
fn strip_line_comment(line: &str) -> &str {
    let mut in_string = false;
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' => in_string = !in_string,
            b'-' if !in_string && bytes.get(i + 1) == Some(&b'-') => return &line[..i],
            _ => {}
        }
    }
    line
}

/// The statement with trailing blank lines and `--` comments removed.
fn statement_tail(sql: &str) -> String {
    let mut lines: Vec<&str> = sql.lines().map(strip_line_comment).collect();
    while lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// True when the outermost statement ends in `LIMIT n`. A limit inside a
/// CTE or subquery does not count.
pub fn has_row_limit(sql: &str) -> bool {
    trailing_limit_pattern().is_match(&statement_tail(sql))
}

/// Appends `LIMIT n` when the statement carries no limit. The clause goes
/// on its own line so a trailing `--` comment cannot swallow it.
pub fn ensure_row_limit(sql: &str, limit: u32) -> String {
    if has_row_limit(sql) {
        return sql.trim().to_string();
    }

    let body = sql.trim().trim_end_matches(';').trim_end();
    format!("{}\nLIMIT {}", body, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_sql_fences() {
        let response = "Here you go:\n```sql\nSELECT id FROM bi.companies LIMIT 5;\n```\nEnjoy.";
        assert_eq!(strip_code_fences(response), "SELECT id FROM bi.companies LIMIT 5;");
    }

    #[test]
    fn strips_plain_and_unterminated_fences() {
        assert_eq!(strip_code_fences("```\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(strip_code_fences("```sql\nSELECT 2"), "SELECT 2");
    }

    #[test]
    fn skips_leading_prose_without_fences() {
        let response = "The query is:\nSELECT name\nFROM bi.companies";
        assert_eq!(strip_code_fences(response), "SELECT name\nFROM bi.companies");
        assert_eq!(strip_code_fences("  SELECT 1  "), "SELECT 1");
    }

    #[test]
    fn keeps_an_existing_limit() {
        let sql = "SELECT * FROM bi.companies limit 20";
        assert_eq!(ensure_row_limit(sql, 100), sql);
    }

    #[test]
    fn appends_a_limit_after_semicolons_and_comments() {
        assert_eq!(
            ensure_row_limit("SELECT * FROM bi.companies;", 100),
            "SELECT * FROM bi.companies\nLIMIT 100"
        );
        let commented = ensure_row_limit("SELECT 1 -- one", 50);
        assert_eq!(commented, "SELECT 1 -- one\nLIMIT 50");
        assert!(has_row_limit(&commented));
    }

    #[test]
    fn drops_any_fence_info_string() {
        assert_eq!(strip_code_fences("```SQL\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(strip_code_fences("```postgresql\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(strip_code_fences("```sql  \nSELECT 1\n```"), "SELECT 1");
        assert_eq!(strip_code_fences("```SELECT 1```"), "SELECT 1");
    }

    #[test]
    fn stops_at_the_end_of_the_statement_without_fences() {
        let response = "Here is the query:\nSELECT 1;\n\nThis returns one row.";
        assert_eq!(strip_code_fences(response), "SELECT 1;");

        let multiline = "Sure.\nWITH t AS (SELECT 1 AS n)\nSELECT n FROM t;\nDone.";
        assert_eq!(
            strip_code_fences(multiline),
            "WITH t AS (SELECT 1 AS n)\nSELECT n FROM t;"
        );
    }

    #[test]
    fn an_inner_limit_does_not_bound_the_statement() {
        let cte = "WITH top AS (SELECT id FROM bi.companies LIMIT 5)\n\
                   SELECT * FROM bi_reporting.gusto_payments_and_losses p JOIN top ON p.company_id = top.id";
        assert!(!has_row_limit(cte));
        assert_eq!(ensure_row_limit(cte, 100), format!("{}\nLIMIT 100", cte));

        let subquery = "SELECT * FROM bi.companies WHERE id IN (SELECT company_id FROM bi.penalty_cases LIMIT 10)";
        assert!(!has_row_limit(subquery));
    }

    #[test]
    fn limits_hidden_in_comments_or_strings_do_not_count() {
        assert!(!has_row_limit("SELECT * FROM bi.companies -- LIMIT 10"));
        assert!(!has_row_limit("SELECT * FROM bi.companies WHERE name = 'LIMIT 10'"));
    }

    #[test]
    fn trailing_limits_with_offsets_and_comments_count() {
        assert!(has_row_limit("SELECT * FROM t LIMIT 10 OFFSET 20;"));
        assert!(has_row_limit("SELECT * FROM t\nLIMIT 20 -- top twenty\n"));
        assert!(has_row_limit("SELECT * FROM t LIMIT 100;"));
    }

    #[test]
    fn limit_detection_needs_a_number() {
        assert!(!has_row_limit("SELECT limit_amount FROM t"));
        assert!(has_row_limit("SELECT * FROM t LIMIT\n10"));
    }
}
