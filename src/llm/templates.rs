use crate::util::words::Words;
use tracing::debug;

/// A keyword rule and the canned SQL it produces.
pub struct TemplateRule {
    pub name: &'static str,
    matches: fn(&Words) -> bool,
    render: fn(&Words) -> String,
}

impl TemplateRule {
    pub fn matches(&self, words: &Words) -> bool {
        (self.matches)(words)
    }

    pub fn render(&self, words: &Words) -> String {
        (self.render)(words)
    }
}

/// Rules in evaluation order; the first match wins.
pub static RULES: &[TemplateRule] = &[
    TemplateRule {
        name: "credit_delinquencies_30_days",
        matches: |w| w.contains("credit delinquenc") && w.contains("30 days"),
        render: |_| CREDIT_DELINQUENCIES_30_DAYS.to_string(),
    },
    TemplateRule {
        name: "employee_count",
        matches: |w| w.contains("employee count"),
        render: |_| EMPLOYEE_COUNT.to_string(),
    },
    TemplateRule {
        name: "time_volume",
        matches: |w| {
            Granularity::from_words(w).is_some() && w.has_any_word(&["volume", "count", "total"])
        },
        render: time_volume_sql,
    },
    TemplateRule {
        name: "california_risk",
        matches: |w| w.contains_any(&["california", "risk"]),
        render: |_| CALIFORNIA_RISK.to_string(),
    },
    TemplateRule {
        name: "penalty_cases",
        matches: |w| w.contains("penalt"),
        render: |_| PENALTY_CASES.to_string(),
    },
    TemplateRule {
        name: "information_requests",
        matches: |w| w.contains("information request"),
        render: |_| INFORMATION_REQUESTS.to_string(),
    },
];

pub const DEFAULT_RULE: &str = "active_companies";

/// Picks the template for a question. Always returns SQL.
pub fn match_template(question: &str) -> (&'static str, String) {
    let words = Words::new(question);

    for rule in RULES {
        if rule.matches(&words) {
            debug!("Question matched template rule {}", rule.name);
            return (rule.name, rule.render(&words));
        }
    }

    debug!("No template rule matched, using {}", DEFAULT_RULE);
    (DEFAULT_RULE, ACTIVE_COMPANIES.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Month,
    Week,
    Day,
}

impl Granularity {
    fn from_words(words: &Words) -> Option<Self> {
        if words.has_word("monthly") {
            Some(Granularity::Month)
        } else if words.has_word("weekly") {
            Some(Granularity::Week)
        } else if words.has_word("daily") {
            Some(Granularity::Day)
        } else {
            None
        }
    }

    /// `DATE_TRUNC` unit, also used as the column alias.
    pub fn unit(&self) -> &'static str {
        match self {
            Granularity::Month => "month",
            Granularity::Week => "week",
            Granularity::Day => "day",
        }
    }
}

fn time_volume_sql(words: &Words) -> String {
    let unit = Granularity::from_words(words)
        .unwrap_or(Granularity::Month)
        .unit();

    if words.contains_any(&["payment", "loss"]) {
        format!(
            "SELECT DATE_TRUNC('{unit}', event_debit_date) AS {unit}, COUNT(*) AS volume\n\
             FROM bi_reporting.gusto_payments_and_losses\n\
             GROUP BY 1\n\
             ORDER BY 1 DESC\n\
             LIMIT 100"
        )
    } else {
        format!(
            "SELECT DATE_TRUNC('{unit}', created_at) AS {unit}, COUNT(*) AS new_companies\n\
             FROM bi.companies\n\
             GROUP BY 1\n\
             ORDER BY 1 DESC\n\
             LIMIT 100"
        )
    }
}

const CREDIT_DELINQUENCIES_30_DAYS: &str = "\
SELECT company_id, name, payment_id, debit_date, debit_amount_attempted, days_past_due, delinquent_status
FROM bi.credit_delinquencies
WHERE days_past_due > 30
  AND is_cancelled = false
ORDER BY days_past_due DESC
LIMIT 100";

const EMPLOYEE_COUNT: &str = "\
SELECT id, name, number_active_employees
FROM bi.companies
WHERE is_active = true
ORDER BY number_active_employees DESC
LIMIT 20";

const CALIFORNIA_RISK: &str = "\
SELECT id, name, filing_state, risk_state_description, approval_status, created_at
FROM bi.companies
WHERE filing_state = 'CA'
  AND risk_state_description IS NOT NULL
ORDER BY created_at DESC
LIMIT 100";

const PENALTY_CASES: &str = "\
SELECT id, agency_name, title, status, total_penalty_amount, total_penalty_paid, created_at
FROM bi.penalty_cases
ORDER BY total_penalty_amount DESC
LIMIT 100";

const INFORMATION_REQUESTS: &str = "\
SELECT id, company_id, resource_type, submission_state, situation, queue, created_at
FROM bi.information_requests
WHERE current_flag = true
ORDER BY created_at DESC
LIMIT 100";

const ACTIVE_COMPANIES: &str = "\
SELECT id, name, filing_state, number_active_employees, created_at
FROM bi.companies
WHERE is_active = true
ORDER BY created_at DESC
LIMIT 100";
