use crate::db::schema_registry::SchemaRegistry;
use crate::llm::models::ValidatedQuery;

const BUSINESS_RULES: &[&str] = &[
    "Use ONLY the columns listed above",
    "Use proper table names with schema (e.g., bi.companies)",
    "Add LIMIT 100 to prevent large results",
    "Use proper SQL syntax for Redshift",
    "For time-based queries, use DATE_TRUNC for aggregations",
    "For time-based aggregations, ALWAYS add ORDER BY time_column DESC to show most recent first",
    "For monthly/weekly/daily aggregations, sort by the time period in descending order",
    "For bi_reporting.gusto_payments_and_losses, ALWAYS use event_debit_date as the date column for time-based queries",
    "Fraud loss transactions use credit_loss_flag = false (is_credit_loss = false for bi.credit_delinquencies); \
     credit loss transactions use credit_loss_flag = true (is_credit_loss = true for bi.credit_delinquencies)",
    "In bi.companies, filing_state is ALWAYS a 2-letter uppercase state abbreviation, e.g. WHERE filing_state = 'CA'",
    "For ATO (account takeover) payments ALWAYS filter on ato_flag: ato_flag = true for ATO, ato_flag = false otherwise",
];

pub const VALIDATED_QUERIES: &[ValidatedQuery] = &[
    ValidatedQuery {
        question: "Show me fraud companies created in the last 30 days",
        sql: "SELECT c.id, c.name, ro.risk_state, ro.risk_state_description, c.created_at
FROM bi.companies c
JOIN bi.risk_onboarding ro ON c.id = ro.company_id
WHERE ro.risk_state IN (2,3,7,9,12,13,14,15,17,20,22)
  AND c.created_at >= CURRENT_DATE - INTERVAL '30 days'
ORDER BY c.created_at DESC
LIMIT 100;",
    },
    ValidatedQuery {
        question: "Get fraud loss transactions from last month",
        sql: "SELECT company_id, event_id, event_debit_date, event_gross_amount,
       recovered_amount, net_loss_amount
FROM bi_reporting.gusto_payments_and_losses
WHERE credit_loss_flag = false
  AND event_debit_date >= DATE_TRUNC('month', CURRENT_DATE - INTERVAL '1 month')
  AND event_debit_date < DATE_TRUNC('month', CURRENT_DATE)
ORDER BY event_debit_date DESC
LIMIT 100;",
    },
    ValidatedQuery {
        question: "Show companies with high risk tiers in California",
        sql: "SELECT c.id, c.name, c.filing_state, t.combined_risk_tier, t.fraud_risk_tier
FROM bi.companies c
JOIN zenpayroll_production_no_pii.customer_risk_tiers t ON t.company_id = c.id
WHERE c.filing_state = 'CA'
  AND t.combined_risk_tier IN ('Tier C', 'Tier D', 'Tier E')
ORDER BY t.fraud_risk_tier DESC
LIMIT 100;",
    },
    ValidatedQuery {
        question: "Get recent AI agent decisions with company details",
        sql: "SELECT d.company_id, c.name, d.decision, d.status,
       d.trust_analyst_decision, d.trust_analyst_confidence,
       d.risk_analyst_decision, d.risk_analyst_confidence,
       d.created_at
FROM zenpayroll_production_no_pii.risk_onboarding_ai_agent_decisions d
JOIN bi.companies c ON d.company_id = c.id
WHERE d.created_at >= CURRENT_DATE - INTERVAL '7 days'
ORDER BY d.created_at DESC
LIMIT 100;",
    },
    ValidatedQuery {
        question: "Show ATO transactions with losses greater than $1000",
        sql: "SELECT company_id, event_id, event_debit_date, event_gross_amount,
       recovered_amount, net_loss_amount, ato_flag
FROM bi_reporting.gusto_payments_and_losses
WHERE ato_flag = true
  AND net_loss_amount > 1000
  AND failed_payment_flag = true
ORDER BY net_loss_amount DESC
LIMIT 100;",
    },
];

fn examples_section(examples: &[ValidatedQuery]) -> String {
    let mut text = String::from("Example validated queries (learn from these patterns):\n\n");
    for (idx, example) in examples.iter().enumerate() {
        text.push_str(&format!("{}. Query: \"{}\"\n", idx + 1, example.question));
        text.push_str(&format!("   SQL: {}\n\n", example.sql));
    }
    text.push_str(
        "Learn from these patterns: date ranges, proper joins, boolean flags, risk_state values, tier formats.\n",
    );
    text
}

/// Builds the single completion prompt for a question.
pub fn build_prompt(registry: &SchemaRegistry, question: &str) -> String {
    let rules = BUSINESS_RULES
        .iter()
        .enumerate()
        .map(|(idx, rule)| format!("{}. {}", idx + 1, rule))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a SQL expert for the company's data warehouse. \
         Generate a SQL query for the natural language request.\n\n\
         Available tables and columns:\n{}\n\n\
         Rules:\n{}\n\n\
         {}\n\
         User query: {}\n\n\
         Respond with the SQL only.\n\
         Generate SQL:",
        registry.to_prompt_context(),
        rules,
        examples_section(VALIDATED_QUERIES),
        question.trim()
    )
}
