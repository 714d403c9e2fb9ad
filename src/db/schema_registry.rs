use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Column types used when materializing the registry (demo warehouse).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DataType {
    BigInt,
    Integer,
    Double,
    Varchar,
    Boolean,
    Date,
    Timestamp,
}

impl DataType {
    pub fn to_sql_type(&self) -> &'static str {
        match self {
            DataType::BigInt => "BIGINT",
            DataType::Integer => "INTEGER",
            DataType::Double => "DOUBLE",
            DataType::Varchar => "VARCHAR",
            DataType::Boolean => "BOOLEAN",
            DataType::Date => "DATE",
            DataType::Timestamp => "TIMESTAMP",
        }
    }

    /// Infers a column type from warehouse naming conventions.
    pub fn infer(column: &str) -> Self {
        let name = column.to_ascii_lowercase();

        if name.starts_with("is_")
            || name.starts_with("has_")
            || name.starts_with("had_")
            || name.ends_with("_flag")
            || matches!(
                name.as_str(),
                "pass_through" | "dismissed" | "refund" | "cleared" | "in_flight" | "pe"
                    | "notify_if_error" | "resubmit_if_error" | "company_transaction"
                    | "hide_from_review_queue" | "from_partner_program" | "partner_billing"
                    | "bill_to_accountant" | "bill_to_client" | "volume_discount_eligible"
                    | "supports_multiple_pay_schedules"
            )
        {
            return DataType::Boolean;
        }
        if name.ends_with("_at") || name.ends_with("_ts") || name.ends_with("_tstamp") {
            return DataType::Timestamp;
        }
        if name.ends_with("_date") || name.ends_with("_dt") || name == "calendar_date" {
            return DataType::Date;
        }
        if name == "id" || name.ends_with("_id") {
            return DataType::BigInt;
        }
        if name.contains("amount")
            || name.starts_with("median_")
            || name.starts_with("mrr_")
            || name.ends_with("_total_debit")
        {
            return DataType::Double;
        }
        if name.starts_with("number_")
            || name.ends_with("_count")
            || name.ends_with("_days")
            || name.ends_with("_in_days")
            || name.starts_with("days_")
            || matches!(
                name.as_str(),
                "year" | "quarter" | "company_age" | "week_in_month" | "successful_credits"
                    | "successful_debits" | "recovery_debits" | "risk_state" | "batch"
            )
        {
            return DataType::Integer;
        }
        DataType::Varchar
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    /// Schema-qualified, e.g. `bi.companies`.
    pub table_name: String,
    pub columns: Vec<String>,
    pub description: Option<String>,
}

impl TableSchema {
    pub fn new(table_name: &str, columns: &[&str], description: Option<&str>) -> Self {
        Self {
            table_name: table_name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            description: description.map(str::to_string),
        }
    }

    pub fn schema_name(&self) -> &str {
        self.table_name
            .split_once('.')
            .map(|(schema, _)| schema)
            .unwrap_or("main")
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.eq_ignore_ascii_case(column))
    }

    /// `table: col, col, ...` line used in the generation prompt.
    pub fn to_prompt_line(&self) -> String {
        format!("{}: {}", self.table_name, self.columns.join(", "))
    }

    pub fn to_create_table_sql(&self) -> String {
        let columns_sql: Vec<String> = self
            .columns
            .iter()
            .map(|col| format!("\"{}\" {}", col, DataType::infer(col).to_sql_type()))
            .collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
            self.table_name,
            columns_sql.join(",\n    ")
        )
    }
}

/// Static mapping of warehouse tables, loaded once at startup.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaRegistry {
    tables: Vec<TableSchema>,
}

impl SchemaRegistry {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    pub fn get(&self, table_name: &str) -> Option<&TableSchema> {
        self.tables
            .iter()
            .find(|t| t.table_name.eq_ignore_ascii_case(table_name))
    }

    pub fn to_prompt_context(&self) -> String {
        self.tables
            .iter()
            .map(TableSchema::to_prompt_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Schema-qualified tables named after FROM/JOIN that the registry lacks.
    pub fn unknown_tables(&self, sql: &str) -> Vec<String> {
        referenced_tables(sql)
            .into_iter()
            .filter(|t| self.get(t).is_none())
            .collect()
    }

    /// The fixed warehouse schema.
    pub fn warehouse() -> Self {
        Self::new(vec![
            TableSchema::new(
                "bi.companies",
                &[
                    "id", "name", "trade_name", "accounting_firm_id", "created_at", "company_lead_id",
                    "initial_company_size", "initial_employee_count", "segment_by_initial_size",
                    "segment_by_initial_employee_count", "initial_contractor_count", "approval_status",
                    "number_active_employees", "number_active_contractors",
                    "segment_by_current_employee_count", "segment_by_current_size", "joined_at",
                    "is_active", "finished_onboarding_at", "originally_finished_onboarding_at",
                    "last_finished_onboarding_at", "suspension_at", "is_soft_suspended",
                    "has_suspension_warning", "suspension_leaving_for", "suspension_created_at",
                    "active_wc_policy", "has_zenefits_integration", "filing_address_id", "filing_state",
                    "filing_city", "filing_zip", "mailing_address_id", "tax_payer_type", "pass_through",
                    "median_payroll_net_pay", "median_payroll_tax", "sic_code", "previous_payroll_provider",
                    "had_previous_provider", "has_accountant_collaborator", "is_bank_verified",
                    "has_bank_info", "from_partner_program", "partner_acquisition",
                    "volume_discount_eligible", "current_federal_deposit_schedule", "is_eftps_enabled",
                    "partner_billing", "bill_to_accountant", "bill_to_client", "bank_account_type",
                    "first_approved_at", "is_eligible_for_fast_ach", "has_fast_ach",
                    "supports_multiple_pay_schedules", "has_teams", "suggested_referral",
                    "suggested_referral_at", "suggested_referral_by_user", "estimated_company_founded_date",
                    "previous_payroll_provider_type", "current_flag", "updated_at", "industry_source", "slug",
                    "previous_payroll_provider_sub_type", "previous_company_id", "is_big_desk",
                    "lead_industry_classification", "is_big_desk_initial",
                    "number_active_contractors_current_mtd", "number_active_employees_current_mtd", "uuid",
                    "has_gws", "is_mrb", "previous_provider_in", "suspension_id", "dbt_incremental_ts",
                    "sales_program", "risk_state_description", "suspended_reason", "naics_code",
                    "user_provided_industry", "user_provided_sub_industry", "industry_classification",
                    "industry_title", "industry_custom_description", "suggested_referral_channel",
                    "bank_name", "snowplow__created_by_user_id", "etl_insert_ts", "etl_update_ts",
                ],
                Some("One row per customer company; filing_state is a two-letter code"),
            ),
            TableSchema::new(
                "bi.credit_delinquencies",
                &[
                    "company_id", "name", "payment_id", "payment_type", "payment_speed_in_days",
                    "expedite_reason", "off_cycle_reason", "processing_state", "debit_date", "debit_event",
                    "debit_amount_attempted", "error_code", "error_code_returned_at", "past_due_date",
                    "admin_comment", "admin_end_date", "successful_credits", "final_credit_reversal_date",
                    "successful_debits", "final_debit_date", "recovery_debits", "final_recovery_debit_date",
                    "wire_recovery_amount", "loi_recovered_amount", "wire_recovery_date", "is_credit_loss",
                    "recovery_needed_flag", "recovery_amount_needed", "in_flight", "recovered_amount",
                    "pending_amount", "delinquent_status", "final_date", "days_past_due", "is_cancelled",
                    "updated_at", "etl_comments", "dbt_incremental_ts",
                ],
                Some("Failed payroll debits awaiting recovery"),
            ),
            TableSchema::new(
                "bi.gusto_employees",
                &[
                    "dbt_id", "id", "sfdc_ee_id", "first_name", "last_name", "name", "nickname", "email",
                    "hired_at", "terminated_at", "department_name", "work_state", "status", "worker_type",
                    "worker_sub_type", "org", "job_title", "location", "team", "sub_team", "is_pe", "pe",
                    "pe_email", "sfdc_class_queue", "sfdc_benefits_class", "sfdc_profile_id",
                    "sfdc_userrole_id", "sfdc_userrole_name", "sfdc_user_id", "genesys_user_id",
                    "cxone_agent_id", "cxone_user_id", "updated_date", "lastmodified_ts", "effect_start_dt",
                    "effect_end_dt", "current_flag", "mu_id", "mu_name", "pe_sfdc_ee_id", "etl_insert_ts",
                    "etl_update_ts",
                ],
                Some("Internal staff directory"),
            ),
            TableSchema::new(
                "bi.information_requests",
                &[
                    "id", "resource_id", "resource_type", "submission_state", "situation", "queue",
                    "company_id", "requested_by_user_email", "hide_from_review_queue", "created_at",
                    "current_flag", "updated_at", "dbt_incremental_ts", "etl_insert_ts", "etl_update_ts",
                ],
                Some("Documents requested from companies during review"),
            ),
            TableSchema::new(
                "bi.penalty_cases",
                &[
                    "id", "agent_id", "agency_name", "created_at", "year", "quarter", "title",
                    "total_interest_amount", "error_type", "total_penalty_amount", "total_penalty_paid",
                    "total_interest_paid", "error_origin", "status", "updated_at", "penalty_group_id",
                    "agent_payment", "dbt_incremental_ts", "etl_insert_ts", "etl_update_ts",
                ],
                Some("Tax agency penalty notices"),
            ),
            TableSchema::new(
                "bi.penalty_groups",
                &[
                    "id", "penalty_case_id", "link", "ticket_system_of_record", "sor_ticket_id", "pay_to",
                    "batch", "approval_status", "created_at", "updated_at", "source_ts_tstamp",
                    "dbt_incremental_ts", "etl_insert_ts", "etl_update_ts",
                ],
                None,
            ),
            TableSchema::new(
                "bi_reporting.gusto_payments_and_losses",
                &[
                    "calendar_date", "week_in_month", "event_type", "company_id", "event_id",
                    "event_debit_date", "bank_name", "origination_account_id", "company_age",
                    "sales_program", "user_provided_industry", "product_plan", "initial_size",
                    "current_size", "is_mrb", "managing_accounting_firm_id", "partner_level_tier",
                    "is_gep_company", "gep_partner_name", "invoice_total_debit",
                    "mrr_payroll_pre_discounts", "mrr_payroll_post_discounts", "initiated_by", "error_code",
                    "error_code_returned_at", "event_speed_in_days", "ach_speed", "is_auto_pilot",
                    "plaid_connected_flag", "funding_type", "funding_method", "event_id_risk",
                    "transmission_flag", "processing_state", "original_status", "last_status",
                    "challenged_reasons", "unchallenged_reasons", "plaid_challenge_flag",
                    "pocm_challenge_flag", "only_pocm_challenge_flag", "pfqm_challenge_flag",
                    "reviewed_by_risk_model_flag", "event_gross_amount", "ato_flag", "credit_loss_flag",
                    "days_past_due", "recovery_date", "expected_debit_amount", "ne_successful_debit_amount",
                    "ep_successful_debit_amount", "final_successful_debit_amount", "failed_debits_count",
                    "failed_payment_flag", "failed_payment_amount", "failed_unrecovered_payment_amount",
                    "failed_payment_outstanding_amount", "recovered_amount", "net_loss_amount",
                    "etl_insert_ts",
                ],
                Some("Payment events with fraud and credit loss outcomes; date column is event_debit_date"),
            ),
            TableSchema::new(
                "bi.nacha_entries",
                &[
                    "id", "created_at_date", "batch_check_date", "amount", "company_id", "employee_id",
                    "contractor_id", "payroll_id", "contractor_payment_id", "agent_payment_id", "error_code",
                    "is_debit", "is_credit", "entry_code", "transaction_type", "is_test_deposit",
                    "is_invoice", "current_flag", "updated_at", "entry_id", "international_contractor_id",
                    "international_contractor_payment_id", "returned_code_at",
                    "international_employee_payroll_id", "nacha_batch_id", "bank_account_type",
                    "notify_if_error", "resubmit_if_error", "company_transaction", "bank_account_id",
                    "dismissed", "refund", "accounting_firm_id", "failed_entry_id", "cleared",
                    "requested_by_id", "payment_direction", "origination_account_id",
                    "effective_entry_date", "uuid", "submission_date", "dbt_incremental_ts",
                    "encrypted_bank_routing_number", "processing_state", "confirmation", "ach_trace_id",
                    "ach_type", "bank_account_hapii_id", "correction_code", "etl_insert_ts", "etl_update_ts",
                ],
                Some("ACH entries"),
            ),
        ])
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::warehouse()
    }
}

fn referenced_tables(sql: &str) -> Vec<String> {
    static TABLE_REF: OnceLock<Regex> = OnceLock::new();
    let re = TABLE_REF.get_or_init(|| {
        Regex::new(r"(?i)\b(?:from|join)\s+([a-z_][a-z0-9_]*\.[a-z_][a-z0-9_]*)")
            .expect("table reference pattern is valid")
    });

    re.captures_iter(sql)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect()
}
