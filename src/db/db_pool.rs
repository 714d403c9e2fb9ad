use chrono::{DateTime, Days, NaiveDate};
use duckdb::Connection;
use duckdb::types::{TimeUnit, Value as DuckValue};
use r2d2::{CustomizeConnection, ManageConnection, Pool};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::executor::{unique_columns, QueryOutput, Record, WarehouseConnection};
use crate::db::schema_registry::SchemaRegistry;
use crate::error::ExecutionError;

pub const IN_MEMORY: &str = ":memory:";

pub struct DuckDBConnectionManager {
    connection_string: String,
}

impl DuckDBConnectionManager {
    pub fn new(connection_string: String) -> Self {
        Self { connection_string }
    }

    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY.to_string())
    }
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        if self.connection_string == IN_MEMORY {
            Connection::open_in_memory()
        } else {
            Connection::open(&self.connection_string)
        }
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute("SELECT 1", [])?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

/// Creates the registry's tables and loads the sample rows on every new
/// connection, so each in-memory database is an identical copy.
#[derive(Debug)]
pub struct DemoSeeder {
    registry: Arc<SchemaRegistry>,
}

impl DemoSeeder {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn seed_sql(&self) -> String {
        let mut schemas: Vec<&str> = self
            .registry
            .tables()
            .iter()
            .map(|t| t.schema_name())
            .collect();
        schemas.sort_unstable();
        schemas.dedup();

        let mut sql = String::new();
        for schema in schemas {
            sql.push_str(&format!("CREATE SCHEMA IF NOT EXISTS {};\n", schema));
        }
        for table in self.registry.tables() {
            sql.push_str(&table.to_create_table_sql());
            sql.push('\n');
        }
        sql.push_str(SAMPLE_ROWS);
        sql
    }
}

impl CustomizeConnection<Connection, duckdb::Error> for DemoSeeder {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), duckdb::Error> {
        conn.execute_batch(&self.seed_sql())?;
        debug!("Seeded demo warehouse connection");
        Ok(())
    }
}

/// A pool of seeded in-memory demo warehouses.
pub fn demo_pool(size: u32) -> Result<Pool<DuckDBConnectionManager>, r2d2::Error> {
    info!("Initializing demo warehouse pool (size {})", size);
    Pool::builder()
        .max_size(size.max(1))
        .connection_customizer(Box::new(DemoSeeder::new(Arc::new(SchemaRegistry::warehouse()))))
        .build(DuckDBConnectionManager::in_memory())
}

impl WarehouseConnection for Connection {
    fn fetch_all(&mut self, sql: &str) -> Result<QueryOutput, ExecutionError> {
        let query_error = |e: duckdb::Error| ExecutionError::Query(e.to_string());

        let mut stmt = self.prepare(sql).map_err(query_error)?;
        let mut rows = stmt.query([]).map_err(query_error)?;

        let columns = unique_columns(
            rows.as_ref()
                .map(|s| s.column_names())
                .unwrap_or_default(),
        );

        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(query_error)? {
            let mut record = Record::new();
            for (i, name) in columns.iter().enumerate() {
                let value: DuckValue = row.get(i).map_err(query_error)?;
                record.insert(name.clone(), duck_to_json(value));
            }
            records.push(record);
        }

        Ok(QueryOutput {
            columns,
            rows: records,
        })
    }
}

fn number(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

fn date_from_days(days: i32) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    if days >= 0 {
        epoch.checked_add_days(Days::new(days as u64))
    } else {
        epoch.checked_sub_days(Days::new(days.unsigned_abs() as u64))
    }
}

fn duck_to_json(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(v) => Value::from(v),
        DuckValue::SmallInt(v) => Value::from(v),
        DuckValue::Int(v) => Value::from(v),
        DuckValue::BigInt(v) => Value::from(v),
        DuckValue::HugeInt(v) => number(v as f64),
        DuckValue::UTinyInt(v) => Value::from(v),
        DuckValue::USmallInt(v) => Value::from(v),
        DuckValue::UInt(v) => Value::from(v),
        DuckValue::UBigInt(v) => Value::from(v),
        DuckValue::Float(v) => number(v as f64),
        DuckValue::Double(v) => number(v),
        DuckValue::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map(number)
            .unwrap_or(Value::Null),
        DuckValue::Text(s) => Value::String(s),
        DuckValue::Date32(days) => date_from_days(days)
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        DuckValue::Timestamp(unit, v) => DateTime::from_timestamp_micros(to_micros(unit, v))
            .map(|ts| Value::String(ts.naive_utc().format("%Y-%m-%d %H:%M:%S").to_string()))
            .unwrap_or(Value::Null),
        other => Value::String(format!("{:?}", other)),
    }
}

// Deterministic rows covering every template query.
const SAMPLE_ROWS: &str = r#"
INSERT INTO bi.companies (id, name, trade_name, created_at, filing_state, filing_city,
    number_active_employees, number_active_contractors, is_active, approval_status,
    risk_state_description, sales_program, industry_title, updated_at)
SELECT i,
       concat('Company ', i),
       concat('Trade ', i),
       TIMESTAMP '2024-01-03 09:00:00' + INTERVAL (i * 11) DAY,
       ['CA', 'NY', 'TX', 'WA', 'CO'][(i % 5) + 1],
       ['San Francisco', 'New York', 'Austin', 'Seattle', 'Denver'][(i % 5) + 1],
       (i * 37) % 240 + 3,
       (i * 7) % 15,
       i % 6 <> 0,
       CASE WHEN i % 6 = 0 THEN 'rejected' ELSE 'approved' END,
       CASE WHEN i % 4 = 0 THEN 'flagged_for_review' WHEN i % 4 = 1 THEN 'cleared' ELSE NULL END,
       ['core', 'partner', 'accountant'][(i % 3) + 1],
       ['Restaurants', 'Software', 'Construction', 'Retail'][(i % 4) + 1],
       TIMESTAMP '2024-12-01 00:00:00'
FROM range(1, 41) AS t(i);

INSERT INTO bi.credit_delinquencies (company_id, name, payment_id, payment_type, debit_date,
    debit_amount_attempted, days_past_due, delinquent_status, is_credit_loss, is_cancelled,
    recovered_amount, recovery_amount_needed)
SELECT i * 3,
       concat('Company ', i * 3),
       5000 + i,
       ['payroll', 'contractor'][(i % 2) + 1],
       CAST(DATE '2024-06-01' + INTERVAL (i * 5) DAY AS DATE),
       1250.0 * i,
       (i * 9) % 75 + 5,
       ['open', 'recovering', 'written_off'][(i % 3) + 1],
       i % 5 = 0,
       i % 7 = 0,
       CASE WHEN i % 3 = 1 THEN 300.0 * i ELSE 0.0 END,
       950.0 * i
FROM range(1, 13) AS t(i);

INSERT INTO bi.gusto_employees (dbt_id, id, first_name, last_name, name, email, hired_at,
    department_name, work_state, status, worker_type, job_title, team, current_flag)
SELECT 1000 + i,
       i,
       concat('First', i),
       concat('Last', i),
       concat('First', i, ' Last', i),
       concat('employee', i, '@example.com'),
       TIMESTAMP '2019-03-01 00:00:00' + INTERVAL (i * 41) DAY,
       ['Risk', 'Engineering', 'Support', 'Sales', 'Finance'][(i % 5) + 1],
       ['CA', 'CO', 'NY'][(i % 3) + 1],
       CASE WHEN i % 8 = 0 THEN 'terminated' ELSE 'active' END,
       'employee',
       ['Analyst', 'Engineer', 'Specialist', 'Manager'][(i % 4) + 1],
       ['Onboarding', 'Platform', 'Care'][(i % 3) + 1],
       true
FROM range(1, 31) AS t(i);

INSERT INTO bi.information_requests (id, resource_id, resource_type, submission_state, situation,
    queue, company_id, requested_by_user_email, hide_from_review_queue, created_at, current_flag,
    updated_at)
SELECT i,
       900 + i,
       ['Company', 'Payroll'][(i % 2) + 1],
       ['pending', 'submitted', 'approved'][(i % 3) + 1],
       ['onboarding', 'payment_review'][(i % 2) + 1],
       ['risk_ops', 'underwriting'][(i % 2) + 1],
       (i * 2) % 40 + 1,
       concat('analyst', i % 4, '@example.com'),
       false,
       TIMESTAMP '2024-09-01 10:00:00' + INTERVAL (i * 3) DAY,
       i % 10 <> 0,
       TIMESTAMP '2024-12-01 00:00:00'
FROM range(1, 21) AS t(i);

INSERT INTO bi.penalty_cases (id, agent_id, agency_name, created_at, year, quarter, title,
    total_interest_amount, error_type, total_penalty_amount, total_penalty_paid,
    total_interest_paid, error_origin, status)
SELECT i,
       60 + i,
       ['IRS', 'CA EDD', 'NY DTF', 'TX TWC'][(i % 4) + 1],
       TIMESTAMP '2023-02-15 00:00:00' + INTERVAL (i * 37) DAY,
       2023 + (i % 2),
       (i % 4) + 1,
       concat('Late deposit notice ', i),
       42.5 * i,
       ['late_filing', 'late_payment'][(i % 2) + 1],
       310.0 * i,
       CASE WHEN i % 3 = 0 THEN 310.0 * i ELSE 0.0 END,
       0.0,
       ['customer', 'internal'][(i % 2) + 1],
       ['open', 'closed', 'paid'][(i % 3) + 1]
FROM range(1, 11) AS t(i);

INSERT INTO bi_reporting.gusto_payments_and_losses (calendar_date, event_type, company_id,
    event_id, event_debit_date, event_gross_amount, ato_flag, credit_loss_flag,
    failed_payment_flag, recovered_amount, net_loss_amount, processing_state)
SELECT CAST(DATE '2024-01-01' + INTERVAL (i * 6) DAY AS DATE),
       ['payroll', 'contractor_payment', 'invoice'][(i % 3) + 1],
       (i % 40) + 1,
       70000 + i,
       CAST(DATE '2024-01-01' + INTERVAL (i * 6) DAY AS DATE),
       2000.0 + 175.0 * i,
       i % 9 = 0,
       i % 4 = 0,
       i % 3 = 0,
       CASE WHEN i % 3 = 0 THEN 120.0 * i ELSE 0.0 END,
       CASE WHEN i % 3 = 0 THEN 60.0 * i ELSE 0.0 END,
       ['processed', 'failed', 'recovered'][(i % 3) + 1]
FROM range(1, 61) AS t(i);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn seeded_connections_hold_every_registry_table() {
        let pool = demo_pool(1).unwrap();
        let mut conn = pool.get().unwrap();
        let registry = SchemaRegistry::warehouse();

        for table in registry.tables() {
            let out = conn
                .fetch_all(&format!("SELECT * FROM {} LIMIT 1", table.table_name))
                .unwrap();
            assert_eq!(out.columns, table.columns, "columns of {}", table.table_name);
        }

        let out = conn.fetch_all("SELECT COUNT(*) AS n FROM bi.companies").unwrap();
        assert_eq!(out.rows[0]["n"], Value::from(40));
    }

    #[test]
    fn dates_and_timestamps_render_as_iso_strings() {
        let pool = demo_pool(1).unwrap();
        let mut conn = pool.get().unwrap();
        let out = conn
            .fetch_all("SELECT DATE '2024-03-05' AS d, TIMESTAMP '2024-03-05 06:07:08' AS ts, 1.25::DECIMAL(6,2) AS amount")
            .unwrap();

        let row = &out.rows[0];
        assert_eq!(row["d"], Value::String("2024-03-05".to_string()));
        assert_eq!(row["ts"], Value::String("2024-03-05 06:07:08".to_string()));
        assert_eq!(row["amount"], Value::from(1.25));
    }

    #[test]
    fn days_before_epoch() {
        assert_eq!(date_from_days(-1), NaiveDate::from_ymd_opt(1969, 12, 31));
        assert_eq!(date_from_days(0), NaiveDate::from_ymd_opt(1970, 1, 1));
    }
}
