use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use postgres::types::{FromSql, Type};
use postgres::{Client, Config, NoTls, Row};
use r2d2::ManageConnection;
use serde_json::Value;
use std::error::Error;
use tracing::debug;

use crate::config::RedshiftCredentials;
use crate::db::executor::{unique_columns, QueryOutput, Record, WarehouseConnection};
use crate::error::ExecutionError;

/// Opens Redshift sessions over the PostgreSQL wire protocol.
pub struct RedshiftConnectionManager {
    config: Config,
}

impl RedshiftConnectionManager {
    pub fn new(credentials: &RedshiftCredentials, connect_timeout: std::time::Duration) -> Self {
        let mut config = Config::new();
        config
            .host(&credentials.host)
            .port(credentials.port)
            .dbname(&credentials.database)
            .user(&credentials.username)
            .password(&credentials.password)
            .application_name("warehouse-analyst")
            .connect_timeout(connect_timeout);

        Self { config }
    }
}

impl ManageConnection for RedshiftConnectionManager {
    type Connection = Client;
    type Error = postgres::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        self.config.connect(NoTls)
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.simple_query("SELECT 1")?;
        Ok(())
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}

impl WarehouseConnection for Client {
    fn fetch_all(&mut self, sql: &str) -> Result<QueryOutput, ExecutionError> {
        let query_error = |e: postgres::Error| ExecutionError::Query(e.to_string());

        let statement = self.prepare(sql).map_err(query_error)?;
        let columns = unique_columns(statement.columns().iter().map(|c| c.name().to_string()));

        let rows = self.query(&statement, &[]).map_err(query_error)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut record = Record::new();
            for (i, column) in statement.columns().iter().enumerate() {
                let value = pg_value(row, i, column.type_()).map_err(query_error)?;
                record.insert(columns[i].clone(), value);
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

fn pg_value(row: &Row, idx: usize, ty: &Type) -> Result<Value, postgres::Error> {
    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?.map(Value::from)
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?.map(Value::from)
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(Value::from)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?.map(|v| number(v as f64))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(number)
    } else if *ty == Type::NUMERIC {
        row.try_get::<_, Option<PgNumeric>>(idx)?.map(|n| number(n.0))
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(idx)?
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|ts| Value::String(ts.format("%Y-%m-%d %H:%M:%S").to_string()))
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|ts| Value::String(ts.to_rfc3339()))
    } else {
        match row.try_get::<_, Option<String>>(idx) {
            Ok(text) => text.map(Value::String),
            Err(e) => {
                debug!("Column {} of type {} decoded as null: {}", idx, ty, e);
                None
            }
        }
    };

    Ok(value.unwrap_or(Value::Null))
}

/// Binary NUMERIC decoded to the nearest `f64`. NaN becomes null.
struct PgNumeric(f64);

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        let word = |offset: usize| -> Result<u16, Box<dyn Error + Sync + Send>> {
            raw.get(offset..offset + 2)
                .map(|b| u16::from_be_bytes([b[0], b[1]]))
                .ok_or_else(|| "truncated numeric value".into())
        };

        let ndigits = word(0)? as usize;
        let weight = word(2)? as i16;
        let sign = word(4)?;

        if sign == NUMERIC_NAN {
            return Ok(PgNumeric(f64::NAN));
        }

        let mut value = 0f64;
        for i in 0..ndigits {
            let digit = word(8 + i * 2)? as f64;
            value += digit * 10_000f64.powi(weight as i32 - i as i32);
        }
        if sign == NUMERIC_NEG {
            value = -value;
        }

        Ok(PgNumeric(value))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(weight: i16, sign: u16, digits: &[u16]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(digits.len() as u16).to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&2u16.to_be_bytes());
        for d in digits {
            raw.extend_from_slice(&d.to_be_bytes());
        }
        raw
    }

    fn decode(raw: &[u8]) -> f64 {
        PgNumeric::from_sql(&Type::NUMERIC, raw).unwrap().0
    }

    #[test]
    fn decodes_fractional_numeric() {
        // 123.45 = 123 * 10000^0 + 4500 * 10000^-1
        let value = decode(&numeric(0, 0, &[123, 4500]));
        assert!((value - 123.45).abs() < 1e-9);
    }

    #[test]
    fn decodes_large_and_negative_numeric() {
        // -1234567 = -(123 * 10000^1 + 4567)
        let value = decode(&numeric(1, NUMERIC_NEG, &[123, 4567]));
        assert_eq!(value, -1_234_567.0);
    }

    #[test]
    fn zero_digits_is_zero() {
        assert_eq!(decode(&numeric(0, 0, &[])), 0.0);
    }

    #[test]
    fn nan_and_truncated_input() {
        assert!(decode(&numeric(0, NUMERIC_NAN, &[])).is_nan());
        assert!(PgNumeric::from_sql(&Type::NUMERIC, &[0, 1, 0]).is_err());
        assert_eq!(number(f64::NAN), Value::Null);
    }
}
