//! PostgreSQL wire protocol backend
//!
//! Redshift accepts PostgreSQL clients, so a single `tokio-postgres`
//! connection is enough to run the catalog. There is no pool: statements run
//! one after another on the same session.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::Row;
use tokio_postgres::types::Type;

use super::{QueryResult, WarehouseBackend, WarehouseError, WarehouseResult};
use crate::config::ClusterSettings;

/// Warehouse backend over a single PostgreSQL protocol connection
pub struct PostgresBackend {
    /// Connection string with the password masked, for logs
    masked: String,
    client: Arc<Mutex<tokio_postgres::Client>>,
}

impl PostgresBackend {
    /// Connect to the cluster described by `settings`
    pub async fn connect(settings: &ClusterSettings) -> WarehouseResult<Self> {
        Self::open(pg_config(settings), settings.connection_string_masked()).await
    }

    /// Connect using a raw connection string
    pub async fn new(connection_string: &str) -> WarehouseResult<Self> {
        let masked = mask_password(connection_string);
        let config = connection_string.parse::<tokio_postgres::Config>().map_err(|e| {
            WarehouseError::ConnectionFailed(format!("Invalid connection string {}: {}", masked, e))
        })?;
        Self::open(config, masked).await
    }

    async fn open(config: tokio_postgres::Config, masked: String) -> WarehouseResult<Self> {
        tracing::info!("Connecting to warehouse: {}", masked);

        let (client, connection) = config.connect(tokio_postgres::NoTls).await.map_err(|e| {
            WarehouseError::ConnectionFailed(format!("Failed to connect to {}: {}", masked, e))
        })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("Warehouse connection error: {}", e);
            }
        });

        Ok(Self {
            masked,
            client: Arc::new(Mutex::new(client)),
        })
    }

    /// Connection string with the password masked
    pub fn connection_string_masked(&self) -> &str {
        &self.masked
    }
}

/// Driver configuration for the cluster
///
/// Values are handed to the driver as-is, so spaces or quotes in a user name
/// or password need no escaping.
pub fn pg_config(settings: &ClusterSettings) -> tokio_postgres::Config {
    let mut config = tokio_postgres::Config::new();
    config
        .host(&settings.host)
        .port(settings.port)
        .dbname(&settings.db_name)
        .user(&settings.db_user)
        .password(&settings.db_password);
    config
}

fn row_to_json(row: &Row) -> serde_json::Value {
    let map = row
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| (column.name().to_string(), cell_value(row, idx, column.type_())))
        .collect::<serde_json::Map<_, _>>();
    serde_json::Value::Object(map)
}

/// Decode one cell by its declared type; NULL and unmapped types become `null`
fn cell_value(row: &Row, idx: usize, ty: &Type) -> serde_json::Value {
    let value: Result<Option<serde_json::Value>, tokio_postgres::Error> = if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx).map(|v| v.map(Into::into))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx).map(|v| v.map(Into::into))
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx).map(|v| v.map(Into::into))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx).map(|v| v.map(Into::into))
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx).map(|v| v.map(Into::into))
    } else if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx).map(|v| v.map(Into::into))
    } else {
        row.try_get::<_, Option<String>>(idx).map(|v| v.map(Into::into))
    };

    value.ok().flatten().unwrap_or(serde_json::Value::Null)
}

/// Mask the password in a key/value or URL connection string
fn mask_password(connection_string: &str) -> String {
    if let Some(pos) = connection_string.find("password=") {
        let value_start = pos + "password=".len();
        let value = &connection_string[value_start..];

        // libpq values may be single-quoted with backslash escapes
        let value_len = if let Some(quoted) = value.strip_prefix('\'') {
            let mut escaped = false;
            quoted
                .char_indices()
                .find(|&(_, c)| {
                    let closes = c == '\'' && !escaped;
                    escaped = c == '\\' && !escaped;
                    closes
                })
                .map_or(value.len(), |(i, _)| i + 2)
        } else {
            value.find(char::is_whitespace).unwrap_or(value.len())
        };

        return format!(
            "{}password=****{}",
            &connection_string[..pos],
            &value[value_len..]
        );
    }

    let userinfo_start = connection_string.find("://").map_or(0, |p| p + 3);
    if let Some(at_pos) = connection_string.find('@')
        && let Some(colon_pos) = connection_string[..at_pos].rfind(':')
        && colon_pos >= userinfo_start
    {
        let prefix = &connection_string[..colon_pos + 1];
        let suffix = &connection_string[at_pos..];
        return format!("{}****{}", prefix, suffix);
    }

    connection_string.to_string()
}

#[async_trait(?Send)]
impl WarehouseBackend for PostgresBackend {
    async fn execute(&self, sql: &str) -> WarehouseResult<u64> {
        let client = self.client.lock().await;

        // Simple query protocol: COPY and DDL are not preparable on Redshift.
        let messages = client
            .simple_query(sql)
            .await
            .map_err(|e| WarehouseError::QueryFailed(e.to_string()))?;

        let affected = messages
            .iter()
            .filter_map(|m| match m {
                tokio_postgres::SimpleQueryMessage::CommandComplete(n) => Some(*n),
                _ => None,
            })
            .sum();

        Ok(affected)
    }

    async fn query(&self, sql: &str) -> WarehouseResult<QueryResult> {
        let start = std::time::Instant::now();
        let client = self.client.lock().await;

        let rows = client
            .query(sql, &[])
            .await
            .map_err(|e| WarehouseError::QueryFailed(e.to_string()))?;

        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        Ok(QueryResult {
            columns,
            rows: rows.iter().map(row_to_json).collect(),
            rows_affected: None,
            execution_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn close(&self) -> WarehouseResult<()> {
        // Connection closes when the client is dropped
        Ok(())
    }
}
