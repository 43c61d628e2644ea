//! Query catalog for the song play warehouse
//!
//! The catalog holds the text of every DDL, load, transform and verification
//! statement and exposes them as ordered groups:
//!
//! - drop: 7 statements, one per table
//! - create: 7 statements, one per table
//! - copy: 2 statements loading the staging tables from S3
//! - insert: 5 statements building the star schema
//! - count: 7 verification queries
//!
//! Groups run in the order drop, create, copy, insert. Inside the insert
//! group the fact table comes first because the `time` dimension is derived
//! from `songplays.start_time`. Runners must keep this order as given.
//!
//! ## Example
//!
//! ```
//! use songplay_dwh::catalog::QueryCatalog;
//! use songplay_dwh::config::DwhConfig;
//!
//! let config = DwhConfig::with_sources(
//!     "s3://udacity-dend/log_data",
//!     "s3://udacity-dend/song_data",
//!     "arn:aws:iam::123456789012:role/dwhRole",
//! );
//! let catalog = QueryCatalog::new(&config).unwrap();
//!
//! assert_eq!(catalog.copy_statements().len(), 2);
//! for statement in catalog.execution_plan() {
//!     println!("-- {}\n{}", statement.name(), statement.sql());
//! }
//! ```

pub mod sql;
pub mod template;

use serde::Serialize;

use crate::config::{ConfigResult, CopySources, DwhConfig};

pub use template::{SqlTemplate, TemplateError, has_placeholders};

/// Role of a table in the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    /// Raw landing table loaded by COPY
    Staging,
    /// Central event table
    Fact,
    /// Descriptive table referenced by the fact table
    Dimension,
}

/// Warehouse tables managed by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    StagingEvents,
    StagingSongs,
    Songplays,
    Users,
    Songs,
    Artists,
    Time,
}

impl Table {
    /// All tables in catalog order
    pub const ALL: [Table; 7] = [
        Table::StagingEvents,
        Table::StagingSongs,
        Table::Songplays,
        Table::Users,
        Table::Songs,
        Table::Artists,
        Table::Time,
    ];

    /// Staging tables in load order
    pub const COPY_ORDER: [Table; 2] = [Table::StagingEvents, Table::StagingSongs];

    /// Star schema tables in insert order
    pub const INSERT_ORDER: [Table; 5] = [
        Table::Songplays,
        Table::Users,
        Table::Songs,
        Table::Artists,
        Table::Time,
    ];

    /// Table name in the warehouse
    pub fn name(&self) -> &'static str {
        match self {
            Table::StagingEvents => "staging_events",
            Table::StagingSongs => "staging_songs",
            Table::Songplays => "songplays",
            Table::Users => "users",
            Table::Songs => "songs",
            Table::Artists => "artists",
            Table::Time => "time",
        }
    }

    pub fn kind(&self) -> TableKind {
        match self {
            Table::StagingEvents | Table::StagingSongs => TableKind::Staging,
            Table::Songplays => TableKind::Fact,
            Table::Users | Table::Songs | Table::Artists | Table::Time => TableKind::Dimension,
        }
    }

    pub fn is_staging(&self) -> bool {
        self.kind() == TableKind::Staging
    }

    // Singular stem used in logical statement names, e.g. `user_table_insert`.
    fn stem(&self) -> &'static str {
        match self {
            Table::StagingEvents => "staging_events",
            Table::StagingSongs => "staging_songs",
            Table::Songplays => "songplay",
            Table::Users => "user",
            Table::Songs => "song",
            Table::Artists => "artist",
            Table::Time => "time",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Table {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown table: {}", s))
    }
}

/// Logical operation a statement performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Drop,
    Create,
    Copy,
    Insert,
    Count,
}

impl StatementKind {
    /// Groups that change the warehouse, in execution order
    pub const EXECUTION_ORDER: [StatementKind; 4] = [
        StatementKind::Drop,
        StatementKind::Create,
        StatementKind::Copy,
        StatementKind::Insert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Drop => "drop",
            StatementKind::Create => "create",
            StatementKind::Copy => "copy",
            StatementKind::Insert => "insert",
            StatementKind::Count => "count",
        }
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StatementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(StatementKind::Drop),
            "create" => Ok(StatementKind::Create),
            "copy" => Ok(StatementKind::Copy),
            "insert" => Ok(StatementKind::Insert),
            "count" | "verify" => Ok(StatementKind::Count),
            _ => Err(format!("Unknown statement group: {}", s)),
        }
    }
}

/// A single, fully rendered SQL statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    name: String,
    kind: StatementKind,
    table: Table,
    sql: String,
}

impl Statement {
    fn new(kind: StatementKind, table: Table, sql: impl Into<String>) -> Self {
        let name = match kind {
            StatementKind::Drop => format!("{}_table_drop", table.stem()),
            StatementKind::Create => format!("{}_table_create", table.stem()),
            StatementKind::Copy => format!("{}_copy", table.name()),
            StatementKind::Insert => format!("{}_table_insert", table.stem()),
            StatementKind::Count => format!("get_number_{}", table.name()),
        };
        Self {
            name,
            kind,
            table,
            sql: sql.into().trim().to_string(),
        }
    }

    /// Logical operation name, e.g. `songplay_table_insert`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Ordered statements of one kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementGroup {
    kind: StatementKind,
    statements: Vec<Statement>,
}

impl StatementGroup {
    fn new(kind: StatementKind, statements: Vec<Statement>) -> Self {
        Self { kind, statements }
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Statement> {
        self.statements.iter()
    }

    /// Tables touched by this group, in order
    pub fn tables(&self) -> Vec<Table> {
        self.statements.iter().map(|s| s.table).collect()
    }

    /// SQL text of each statement, in order
    pub fn sql(&self) -> Vec<&str> {
        self.statements.iter().map(|s| s.sql()).collect()
    }
}

impl<'a> IntoIterator for &'a StatementGroup {
    type Item = &'a Statement;
    type IntoIter = std::slice::Iter<'a, Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.iter()
    }
}

/// Immutable catalog of every statement the pipeline runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryCatalog {
    drop: StatementGroup,
    create: StatementGroup,
    copy: StatementGroup,
    insert: StatementGroup,
    count: StatementGroup,
}

impl QueryCatalog {
    /// Build the catalog from a loaded configuration
    ///
    /// Fails with a [`ConfigError`](crate::config::ConfigError) if a
    /// required source value is missing or malformed. No statement text is
    /// produced in that case.
    pub fn new(config: &DwhConfig) -> ConfigResult<Self> {
        let sources = config.copy_sources()?;
        Self::from_sources(&sources)
    }

    /// Build the catalog from already validated source values
    pub fn from_sources(sources: &CopySources) -> ConfigResult<Self> {
        let mut copy = Vec::with_capacity(Table::COPY_ORDER.len());
        for table in Table::COPY_ORDER {
            let template = sql::copy_template(table)
                .ok_or_else(|| TemplateError::NoTemplate(table.name().to_string()))?;
            let rendered = template.render(&copy_params(table, sources))?;
            copy.push(Statement::new(StatementKind::Copy, table, rendered));
        }

        let catalog = Self {
            drop: StatementGroup::new(
                StatementKind::Drop,
                Table::ALL
                    .into_iter()
                    .map(|t| Statement::new(StatementKind::Drop, t, sql::drop_statement(t)))
                    .collect(),
            ),
            create: StatementGroup::new(
                StatementKind::Create,
                Table::ALL
                    .into_iter()
                    .map(|t| Statement::new(StatementKind::Create, t, sql::create_statement(t)))
                    .collect(),
            ),
            copy: StatementGroup::new(StatementKind::Copy, copy),
            insert: StatementGroup::new(
                StatementKind::Insert,
                Table::INSERT_ORDER
                    .into_iter()
                    .filter_map(|t| {
                        sql::insert_statement(t)
                            .map(|text| Statement::new(StatementKind::Insert, t, text))
                    })
                    .collect(),
            ),
            count: StatementGroup::new(
                StatementKind::Count,
                Table::ALL
                    .into_iter()
                    .map(|t| Statement::new(StatementKind::Count, t, sql::count_statement(t)))
                    .collect(),
            ),
        };

        tracing::debug!(
            drop = catalog.drop.len(),
            create = catalog.create.len(),
            copy = catalog.copy.len(),
            insert = catalog.insert.len(),
            count = catalog.count.len(),
            "Built query catalog"
        );

        Ok(catalog)
    }

    pub fn drop_statements(&self) -> &StatementGroup {
        &self.drop
    }

    pub fn create_statements(&self) -> &StatementGroup {
        &self.create
    }

    pub fn copy_statements(&self) -> &StatementGroup {
        &self.copy
    }

    pub fn insert_statements(&self) -> &StatementGroup {
        &self.insert
    }

    pub fn count_statements(&self) -> &StatementGroup {
        &self.count
    }

    /// Group of the given kind
    pub fn group(&self, kind: StatementKind) -> &StatementGroup {
        match kind {
            StatementKind::Drop => &self.drop,
            StatementKind::Create => &self.create,
            StatementKind::Copy => &self.copy,
            StatementKind::Insert => &self.insert,
            StatementKind::Count => &self.count,
        }
    }

    /// All five groups: the four execution groups followed by counts
    pub fn groups(&self) -> [&StatementGroup; 5] {
        [&self.drop, &self.create, &self.copy, &self.insert, &self.count]
    }

    /// Statement of the given kind for a table, if one exists
    pub fn statement(&self, kind: StatementKind, table: Table) -> Option<&Statement> {
        self.group(kind).iter().find(|s| s.table == table)
    }

    /// Look up a statement by its logical name
    pub fn by_name(&self, name: &str) -> Option<&Statement> {
        self.groups()
            .into_iter()
            .flat_map(|g| g.iter())
            .find(|s| s.name == name)
    }

    /// Drop, create, copy and insert statements in execution order
    pub fn execution_plan(&self) -> impl Iterator<Item = &Statement> {
        StatementKind::EXECUTION_ORDER
            .into_iter()
            .flat_map(move |kind| self.group(kind).iter())
    }
}

// Values for each COPY template, keyed by placeholder name
fn copy_params(table: Table, sources: &CopySources) -> Vec<(&'static str, &str)> {
    match table {
        Table::StagingEvents => vec![
            ("log_data", sources.log_data.as_str()),
            ("iam_role_arn", sources.iam_role_arn.as_str()),
            ("region", sources.region.as_str()),
            ("log_jsonpath", sources.log_jsonpath.as_deref().unwrap_or("auto")),
        ],
        Table::StagingSongs => vec![
            ("song_data", sources.song_data.as_str()),
            ("iam_role_arn", sources.iam_role_arn.as_str()),
            ("region", sources.region.as_str()),
        ],
        Table::Songplays | Table::Users | Table::Songs | Table::Artists | Table::Time => Vec::new(),
    }
}
