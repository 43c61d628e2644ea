//! Warehouse statement text
//!
//! Written for the Redshift dialect: `IDENTITY`, `SORTKEY`/`DISTKEY` column
//! attributes and the `COPY ... IAM_ROLE` bulk-load syntax.

use super::Table;
use super::template::SqlTemplate;

/// DROP statements; all idempotent
pub mod drop_sql {
    pub const STAGING_EVENTS: &str = "DROP TABLE IF EXISTS staging_events;";
    pub const STAGING_SONGS: &str = "DROP TABLE IF EXISTS staging_songs;";
    pub const SONGPLAYS: &str = "DROP TABLE IF EXISTS songplays;";
    pub const USERS: &str = "DROP TABLE IF EXISTS users;";
    pub const SONGS: &str = "DROP TABLE IF EXISTS songs;";
    pub const ARTISTS: &str = "DROP TABLE IF EXISTS artists;";
    pub const TIME: &str = "DROP TABLE IF EXISTS time;";
}

/// CREATE TABLE statements
pub mod create_sql {
    pub const STAGING_EVENTS: &str = r#"
CREATE TABLE staging_events (
    artist              VARCHAR(MAX),
    auth                VARCHAR(MAX),
    firstName           CHAR(50),
    gender              CHAR(1),
    itemInSession       INTEGER,
    lastName            CHAR(50),
    length              DECIMAL,
    level               CHAR(5),
    location            VARCHAR(200),
    method              CHAR(20),
    page                CHAR(20),
    registration        DECIMAL,
    sessionId           INTEGER,
    song                VARCHAR(MAX),
    status              INTEGER,
    ts                  BIGINT,
    userAgent           VARCHAR(MAX),
    userId              INTEGER
);
"#;

    pub const STAGING_SONGS: &str = r#"
CREATE TABLE staging_songs (
    num_songs           INTEGER,
    artist_id           VARCHAR(256),
    artist_latitude     DECIMAL,
    artist_longitude    DECIMAL,
    artist_location     VARCHAR(MAX),
    artist_name         VARCHAR(256),
    song_id             VARCHAR(256),
    title               VARCHAR(MAX),
    duration            DECIMAL,
    year                INTEGER
);
"#;

    pub const SONGPLAYS: &str = r#"
CREATE TABLE songplays (
    songplay_id         INTEGER         IDENTITY(0,1)   PRIMARY KEY,
    start_time          TIMESTAMP       NOT NULL SORTKEY DISTKEY,
    user_id             INTEGER         NOT NULL,
    level               VARCHAR,
    song_id             VARCHAR         NOT NULL,
    artist_id           VARCHAR         NOT NULL,
    session_id          INTEGER,
    location            VARCHAR,
    user_agent          VARCHAR
);
"#;

    pub const USERS: &str = r#"
CREATE TABLE users (
    user_id             INTEGER         NOT NULL SORTKEY PRIMARY KEY,
    first_name          VARCHAR         NOT NULL,
    last_name           VARCHAR         NOT NULL,
    gender              VARCHAR         NOT NULL,
    level               VARCHAR         NOT NULL
);
"#;

    pub const SONGS: &str = r#"
CREATE TABLE songs (
    song_id             VARCHAR         NOT NULL SORTKEY PRIMARY KEY,
    title               VARCHAR         NOT NULL,
    artist_id           VARCHAR         NOT NULL,
    year                INTEGER         NOT NULL,
    duration            FLOAT
);
"#;

    pub const ARTISTS: &str = r#"
CREATE TABLE artists (
    artist_id           VARCHAR         NOT NULL SORTKEY PRIMARY KEY,
    name                VARCHAR         NOT NULL,
    location            VARCHAR,
    latitude            FLOAT,
    longitude           FLOAT
);
"#;

    pub const TIME: &str = r#"
CREATE TABLE time (
    start_time          TIMESTAMP       NOT NULL DISTKEY SORTKEY PRIMARY KEY,
    hour                INTEGER         NOT NULL,
    day                 INTEGER         NOT NULL,
    week                INTEGER         NOT NULL,
    month               INTEGER         NOT NULL,
    year                INTEGER         NOT NULL,
    weekday             VARCHAR(20)     NOT NULL
);
"#;
}

/// COPY templates for the staging tables
pub mod copy_sql {
    use super::SqlTemplate;

    /// Event logs; `ts` arrives as epoch milliseconds
    pub const STAGING_EVENTS: SqlTemplate = SqlTemplate::new(
        r#"
COPY staging_events FROM {log_data}
IAM_ROLE {iam_role_arn}
REGION {region}
FORMAT AS JSON {log_jsonpath}
TIMEFORMAT AS 'epochmillisecs';
"#,
    );

    pub const STAGING_SONGS: SqlTemplate = SqlTemplate::new(
        r#"
COPY staging_songs FROM {song_data}
IAM_ROLE {iam_role_arn}
FORMAT AS JSON 'auto'
REGION {region};
"#,
    );
}

/// INSERT ... SELECT statements populating the star schema
pub mod insert_sql {
    pub const SONGPLAYS: &str = r#"
INSERT INTO songplays (start_time, user_id, level, song_id, artist_id, session_id, location, user_agent)
SELECT  TIMESTAMP 'epoch' + (se.ts / 1000) * INTERVAL '1 second'   AS start_time,
        se.userId                                               AS user_id,
        se.level                                                AS level,
        ss.song_id                                              AS song_id,
        ss.artist_id                                            AS artist_id,
        se.sessionId                                            AS session_id,
        se.location                                             AS location,
        se.userAgent                                            AS user_agent
FROM staging_events se
JOIN staging_songs ss
  ON se.artist = ss.artist_name
 AND se.song = ss.title
 AND se.length = ss.duration
WHERE se.page = 'NextSong'
  AND se.userId IS NOT NULL;
"#;

    /// Latest event per user wins, so a level change yields one row
    pub const USERS: &str = r#"
INSERT INTO users (user_id, first_name, last_name, gender, level)
SELECT  user_id, first_name, last_name, gender, level
FROM (
    SELECT  userId      AS user_id,
            firstName   AS first_name,
            lastName    AS last_name,
            gender,
            level,
            ROW_NUMBER() OVER (PARTITION BY userId ORDER BY ts DESC) AS rn
    FROM staging_events
    WHERE page = 'NextSong'
      AND userId IS NOT NULL
) latest
WHERE rn = 1;
"#;

    pub const SONGS: &str = r#"
INSERT INTO songs (song_id, title, artist_id, year, duration)
SELECT  song_id, title, artist_id, year, duration
FROM (
    SELECT  song_id,
            title,
            artist_id,
            year,
            duration,
            ROW_NUMBER() OVER (PARTITION BY song_id ORDER BY year DESC) AS rn
    FROM staging_songs
    WHERE song_id IS NOT NULL
) latest
WHERE rn = 1;
"#;

    pub const ARTISTS: &str = r#"
INSERT INTO artists (artist_id, name, location, latitude, longitude)
SELECT  artist_id, name, location, latitude, longitude
FROM (
    SELECT  artist_id,
            artist_name         AS name,
            artist_location     AS location,
            artist_latitude     AS latitude,
            artist_longitude    AS longitude,
            ROW_NUMBER() OVER (PARTITION BY artist_id ORDER BY year DESC) AS rn
    FROM staging_songs
    WHERE artist_id IS NOT NULL
) latest
WHERE rn = 1;
"#;

    /// Derived from `songplays`, so it runs after the fact insert
    pub const TIME: &str = r#"
INSERT INTO time (start_time, hour, day, week, month, year, weekday)
SELECT  DISTINCT start_time                 AS start_time,
        EXTRACT(hour FROM start_time)       AS hour,
        EXTRACT(day FROM start_time)        AS day,
        EXTRACT(week FROM start_time)       AS week,
        EXTRACT(month FROM start_time)      AS month,
        EXTRACT(year FROM start_time)       AS year,
        EXTRACT(dayofweek FROM start_time)  AS weekday
FROM songplays;
"#;
}

/// Row-count queries used for verification
pub mod count_sql {
    pub const STAGING_EVENTS: &str = "SELECT COUNT(*) AS count FROM staging_events";
    pub const STAGING_SONGS: &str = "SELECT COUNT(*) AS count FROM staging_songs";
    pub const SONGPLAYS: &str = "SELECT COUNT(*) AS count FROM songplays";
    pub const USERS: &str = "SELECT COUNT(*) AS count FROM users";
    pub const SONGS: &str = "SELECT COUNT(*) AS count FROM songs";
    pub const ARTISTS: &str = "SELECT COUNT(*) AS count FROM artists";
    pub const TIME: &str = "SELECT COUNT(*) AS count FROM time";
}

pub(crate) fn drop_statement(table: Table) -> &'static str {
    match table {
        Table::StagingEvents => drop_sql::STAGING_EVENTS,
        Table::StagingSongs => drop_sql::STAGING_SONGS,
        Table::Songplays => drop_sql::SONGPLAYS,
        Table::Users => drop_sql::USERS,
        Table::Songs => drop_sql::SONGS,
        Table::Artists => drop_sql::ARTISTS,
        Table::Time => drop_sql::TIME,
    }
}

pub(crate) fn create_statement(table: Table) -> &'static str {
    match table {
        Table::StagingEvents => create_sql::STAGING_EVENTS,
        Table::StagingSongs => create_sql::STAGING_SONGS,
        Table::Songplays => create_sql::SONGPLAYS,
        Table::Users => create_sql::USERS,
        Table::Songs => create_sql::SONGS,
        Table::Artists => create_sql::ARTISTS,
        Table::Time => create_sql::TIME,
    }
}

pub(crate) fn copy_template(table: Table) -> Option<SqlTemplate> {
    match table {
        Table::StagingEvents => Some(copy_sql::STAGING_EVENTS),
        Table::StagingSongs => Some(copy_sql::STAGING_SONGS),
        Table::Songplays | Table::Users | Table::Songs | Table::Artists | Table::Time => None,
    }
}

pub(crate) fn insert_statement(table: Table) -> Option<&'static str> {
    match table {
        Table::Songplays => Some(insert_sql::SONGPLAYS),
        Table::Users => Some(insert_sql::USERS),
        Table::Songs => Some(insert_sql::SONGS),
        Table::Artists => Some(insert_sql::ARTISTS),
        Table::Time => Some(insert_sql::TIME),
        Table::StagingEvents | Table::StagingSongs => None,
    }
}

pub(crate) fn count_statement(table: Table) -> &'static str {
    match table {
        Table::StagingEvents => count_sql::STAGING_EVENTS,
        Table::StagingSongs => count_sql::STAGING_SONGS,
        Table::Songplays => count_sql::SONGPLAYS,
        Table::Users => count_sql::USERS,
        Table::Songs => count_sql::SONGS,
        Table::Artists => count_sql::ARTISTS,
        Table::Time => count_sql::TIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_text_names_its_table() {
        for table in Table::ALL {
            let name = table.name();
            assert!(drop_statement(table).ends_with(&format!("{};", name)));
            assert!(create_statement(table).contains(&format!("CREATE TABLE {} (", name)));
            assert!(count_statement(table).ends_with(&format!("FROM {}", name)));
        }
    }

    #[test]
    fn test_only_staging_tables_are_copied() {
        for table in Table::ALL {
            assert_eq!(copy_template(table).is_some(), table.is_staging());
            assert_eq!(insert_statement(table).is_some(), !table.is_staging());
        }
    }

    #[test]
    fn test_copy_templates_placeholders() {
        assert_eq!(
            copy_sql::STAGING_EVENTS.placeholders(),
            vec!["log_data", "iam_role_arn", "region", "log_jsonpath"]
        );
        assert_eq!(
            copy_sql::STAGING_SONGS.placeholders(),
            vec!["song_data", "iam_role_arn", "region"]
        );
    }
}
