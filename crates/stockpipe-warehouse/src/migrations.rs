use ::duckdb::{params, Connection};

/// Name of the counter row that hands out `stock_observations.id` values.
pub(crate) const OBSERVATION_SEQUENCE: &str = "stock_observations";

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_stock_observations",
        sql: r#"
CREATE TABLE IF NOT EXISTS stock_observations (
    id BIGINT PRIMARY KEY,
    trade_code VARCHAR(20) NOT NULL,
    date DATE NOT NULL,
    open DOUBLE NOT NULL,
    high DOUBLE NOT NULL,
    low DOUBLE NOT NULL,
    close DOUBLE NOT NULL,
    volume BIGINT NOT NULL,
    UNIQUE (trade_code, date)
);

CREATE TABLE IF NOT EXISTS ordinal_sequences (
    name TEXT PRIMARY KEY,
    next_value BIGINT NOT NULL
);

INSERT INTO ordinal_sequences (name, next_value)
VALUES ('stock_observations', 1)
ON CONFLICT DO NOTHING;
"#,
    },
    Migration {
        version: "0002_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_stock_observations_trade_code ON stock_observations(trade_code);
CREATE INDEX IF NOT EXISTS idx_stock_observations_date ON stock_observations(date);
"#,
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params![migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            tracing::debug!(version = migration.version, "applying warehouse migration");
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                params![migration.version],
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_apply_once() {
        let connection = Connection::open_in_memory().expect("in-memory duckdb");
        apply_migrations(&connection).expect("first run");
        apply_migrations(&connection).expect("second run");

        let applied: i64 = connection
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .expect("count migrations");
        assert_eq!(applied as usize, MIGRATIONS.len());

        let next: i64 = connection
            .query_row(
                "SELECT next_value FROM ordinal_sequences WHERE name = ?",
                params![OBSERVATION_SEQUENCE],
                |row| row.get(0),
            )
            .expect("sequence row");
        assert_eq!(next, 1);
    }
}
