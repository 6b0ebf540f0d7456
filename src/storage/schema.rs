//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Sponsor-Graph database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Every account discovered in the graph
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    handle TEXT NOT NULL,
    kind TEXT NOT NULL,
    is_enriched INTEGER NOT NULL DEFAULT 0,
    last_enriched TEXT,
    private_sponsor_count INTEGER NOT NULL DEFAULT 0,
    min_tier_price INTEGER,
    name TEXT,
    location TEXT,
    company TEXT,
    bio TEXT,
    hireable INTEGER,
    email TEXT,
    twitter_username TEXT,
    avatar_url TEXT,
    profile_url TEXT,
    followers INTEGER NOT NULL DEFAULT 0,
    following INTEGER NOT NULL DEFAULT 0,
    public_repos INTEGER NOT NULL DEFAULT 0,
    public_gists INTEGER NOT NULL DEFAULT 0,
    created_at TEXT,
    gender TEXT,
    has_pronouns INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_accounts_last_enriched ON accounts(last_enriched);

-- Directed sponsorship edges
CREATE TABLE IF NOT EXISTS sponsorships (
    sponsor_id INTEGER NOT NULL REFERENCES accounts(id),
    sponsored_id INTEGER NOT NULL REFERENCES accounts(id),
    PRIMARY KEY (sponsor_id, sponsored_id)
);

CREATE INDEX IF NOT EXISTS idx_sponsorships_sponsored ON sponsorships(sponsored_id);

-- Crawl frontier queue
CREATE TABLE IF NOT EXISTS frontier (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id INTEGER NOT NULL UNIQUE,
    handle TEXT NOT NULL,
    depth INTEGER NOT NULL,
    status TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_frontier_pending ON frontier(status, created_at, id);

-- Yearly activity aggregates
CREATE TABLE IF NOT EXISTS account_activity (
    account_id INTEGER NOT NULL REFERENCES accounts(id),
    year INTEGER NOT NULL,
    commits INTEGER NOT NULL DEFAULT 0,
    pull_requests INTEGER NOT NULL DEFAULT 0,
    issues INTEGER NOT NULL DEFAULT 0,
    reviews INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (account_id, year)
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
