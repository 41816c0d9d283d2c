// src/db/schema.rs

pub const USERS_TABLE: &str = "users";

/// Drops and recreates `users`. Destroys all rows.
///
/// SQLite ignores the VARCHAR width, hence the explicit CHECK.
pub const USERS_DDL: &str = r#"
DROP TABLE IF EXISTS users;

CREATE TABLE
    users (
        name VARCHAR(50) NOT NULL PRIMARY KEY CHECK (length (name) <= 50),
        gender INT NOT NULL DEFAULT 0,
        age INT NOT NULL DEFAULT 0
    );

CREATE INDEX idx_users_gender ON users (gender);

CREATE INDEX idx_users_age ON users (age);
"#;
