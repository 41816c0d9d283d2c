// src/db/statement.rs

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

use super::person::Person;

/// One write step of [`super::PersonRepository::run_transaction`]:
/// SQL text plus the values bound to its `?` placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn insert(person: &Person) -> Self {
        Statement::new("INSERT INTO users (name, gender, age) VALUES (?1, ?2, ?3)")
            .bind(person.name.clone())
            .bind(person.gender)
            .bind(person.age)
    }

    pub fn update_age(name: impl Into<String>, age: i64) -> Self {
        Statement::new("UPDATE users SET age = ?1 WHERE name = ?2")
            .bind(age)
            .bind(name.into())
    }

    pub fn delete(name: impl Into<String>) -> Self {
        Statement::new("DELETE FROM users WHERE name = ?1").bind(name.into())
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub(crate) fn execute(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(&self.sql, params_from_iter(self.params.iter()))
    }
}
