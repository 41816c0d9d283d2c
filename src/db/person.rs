// src/db/person.rs

use std::fmt::{Display, Formatter};

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Integer gender code stored in `users.gender`.
///
/// `0` and `1` are the documented codes; anything else is kept verbatim so
/// rows written by other tools survive a read/write cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Gender {
    #[default]
    Female,
    Male,
    Other(i64),
}

impl Gender {
    pub fn to_i64(self) -> i64 {
        match self {
            Gender::Female => 0,
            Gender::Male => 1,
            Gender::Other(code) => code,
        }
    }
}

impl From<i64> for Gender {
    fn from(code: i64) -> Self {
        match code {
            0 => Gender::Female,
            1 => Gender::Male,
            other => Gender::Other(other),
        }
    }
}

impl From<Gender> for i64 {
    fn from(gender: Gender) -> Self {
        gender.to_i64()
    }
}

impl From<Gender> for Value {
    fn from(gender: Gender) -> Self {
        Value::Integer(gender.to_i64())
    }
}

impl Display for Gender {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Female => write!(f, "female"),
            Gender::Male => write!(f, "male"),
            Gender::Other(code) => write!(f, "other({code})"),
        }
    }
}

impl ToSql for Gender {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_i64()))
    }
}

impl FromSql for Gender {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Gender::from)
    }
}

/// One row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub age: i64,
    pub gender: Gender,
}

impl Person {
    /// Column order every SELECT in this crate uses.
    pub const COLUMNS: [&'static str; 3] = ["name", "gender", "age"];

    pub fn new(name: impl Into<String>, age: i64, gender: Gender) -> Self {
        Self {
            name: name.into(),
            age,
            gender,
        }
    }

    /// Binds every column to its field by position. Callers check the
    /// statement's column list against [`Person::COLUMNS`] first.
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Person {
            name: row.get(0)?,
            gender: row.get(1)?,
            age: row.get(2)?,
        })
    }
}

/// Predicate for [`super::PersonRepository::query`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonFilter {
    All,
    Name(String),
    Gender(Gender),
    /// Inclusive on both ends.
    AgeBetween { min: i64, max: i64 },
}

impl PersonFilter {
    pub fn name(name: impl Into<String>) -> Self {
        PersonFilter::Name(name.into())
    }

    pub(crate) fn where_clause(&self) -> (&'static str, Vec<Value>) {
        match self {
            PersonFilter::All => ("", Vec::new()),
            PersonFilter::Name(name) => (" WHERE name = ?1", vec![Value::Text(name.clone())]),
            PersonFilter::Gender(gender) => (" WHERE gender = ?1", vec![Value::from(*gender)]),
            PersonFilter::AgeBetween { min, max } => (
                " WHERE age BETWEEN ?1 AND ?2",
                vec![Value::Integer(*min), Value::Integer(*max)],
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_codes_round_trip() {
        assert_eq!(Gender::from(0), Gender::Female);
        assert_eq!(Gender::from(1), Gender::Male);
        assert_eq!(Gender::from(2), Gender::Other(2));
        assert_eq!(Gender::Other(7).to_i64(), 7);
        assert_eq!(Gender::default().to_i64(), 0);
    }

    #[test]
    fn person_serializes_gender_as_code() {
        let person = Person::new("john", 12, Gender::Male);
        let json = serde_json::to_string(&person).expect("serialize");
        assert_eq!(json, r#"{"name":"john","age":12,"gender":1}"#);

        let back: Person = serde_json::from_str(r#"{"name":"x","age":3,"gender":2}"#)
            .expect("deserialize");
        assert_eq!(back.gender, Gender::Other(2));
    }

    #[test]
    fn filter_binds_one_parameter_per_placeholder() {
        let (clause, params) = PersonFilter::AgeBetween { min: 10, max: 20 }.where_clause();
        assert_eq!(clause.matches('?').count(), params.len());

        let (clause, params) = PersonFilter::All.where_clause();
        assert!(clause.is_empty());
        assert!(params.is_empty());
    }
}
