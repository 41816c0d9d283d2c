// src/lib.rs

//! Repository-style access to a single `users` table of [`Person`] rows,
//! backed by SQLite through `rusqlite`.
//!
//! ```no_run
//! use people_db::{DatabaseConfig, Gender, Person, PersonRepository};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = PersonRepository::open(&DatabaseConfig::from_env()?)?;
//! repo.ensure_schema()?;
//! repo.insert_many(&[Person::new("john", 12, Gender::Male)])?;
//! assert_eq!(repo.update_age("john", 13)?, 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;

pub use config::{ConfigError, DatabaseConfig};
pub use db::monitoring::gather_metrics;
pub use db::{
    open_connection, EntityRepository, ErrorCategory, Gender, Person, PersonFilter,
    PersonRepository, RepoError, SharedPersonRepository, Statement, TxStage,
};
