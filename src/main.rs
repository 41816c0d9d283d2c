// src/main.rs
//
// Walks through every repository operation against the configured database.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::{info, warn};

use people_db::{
    gather_metrics, ConfigError, DatabaseConfig, Gender, Person, PersonFilter, PersonRepository,
    RepoError, Statement,
};

#[derive(Debug, Parser)]
#[command(name = "people-db", version, about = "Person repository walkthrough on SQLite")]
struct Cli {
    /// Database file (overrides PEOPLE_DB_PATH)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// SQLCipher key (overrides PEOPLE_DB_PASSWORD; needs the `sqlcipher` feature)
    #[arg(long)]
    password: Option<String>,

    /// Busy timeout in milliseconds (overrides PEOPLE_DB_BUSY_TIMEOUT_MS)
    #[arg(long)]
    busy_timeout_ms: Option<u64>,

    /// Log commit/rollback/update hook events (RUST_LOG=debug to see them)
    #[arg(long)]
    trace_hooks: bool,

    /// Print rows as JSON
    #[arg(long)]
    json: bool,

    /// Dump Prometheus metrics when done
    #[arg(long)]
    metrics: bool,
}

impl Cli {
    fn apply(&self, mut config: DatabaseConfig) -> DatabaseConfig {
        if let Some(path) = &self.db_path {
            config.path = path.clone();
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        if let Some(ms) = self.busy_timeout_ms {
            config.busy_timeout = Duration::from_millis(ms);
        }
        config.trace_hooks |= self.trace_hooks;
        config
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", error_message(&err));
            ExitCode::from(exit_code_for(&err))
        }
    }
}

// RepoError's own message already carries the driver text, so the source
// chain is not appended.
fn error_message(err: &anyhow::Error) -> String {
    format!("error: {err}")
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(repo_err) = err.downcast_ref::<RepoError>() {
        repo_err.category().exit_code()
    } else if err.downcast_ref::<ConfigError>().is_some() {
        ConfigError::EXIT_CODE
    } else {
        1
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.apply(DatabaseConfig::from_env()?);
    let repo = PersonRepository::open(&config)?;

    repo.ensure_schema()?;

    let inserted = repo.insert_many(&[
        Person::new("fun", 11, Gender::Male),
        Person::new("john", 12, Gender::Male),
        Person::new("amy", 14, Gender::Female),
    ])?;
    info!("Inserted {inserted} rows");

    let updated = repo.update_age("fun", 18)?;
    info!("update_age(fun, 18): {updated} rows affected");

    let deleted = repo.delete("amy")?;
    info!("delete(amy): {deleted} rows affected");

    match repo.find_by_name("john")? {
        Some(john) => print_people(std::slice::from_ref(&john), cli.json)?,
        None => warn!("john not found"),
    }

    print_people(&repo.query(&PersonFilter::All)?, cli.json)?;

    let affected = repo.run_transaction(&[
        Statement::insert(&Person::new("fun5", 30, Gender::Male)),
        Statement::update_age("john", 31),
    ])?;
    info!("Transaction committed, rows affected per step: {affected:?}");

    // person1 does not exist: the insert of fun6 must be rolled back with it.
    let failing = [
        Statement::insert(&Person::new("fun6", 30, Gender::Other(2))),
        Statement::new("UPDATE person1 SET age = ?1 WHERE name = ?2")
            .bind(31)
            .bind("fun1".to_string()),
    ];
    match repo.run_transaction(&failing) {
        Ok(_) => warn!("Transaction against person1 unexpectedly committed"),
        Err(err) => info!("Transaction rolled back: {err}"),
    }

    print_people(&repo.query(&PersonFilter::All)?, cli.json)?;

    if cli.metrics {
        print!("{}", gather_metrics()?);
    }
    Ok(())
}

fn print_people(people: &[Person], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(people)?);
        return Ok(());
    }
    for person in people {
        println!("person: {} age={} gender={}", person.name, person.age, person.gender);
    }
    Ok(())
}
