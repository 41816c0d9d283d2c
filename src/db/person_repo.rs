// src/db/person_repo.rs

use log::{debug, error, info, warn};
use rusqlite::types::{ToSql, Value};
use rusqlite::{params, params_from_iter, Connection};

use super::error::{RepoError, TxStage};
use super::monitoring::measure;
use super::person::{Person, PersonFilter};
use super::schema::USERS_DDL;
use super::statement::Statement;
use crate::config::DatabaseConfig;

/// Rows per multi-row INSERT; three bound values each keeps us under
/// SQLite's historical 999-parameter limit.
pub const MAX_ROWS_PER_INSERT: usize = 300;

const SELECT_PERSON: &str = "SELECT name, gender, age FROM users";

/// CRUD over the `users` table through one owned connection.
///
/// Every method takes `&self` and is one request/response round trip.
/// `rusqlite::Connection` is not `Sync`, so sharing a repository between
/// threads needs a wrapper; see [`super::SharedPersonRepository`].
pub struct PersonRepository {
    conn: Connection,
}

impl PersonRepository {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open(config: &DatabaseConfig) -> Result<Self, RepoError> {
        super::open_connection(config).map(Self::new)
    }

    pub fn open_in_memory() -> Result<Self, RepoError> {
        Self::open(&DatabaseConfig::in_memory())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_inner(self) -> Connection {
        self.conn
    }

    /// Drops and recreates `users` with its indexes. All rows are lost.
    pub fn ensure_schema(&self) -> Result<(), RepoError> {
        measure("ensure_schema", || ensure_schema(&self.conn))
    }

    /// Inserts the whole batch or nothing. Returns the number of rows inserted.
    pub fn insert_many(&self, rows: &[Person]) -> Result<usize, RepoError> {
        measure("insert_many", || insert_many(&self.conn, rows))
    }

    /// Zero rows affected means no such name; that is not an error.
    pub fn update_age(&self, name: &str, new_age: i64) -> Result<usize, RepoError> {
        measure("update_age", || update_age(&self.conn, name, new_age))
    }

    pub fn delete(&self, name: &str) -> Result<usize, RepoError> {
        measure("delete", || delete(&self.conn, name))
    }

    pub fn find_by_name(&self, name: &str) -> Result<Option<Person>, RepoError> {
        measure("find_by_name", || find_by_name(&self.conn, name))
    }

    /// Matching rows ordered by name.
    pub fn query(&self, filter: &PersonFilter) -> Result<Vec<Person>, RepoError> {
        measure("query", || query(&self.conn, filter))
    }

    /// Runs caller-supplied SELECT text and maps each row into a [`Person`].
    ///
    /// The result columns must be exactly `name, gender, age`; anything else
    /// is a [`RepoError::Mapping`].
    pub fn select(&self, sql: &str, params: &[Value]) -> Result<Vec<Person>, RepoError> {
        measure("select", || select(&self.conn, "select", sql, params))
    }

    pub fn count(&self) -> Result<usize, RepoError> {
        measure("count", || count(&self.conn))
    }

    /// Executes `steps` in order inside one transaction. Returns rows affected
    /// per step. The first failing step rolls everything back.
    pub fn run_transaction(&self, steps: &[Statement]) -> Result<Vec<usize>, RepoError> {
        measure("run_transaction", || run_transaction(&self.conn, steps))
    }
}

// The free functions below are shared with the async repository, which runs
// them on its worker thread.

pub(crate) fn ensure_schema(conn: &Connection) -> Result<(), RepoError> {
    const OP: &str = "ensure_schema";

    let tx = conn.unchecked_transaction().map_err(RepoError::schema(OP))?;
    tx.execute_batch(USERS_DDL).map_err(RepoError::schema(OP))?;
    tx.commit().map_err(RepoError::schema(OP))?;

    info!("Table users recreated");
    Ok(())
}

pub(crate) fn insert_many(conn: &Connection, rows: &[Person]) -> Result<usize, RepoError> {
    const OP: &str = "insert_many";

    if rows.is_empty() {
        debug!("{OP}: empty batch, nothing to do");
        return Ok(0);
    }

    let tx = conn.unchecked_transaction().map_err(RepoError::write(OP))?;
    let mut inserted = 0;
    for chunk in rows.chunks(MAX_ROWS_PER_INSERT) {
        let sql = format!(
            "INSERT INTO users (name, gender, age) VALUES {}",
            vec!["(?, ?, ?)"; chunk.len()].join(", ")
        );
        let values: Vec<&dyn ToSql> = chunk
            .iter()
            .flat_map(|p| [&p.name as &dyn ToSql, &p.gender, &p.age])
            .collect();
        inserted += tx
            .execute(&sql, values.as_slice())
            .map_err(RepoError::write(OP))?;
    }
    let last_rowid = tx.last_insert_rowid();
    tx.commit().map_err(RepoError::write(OP))?;

    debug!("{OP}: {inserted} rows, last insert rowid {last_rowid}");
    Ok(inserted)
}

pub(crate) fn update_age(conn: &Connection, name: &str, new_age: i64) -> Result<usize, RepoError> {
    let affected = conn
        .execute("UPDATE users SET age = ?1 WHERE name = ?2", params![new_age, name])
        .map_err(RepoError::write("update_age"))?;
    debug!("update_age: {name} -> {new_age}, {affected} rows");
    Ok(affected)
}

pub(crate) fn delete(conn: &Connection, name: &str) -> Result<usize, RepoError> {
    let affected = conn
        .execute("DELETE FROM users WHERE name = ?1", params![name])
        .map_err(RepoError::write("delete"))?;
    debug!("delete: {name}, {affected} rows");
    Ok(affected)
}

pub(crate) fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Person>, RepoError> {
    let (clause, values) = PersonFilter::name(name).where_clause();
    let sql = format!("{SELECT_PERSON}{clause}");
    let mut found = select(conn, "find_by_name", &sql, &values)?;
    // name is the primary key
    Ok(found.pop())
}

pub(crate) fn query(conn: &Connection, filter: &PersonFilter) -> Result<Vec<Person>, RepoError> {
    let (clause, values) = filter.where_clause();
    let sql = format!("{SELECT_PERSON}{clause} ORDER BY name");
    select(conn, "query", &sql, &values)
}

pub(crate) fn count(conn: &Connection) -> Result<usize, RepoError> {
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
        .map_err(RepoError::read("count"))?;
    Ok(usize::try_from(n).unwrap_or_default())
}

pub(crate) fn select(
    conn: &Connection,
    op: &'static str,
    sql: &str,
    values: &[Value],
) -> Result<Vec<Person>, RepoError> {
    let mut stmt = conn.prepare(sql).map_err(RepoError::read(op))?;

    {
        let columns = stmt.column_names();
        if columns.len() != Person::COLUMNS.len()
            || columns
                .iter()
                .zip(Person::COLUMNS)
                .any(|(got, want)| !got.eq_ignore_ascii_case(want))
        {
            return Err(RepoError::Mapping {
                op,
                reason: format!(
                    "expected columns {:?}, query returns {:?}",
                    Person::COLUMNS,
                    columns
                ),
            });
        }
    }

    let rows = stmt
        .query_map(params_from_iter(values.iter()), Person::from_row)
        .map_err(RepoError::read(op))?;

    let mut people = Vec::new();
    for row in rows {
        people.push(row.map_err(RepoError::read(op))?);
    }
    debug!("{op}: {} rows", people.len());
    Ok(people)
}

pub(crate) fn run_transaction(conn: &Connection, steps: &[Statement]) -> Result<Vec<usize>, RepoError> {
    const OP: &str = "run_transaction";

    let tx = conn
        .unchecked_transaction()
        .map_err(RepoError::transaction(OP, TxStage::Begin))?;

    let mut affected = Vec::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        match step.execute(&tx) {
            Ok(n) => affected.push(n),
            Err(source) => {
                warn!("{OP}: step {index} ({}) failed, rolling back: {source}", step.sql());
                if let Err(e) = tx.rollback() {
                    error!("{OP}: rollback failed: {e}");
                }
                return Err(RepoError::Transaction {
                    op: OP,
                    stage: TxStage::Step(index),
                    source,
                });
            }
        }
    }

    tx.commit()
        .map_err(RepoError::transaction(OP, TxStage::Commit))?;
    info!("{OP}: committed {} steps", steps.len());
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::error::ErrorCategory;
    use crate::db::person::Gender;

    fn setup_test_repo() -> PersonRepository {
        let repo = PersonRepository::open_in_memory().expect("Failed to open in-memory database");
        repo.ensure_schema().expect("Failed to create users table");
        repo
    }

    fn seed() -> Vec<Person> {
        vec![
            Person::new("fun", 11, Gender::Male),
            Person::new("john", 12, Gender::Male),
            Person::new("amy", 14, Gender::Female),
        ]
    }

    fn snapshot(repo: &PersonRepository) -> Vec<Person> {
        repo.query(&PersonFilter::All).expect("Failed to read users")
    }

    #[test]
    fn test_insert_then_read_all() {
        let repo = setup_test_repo();

        let inserted = repo.insert_many(&seed()).expect("Failed to insert");
        assert_eq!(inserted, 3);

        let mut expected = seed();
        expected.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(snapshot(&repo), expected);
        assert_eq!(repo.count().unwrap(), 3);
    }

    #[test]
    fn test_update_age_touches_only_matching_row() {
        let repo = setup_test_repo();
        repo.insert_many(&seed()).unwrap();

        assert_eq!(repo.update_age("fun", 18).unwrap(), 1);
        assert_eq!(repo.find_by_name("fun").unwrap().unwrap().age, 18);
        assert_eq!(repo.find_by_name("john").unwrap().unwrap().age, 12);
        assert_eq!(repo.find_by_name("amy").unwrap().unwrap().age, 14);

        assert_eq!(repo.update_age("nobody", 18).unwrap(), 0);
    }

    #[test]
    fn test_delete_removes_exactly_one_row() {
        let repo = setup_test_repo();
        repo.insert_many(&seed()).unwrap();

        assert_eq!(repo.delete("amy").unwrap(), 1);
        assert_eq!(repo.find_by_name("amy").unwrap(), None);
        assert!(repo.query(&PersonFilter::name("amy")).unwrap().is_empty());
        assert_eq!(repo.count().unwrap(), 2);

        assert_eq!(repo.delete("amy").unwrap(), 0);
    }

    #[test]
    fn test_round_trip_by_name() {
        let repo = setup_test_repo();
        let john = Person::new("john", 12, Gender::Male);
        repo.insert_many(std::slice::from_ref(&john)).unwrap();

        assert_eq!(repo.find_by_name("john").unwrap(), Some(john));
    }

    #[test]
    fn test_filters() {
        let repo = setup_test_repo();
        repo.insert_many(&seed()).unwrap();
        repo.insert_many(&[Person::new("zed", 40, Gender::Other(2))]).unwrap();

        let names = |filter: PersonFilter| -> Vec<String> {
            repo.query(&filter)
                .unwrap()
                .into_iter()
                .map(|p| p.name)
                .collect()
        };

        assert_eq!(names(PersonFilter::Gender(Gender::Male)), ["fun", "john"]);
        assert_eq!(names(PersonFilter::Gender(Gender::Other(2))), ["zed"]);
        assert_eq!(names(PersonFilter::AgeBetween { min: 12, max: 14 }), ["amy", "john"]);
        assert!(names(PersonFilter::AgeBetween { min: 50, max: 60 }).is_empty());
    }

    #[test]
    fn test_duplicate_key_is_write_error_and_inserts_nothing() {
        let repo = setup_test_repo();
        repo.insert_many(&seed()).unwrap();

        let err = repo
            .insert_many(&[
                Person::new("new", 1, Gender::Female),
                Person::new("john", 99, Gender::Female),
            ])
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Write);
        assert!(err.is_constraint_violation());
        assert_eq!(repo.find_by_name("new").unwrap(), None);
        assert_eq!(repo.find_by_name("john").unwrap().unwrap().age, 12);
    }

    #[test]
    fn test_name_longer_than_column_is_rejected() {
        let repo = setup_test_repo();
        let err = repo
            .insert_many(&[Person::new("x".repeat(51), 1, Gender::Male)])
            .unwrap_err();
        assert!(err.is_constraint_violation());
        repo.insert_many(&[Person::new("y".repeat(50), 1, Gender::Male)])
            .unwrap();
    }

    #[test]
    fn test_large_batch_spans_several_statements() {
        let repo = setup_test_repo();
        let rows: Vec<Person> = (0..MAX_ROWS_PER_INSERT * 2 + 7)
            .map(|i| Person::new(format!("user{i:04}"), (i % 90) as i64, Gender::from((i % 2) as i64)))
            .collect();

        assert_eq!(repo.insert_many(&rows).unwrap(), rows.len());
        assert_eq!(repo.count().unwrap(), rows.len());
    }

    #[test]
    fn test_large_batch_is_atomic() {
        let repo = setup_test_repo();
        let mut rows: Vec<Person> = (0..MAX_ROWS_PER_INSERT + 5)
            .map(|i| Person::new(format!("user{i:04}"), 1, Gender::Female))
            .collect();
        // duplicate lands in the second chunk
        rows.push(Person::new("user0000", 1, Gender::Female));

        assert!(repo.insert_many(&rows).is_err());
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let repo = setup_test_repo();
        assert_eq!(repo.insert_many(&[]).unwrap(), 0);
    }

    #[test]
    fn test_ensure_schema_twice_leaves_empty_table() {
        let repo = setup_test_repo();
        repo.insert_many(&seed()).unwrap();

        repo.ensure_schema().unwrap();
        assert_eq!(repo.count().unwrap(), 0);
        repo.insert_many(&seed()).unwrap();

        repo.ensure_schema().unwrap();
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn test_schema_has_secondary_indexes() {
        let repo = setup_test_repo();
        let mut stmt = repo
            .connection()
            .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = 'users' AND sql IS NOT NULL ORDER BY name")
            .unwrap();
        let names: Vec<String> = stmt
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(names, ["idx_users_age", "idx_users_gender"]);
    }

    #[test]
    fn test_transaction_commits_all_steps() {
        let repo = setup_test_repo();
        repo.insert_many(&seed()).unwrap();

        let affected = repo
            .run_transaction(&[
                Statement::insert(&Person::new("fun5", 30, Gender::Male)),
                Statement::update_age("john", 31),
                Statement::delete("nobody"),
            ])
            .unwrap();

        assert_eq!(affected, [1, 1, 0]);
        assert_eq!(repo.find_by_name("fun5").unwrap().unwrap().age, 30);
        assert_eq!(repo.find_by_name("john").unwrap().unwrap().age, 31);
    }

    #[test]
    fn test_failing_step_rolls_back_whole_transaction() {
        let repo = setup_test_repo();
        repo.insert_many(&seed()).unwrap();
        let before = snapshot(&repo);

        let err = repo
            .run_transaction(&[
                Statement::insert(&Person::new("fun6", 30, Gender::Other(2))),
                Statement::update_age("fun", 99),
                Statement::new("UPDATE person1 SET age = ?1 WHERE name = ?2")
                    .bind(31)
                    .bind("fun1".to_string()),
                Statement::delete("john"),
            ])
            .unwrap_err();

        assert!(matches!(
            err,
            RepoError::Transaction { stage: TxStage::Step(2), .. }
        ));
        assert_eq!(err.category(), ErrorCategory::Transaction);
        assert_eq!(snapshot(&repo), before);

        // connection is usable afterwards
        assert_eq!(repo.update_age("fun", 20).unwrap(), 1);
    }

    #[test]
    fn test_select_rejects_wrong_shape() {
        let repo = setup_test_repo();
        repo.insert_many(&seed()).unwrap();

        let err = repo.select("SELECT name FROM users", &[]).unwrap_err();
        assert!(matches!(err, RepoError::Mapping { .. }));

        let err = repo.select("SELECT * FROM users, users AS u2", &[]).unwrap_err();
        assert!(matches!(err, RepoError::Mapping { .. }));

        let err = repo
            .select("SELECT name, 'many' AS gender, age FROM users", &[])
            .unwrap_err();
        assert!(matches!(err, RepoError::Mapping { .. }));
        assert_eq!(err.category(), ErrorCategory::Read);
    }

    #[test]
    fn test_select_with_parameters() {
        let repo = setup_test_repo();
        repo.insert_many(&seed()).unwrap();

        let people = repo
            .select(
                "SELECT name, gender, age FROM users WHERE age > ?1 ORDER BY age",
                &[Value::Integer(11)],
            )
            .unwrap();
        assert_eq!(
            people.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            ["john", "amy"]
        );
    }

    #[test]
    fn test_malformed_query_is_read_error() {
        let repo = setup_test_repo();
        let err = repo.select("SELEKT name, gender, age FROM users", &[]).unwrap_err();
        assert!(matches!(err, RepoError::Read { op: "select", .. }));
    }

    #[test]
    fn test_operations_without_schema_fail_with_their_category() {
        let repo = PersonRepository::open_in_memory().unwrap();

        assert_eq!(
            repo.update_age("fun", 1).unwrap_err().category(),
            ErrorCategory::Write
        );
        assert_eq!(
            repo.query(&PersonFilter::All).unwrap_err().category(),
            ErrorCategory::Read
        );
    }
}
