//! SQLite-backed index database

use crate::memory::IndexSnapshot;
use crate::provider::{IndexError, Result, SymbolIndex};
use crate::types::{
    Symbol, SymbolKind, SymbolLocation, SymbolOccurrence, SymbolRelation, SymbolRoles,
    UnitInclude,
};
use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const OCCURRENCE_COLUMNS: &str = "o.id, o.usr, o.name, o.kind, o.path, o.line, o.col, o.roles";

static MEMORY_DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Connections to one database. Each query checks one out, so concurrent
/// readers never wait on each other.
struct ConnectionPool {
    target: PathBuf,
    idle: Mutex<Vec<Connection>>,
}

impl ConnectionPool {
    fn new(target: PathBuf) -> Result<Self> {
        let pool = Self {
            target,
            idle: Mutex::new(Vec::new()),
        };
        // Keeps a shared in-memory database alive for the pool's lifetime
        let first = pool.connect()?;
        pool.put(first);
        Ok(pool)
    }

    fn connect(&self) -> Result<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.target, flags)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    fn get(&self) -> Result<Connection> {
        let idle = self
            .idle
            .lock()
            .map_err(|_| IndexError::Query("connection pool lock poisoned".into()))?
            .pop();
        match idle {
            Some(conn) => Ok(conn),
            None => self.connect(),
        }
    }

    fn put(&self, conn: Connection) {
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(conn);
        }
    }

    #[cfg(test)]
    fn idle_count(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }
}

pub struct SqliteIndex {
    pool: Arc<ConnectionPool>,
}

impl SqliteIndex {
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_target(path.to_path_buf())
    }

    /// Private in-memory database, shared by all connections of this index
    pub fn open_in_memory() -> Result<Self> {
        let n = MEMORY_DB_COUNTER.fetch_add(1, Ordering::Relaxed);
        let uri = format!(
            "file:incprune-mem-{}-{}?mode=memory&cache=shared",
            std::process::id(),
            n
        );
        Self::with_target(PathBuf::from(uri))
    }

    fn with_target(target: PathBuf) -> Result<Self> {
        let index = Self {
            pool: Arc::new(ConnectionPool::new(target)?),
        };
        index.init_schema()?;
        Ok(index)
    }

    /// Run `f` on a pooled connection, synchronously
    fn with_conn_blocking<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.pool.get()?;
        let result = f(&mut conn);
        self.pool.put(conn);
        result
    }

    /// Run `f` on a pooled connection on the blocking thread pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let result = f(&conn);
            pool.put(conn);
            result
        })
        .await
        .map_err(|e| IndexError::Query(format!("query task failed: {}", e)))?
    }

    fn init_schema(&self) -> Result<()> {
        self.with_conn_blocking(|conn| {
            conn.execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS units (
                name TEXT PRIMARY KEY,
                main_file TEXT NOT NULL,
                modified_at INTEGER
            );

            CREATE TABLE IF NOT EXISTS unit_includes (
                id INTEGER PRIMARY KEY,
                unit TEXT NOT NULL,
                seq INTEGER NOT NULL,
                source_path TEXT NOT NULL,
                target_path TEXT NOT NULL,
                line INTEGER NOT NULL,
                FOREIGN KEY (unit) REFERENCES units(name)
            );

            CREATE TABLE IF NOT EXISTS occurrences (
                id INTEGER PRIMARY KEY,
                usr TEXT NOT NULL,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                path TEXT NOT NULL,
                line INTEGER NOT NULL,
                col INTEGER NOT NULL,
                roles INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS occurrence_relations (
                occurrence_id INTEGER NOT NULL,
                roles INTEGER NOT NULL,
                usr TEXT NOT NULL,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                FOREIGN KEY (occurrence_id) REFERENCES occurrences(id)
            );

            CREATE INDEX IF NOT EXISTS idx_includes_unit ON unit_includes(unit, seq);
            CREATE INDEX IF NOT EXISTS idx_includes_source ON unit_includes(source_path);
            CREATE INDEX IF NOT EXISTS idx_includes_target ON unit_includes(target_path);
            CREATE INDEX IF NOT EXISTS idx_occ_usr ON occurrences(usr);
            CREATE INDEX IF NOT EXISTS idx_occ_path ON occurrences(path);
            CREATE INDEX IF NOT EXISTS idx_occ_name ON occurrences(name);
            CREATE INDEX IF NOT EXISTS idx_rel_usr ON occurrence_relations(usr);
            CREATE INDEX IF NOT EXISTS idx_rel_occ ON occurrence_relations(occurrence_id);
                "#,
            )?;
            Ok(())
        })
    }

    /// Write a snapshot into the database in one transaction.
    /// Units with the same name are replaced.
    pub fn import_snapshot(&self, snapshot: &IndexSnapshot) -> Result<()> {
        self.with_conn_blocking(|conn| Self::write_snapshot(conn, snapshot))?;
        tracing::debug!(
            "Imported {} units, {} occurrences",
            snapshot.units.len(),
            snapshot.occurrences.len()
        );
        Ok(())
    }

    fn write_snapshot(conn: &mut Connection, snapshot: &IndexSnapshot) -> Result<()> {
        let tx = conn.transaction()?;

        for unit in &snapshot.units {
            tx.execute("DELETE FROM unit_includes WHERE unit = ?", [&unit.name])?;
            tx.execute(
                r#"
                INSERT INTO units (name, main_file, modified_at) VALUES (?, ?, ?)
                ON CONFLICT(name) DO UPDATE SET
                    main_file = excluded.main_file,
                    modified_at = excluded.modified_at
                "#,
                params![&unit.name, &unit.main_file, unit.modified_at],
            )?;
            for (seq, inc) in unit.includes.iter().enumerate() {
                tx.execute(
                    "INSERT INTO unit_includes (unit, seq, source_path, target_path, line) VALUES (?, ?, ?, ?, ?)",
                    params![&unit.name, seq as i64, &inc.source_path, &inc.target_path, inc.line],
                )?;
            }
        }

        for occ in &snapshot.occurrences {
            tx.execute(
                "INSERT INTO occurrences (usr, name, kind, path, line, col, roles) VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    &occ.symbol.usr,
                    &occ.symbol.name,
                    occ.symbol.kind.as_str(),
                    &occ.location.path,
                    occ.location.line,
                    occ.location.column,
                    occ.roles.bits(),
                ],
            )?;
            let occurrence_id = tx.last_insert_rowid();
            for rel in &occ.relations {
                tx.execute(
                    "INSERT INTO occurrence_relations (occurrence_id, roles, usr, name, kind) VALUES (?, ?, ?, ?, ?)",
                    params![
                        occurrence_id,
                        rel.roles.bits(),
                        &rel.symbol.usr,
                        &rel.symbol.name,
                        rel.symbol.kind.as_str(),
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn ensure_unit(conn: &Connection, unit: &str) -> Result<Option<i64>> {
        conn.query_row(
            "SELECT modified_at FROM units WHERE name = ?",
            [unit],
            |row| row.get::<_, Option<i64>>(0),
        )
        .optional()?
        .ok_or_else(|| IndexError::UnknownUnit(unit.to_string()))
    }

    /// Run an occurrence query and attach the relations of each row
    fn query_occurrences(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<SymbolOccurrence>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |row| {
                let id: i64 = row.get(0)?;
                let kind: String = row.get(3)?;
                let occurrence = SymbolOccurrence {
                    symbol: Symbol::new(
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        SymbolKind::from_str(&kind),
                    ),
                    location: SymbolLocation {
                        path: row.get(4)?,
                        line: row.get(5)?,
                        column: row.get(6)?,
                    },
                    roles: SymbolRoles::from_bits(row.get(7)?),
                    relations: Vec::new(),
                };
                Ok((id, occurrence))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut rel_stmt = conn.prepare(
            "SELECT roles, usr, name, kind FROM occurrence_relations WHERE occurrence_id = ?",
        )?;
        let mut occurrences = Vec::with_capacity(rows.len());
        for (id, mut occurrence) in rows {
            occurrence.relations = rel_stmt
                .query_map([id], |row| {
                    let kind: String = row.get(3)?;
                    Ok(SymbolRelation {
                        roles: SymbolRoles::from_bits(row.get(0)?),
                        symbol: Symbol::new(
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            SymbolKind::from_str(&kind),
                        ),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            occurrences.push(occurrence);
        }
        Ok(occurrences)
    }
}

#[async_trait]
impl SymbolIndex for SqliteIndex {
    async fn units_containing(&self, path: &str) -> Result<Vec<String>> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT u.name FROM units u
                WHERE u.main_file = ?1
                   OR EXISTS (
                       SELECT 1 FROM unit_includes i
                       WHERE i.unit = u.name AND (i.source_path = ?1 OR i.target_path = ?1)
                   )
                ORDER BY u.rowid
                "#,
            )?;
            let names = stmt
                .query_map([&path], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(names)
        })
        .await
    }

    async fn unit_modification_time(&self, unit: &str) -> Result<Option<i64>> {
        let unit = unit.to_string();
        self.with_conn(move |conn| Self::ensure_unit(conn, &unit)).await
    }

    async fn includes_of_unit(&self, unit: &str) -> Result<Vec<UnitInclude>> {
        let unit = unit.to_string();
        self.with_conn(move |conn| {
            Self::ensure_unit(conn, &unit)?;
            let mut stmt = conn.prepare(
                "SELECT source_path, target_path, line FROM unit_includes WHERE unit = ? ORDER BY seq",
            )?;
            let includes = stmt
                .query_map([&unit], |row| {
                    Ok(UnitInclude {
                        source_path: row.get(0)?,
                        target_path: row.get(1)?,
                        line: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(includes)
        })
        .await
    }

    async fn symbols_in_file(&self, path: &str) -> Result<Vec<Symbol>> {
        let path = path.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT usr, name, kind, MIN(id) AS first_id FROM occurrences
                WHERE path = ?
                GROUP BY usr
                ORDER BY first_id
                "#,
            )?;
            let symbols = stmt
                .query_map([&path], |row| {
                    let kind: String = row.get(2)?;
                    Ok(Symbol::new(
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        SymbolKind::from_str(&kind),
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(symbols)
        })
        .await
    }

    async fn occurrences(&self, usr: &str, roles: SymbolRoles) -> Result<Vec<SymbolOccurrence>> {
        let usr = usr.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM occurrences o WHERE o.usr = ? AND (o.roles & ?) != 0 ORDER BY o.id",
                OCCURRENCE_COLUMNS
            );
            Self::query_occurrences(conn, &sql, params![usr, roles.bits()])
        })
        .await
    }

    async fn related_occurrences(
        &self,
        usr: &str,
        roles: SymbolRoles,
    ) -> Result<Vec<SymbolOccurrence>> {
        let usr = usr.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                r#"
                SELECT {} FROM occurrences o
                WHERE EXISTS (
                    SELECT 1 FROM occurrence_relations r
                    WHERE r.occurrence_id = o.id AND r.usr = ? AND (r.roles & ?) != 0
                )
                ORDER BY o.id
                "#,
                OCCURRENCE_COLUMNS
            );
            Self::query_occurrences(conn, &sql, params![usr, roles.bits()])
        })
        .await
    }

    async fn canonical_occurrences(&self, name: &str) -> Result<Vec<SymbolOccurrence>> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM occurrences o WHERE o.name = ? AND (o.roles & ?) != 0 ORDER BY o.id",
                OCCURRENCE_COLUMNS
            );
            Self::query_occurrences(conn, &sql, params![name, SymbolRoles::CANONICAL.bits()])
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryIndex;
    use crate::types::UnitRecord;

    fn snapshot() -> IndexSnapshot {
        let decl = SymbolOccurrence {
            symbol: Symbol::new("c:objc(ext)Foo@Cat", "Foo", SymbolKind::Extension),
            location: SymbolLocation {
                path: "/src/foo+cat.h".to_string(),
                line: 4,
                column: 1,
            },
            roles: SymbolRoles::DECLARATION | SymbolRoles::EXTENDED_BY,
            relations: vec![SymbolRelation {
                roles: SymbolRoles::EXTENDED_BY,
                symbol: Symbol::new("c:objc(cs)Foo", "Foo", SymbolKind::Class),
            }],
        };
        let reference = SymbolOccurrence {
            symbol: Symbol::new("c:objc(cs)Foo", "Foo", SymbolKind::Class),
            location: SymbolLocation {
                path: "/src/main.m".to_string(),
                line: 9,
                column: 5,
            },
            roles: SymbolRoles::REFERENCE,
            relations: vec![],
        };
        IndexSnapshot {
            units: vec![
                UnitRecord {
                    name: "old.o".to_string(),
                    main_file: "/src/main.m".to_string(),
                    modified_at: Some(1),
                    includes: vec![],
                },
                UnitRecord {
                    name: "main.o".to_string(),
                    main_file: "/src/other.m".to_string(),
                    modified_at: None,
                    includes: vec![
                        UnitInclude::new("/src/other.m", "/src/main.m", 1),
                        UnitInclude::new("/src/main.m", "/src/foo+cat.h", 2),
                    ],
                },
            ],
            occurrences: vec![decl, reference],
        }
    }

    #[tokio::test]
    async fn test_sqlite_matches_memory_index() {
        let sqlite = SqliteIndex::open_in_memory().unwrap();
        sqlite.import_snapshot(&snapshot()).unwrap();
        let memory = MemoryIndex::from_snapshot(snapshot());

        assert_eq!(
            sqlite.units_containing("/src/main.m").await.unwrap(),
            memory.units_containing("/src/main.m").await.unwrap()
        );
        assert_eq!(
            sqlite.includes_of_unit("main.o").await.unwrap(),
            memory.includes_of_unit("main.o").await.unwrap()
        );
        assert_eq!(
            sqlite.symbols_in_file("/src/main.m").await.unwrap(),
            memory.symbols_in_file("/src/main.m").await.unwrap()
        );

        let roles = SymbolRoles::DECLARATION | SymbolRoles::EXTENDED_BY;
        assert_eq!(
            sqlite.occurrences("c:objc(ext)Foo@Cat", roles).await.unwrap(),
            memory.occurrences("c:objc(ext)Foo@Cat", roles).await.unwrap()
        );
        assert_eq!(
            sqlite
                .related_occurrences("c:objc(cs)Foo", SymbolRoles::EXTENDED_BY)
                .await
                .unwrap(),
            memory
                .related_occurrences("c:objc(cs)Foo", SymbolRoles::EXTENDED_BY)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_unit_metadata() {
        let sqlite = SqliteIndex::open_in_memory().unwrap();
        sqlite.import_snapshot(&snapshot()).unwrap();

        assert_eq!(sqlite.unit_modification_time("old.o").await.unwrap(), Some(1));
        assert_eq!(sqlite.unit_modification_time("main.o").await.unwrap(), None);
        assert!(matches!(
            sqlite.unit_modification_time("gone.o").await,
            Err(IndexError::UnknownUnit(_))
        ));
    }

    #[tokio::test]
    async fn test_reimport_replaces_unit_includes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        {
            let sqlite = SqliteIndex::open(&path).unwrap();
            sqlite.import_snapshot(&snapshot()).unwrap();
            let again = IndexSnapshot {
                units: snapshot().units,
                occurrences: vec![],
            };
            sqlite.import_snapshot(&again).unwrap();
        }

        let sqlite = SqliteIndex::open(&path).unwrap();
        assert_eq!(sqlite.includes_of_unit("main.o").await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_query_does_not_wait_for_busy_connection() {
        let sqlite = SqliteIndex::open_in_memory().unwrap();
        sqlite.import_snapshot(&snapshot()).unwrap();

        let held = sqlite.pool.get().unwrap();
        let units = tokio::time::timeout(
            Duration::from_secs(5),
            sqlite.units_containing("/src/main.m"),
        )
        .await
        .expect("query blocked on a checked-out connection")
        .unwrap();
        assert_eq!(units, vec!["old.o", "main.o"]);

        sqlite.pool.put(held);
        assert_eq!(sqlite.pool.idle_count(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_queries() {
        let dir = tempfile::tempdir().unwrap();
        let sqlite = Arc::new(SqliteIndex::open(&dir.path().join("index.db")).unwrap());
        sqlite.import_snapshot(&snapshot()).unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let sqlite = Arc::clone(&sqlite);
            tasks.spawn(async move {
                sqlite
                    .related_occurrences("c:objc(cs)Foo", SymbolRoles::EXTENDED_BY)
                    .await
            });
        }
        while let Some(result) = tasks.join_next().await {
            let occurrences = result.unwrap().unwrap();
            assert_eq!(occurrences.len(), 1);
            assert_eq!(occurrences[0].symbol.usr, "c:objc(ext)Foo@Cat");
        }
    }

    #[test]
    fn test_in_memory_databases_are_separate() {
        let a = SqliteIndex::open_in_memory().unwrap();
        let b = SqliteIndex::open_in_memory().unwrap();
        a.import_snapshot(&snapshot()).unwrap();

        let count = |index: &SqliteIndex| {
            index
                .with_conn_blocking(|conn| {
                    Ok(conn.query_row("SELECT COUNT(*) FROM units", [], |row| row.get::<_, i64>(0))?)
                })
                .unwrap()
        };
        assert_eq!(count(&a), 2);
        assert_eq!(count(&b), 0);
    }
}
