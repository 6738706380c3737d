use std::collections::HashSet;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::app::{Result, SiftError};
use crate::config::{HISTORY_LIMIT, POOL_SIZE};
use crate::domain::{Category, Item, SourcePriority, Tab};
use crate::store::{Exemplar, Store, TabEntry};

static MEM_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
enum StoreTarget {
    File(PathBuf),
    /// Named shared-cache URI so every pooled connection sees one database.
    Memory(String),
}

/// SQLite-backed retention store.
///
/// Connections are pooled: `acquire` pops one from the pool or opens a
/// fresh connection when the pool is empty, and the guard returns it on
/// drop unless the pool is already full.
pub struct SqliteStore {
    target: StoreTarget,
    pool: Arc<Mutex<Vec<Connection>>>,
    priority: SourcePriority,
}

struct PooledConn {
    conn: Option<Connection>,
    pool: Arc<Mutex<Vec<Connection>>>,
}

impl Deref for PooledConn {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection taken")
    }
}

impl DerefMut for PooledConn {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection taken")
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Ok(mut pool) = self.pool.lock() {
                if pool.len() < POOL_SIZE {
                    pool.push(conn);
                }
            }
        }
    }
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_priority(path, SourcePriority::default_order())
    }

    pub fn with_priority<P: AsRef<Path>>(path: P, priority: SourcePriority) -> Result<Self> {
        Self::open(StoreTarget::File(path.as_ref().to_path_buf()), priority)
    }

    pub fn in_memory() -> Result<Self> {
        Self::in_memory_with_priority(SourcePriority::default_order())
    }

    pub fn in_memory_with_priority(priority: SourcePriority) -> Result<Self> {
        let n = MEM_DB_COUNTER.fetch_add(1, Ordering::Relaxed);
        let uri = format!("file:sift-mem-{}?mode=memory&cache=shared", n);
        Self::open(StoreTarget::Memory(uri), priority)
    }

    fn open(target: StoreTarget, priority: SourcePriority) -> Result<Self> {
        let store = Self {
            target,
            pool: Arc::new(Mutex::new(Vec::new())),
            priority,
        };

        let mut conn = store.open_connection()?;
        run_migrations(&mut conn)?;
        store
            .pool
            .lock()
            .map_err(|_| SiftError::Other("store pool lock poisoned".into()))?
            .push(conn);

        Ok(store)
    }

    fn open_connection(&self) -> Result<Connection> {
        let conn = match &self.target {
            StoreTarget::File(path) => Connection::open(path)?,
            StoreTarget::Memory(uri) => Connection::open_with_flags(
                uri,
                OpenFlags::default() | OpenFlags::SQLITE_OPEN_URI,
            )?,
        };
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        Ok(conn)
    }

    fn acquire(&self) -> Result<PooledConn> {
        let pooled = self
            .pool
            .lock()
            .map_err(|_| SiftError::Other("store pool lock poisoned".into()))?
            .pop();

        // Pool exhaustion falls back to a fresh connection, never blocks.
        let conn = match pooled {
            Some(conn) => conn,
            None => self.open_connection()?,
        };

        Ok(PooledConn {
            conn: Some(conn),
            pool: Arc::clone(&self.pool),
        })
    }

    fn evict_once(&self, conn: &Connection, category: Category) -> Result<usize> {
        let deleted = conn.execute(
            "DELETE FROM items
             WHERE category = ?1 AND sorted_at IS NOT NULL
               AND id NOT IN (
                   SELECT id FROM items
                    WHERE category = ?1 AND sorted_at IS NOT NULL
                    ORDER BY sorted_at DESC
                    LIMIT ?2)",
            params![category.to_i64(), HISTORY_LIMIT as i64],
        )?;
        Ok(deleted)
    }

    fn tab_by_category(&self, category: Category, limit: usize) -> Result<Vec<TabEntry>> {
        let conn = self.acquire()?;
        let prefixes = self.priority.prefixes();

        // Tier CASE over bound prefix patterns; only internally generated
        // placeholder indices and tier integers land in the SQL text.
        let mut case = String::from("CASE");
        let mut values: Vec<Value> = vec![Value::Integer(category.to_i64())];
        for (i, prefix) in prefixes.iter().enumerate() {
            case.push_str(&format!(" WHEN id LIKE ?{} THEN {}", i + 2, i));
            values.push(Value::Text(format!("{}-%", prefix)));
        }
        case.push_str(&format!(" ELSE {} END", prefixes.len()));

        let sql = format!(
            "SELECT id, category, title, source_url FROM items
             WHERE category = ?1
             ORDER BY {} ASC, created_at DESC
             LIMIT ?{}",
            case,
            prefixes.len() + 2
        );
        values.push(Value::Integer(limit as i64));

        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params_from_iter(values), row_to_tab_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn tab_all(&self, limit: usize) -> Result<Vec<TabEntry>> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT id, category, title, source_url FROM items
             WHERE sorted_at IS NOT NULL
             ORDER BY sorted_at DESC
             LIMIT ?1",
        )?;

        let entries = stmt
            .query_map(params![limit as i64], row_to_tab_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }
}

fn run_migrations(conn: &mut Connection) -> Result<()> {
    let migrations = Migrations::new(vec![M::up(include_str!(
        "../../migrations/001-initial/up.sql"
    ))]);

    migrations
        .to_latest(conn)
        .map_err(|e| SiftError::Other(format!("migration failed: {}", e)))?;

    Ok(())
}

fn row_to_tab_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<TabEntry> {
    Ok(TabEntry {
        id: row.get(0)?,
        category: row
            .get::<_, Option<i64>>(1)?
            .and_then(Category::from_i64),
        title: row.get(2)?,
        source_url: row.get(3)?,
    })
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<Item> {
    let tags: String = row.get(5)?;
    Ok(Item {
        id: row.get(0)?,
        source_url: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        description: row.get(4)?,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        created_at: row.get(6)?,
        category: row
            .get::<_, Option<i64>>(7)?
            .and_then(Category::from_i64),
        sorted_at: row.get(8)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl Store for SqliteStore {
    fn filter_new(&self, candidate_ids: &[String]) -> Result<Vec<String>> {
        if candidate_ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.acquire()?;
        let placeholders = vec!["?"; candidate_ids.len()].join(", ");
        let sql = format!("SELECT id FROM items WHERE id IN ({})", placeholders);

        let mut stmt = conn.prepare(&sql)?;
        let existing = stmt
            .query_map(params_from_iter(candidate_ids.iter()), |row| {
                row.get::<_, String>(0)
            })?
            .collect::<std::result::Result<HashSet<_>, _>>()?;

        Ok(candidate_ids
            .iter()
            .filter(|id| !existing.contains(*id))
            .cloned()
            .collect())
    }

    fn insert_batch(&self, items: &[Item]) -> Result<usize> {
        let mut conn = self.acquire()?;
        let tx = conn.transaction()?;

        for item in items {
            let tags = serde_json::to_string(&item.tags)?;
            let inserted = tx.execute(
                "INSERT INTO items
                     (id, source_url, title, url, description, tags,
                      created_at, category, sorted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    item.id,
                    item.source_url,
                    item.title,
                    item.url,
                    item.description,
                    tags,
                    item.created_at,
                    item.category.map(Category::to_i64),
                    item.sorted_at,
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_constraint_violation(&e) => {
                    return Err(SiftError::DuplicateItem(item.id.clone()));
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit()?;
        Ok(items.len())
    }

    fn evict_overflow(&self, category: Category) -> Result<usize> {
        let conn = self.acquire()?;
        // Eviction is always double-checked: the delete runs twice to
        // tolerate off-by-one races from concurrent writers.
        let first = self.evict_once(&conn, category)?;
        let second = self.evict_once(&conn, category)?;
        if first + second > 0 {
            tracing::debug!(
                category = category.as_str(),
                deleted = first + second,
                "evicted overflow history rows"
            );
        }
        Ok(first + second)
    }

    fn exemplars(&self, category: Category, limit: usize) -> Result<Vec<Exemplar>> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT title, url, description, tags FROM items
             WHERE category = ?1 AND sorted_at IS NOT NULL
             ORDER BY sorted_at DESC
             LIMIT ?2",
        )?;

        let exemplars = stmt
            .query_map(params![category.to_i64(), limit as i64], |row| {
                let tags: String = row.get(3)?;
                Ok(Exemplar {
                    title: row.get(0)?,
                    url: row.get(1)?,
                    description: row.get(2)?,
                    tags: serde_json::from_str(&tags).unwrap_or_default(),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(exemplars)
    }

    fn get_item(&self, id: &str) -> Result<Option<Item>> {
        let conn = self.acquire()?;
        let item = conn
            .query_row(
                "SELECT id, source_url, title, url, description, tags,
                        created_at, category, sorted_at
                 FROM items WHERE id = ?1",
                params![id],
                row_to_item,
            )
            .optional()?;

        Ok(item)
    }

    fn get_tab(&self, tab: Tab, limit: usize) -> Result<Vec<TabEntry>> {
        match tab {
            Tab::All => self.tab_all(limit),
            Tab::Liked => self.tab_by_category(Category::Liked, limit),
            Tab::Disliked => self.tab_by_category(Category::Disliked, limit),
        }
    }

    fn reclassify(&self, id: &str, category: Category) -> Result<()> {
        let updated = {
            let conn = self.acquire()?;
            conn.execute(
                "UPDATE items
                 SET category = ?1, sorted_at = COALESCE(sorted_at, ?2)
                 WHERE id = ?3",
                params![category.to_i64(), Utc::now().timestamp(), id],
            )?
        };

        if updated == 0 {
            return Err(SiftError::ItemNotFound(id.to_string()));
        }

        self.evict_overflow(category)?;
        Ok(())
    }

    fn pending_count(&self) -> Result<i64> {
        let conn = self.acquire()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM items WHERE sorted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn history_count(&self, category: Category) -> Result<i64> {
        let conn = self.acquire()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM items WHERE category = ?1 AND sorted_at IS NOT NULL",
            params![category.to_i64()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
