//! SQLite-backed persistence for widget lists and widget instances.
//!
//! Two tables: `widget_lists` (identity only) and `widget_instances` (owning
//! list, class name, title, JSON configuration document, position). The
//! dense-position invariant is owned by the ordering engine, not by a
//! database constraint.

use std::path::Path;
use std::time::Duration;

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::error::{WidgetError, WidgetResult};
use crate::JsonMap;

/// How long a connection waits on the database write lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A stored widget instance.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetRow {
    pub id: i64,
    pub widget_list_id: i64,
    pub widget_class: String,
    pub title: String,
    /// Validated, serialized configuration document.
    pub configuration: JsonMap,
    pub position: i64,
}

/// Create the schema if it does not exist yet.
pub fn init_schema(conn: &Connection) -> WidgetResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS widget_lists (
             id INTEGER PRIMARY KEY AUTOINCREMENT
         );
         CREATE TABLE IF NOT EXISTS widget_instances (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             widget_list_id INTEGER NOT NULL
                 REFERENCES widget_lists(id) ON DELETE CASCADE,
             widget_class TEXT NOT NULL,
             title TEXT NOT NULL,
             configuration TEXT NOT NULL,
             position INTEGER NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_widget_instances_list_position
             ON widget_instances(widget_list_id, position);",
    )?;
    Ok(())
}

/// Connection pool over the widget database.
pub struct Store {
    pool: r2d2::Pool<SqliteConnectionManager>,
}

impl Store {
    /// Open (creating if needed) the database at `path` and run migrations.
    pub fn open(path: impl AsRef<Path>) -> WidgetResult<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(init_connection);
        let pool = r2d2::Pool::builder()
            .build(manager)
            .map_err(|e| WidgetError::Storage(e.to_string()))?;
        let store = Self { pool };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory database. Pool size is pinned to one connection so
    /// every caller sees the same data.
    pub fn open_in_memory() -> WidgetResult<Self> {
        let manager = SqliteConnectionManager::memory().with_init(init_connection);
        let pool = r2d2::Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| WidgetError::Storage(e.to_string()))?;
        let store = Self { pool };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> WidgetResult<()> {
        init_schema(&*self.conn()?)
    }

    /// Check out a pooled connection.
    pub fn conn(&self) -> WidgetResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(WidgetError::from)
    }

    /// Create an empty widget list and return its id.
    pub fn create_list(&self) -> WidgetResult<i64> {
        let conn = self.conn()?;
        conn.execute("INSERT INTO widget_lists DEFAULT VALUES", [])?;
        Ok(conn.last_insert_rowid())
    }

    /// Delete a widget list; its widgets cascade away with it.
    pub fn delete_list(&self, list_id: i64) -> WidgetResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let deleted = tx.execute("DELETE FROM widget_lists WHERE id = ?1", params![list_id])?;
        if deleted == 0 {
            return Err(WidgetError::NotFound {
                kind: "widget list",
                id: list_id,
            });
        }
        tx.commit()?;
        Ok(())
    }

    /// Ids of all widget lists, ascending.
    pub fn list_ids(&self) -> WidgetResult<Vec<i64>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM widget_lists ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// True if the list exists.
    pub fn list_exists(&self, list_id: i64) -> WidgetResult<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM widget_lists WHERE id = ?1",
                params![list_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Fetch a single widget instance.
    pub fn get_widget(&self, widget_id: i64) -> WidgetResult<WidgetRow> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, widget_list_id, widget_class, title, configuration, position
             FROM widget_instances WHERE id = ?1",
            params![widget_id],
            row_to_widget,
        )
        .optional()?
        .ok_or(WidgetError::NotFound {
            kind: "widget",
            id: widget_id,
        })
    }

    /// All widgets in a list, ordered by position. A single read gives a
    /// consistent snapshot; a list mid-shift is never observed.
    pub fn widgets_in_list(&self, list_id: i64) -> WidgetResult<Vec<WidgetRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, widget_list_id, widget_class, title, configuration, position
             FROM widget_instances WHERE widget_list_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![list_id], row_to_widget)?;
        let mut widgets = Vec::new();
        for row in rows {
            widgets.push(row?);
        }
        Ok(widgets)
    }

    /// Overwrite a widget's title and configuration. Position is untouched.
    pub fn update_widget(
        &self,
        widget_id: i64,
        title: &str,
        configuration: &JsonMap,
    ) -> WidgetResult<()> {
        let conn = self.conn()?;
        let encoded = serde_json::to_string(configuration)?;
        let updated = conn.execute(
            "UPDATE widget_instances SET title = ?1, configuration = ?2 WHERE id = ?3",
            params![title, encoded, widget_id],
        )?;
        if updated == 0 {
            return Err(WidgetError::NotFound {
                kind: "widget",
                id: widget_id,
            });
        }
        Ok(())
    }
}

fn init_connection(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(())
}

fn row_to_widget(row: &rusqlite::Row<'_>) -> Result<WidgetRow, rusqlite::Error> {
    let encoded: String = row.get(4)?;
    let configuration = serde_json::from_str(&encoded).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(WidgetRow {
        id: row.get(0)?,
        widget_list_id: row.get(1)?,
        widget_class: row.get(2)?,
        title: row.get(3)?,
        configuration,
        position: row.get(5)?,
    })
}
