//! List ordering engine.
//!
//! Widget instances within a list occupy a dense, zero-based, contiguous
//! position sequence: for a list with `n` widgets the positions are exactly
//! `{0, 1, ..., n-1}`. Every operation here preserves that invariant by
//! shifting only the affected interval of neighbors, so a move costs
//! O(distance moved) rather than O(list length).
//!
//! All functions run against a connection that is already inside the
//! caller's transaction; the service layer opens an immediate transaction
//! per mutation so concurrent position changes on a list are serialized by
//! the storage engine's write lock.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{WidgetError, WidgetResult};
use crate::JsonMap;

/// Data for a widget instance about to be inserted.
#[derive(Debug)]
pub struct NewWidget<'a> {
    pub widget_list_id: i64,
    pub widget_class: &'a str,
    pub title: &'a str,
    pub configuration: &'a JsonMap,
}

/// Number of widgets in a list.
pub fn list_len(conn: &Connection, list_id: i64) -> WidgetResult<i64> {
    let len = conn.query_row(
        "SELECT COUNT(*) FROM widget_instances WHERE widget_list_id = ?1",
        params![list_id],
        |row| row.get(0),
    )?;
    Ok(len)
}

/// Positions of a list's widgets, ordered ascending. Test and audit helper.
pub fn positions(conn: &Connection, list_id: i64) -> WidgetResult<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT position FROM widget_instances WHERE widget_list_id = ?1 ORDER BY position",
    )?;
    let rows = stmt.query_map(params![list_id], |row| row.get(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Insert a widget, appending when `target` is `None`.
///
/// An explicit target position `p` must satisfy `0 <= p <= len`; widgets at
/// `position >= p` are shifted up by one before the insert. Out-of-range
/// explicit positions are rejected outright, never clamped.
///
/// Returns the new widget's id.
pub fn insert_at(
    conn: &Connection,
    widget: &NewWidget<'_>,
    target: Option<i64>,
) -> WidgetResult<i64> {
    let len = list_len(conn, widget.widget_list_id)?;
    let position = match target {
        None => len,
        Some(p) => {
            if p < 0 || p > len {
                return Err(WidgetError::PositionOutOfRange { position: p, len });
            }
            if p < len {
                conn.execute(
                    "UPDATE widget_instances SET position = position + 1
                     WHERE widget_list_id = ?1 AND position >= ?2",
                    params![widget.widget_list_id, p],
                )?;
            }
            p
        }
    };
    let configuration = serde_json::to_string(widget.configuration)?;
    conn.execute(
        "INSERT INTO widget_instances (widget_list_id, widget_class, title, configuration, position)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            widget.widget_list_id,
            widget.widget_class,
            widget.title,
            configuration,
            position
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Delete a widget and compact the trailing positions in its list.
///
/// Returns the owning list's id.
pub fn remove(conn: &Connection, widget_id: i64) -> WidgetResult<i64> {
    let (list_id, position) = locate(conn, widget_id)?;
    conn.execute(
        "DELETE FROM widget_instances WHERE id = ?1",
        params![widget_id],
    )?;
    conn.execute(
        "UPDATE widget_instances SET position = position - 1
         WHERE widget_list_id = ?1 AND position > ?2",
        params![list_id, position],
    )?;
    Ok(list_id)
}

/// Reposition a widget within its list.
///
/// The target is clamped into `[0, len - 1]`; moves are therefore always
/// successful and idempotent. Moving to the current position is a no-op.
/// Only the interval between the old and new position shifts.
///
/// Returns the owning list's id.
pub fn move_to(conn: &Connection, widget_id: i64, target: i64) -> WidgetResult<i64> {
    let (list_id, current) = locate(conn, widget_id)?;
    let len = list_len(conn, list_id)?;
    let target = target.clamp(0, len - 1);
    if target == current {
        return Ok(list_id);
    }
    if target < current {
        conn.execute(
            "UPDATE widget_instances SET position = position + 1
             WHERE widget_list_id = ?1 AND position >= ?2 AND position < ?3",
            params![list_id, target, current],
        )?;
    } else {
        conn.execute(
            "UPDATE widget_instances SET position = position - 1
             WHERE widget_list_id = ?1 AND position > ?2 AND position <= ?3",
            params![list_id, current, target],
        )?;
    }
    conn.execute(
        "UPDATE widget_instances SET position = ?1 WHERE id = ?2",
        params![target, widget_id],
    )?;
    Ok(list_id)
}

/// Remove every widget in a list. Bulk delete; no shifting needed since the
/// list ends up empty.
pub fn clear_list(conn: &Connection, list_id: i64) -> WidgetResult<()> {
    conn.execute(
        "DELETE FROM widget_instances WHERE widget_list_id = ?1",
        params![list_id],
    )?;
    Ok(())
}

fn locate(conn: &Connection, widget_id: i64) -> WidgetResult<(i64, i64)> {
    conn.query_row(
        "SELECT widget_list_id, position FROM widget_instances WHERE id = ?1",
        params![widget_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )
    .optional()?
    .ok_or(WidgetError::NotFound {
        kind: "widget",
        id: widget_id,
    })
}
