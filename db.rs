use crate::config::AppPaths;
use crate::error::Result;
use crate::models::{FrameRecord, FrameUpdate, ProjectRecord, UserRecord};
use crate::schema;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::time::Duration;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Initializes the database connection pool and runs migrations.
///
/// Every connection starts in WAL mode with a bounded busy wait, so
/// concurrent add/edit/delete/reorder calls serialize at the store instead of
/// corrupting table state.
pub fn init_database(paths: &AppPaths) -> Result<DbPool> {
    log::info!("Database path: {}", paths.db_path.display());

    if let Some(parent) = paths.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(&paths.db_path).with_init(configure_connection);
    let pool = r2d2::Pool::new(manager)?;

    run_migrations(&pool.get()?)?;

    Ok(pool)
}

fn configure_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    // journal_mode returns a result row; query it instead of executing.
    conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
    conn.busy_timeout(Duration::from_secs(10))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

/// Applies all pending database migrations, gated on `user_version` so
/// non-idempotent statements (ALTER TABLE) run exactly once.
fn run_migrations(conn: &DbConnection) -> Result<()> {
    let conn: &Connection = conn;

    let applied: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    log::info!("Running database migrations from version {applied}...");

    for (idx, migration) in schema::MIGRATIONS.iter().enumerate() {
        let version = idx as i64 + 1;
        if version <= applied {
            continue;
        }
        conn.execute_batch(migration)?;
        conn.pragma_update(None, "user_version", version)?;
    }

    log::info!("Migrations applied successfully.");
    Ok(())
}

// ---- users ----

pub fn create_user(conn: &Connection, username: &str) -> Result<i64> {
    conn.execute("INSERT INTO user (username) VALUES (?1)", params![username])?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user(conn: &Connection, user_id: i64) -> Result<Option<UserRecord>> {
    let user = conn
        .query_row(
            "SELECT id, username FROM user WHERE id = ?1",
            params![user_id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn list_users(conn: &Connection) -> Result<Vec<UserRecord>> {
    let mut stmt = conn.prepare("SELECT id, username FROM user ORDER BY id")?;
    let users = stmt
        .query_map([], user_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

pub fn rename_user(conn: &Connection, user_id: i64, username: &str) -> Result<()> {
    conn.execute(
        "UPDATE user SET username = ?1 WHERE id = ?2",
        params![username, user_id],
    )?;
    Ok(())
}

// ---- projects ----

pub fn create_project(conn: &Connection, user_id: i64, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO project (name, user_id) VALUES (?1, ?2)",
        params![name, user_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_project(conn: &Connection, project_id: i64) -> Result<Option<ProjectRecord>> {
    let project = conn
        .query_row(
            "SELECT id, name, user_id FROM project WHERE id = ?1",
            params![project_id],
            project_from_row,
        )
        .optional()?;
    Ok(project)
}

pub fn list_projects(conn: &Connection, user_id: i64) -> Result<Vec<ProjectRecord>> {
    let mut stmt =
        conn.prepare("SELECT id, name, user_id FROM project WHERE user_id = ?1 ORDER BY id")?;
    let projects = stmt
        .query_map(params![user_id], project_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(projects)
}

pub fn rename_project(conn: &Connection, project_id: i64, name: &str) -> Result<()> {
    conn.execute(
        "UPDATE project SET name = ?1 WHERE id = ?2",
        params![name, project_id],
    )?;
    Ok(())
}

// ---- frames ----

pub fn insert_frame(conn: &Connection, frame: &FrameRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO frame (project_id, description, image_path, thumbnail_path,
                            character_name, shoot_time, location, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            frame.project_id,
            frame.description,
            frame.image_path,
            frame.thumbnail_path,
            frame.character_name,
            frame.shoot_time,
            frame.location,
            frame.position,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_frame(conn: &Connection, frame_id: i64) -> Result<Option<FrameRecord>> {
    let frame = conn
        .query_row(
            &format!("{FRAME_SELECT} WHERE id = ?1"),
            params![frame_id],
            frame_from_row,
        )
        .optional()?;
    Ok(frame)
}

/// Frames of a project in export order: position ascending, insertion order
/// as the deterministic tie break.
pub fn list_frames(conn: &Connection, project_id: i64) -> Result<Vec<FrameRecord>> {
    let mut stmt =
        conn.prepare(&format!("{FRAME_SELECT} WHERE project_id = ?1 ORDER BY position, id"))?;
    let frames = stmt
        .query_map(params![project_id], frame_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(frames)
}

pub fn rename_frame(conn: &Connection, frame_id: i64, description: &str) -> Result<()> {
    conn.execute(
        "UPDATE frame SET description = ?1, updated_at = strftime('%s', 'now') WHERE id = ?2",
        params![description, frame_id],
    )?;
    Ok(())
}

/// Overwrites the four editable text columns as given (nulls included).
pub fn update_frame_details(
    conn: &Connection,
    project_id: i64,
    frame_id: i64,
    update: &FrameUpdate,
) -> Result<()> {
    conn.execute(
        "UPDATE frame
         SET character_name = ?1, description = ?2, shoot_time = ?3, location = ?4,
             updated_at = strftime('%s', 'now')
         WHERE id = ?5 AND project_id = ?6",
        params![
            update.character_name,
            update.description,
            update.shoot_time,
            update.location,
            frame_id,
            project_id,
        ],
    )?;
    Ok(())
}

/// Rewrites positions to 0..n following the payload order. One transaction;
/// frames not named keep their positions.
pub fn update_frame_order(conn: &mut DbConnection, order: &[i64]) -> Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare("UPDATE frame SET position = ?1 WHERE id = ?2")?;
        for (idx, frame_id) in order.iter().enumerate() {
            stmt.execute(params![idx as i64, frame_id])?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn delete_frame_record(conn: &Connection, frame_id: i64) -> Result<()> {
    conn.execute("DELETE FROM frame WHERE id = ?1", params![frame_id])?;
    Ok(())
}

/// Deletes a project and its frames in one transaction. Returns the frame
/// records that were removed so the caller can release their files.
pub fn delete_project_records(
    conn: &mut DbConnection,
    project_id: i64,
) -> Result<Vec<FrameRecord>> {
    let frames = list_frames(conn, project_id)?;
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM frame WHERE project_id = ?1", params![project_id])?;
    tx.execute("DELETE FROM project WHERE id = ?1", params![project_id])?;
    tx.commit()?;
    Ok(frames)
}

/// Deletes a user, their projects and all frames in one transaction,
/// returning the removed frame records for file cleanup.
pub fn delete_user_records(conn: &mut DbConnection, user_id: i64) -> Result<Vec<FrameRecord>> {
    let projects = list_projects(conn, user_id)?;
    let mut frames = Vec::new();
    for project in &projects {
        if let Some(project_id) = project.id {
            frames.extend(list_frames(conn, project_id)?);
        }
    }

    let tx = conn.transaction()?;
    tx.execute(
        "DELETE FROM frame WHERE project_id IN (SELECT id FROM project WHERE user_id = ?1)",
        params![user_id],
    )?;
    tx.execute("DELETE FROM project WHERE user_id = ?1", params![user_id])?;
    tx.execute("DELETE FROM user WHERE id = ?1", params![user_id])?;
    tx.commit()?;
    Ok(frames)
}

// ---- row mapping ----

const FRAME_SELECT: &str = "SELECT id, project_id, description, character_name, shoot_time,
            location, image_path, thumbnail_path, position, created_at, updated_at FROM frame";

fn user_from_row(row: &Row) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
    })
}

fn project_from_row(row: &Row) -> rusqlite::Result<ProjectRecord> {
    Ok(ProjectRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        user_id: row.get(2)?,
    })
}

fn frame_from_row(row: &Row) -> rusqlite::Result<FrameRecord> {
    Ok(FrameRecord {
        id: row.get(0)?,
        project_id: row.get(1)?,
        description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        character_name: row.get(3)?,
        shoot_time: row.get(4)?,
        location: row.get(5)?,
        image_path: row.get(6)?,
        thumbnail_path: row.get(7)?,
        position: row.get::<_, Option<i64>>(8)?.unwrap_or(0),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
