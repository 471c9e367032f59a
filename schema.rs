/// MIGRATION 0001: Initial database schema.
///
/// Historical revision: `frame` has no `thumbnail_path` column yet; readers
/// derive thumbnail names by the `thumb_` prefix convention for such rows.
pub const MIGRATION_0001: &str = r#"
-- Users Table: Account records owning projects.
CREATE TABLE IF NOT EXISTS user (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL
);

-- Projects Table: Named, ordered collections of frames.
CREATE TABLE IF NOT EXISTS project (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    user_id INTEGER,
    FOREIGN KEY (user_id) REFERENCES user (id)
);

-- Frames Table: One storyboard shot per row.
CREATE TABLE IF NOT EXISTS frame (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER,
    description TEXT,
    image_path TEXT,
    character_name TEXT,
    shoot_time TEXT,
    location TEXT,
    position INTEGER DEFAULT 0,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    FOREIGN KEY (project_id) REFERENCES project (id)
);

-- Indexes for faster queries
CREATE INDEX IF NOT EXISTS idx_project_user_id ON project (user_id);
CREATE INDEX IF NOT EXISTS idx_frame_project_id ON frame (project_id);
CREATE INDEX IF NOT EXISTS idx_frame_position ON frame (project_id, position);
"#;

/// MIGRATION 0002: Persist thumbnail filenames explicitly.
pub const MIGRATION_0002: &str = r#"
ALTER TABLE frame ADD COLUMN thumbnail_path TEXT;
"#;

/// Migrations in order; `db::run_migrations` gates them on `user_version`.
pub const MIGRATIONS: &[&str] = &[MIGRATION_0001, MIGRATION_0002];
