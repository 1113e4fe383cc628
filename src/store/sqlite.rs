use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, FixedOffset, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use serde_json::{Map, Value};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

/// Build/step timestamps keep the offset the client submitted.
fn parse_offset_datetime(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).unwrap_or_else(|e| {
        tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
        Utc::now().fixed_offset()
    })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_extra_info(s: &str) -> Map<String, Value> {
    serde_json::from_str(s).unwrap_or_default()
}

fn format_extra_info(extra: &Map<String, Value>) -> String {
    Value::Object(extra.clone()).to_string()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn build_from_row(row: &Row) -> rusqlite::Result<Build> {
    Ok(Build {
        id: row.get(0)?,
        project_id: row.get(1)?,
        success: row.get(2)?,
        started: parse_offset_datetime(&row.get::<_, String>(3)?),
        finished: parse_offset_datetime(&row.get::<_, String>(4)?),
        host: row.get(5)?,
        arch: row.get(6)?,
        user_id: row.get(7)?,
        extra_info: parse_extra_info(&row.get::<_, String>(8)?),
        client_info: parse_extra_info(&row.get::<_, String>(9)?),
    })
}

const BUILD_COLUMNS: &str =
    "id, project_id, success, started, finished, host, arch, user_id, extra_info, client_info";

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO users (id, username, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                user.id,
                user.username,
                user.password_hash,
                format_datetime(&user.created_at),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, username, password_hash, created_at FROM users WHERE id = ?1",
            params![id],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
            params![username],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    // Project operations

    fn create_project(&self, project: &Project) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO projects (id, name, slug, owner_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                project.id,
                project.name,
                project.slug,
                project.owner_id,
                format_datetime(&project.created_at),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    fn get_project_by_slug(&self, slug: &str) -> Result<Option<Project>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, slug, owner_id, created_at FROM projects WHERE slug = ?1",
            params![slug],
            |row| {
                Ok(Project {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slug: row.get(2)?,
                    owner_id: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, slug, owner_id, created_at FROM projects ORDER BY name",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Project {
                id: row.get(0)?,
                name: row.get(1)?,
                slug: row.get(2)?,
                owner_id: row.get(3)?,
                created_at: parse_datetime(&row.get::<_, String>(4)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_project_name(&self, slug: &str, name: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE projects SET name = ?1 WHERE slug = ?2",
            params![name, slug],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_project(&self, slug: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM projects WHERE slug = ?1", params![slug])?;
        Ok(rows > 0)
    }

    // Build operations

    fn create_build_report(&self, report: &NewBuild) -> Result<i64> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO builds (project_id, success, started, finished, host, arch, user_id, extra_info, client_info)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                report.project_id,
                report.success,
                report.started.to_rfc3339(),
                report.finished.to_rfc3339(),
                report.host,
                report.arch,
                report.user_id,
                format_extra_info(&report.extra_info),
                format_extra_info(&report.client_info),
            ],
        )?;
        let build_id = tx.last_insert_rowid();

        for step in &report.steps {
            tx.execute(
                "INSERT INTO build_steps (build_id, success, started, finished, name, output, errout, extra_info)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    build_id,
                    step.success,
                    step.started.to_rfc3339(),
                    step.finished.to_rfc3339(),
                    step.name,
                    step.output,
                    step.errout,
                    format_extra_info(&step.extra_info),
                ],
            )?;
        }

        for tag in &report.tags {
            tx.execute(
                "INSERT OR IGNORE INTO tags (name) VALUES (?1)",
                params![tag],
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO build_tags (build_id, tag_id)
                 SELECT ?1, id FROM tags WHERE name = ?2",
                params![build_id, tag],
            )?;
        }

        tx.commit()?;
        Ok(build_id)
    }

    fn get_build(&self, project_id: &str, build_id: i64) -> Result<Option<Build>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {BUILD_COLUMNS} FROM builds WHERE project_id = ?1 AND id = ?2"),
            params![project_id, build_id],
            build_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_builds(&self, project_id: &str) -> Result<Vec<Build>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {BUILD_COLUMNS} FROM builds WHERE project_id = ?1
             ORDER BY datetime(finished) DESC, id DESC"
        ))?;

        let rows = stmt.query_map(params![project_id], build_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn latest_build(&self, project_id: &str) -> Result<Option<Build>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {BUILD_COLUMNS} FROM builds WHERE project_id = ?1
                 ORDER BY datetime(finished) DESC, id DESC LIMIT 1"
            ),
            params![project_id],
            build_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_build_steps(&self, build_id: i64) -> Result<Vec<BuildStep>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, build_id, success, started, finished, name, output, errout, extra_info
             FROM build_steps WHERE build_id = ?1 ORDER BY datetime(started), id",
        )?;

        let rows = stmt.query_map(params![build_id], |row| {
            Ok(BuildStep {
                id: row.get(0)?,
                build_id: row.get(1)?,
                success: row.get(2)?,
                started: parse_offset_datetime(&row.get::<_, String>(3)?),
                finished: parse_offset_datetime(&row.get::<_, String>(4)?),
                name: row.get(5)?,
                output: row.get(6)?,
                errout: row.get(7)?,
                extra_info: parse_extra_info(&row.get::<_, String>(8)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Tag operations

    fn list_build_tags(&self, build_id: i64) -> Result<Vec<String>> {
        let conn = self.conn();
        // Submission order, so reported tag lists read back as posted.
        let mut stmt = conn.prepare(
            "SELECT t.name FROM tags t
             JOIN build_tags bt ON bt.tag_id = t.id
             WHERE bt.build_id = ?1 ORDER BY bt.rowid",
        )?;

        let rows = stmt.query_map(params![build_id], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_project_tags(&self, project_id: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT t.name FROM tags t
             JOIN build_tags bt ON bt.tag_id = t.id
             JOIN builds b ON b.id = bt.build_id
             WHERE b.project_id = ?1 ORDER BY t.name",
        )?;

        let rows = stmt.query_map(params![project_id], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_builds_with_all_tags(&self, project_id: &str, tags: &[String]) -> Result<Vec<Build>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (0..tags.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {BUILD_COLUMNS} FROM builds
             WHERE project_id = ?1 AND id IN (
                 SELECT bt.build_id FROM build_tags bt
                 JOIN tags t ON t.id = bt.tag_id
                 WHERE t.name IN ({placeholders})
                 GROUP BY bt.build_id
                 HAVING COUNT(DISTINCT t.name) = {}
             )
             ORDER BY datetime(finished) DESC, id DESC",
            tags.len()
        );

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;

        let mut values: Vec<&dyn rusqlite::ToSql> = vec![&project_id];
        for tag in tags {
            values.push(tag);
        }

        let rows = stmt.query_map(params_from_iter(values), build_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Repository / build-request operations

    fn create_repository(
        &self,
        project_id: &str,
        url: &str,
        vcs_type: VcsType,
    ) -> Result<Repository> {
        let conn = self.conn();
        let result = conn.execute(
            "INSERT INTO repositories (project_id, url, vcs_type) VALUES (?1, ?2, ?3)",
            params![project_id, url, vcs_type.as_str()],
        );
        match result {
            Ok(_) => Ok(Repository {
                id: conn.last_insert_rowid(),
                project_id: project_id.to_string(),
                url: url.to_string(),
                vcs_type,
            }),
            Err(e) if is_unique_violation(&e) => Err(Error::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    fn get_repository_by_url(&self, url: &str) -> Result<Option<Repository>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, project_id, url, vcs_type FROM repositories WHERE url = ?1",
            params![url],
            repository_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_repository_for_project(&self, project_id: &str) -> Result<Option<Repository>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, project_id, url, vcs_type FROM repositories
             WHERE project_id = ?1 ORDER BY id LIMIT 1",
            params![project_id],
            repository_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn create_build_request(&self, request: &BuildRequest) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO build_requests (repository_id, identifier, requested) VALUES (?1, ?2, ?3)",
            params![
                request.repository_id,
                request.identifier,
                format_datetime(&request.requested),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

fn repository_from_row(row: &Row) -> rusqlite::Result<Repository> {
    Ok(Repository {
        id: row.get(0)?,
        project_id: row.get(1)?,
        url: row.get(2)?,
        vcs_type: VcsType::parse(&row.get::<_, String>(3)?).unwrap_or(VcsType::None),
    })
}
