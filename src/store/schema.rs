pub const SCHEMA: &str = r#"
-- Accounts, provisioned transparently on first authenticated write
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,       -- argon2id hash with embedded salt
    created_at TEXT DEFAULT (datetime('now'))
);

-- Tracked projects; slug is the external key used in every nested URL
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    owner_id TEXT REFERENCES users(id) ON DELETE SET NULL,
    created_at TEXT DEFAULT (datetime('now'))
);

-- Reported builds; immutable after creation
CREATE TABLE IF NOT EXISTS builds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    success INTEGER NOT NULL,
    started TEXT NOT NULL,             -- RFC3339 with the submitted offset
    finished TEXT NOT NULL,
    host TEXT NOT NULL,
    arch TEXT NOT NULL,
    user_id TEXT REFERENCES users(id) ON DELETE SET NULL,
    extra_info TEXT NOT NULL DEFAULT '{}',
    client_info TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS build_steps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    build_id INTEGER NOT NULL REFERENCES builds(id) ON DELETE CASCADE,
    success INTEGER NOT NULL,
    started TEXT NOT NULL,
    finished TEXT NOT NULL,
    name TEXT NOT NULL,
    output TEXT NOT NULL DEFAULT '',
    errout TEXT NOT NULL DEFAULT '',
    extra_info TEXT NOT NULL DEFAULT '{}'
);

-- Free-text build tags (many-to-many)
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS build_tags (
    build_id INTEGER NOT NULL REFERENCES builds(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (build_id, tag_id)
);

-- VCS repositories feeding build triggers
CREATE TABLE IF NOT EXISTS repositories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    url TEXT NOT NULL UNIQUE,
    vcs_type TEXT NOT NULL DEFAULT 'none'
);

-- Queued build triggers, newest first
CREATE TABLE IF NOT EXISTS build_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    identifier TEXT NOT NULL,
    requested TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_builds_project ON builds(project_id);
CREATE INDEX IF NOT EXISTS idx_builds_finished ON builds(project_id, finished);
CREATE INDEX IF NOT EXISTS idx_build_steps_build ON build_steps(build_id);
CREATE INDEX IF NOT EXISTS idx_build_tags_tag ON build_tags(tag_id);
CREATE INDEX IF NOT EXISTS idx_repositories_project ON repositories(project_id);
CREATE INDEX IF NOT EXISTS idx_build_requests_repo ON build_requests(repository_id);
"#;
