//! SQL schema for the Warden SQLite store.
//!
//! Executed once at connection startup. The version is recorded in
//! `PRAGMA user_version` so later migrations can be gated on it.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id            TEXT PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    email         TEXT,
    role          TEXT,            -- raw spelling; normalised on read
    faculty_name  TEXT,
    department    TEXT,
    status        TEXT NOT NULL DEFAULT 'active',
    last_activity TEXT,            -- RFC 3339 UTC
    created_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS courses (
    id           TEXT PRIMARY KEY,
    code         TEXT NOT NULL,
    name         TEXT NOT NULL,
    faculty_name TEXT,
    lecturer_id  TEXT REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS classes (
    id          TEXT PRIMARY KEY,
    course_id   TEXT NOT NULL REFERENCES courses(id),
    lecturer_id TEXT REFERENCES users(id),
    name        TEXT NOT NULL,
    venue       TEXT
);

CREATE TABLE IF NOT EXISTS assignments (
    id         TEXT PRIMARY KEY,
    course_id  TEXT NOT NULL REFERENCES courses(id),
    created_by TEXT REFERENCES users(id),
    title      TEXT NOT NULL,
    due_at     TEXT
);

CREATE TABLE IF NOT EXISTS submissions (
    id            TEXT PRIMARY KEY,
    assignment_id TEXT NOT NULL REFERENCES assignments(id),
    student_id    TEXT NOT NULL REFERENCES users(id),
    submitted_at  TEXT NOT NULL,
    grade         REAL
);

CREATE TABLE IF NOT EXISTS enrollments (
    student_id TEXT NOT NULL REFERENCES users(id),
    course_id  TEXT NOT NULL REFERENCES courses(id),
    status     TEXT NOT NULL,      -- 'enrolled' | 'dropped' | 'completed'
    PRIMARY KEY (student_id, course_id)
);

-- Append-only audit trail.
CREATE TABLE IF NOT EXISTS activity_log (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    action_type TEXT NOT NULL,
    description TEXT NOT NULL,
    origin      TEXT,
    client      TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS courses_faculty_idx  ON courses(faculty_name);
CREATE INDEX IF NOT EXISTS activity_user_idx    ON activity_log(user_id, recorded_at);

PRAGMA user_version = 1;
";
