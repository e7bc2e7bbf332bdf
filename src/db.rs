//! SQLite-backed user and todo storage.
//!
//! One connection behind a mutex, opened once at startup and shared by every
//! request. Each method holds the lock for its whole duration, so a
//! read-modify-write on a single todo is atomic.

use chrono::Utc;
use derive_more::{Display, Error};
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::models::{NewTodo, Todo, TodoPatch, User};

#[derive(Debug, Display, Error)]
pub enum DbError {
    #[display("sqlite error: {_0}")]
    Sqlite(rusqlite::Error),

    #[display("database lock poisoned")]
    Poisoned,
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        DbError::Sqlite(err)
    }
}

impl DbError {
    /// True when an insert was refused by a UNIQUE constraint.
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _))
                if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
        )
    }
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS todos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        text TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        priority TEXT NOT NULL DEFAULT 'medium'
            CHECK (priority IN ('low', 'medium', 'high')),
        completed INTEGER NOT NULL DEFAULT 0,
        user_id INTEGER NOT NULL REFERENCES users(id),
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_todos_user_created ON todos(user_id, created_at);
";

const TODO_COLUMNS: &str = "id, text, description, priority, completed, user_id, created_at";

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Opens (or creates) the database file and makes sure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Closes the connection, reporting any error SQLite raises on the way out.
    pub fn close(self) -> Result<(), DbError> {
        let conn = self.conn.into_inner().map_err(|_| DbError::Poisoned)?;
        conn.close().map_err(|(_, err)| DbError::Sqlite(err))
    }

    // ── Users ───────────────────────────────────────────────────────

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                "SELECT id, username, password, created_at FROM users WHERE username = ?1",
                params![username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<User, DbError> {
        let conn = self.conn()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO users (username, password, created_at) VALUES (?1, ?2, ?3)",
            params![username, password_hash, created_at],
        )?;

        Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at,
        })
    }

    // ── Todos ───────────────────────────────────────────────────────

    /// All of `user_id`'s todos, newest first.
    pub fn list_todos(&self, user_id: i64) -> Result<Vec<Todo>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC"
        ))?;
        let todos = stmt
            .query_map(params![user_id], todo_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(todos)
    }

    pub fn create_todo(&self, user_id: i64, new: NewTodo) -> Result<Todo, DbError> {
        let conn = self.conn()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO todos (text, description, priority, completed, user_id, created_at)
             VALUES (?1, ?2, ?3, 0, ?4, ?5)",
            params![new.text, new.description, new.priority, user_id, created_at],
        )?;

        Ok(Todo {
            id: conn.last_insert_rowid(),
            text: new.text,
            description: new.description,
            priority: new.priority,
            completed: false,
            user_id,
            created_at,
        })
    }

    #[cfg(test)]
    fn find_todo(&self, id: i64) -> Result<Option<Todo>, DbError> {
        let conn = self.conn()?;
        Self::select_todo(&conn, id)
    }

    fn select_todo(conn: &Connection, id: i64) -> Result<Option<Todo>, DbError> {
        let todo = conn
            .query_row(
                &format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = ?1"),
                params![id],
                todo_from_row,
            )
            .optional()?;
        Ok(todo)
    }

    /// Applies `patch` to todo `id` if it belongs to `user_id`.
    ///
    /// `Ok(None)` means the todo does not exist or is someone else's.
    pub fn update_todo(
        &self,
        id: i64,
        user_id: i64,
        patch: TodoPatch,
    ) -> Result<Option<Todo>, DbError> {
        let conn = self.conn()?;
        let mut todo = match Self::select_todo(&conn, id)? {
            Some(todo) if todo.user_id == user_id => todo,
            _ => return Ok(None),
        };

        patch.apply(&mut todo);
        conn.execute(
            "UPDATE todos SET text = ?1, description = ?2, priority = ?3, completed = ?4
             WHERE id = ?5",
            params![todo.text, todo.description, todo.priority, todo.completed, id],
        )?;
        Ok(Some(todo))
    }

    /// Deletes todo `id` if it belongs to `user_id`. Returns whether a row went away.
    pub fn delete_todo(&self, id: i64, user_id: i64) -> Result<bool, DbError> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM todos WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(deleted > 0)
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn todo_from_row(row: &Row<'_>) -> rusqlite::Result<Todo> {
    Ok(Todo {
        id: row.get(0)?,
        text: row.get(1)?,
        description: row.get(2)?,
        priority: row.get(3)?,
        completed: row.get(4)?,
        user_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}
