use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{UserRow, now_ts};
use crate::{Database, Result, StoreError};

const USER_COLUMNS: &str = "id, username, email, password, name, surname, image, created_at";

impl Database {
    pub fn create_user(&self, id: &str, username: &str, email: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, username, email, password_hash, now_ts()],
            )?;
            Ok(())
        })
    }

    /// Check-and-insert in one transaction. The uniqueness probe and the
    /// insert hold the same lock, so two racing registrations of the same
    /// username or email cannot both pass the check; the loser gets `false`
    /// instead of a constraint violation.
    pub fn create_user_if_free(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<bool> {
        self.with_tx(|tx| {
            if query_user(tx, "username", username)?.is_some()
                || query_user(tx, "email", email)?.is_some()
            {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO users (id, username, email, password, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, username, email, password_hash, now_ts()],
            )?;
            Ok(true)
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Profile updates for the display fields the notification and message
    /// payloads carry.
    pub fn update_profile(
        &self,
        id: &str,
        name: Option<&str>,
        surname: Option<&str>,
        image: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET
                    name = COALESCE(?2, name),
                    surname = COALESCE(?3, surname),
                    image = COALESCE(?4, image)
                 WHERE id = ?1",
                params![id, name, surname, image],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }
}

pub(crate) fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        name: row.get(4)?,
        surname: row.get(5)?,
        image: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], user_from_row).optional()?;
    Ok(row)
}
