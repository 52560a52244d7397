//! User directory queries.

use super::Database;
use crate::types::UserProfile;
use anyhow::Result;
use rusqlite::{Row, params};

fn parse_user_row(row: &Row) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        id: row.get("id")?,
        email: row.get("email")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        created_at: row.get("created_at")?,
    })
}

impl Database {
    /// Register a user in the directory. Account provisioning proper is
    /// outside crewflow; this exists for seeding and tests.
    pub fn create_user(&self, user: &UserProfile) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, first_name, last_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user.id,
                    user.email,
                    user.first_name,
                    user.last_name,
                    user.created_at
                ],
            )?;
            Ok(())
        })
    }

    pub fn find_user(&self, id: &str) -> Result<Option<UserProfile>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM users WHERE id = ?1")?;
            let result = stmt.query_row(params![id], parse_user_row);
            match result {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserProfile>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM users WHERE email = ?1")?;
            let result = stmt.query_row(params![email], parse_user_row);
            match result {
                Ok(user) => Ok(Some(user)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Case-insensitive substring search over names and email, excluding
    /// the calling user, capped at 10 rows.
    pub fn search_users(&self, query: &str, exclude_user: &str) -> Result<Vec<UserProfile>> {
        self.with_conn(|conn| {
            let pattern = format!("%{}%", query.to_lowercase());
            let mut stmt = conn.prepare(
                "SELECT * FROM users
                 WHERE id != ?1
                   AND (lower(first_name) LIKE ?2
                        OR lower(last_name) LIKE ?2
                        OR lower(email) LIKE ?2)
                 ORDER BY email ASC
                 LIMIT 10",
            )?;
            let users = stmt
                .query_map(params![exclude_user, pattern], parse_user_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }
}
