//! SQLite persistence layer.
//!
//! `Database` wraps a single connection behind a mutex and implements
//! the `store` traits the services depend on. Schema lives in embedded
//! refinery migrations.

pub mod invites;
pub mod tasks;
pub mod users;
pub mod workflows;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::store::{UserDirectory, WorkflowStore};
use crate::types::{
    InviteStatus, MemberPermissions, Task, TaskStatus, TaskStatusUpdate, UserProfile, Workflow,
    WorkflowInvite, WorkflowMember,
};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Database handle wrapping a SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for concurrent access
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations.
    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        embedded::migrations::runner().run(&mut *conn)?;
        Ok(())
    }

    /// Execute a function with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }

    /// Execute a function with mutable access to the connection (for
    /// transactions).
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().unwrap();
        f(&mut conn)
    }
}

/// Get the current timestamp in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl WorkflowStore for Database {
    fn create_workflow(&self, workflow: &Workflow) -> Result<()> {
        Database::create_workflow(self, workflow)
    }

    fn find_workflow(&self, id: &str) -> Result<Option<Workflow>> {
        Database::find_workflow(self, id)
    }

    fn save_workflow(&self, workflow: &Workflow) -> Result<()> {
        Database::save_workflow(self, workflow)
    }

    fn delete_workflow(&self, id: &str) -> Result<bool> {
        Database::delete_workflow(self, id)
    }

    fn list_workflows_for_user(&self, user_id: &str) -> Result<Vec<Workflow>> {
        Database::list_workflows_for_user(self, user_id)
    }

    fn find_member_in_workflow(
        &self,
        workflow_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkflowMember>> {
        Database::find_member_in_workflow(self, workflow_id, user_id)
    }

    fn add_member(&self, workflow_id: &str, member: &WorkflowMember) -> Result<()> {
        Database::add_member(self, workflow_id, member)
    }

    fn remove_member(&self, workflow_id: &str, user_id: &str) -> Result<bool> {
        Database::remove_member(self, workflow_id, user_id)
    }

    fn update_member_permissions(
        &self,
        workflow_id: &str,
        user_id: &str,
        permissions: &MemberPermissions,
    ) -> Result<bool> {
        Database::update_member_permissions(self, workflow_id, user_id, permissions)
    }

    fn increment_member_credits(&self, workflow_id: &str, user_id: &str) -> Result<bool> {
        Database::increment_member_credits(self, workflow_id, user_id)
    }

    fn create_invite(&self, invite: &WorkflowInvite) -> Result<()> {
        Database::create_invite(self, invite)
    }

    fn find_invite(&self, id: &str) -> Result<Option<WorkflowInvite>> {
        Database::find_invite(self, id)
    }

    fn list_pending_invites_for_user(&self, user_id: &str) -> Result<Vec<WorkflowInvite>> {
        Database::list_pending_invites_for_user(self, user_id)
    }

    fn has_pending_invite(&self, workflow_id: &str, user_id: &str) -> Result<bool> {
        Database::has_pending_invite(self, workflow_id, user_id)
    }

    fn resolve_invite(&self, id: &str, invited_user: &str, status: InviteStatus) -> Result<bool> {
        Database::resolve_invite(self, id, invited_user, status)
    }

    fn void_pending_invites(&self, workflow_id: &str, user_id: &str) -> Result<u64> {
        Database::void_pending_invites(self, workflow_id, user_id)
    }

    fn delete_invites_for_workflow(&self, workflow_id: &str) -> Result<u64> {
        Database::delete_invites_for_workflow(self, workflow_id)
    }

    fn create_task(&self, task: &Task) -> Result<()> {
        Database::create_task(self, task)
    }

    fn find_task(&self, id: &str) -> Result<Option<Task>> {
        Database::find_task(self, id)
    }

    fn save_task(&self, task: &Task) -> Result<()> {
        Database::save_task(self, task)
    }

    fn list_active_tasks(&self, workflow_id: &str) -> Result<Vec<Task>> {
        Database::list_active_tasks(self, workflow_id)
    }

    fn list_completed_tasks(&self, workflow_id: &str) -> Result<Vec<Task>> {
        Database::list_completed_tasks(self, workflow_id)
    }

    fn append_status_update(
        &self,
        task_id: &str,
        status: TaskStatus,
        message: &str,
        updated_by: &str,
        updated_at: i64,
    ) -> Result<()> {
        Database::append_status_update(self, task_id, status, message, updated_by, updated_at)
    }

    fn list_status_updates(&self, task_id: &str) -> Result<Vec<TaskStatusUpdate>> {
        Database::list_status_updates(self, task_id)
    }

    fn confirm_task(
        &self,
        task_id: &str,
        confirmed_by: &str,
        confirmed_at: i64,
        feedback: Option<&str>,
        award_credits: bool,
    ) -> Result<bool> {
        Database::confirm_task(
            self,
            task_id,
            confirmed_by,
            confirmed_at,
            feedback,
            award_credits,
        )
    }
}

impl UserDirectory for Database {
    fn find_user(&self, id: &str) -> Result<Option<UserProfile>> {
        Database::find_user(self, id)
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<UserProfile>> {
        Database::find_user_by_email(self, email)
    }

    fn search_users(&self, query: &str, exclude_user: &str) -> Result<Vec<UserProfile>> {
        Database::search_users(self, query, exclude_user)
    }
}
