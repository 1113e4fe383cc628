mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface. Each method is one of the query
/// shapes the handler layer actually needs; nothing here exposes a general
/// query language.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    // Project operations
    fn create_project(&self, project: &Project) -> Result<()>;
    fn get_project_by_slug(&self, slug: &str) -> Result<Option<Project>>;
    fn list_projects(&self) -> Result<Vec<Project>>;
    fn update_project_name(&self, slug: &str, name: &str) -> Result<()>;
    fn delete_project(&self, slug: &str) -> Result<bool>;

    // Build operations
    /// Ingests a full build report (build, steps, tag associations) in a
    /// single transaction and returns the new build id.
    fn create_build_report(&self, report: &NewBuild) -> Result<i64>;
    fn get_build(&self, project_id: &str, build_id: i64) -> Result<Option<Build>>;
    fn list_builds(&self, project_id: &str) -> Result<Vec<Build>>;
    fn latest_build(&self, project_id: &str) -> Result<Option<Build>>;
    fn list_build_steps(&self, build_id: i64) -> Result<Vec<BuildStep>>;

    // Tag operations
    fn list_build_tags(&self, build_id: i64) -> Result<Vec<String>>;
    fn list_project_tags(&self, project_id: &str) -> Result<Vec<String>>;
    /// Builds carrying *all* of the named tags, newest finished first.
    fn list_builds_with_all_tags(&self, project_id: &str, tags: &[String]) -> Result<Vec<Build>>;

    // Repository / build-request operations
    fn create_repository(&self, project_id: &str, url: &str, vcs_type: VcsType)
    -> Result<Repository>;
    fn get_repository_by_url(&self, url: &str) -> Result<Option<Repository>>;
    fn get_repository_for_project(&self, project_id: &str) -> Result<Option<Repository>>;
    fn create_build_request(&self, request: &BuildRequest) -> Result<i64>;

    fn close(&self) -> Result<()>;
}
