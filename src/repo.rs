use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{CourseInfo, EffortStateRow, HomeworkRecord};

/// Homework read model for one student in one course.
#[async_trait]
pub trait HomeworkRepository {
    /// One record per assignment in the course; assignments the student never
    /// touched come back as the default record so the total stays honest.
    async fn course_homework(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> anyhow::Result<Vec<HomeworkRecord>>;
}

#[async_trait]
pub trait CourseRepository {
    async fn all_courses(&self) -> anyhow::Result<Vec<CourseInfo>>;
}

/// Key-value state store keyed by `(user, module)`. Blobs are opaque JSON
/// text; this layer does not interpret them.
#[async_trait]
pub trait EffortStateRepository {
    async fn load(&self, user_id: Uuid, module: &str) -> anyhow::Result<Option<String>>;

    async fn save(&self, user_id: Uuid, module: &str, blob: &str) -> anyhow::Result<()>;

    /// All rows under the course prefix, joined with the owning user's
    /// identity for roster building.
    async fn course_states(&self) -> anyhow::Result<Vec<EffortStateRow>>;
}
