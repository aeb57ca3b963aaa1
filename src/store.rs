use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::Student;

/// Durable student records keyed by handle.
#[async_trait]
pub trait StudentStore: Send + Sync {
    async fn find_by_handle(&self, handle: &str) -> Result<Option<Student>, StoreError>;

    /// Students with a handle, in registration order.
    async fn list_tracked(&self) -> Result<Vec<Student>, StoreError>;

    async fn insert(&self, student: &Student) -> Result<(), StoreError>;

    /// Replaces the stored record with the same id.
    async fn save(&self, student: &Student) -> Result<(), StoreError>;
}
