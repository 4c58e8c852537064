//! Narrow storage interface used by the file jobs and the section handlers

use async_trait::async_trait;
use geosect_common::{NewSection, Result, Section};

/// Persistence of sections together with their owned classes
///
/// Implementations assign ids on insert and return classes in the order
/// they were supplied.
#[async_trait]
pub trait SectionStore: Send + Sync {
    /// Insert one section with its classes
    async fn save(&self, section: NewSection) -> Result<Section>;

    /// Insert a batch atomically: either every section is stored or none is
    async fn save_all(&self, sections: Vec<NewSection>) -> Result<Vec<Section>>;

    /// All sections ordered by id
    async fn find_all(&self) -> Result<Vec<Section>>;

    /// Sections owning at least one class with exactly `code`, each listed once
    async fn find_by_class_code(&self, code: &str) -> Result<Vec<Section>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Section>>;

    /// Remove a section and its classes; `false` if no such section
    async fn delete(&self, id: i64) -> Result<bool>;
}
