//! SQLite implementation of [`SectionStore`]

use async_trait::async_trait;
use geosect_common::{GeologicalClass, NewSection, Result, Section};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;

use super::SectionStore;
use crate::utils::retry_on_lock;

/// Row of geological_classes: (section_id, id, name, code)
type ClassRow = (i64, i64, String, String);

/// Section store over the service's SQLite pool
#[derive(Clone)]
pub struct SqliteSectionStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteSectionStore {
    pub fn new(pool: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            pool,
            max_lock_wait_ms,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// One transaction for the whole batch
    async fn insert_batch(&self, sections: &[NewSection]) -> Result<Vec<Section>> {
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(sections.len());
        for section in sections {
            saved.push(insert_section(&mut *tx, section).await?);
        }
        tx.commit().await?;
        Ok(saved)
    }

    /// Load classes for `sections` (already ordered) and attach them
    fn attach_classes(sections: Vec<(i64, String)>, class_rows: Vec<ClassRow>) -> Vec<Section> {
        let mut by_section: HashMap<i64, Vec<GeologicalClass>> = HashMap::new();
        for (section_id, id, name, code) in class_rows {
            by_section
                .entry(section_id)
                .or_default()
                .push(GeologicalClass { id, name, code });
        }

        sections
            .into_iter()
            .map(|(id, name)| Section {
                id,
                name,
                geological_classes: by_section.remove(&id).unwrap_or_default(),
            })
            .collect()
    }
}

async fn insert_section(conn: &mut SqliteConnection, section: &NewSection) -> Result<Section> {
    let section_id = sqlx::query("INSERT INTO sections (name) VALUES (?)")
        .bind(&section.name)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    let mut classes = Vec::with_capacity(section.geological_classes.len());
    for (position, class) in section.geological_classes.iter().enumerate() {
        let id = sqlx::query(
            "INSERT INTO geological_classes (section_id, position, name, code) VALUES (?, ?, ?, ?)",
        )
        .bind(section_id)
        .bind(position as i64)
        .bind(&class.name)
        .bind(&class.code)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        classes.push(GeologicalClass {
            id,
            name: class.name.clone(),
            code: class.code.clone(),
        });
    }

    Ok(Section {
        id: section_id,
        name: section.name.clone(),
        geological_classes: classes,
    })
}

#[async_trait]
impl SectionStore for SqliteSectionStore {
    async fn save(&self, section: NewSection) -> Result<Section> {
        let batch = std::slice::from_ref(&section);
        let mut saved = retry_on_lock("save section", self.max_lock_wait_ms, move || {
            self.insert_batch(batch)
        })
        .await?;
        saved
            .pop()
            .ok_or_else(|| geosect_common::Error::Internal("Insert returned no section".to_string()))
    }

    async fn save_all(&self, sections: Vec<NewSection>) -> Result<Vec<Section>> {
        let batch = sections.as_slice();
        let saved = retry_on_lock("save sections batch", self.max_lock_wait_ms, move || {
            self.insert_batch(batch)
        })
        .await?;

        tracing::debug!(count = saved.len(), "Sections batch committed");
        Ok(saved)
    }

    async fn find_all(&self) -> Result<Vec<Section>> {
        // Both reads see the same snapshot
        let mut tx = self.pool.begin().await?;

        let sections: Vec<(i64, String)> = sqlx::query_as("SELECT id, name FROM sections ORDER BY id")
            .fetch_all(&mut *tx)
            .await?;

        let classes: Vec<ClassRow> = sqlx::query_as(
            "SELECT section_id, id, name, code FROM geological_classes ORDER BY section_id, position",
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Self::attach_classes(sections, classes))
    }

    async fn find_by_class_code(&self, code: &str) -> Result<Vec<Section>> {
        // Sections and their classes come from one snapshot
        let mut tx = self.pool.begin().await?;

        let sections: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT id, name FROM sections
            WHERE id IN (SELECT section_id FROM geological_classes WHERE code = ?)
            ORDER BY id
            "#,
        )
        .bind(code)
        .fetch_all(&mut *tx)
        .await?;

        // Matching sections are returned with all of their classes
        let classes: Vec<ClassRow> = sqlx::query_as(
            r#"
            SELECT section_id, id, name, code FROM geological_classes
            WHERE section_id IN (SELECT section_id FROM geological_classes WHERE code = ?)
            ORDER BY section_id, position
            "#,
        )
        .bind(code)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Self::attach_classes(sections, classes))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Section>> {
        let mut tx = self.pool.begin().await?;

        let section: Option<(i64, String)> = sqlx::query_as("SELECT id, name FROM sections WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(section) = section else {
            return Ok(None);
        };

        let classes: Vec<ClassRow> = sqlx::query_as(
            "SELECT section_id, id, name, code FROM geological_classes WHERE section_id = ? ORDER BY position",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Self::attach_classes(vec![section], classes).pop())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let pool = &self.pool;
        let affected = retry_on_lock("delete section", self.max_lock_wait_ms, move || async move {
            let result = sqlx::query("DELETE FROM sections WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await?;
            Ok::<_, geosect_common::Error>(result.rows_affected())
        })
        .await?;

        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;
    use geosect_common::NewGeologicalClass;

    async fn store() -> SqliteSectionStore {
        SqliteSectionStore::new(init_memory_pool().await.unwrap(), 1000)
    }

    fn ridge_a() -> NewSection {
        NewSection::new(
            "Ridge A",
            vec![NewGeologicalClass::new("Basalt", "B1"), NewGeologicalClass::new("Granite", "G2")],
        )
    }

    #[tokio::test]
    async fn test_save_assigns_ids_and_keeps_class_order() {
        let store = store().await;

        let saved = store.save(ridge_a()).await.unwrap();

        assert!(saved.id > 0);
        assert_eq!(saved.class_pairs(), vec![("Basalt", "B1"), ("Granite", "G2")]);
        assert_ne!(saved.geological_classes[0].id, saved.geological_classes[1].id);

        let loaded = store.find_by_id(saved.id).await.unwrap().unwrap();
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn test_save_all_and_find_all_preserve_order() {
        let store = store().await;
        let batch = vec![
            ridge_a(),
            NewSection::new("Bare", vec![]),
            NewSection::new("Valley", vec![NewGeologicalClass::new("Shale", "S1")]),
        ];

        let saved = store.save_all(batch).await.unwrap();
        assert_eq!(saved.len(), 3);

        let all = store.find_all().await.unwrap();
        let names: Vec<_> = all.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Ridge A", "Bare", "Valley"]);
        assert!(all[1].geological_classes.is_empty());
        assert_eq!(all, saved);
    }

    #[tokio::test]
    async fn test_find_by_class_code_lists_each_section_once() {
        let store = store().await;
        store
            .save_all(vec![
                ridge_a(),
                NewSection::new(
                    "Twice B1",
                    vec![NewGeologicalClass::new("Basalt", "B1"), NewGeologicalClass::new("Basalt 2", "B1")],
                ),
                NewSection::new("Other", vec![NewGeologicalClass::new("Shale", "S1")]),
            ])
            .await
            .unwrap();

        let found = store.find_by_class_code("B1").await.unwrap();

        let names: Vec<_> = found.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Ridge A", "Twice B1"]);
        // Full class lists, not only the matching classes
        assert_eq!(found[0].geological_classes.len(), 2);

        assert!(store.find_by_class_code("nope").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lookups_never_see_half_deleted_sections() {
        let dir = tempfile::TempDir::new().unwrap();
        let pool = crate::db::init_database_pool(&dir.path().join("sections.db")).await.unwrap();
        let store = SqliteSectionStore::new(pool, 5000);

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    let saved = store.save(ridge_a()).await.unwrap();
                    tokio::task::yield_now().await;
                    store.delete(saved.id).await.unwrap();
                }
            })
        };

        while !writer.is_finished() {
            for section in store.find_by_class_code("B1").await.unwrap() {
                assert!(section.has_class_code("B1"), "section {} lost its classes", section.id);
                assert_eq!(section.class_pairs(), vec![("Basalt", "B1"), ("Granite", "G2")]);

                if let Some(by_id) = store.find_by_id(section.id).await.unwrap() {
                    assert_eq!(by_id.geological_classes.len(), 2);
                }
            }
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_cascades_to_classes() {
        let store = store().await;
        let saved = store.save(ridge_a()).await.unwrap();

        assert!(store.delete(saved.id).await.unwrap());
        assert!(!store.delete(saved.id).await.unwrap());
        assert!(store.find_by_id(saved.id).await.unwrap().is_none());

        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM geological_classes")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
