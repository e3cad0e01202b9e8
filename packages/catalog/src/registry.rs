use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::CatalogResult;
use crate::types::Course;

/// Read-only course lookup boundary.
///
/// Production deployments back this with the storefront's catalog
/// service; the in-memory implementation below covers the CLI and tests.
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    /// Fetch a course by catalog id, `None` when unknown
    async fn course(&self, course_id: &str) -> CatalogResult<Option<Course>>;
}

/// Catalog held entirely in memory, optionally seeded from a JSON file
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    courses: HashMap<String, Course>,
}

impl InMemoryCatalog {
    pub fn new(courses: Vec<Course>) -> Self {
        Self {
            courses: courses.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }

    /// Load courses from a JSON array file
    pub fn from_json_file(path: &Path) -> CatalogResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let courses: Vec<Course> = serde_json::from_str(&raw)?;
        debug!("Loaded {} courses from {}", courses.len(), path.display());
        Ok(Self::new(courses))
    }

    pub fn insert(&mut self, course: Course) {
        self.courses.insert(course.id.clone(), course);
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}

#[async_trait]
impl CourseCatalog for InMemoryCatalog {
    async fn course(&self, course_id: &str) -> CatalogResult<Option<Course>> {
        Ok(self.courses.get(course_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_course(id: &str) -> Course {
        Course {
            id: id.to_string(),
            code: "WS25".to_string(),
            title: "Windows Server 2025".to_string(),
            tags: vec!["windows".to_string()],
            profile: None,
            requires_elevated_portal: true,
        }
    }

    #[tokio::test]
    async fn test_lookup_known_and_unknown() {
        let catalog = InMemoryCatalog::new(vec![sample_course("c1")]);

        let found = catalog.course("c1").await.unwrap();
        assert!(found.is_some());
        assert!(found.unwrap().requires_elevated_portal);

        let missing = catalog.course("nope").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courses.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"[{{"id":"c9","code":"K8S","title":"Kubernetes Basics","tags":["k8s"]}}]"#
        )
        .unwrap();

        let catalog = InMemoryCatalog::from_json_file(&path).unwrap();
        assert_eq!(catalog.len(), 1);

        let course = catalog.course("c9").await.unwrap().unwrap();
        assert_eq!(course.code, "K8S");
        // Fields absent from the JSON take their defaults
        assert!(!course.requires_elevated_portal);
        assert!(course.profile.is_none());
    }
}
