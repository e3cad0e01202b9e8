//! Course registry boundary and lab machine profiles.
//!
//! The storefront owns the real course catalog; this package carries the
//! read-only slice the lab orchestrator needs (course existence, tags,
//! portal requirements) plus the machine profile table that maps courses
//! to boot images and preinstalled software.

pub mod error;
pub mod profiles;
pub mod registry;
pub mod types;

pub use error::{CatalogError, CatalogResult};
pub use profiles::{profile, profile_for_course, LabProfile};
pub use registry::{CourseCatalog, InMemoryCatalog};
pub use types::{Course, ImageReference};
