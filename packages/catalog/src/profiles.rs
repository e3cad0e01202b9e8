use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::ImageReference;

/// Machine size used by every profile; labs are interactive desktop
/// sessions, not batch workloads, so one size fits all courses.
pub const DEFAULT_MACHINE_SIZE: &str = "Standard_D2s_v3";

/// Boot image plus preinstalled software for one class of lab machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabProfile {
    pub name: String,
    pub image: ImageReference,
    pub size: String,
    /// Package-manager package names installed by the bootstrap script
    pub software: Vec<String>,
}

impl LabProfile {
    fn new(name: &str, image: ImageReference, software: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            image,
            size: DEFAULT_MACHINE_SIZE.to_string(),
            software: software.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn server_2022() -> ImageReference {
    ImageReference::new("MicrosoftWindowsServer", "WindowsServer", "2022-Datacenter", "latest")
}

fn server_2025() -> ImageReference {
    ImageReference::new("MicrosoftWindowsServer", "WindowsServer", "2025-Datacenter", "latest")
}

fn windows_11() -> ImageReference {
    ImageReference::new("MicrosoftWindowsDesktop", "Windows-11", "win11-22h2-pro", "latest")
}

fn default_profile() -> LabProfile {
    LabProfile::new("default", server_2022(), &["git", "googlechrome", "vscode"])
}

/// Look up a profile by name
pub fn profile(name: &str) -> Option<LabProfile> {
    let profile = match name {
        "default" => default_profile(),
        "server2025" => {
            LabProfile::new("server2025", server_2025(), &["git", "googlechrome", "vscode"])
        }
        "windows11" => {
            LabProfile::new("windows11", windows_11(), &["git", "googlechrome", "vscode"])
        }
        "docker" => LabProfile::new(
            "docker",
            server_2022(),
            &["docker-desktop", "git", "vscode", "postman"],
        ),
        "docker2025" => LabProfile::new(
            "docker2025",
            server_2025(),
            &["docker-desktop", "git", "vscode", "postman"],
        ),
        "kubernetes" => LabProfile::new(
            "kubernetes",
            server_2022(),
            &["minikube", "kubernetes-cli", "helm", "vscode"],
        ),
        _ => return None,
    };
    Some(profile)
}

/// Pick the profile name from a course's title, code, and tags
fn select_profile_name(title: &str, code: &str, tags: &[String]) -> &'static str {
    let title = title.to_lowercase();
    let code = code.to_lowercase();
    let has_tag = |needle: &str| tags.iter().any(|t| t.to_lowercase().contains(needle));

    if title.contains("2025") || code.contains("2025") {
        if has_tag("docker") || title.contains("docker") {
            return "docker2025";
        }
        return "server2025";
    }

    if title.contains("windows 11") || title.contains("win11") || code.contains("win11") {
        return "windows11";
    }

    if has_tag("docker") || title.contains("docker") {
        return "docker";
    }

    if has_tag("kubernetes") || has_tag("k8s") || title.contains("kubernetes") {
        return "kubernetes";
    }

    "default"
}

/// Pick the machine profile for a course.
///
/// An explicit profile name on the course wins; otherwise the title,
/// code, and tags are matched against known topic keywords, defaulting
/// to the Server 2022 desktop profile.
pub fn profile_for_course(course: &crate::Course) -> LabProfile {
    if let Some(name) = &course.profile {
        match profile(name) {
            Some(p) => return p,
            None => warn!(
                "Course {} names unknown profile '{}', falling back to keyword selection",
                course.id, name
            ),
        }
    }

    let name = select_profile_name(&course.title, &course.code, &course.tags);
    profile(name).unwrap_or_else(default_profile)
}
