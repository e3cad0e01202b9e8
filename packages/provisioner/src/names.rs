// ABOUTME: Resource naming for lab namespaces and per-launch resources
// ABOUTME: All names derive from one short random suffix so operators can group them

use nanoid::nanoid;

/// Lowercase alphanumerics only, so every derived name is valid for fabric
/// resources that reject uppercase or punctuation.
const NAME_ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h',
    'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

fn short_suffix() -> String {
    nanoid!(5, &NAME_ALPHABET)
}

/// Namespace name for a user's lab: `lab-{user prefix}-{course code}-{suffix}`
pub fn namespace_name(user_id: &str, course_code: &str) -> String {
    let user_prefix: String = user_id.chars().take(5).collect::<String>().to_lowercase();
    format!(
        "lab-{}-{}-{}",
        user_prefix,
        course_code.to_lowercase(),
        short_suffix()
    )
}

/// Names of every resource one launch creates
#[derive(Debug, Clone)]
pub struct LabNames {
    pub instance: String,
    pub network: String,
    pub subnet: String,
    pub address: String,
    pub security_group: String,
    pub interface: String,
    pub disk: String,
}

impl LabNames {
    pub fn generate() -> Self {
        Self::from_suffix(&short_suffix())
    }

    pub fn from_suffix(suffix: &str) -> Self {
        let instance = format!("vm-{}", suffix);
        Self {
            network: format!("vnet-{}", suffix),
            subnet: format!("subnet-{}", suffix),
            address: Self::address_for(&instance),
            security_group: format!("{}-nsg", instance),
            interface: format!("{}-nic", instance),
            disk: Self::conventional_disk(&instance),
            instance,
        }
    }

    /// Public address name for a given instance
    pub fn address_for(instance: &str) -> String {
        format!("{}-pip", instance)
    }

    /// Interface name for a given instance
    pub fn interface_for(instance: &str) -> String {
        format!("{}-nic", instance)
    }

    /// Security group name for a given instance
    pub fn security_group_for(instance: &str) -> String {
        format!("{}-nsg", instance)
    }

    /// Disk name an instance gets when nothing overrides it. Teardown reads
    /// the actual name from the instance and falls back to this.
    pub fn conventional_disk(instance: &str) -> String {
        format!("{}-osdisk", instance)
    }
}
