//! # Device Module
//!
//! Types describing attached devices and the static data that decorates them:
//!
//! | Item | Source |
//! |------|--------|
//! | [`DeviceIdentity`] | platform layer, per attach |
//! | [`DeviceProfile`] | profile catalog directory |
//! | [`ExclusionSet`] | exclusions file |
//! | [`DeviceInfo`] | identity merged with its profile |

pub mod exclusion;
pub mod identity;
pub mod profile;

pub use exclusion::ExclusionSet;
pub use identity::{Component, ComponentKind, DeviceIdentity, DeviceType, InputEvent, PortType};
pub use profile::{DeviceProfile, ProfileCatalog};

use serde::Serialize;

/// Placeholder for metadata only a profile can provide
pub const UNAVAILABLE: &str = "Unavailable";

/// Identity plus profile, flattened into display strings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub description: String,
    pub manufacturer: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub port_type: String,
    /// Type used for counting rules: the platform's, or the profile's when
    /// the platform does not know
    #[serde(skip)]
    pub effective_type: DeviceType,
}

impl DeviceInfo {
    /// Merge platform identity with an optional profile.
    ///
    /// Description and manufacturer only come from profiles. Type and port
    /// type come from the platform unless it reports `Unknown`.
    pub fn merge(identity: &DeviceIdentity, profile: Option<&DeviceProfile>) -> Self {
        let description = profile
            .and_then(|p| p.description.clone())
            .unwrap_or_else(|| UNAVAILABLE.to_string());
        let manufacturer = profile
            .and_then(|p| p.manufacturer.clone())
            .unwrap_or_else(|| UNAVAILABLE.to_string());

        let (device_type, effective_type) = if identity.device_type == DeviceType::Unknown {
            let declared = profile.and_then(|p| p.device_type.as_deref());
            (
                declared.unwrap_or("Unknown").to_string(),
                declared
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(DeviceType::Unknown),
            )
        } else {
            (identity.device_type.to_string(), identity.device_type)
        };

        let port_type = if identity.port_type == PortType::Unknown {
            profile
                .and_then(|p| p.port_type.clone())
                .unwrap_or_else(|| PortType::Unknown.to_string())
        } else {
            identity.port_type.to_string()
        };

        Self {
            name: identity.name.clone(),
            description,
            manufacturer,
            device_type,
            port_type,
            effective_type,
        }
    }
}
