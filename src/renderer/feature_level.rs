use std::fmt;
use ash::vk;
use color_eyre::eyre::eyre;
use color_eyre::Result;

/// Capability tiers a device can be created at, named after the D3D feature
/// levels they stand in for. Each tier maps onto a minimum Vulkan API version.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeatureLevel {
    Level11_0,
    Level11_1,
    Level12_0,
    Level12_1,
}

impl FeatureLevel {
    /// Order in which device creation is attempted
    pub const PREFERENCE: [FeatureLevel; 4] = [
        FeatureLevel::Level12_1,
        FeatureLevel::Level12_0,
        FeatureLevel::Level11_1,
        FeatureLevel::Level11_0,
    ];

    pub fn api_version(self) -> u32 {
        match self {
            FeatureLevel::Level12_1 => vk::API_VERSION_1_3,
            FeatureLevel::Level12_0 => vk::API_VERSION_1_2,
            FeatureLevel::Level11_1 => vk::API_VERSION_1_1,
            FeatureLevel::Level11_0 => vk::API_VERSION_1_0,
        }
    }

    /// Runs `attempt` for every level in preference order and returns the
    /// first success together with the level it succeeded at.
    pub fn first_supported<T, F>(mut attempt: F) -> Result<(FeatureLevel, T)>
    where
        F: FnMut(FeatureLevel) -> Result<T>,
    {
        for level in Self::PREFERENCE {
            match attempt(level) {
                Ok(value) => {
                    log::info!("Device created at feature level {}", level);
                    return Ok((level, value));
                }
                Err(e) => {
                    log::debug!("Feature level {} rejected: {}", level, e);
                }
            }
        }

        Err(eyre!(
            "Device creation failed at every feature level ({} tried)",
            Self::PREFERENCE.len()
        ))
    }
}

impl fmt::Display for FeatureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeatureLevel::Level12_1 => "12_1",
            FeatureLevel::Level12_0 => "12_0",
            FeatureLevel::Level11_1 => "11_1",
            FeatureLevel::Level11_0 => "11_0",
        };
        write!(
            f,
            "{} (Vulkan {}.{})",
            name,
            vk::api_version_major(self.api_version()),
            vk::api_version_minor(self.api_version()),
        )
    }
}
