//! Vendor registry.
//!
//! Vendor names arrive as strings from configuration; the registry maps them
//! to the driver variants the rest of the system dispatches on. External
//! vendor adapters plug in by constructing their own `DebridService`
//! implementation and registering it with the facade; the only built-in
//! driver is the home-media one.

use crate::home_media::{HomeLibrary, HomeMediaDriver};
use crate::service::{DebridError, DebridService};
use std::str::FromStr;
use std::sync::Arc;

/// Known debrid vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    RealDebrid,
    AllDebrid,
    TorBox,
    Premiumize,
    Offcloud,
    DebridLink,
    HomeMedia,
}

impl Vendor {
    pub const ALL: [Vendor; 7] = [
        Vendor::RealDebrid,
        Vendor::AllDebrid,
        Vendor::TorBox,
        Vendor::Premiumize,
        Vendor::Offcloud,
        Vendor::DebridLink,
        Vendor::HomeMedia,
    ];

    /// Stable lowercase label, used for cache scoping and log fields.
    pub fn label(self) -> &'static str {
        match self {
            Self::RealDebrid => "realdebrid",
            Self::AllDebrid => "alldebrid",
            Self::TorBox => "torbox",
            Self::Premiumize => "premiumize",
            Self::Offcloud => "offcloud",
            Self::DebridLink => "debridlink",
            Self::HomeMedia => "homemedia",
        }
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Vendor {
    type Err = DebridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "realdebrid" | "real-debrid" => Ok(Self::RealDebrid),
            "alldebrid" | "all-debrid" => Ok(Self::AllDebrid),
            "torbox" => Ok(Self::TorBox),
            "premiumize" => Ok(Self::Premiumize),
            "offcloud" => Ok(Self::Offcloud),
            "debridlink" | "debrid-link" => Ok(Self::DebridLink),
            "homemedia" | "home-media" => Ok(Self::HomeMedia),
            other => Err(DebridError::NotConfigured {
                vendor: other.to_string(),
            }),
        }
    }
}

/// Build the driver for a vendor.
///
/// Vendor HTTP adapters are external plug-ins; asking for one that has not
/// been registered is a configuration error, not a panic.
pub fn build_driver(
    vendor: Vendor,
    home_library: Option<Arc<dyn HomeLibrary>>,
) -> Result<Arc<dyn DebridService>, DebridError> {
    match vendor {
        Vendor::HomeMedia => {
            let library = home_library.ok_or_else(|| DebridError::NotConfigured {
                vendor: vendor.label().to_string(),
            })?;
            Ok(Arc::new(HomeMediaDriver::new(library)))
        }
        other => Err(DebridError::NotConfigured {
            vendor: other.label().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_names_parse() {
        assert_eq!("realdebrid".parse::<Vendor>().unwrap(), Vendor::RealDebrid);
        assert_eq!("Real-Debrid".parse::<Vendor>().unwrap(), Vendor::RealDebrid);
        assert_eq!("torbox".parse::<Vendor>().unwrap(), Vendor::TorBox);
        assert!("unknown-vendor".parse::<Vendor>().is_err());
    }

    #[test]
    fn labels_are_lowercase() {
        for vendor in Vendor::ALL {
            assert_eq!(vendor.label(), vendor.label().to_ascii_lowercase());
        }
    }
}
