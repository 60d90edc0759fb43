//! 48-bit controller identity address.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Address used when no usable local interface is found.
pub const FALLBACK_MAC: MacAddress = MacAddress([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);

const SYSFS_NET: &str = "/sys/class/net";

/// A 48-bit MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

/// Error returned when parsing a MAC address string fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid MAC address: {0:?}")]
pub struct ParseMacError(String);

impl MacAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 6]
    }

    /// The default controller address for this process.
    ///
    /// Derived from the first non-loopback interface (by name) that has a
    /// non-zero hardware address, else [`FALLBACK_MAC`]. Computed once.
    pub fn local_or_fallback() -> MacAddress {
        static DEFAULT: OnceLock<MacAddress> = OnceLock::new();
        *DEFAULT.get_or_init(|| {
            match scan_interfaces(Path::new(SYSFS_NET)) {
                Some(mac) => {
                    tracing::debug!(mac = %mac, "Derived controller MAC from local interface");
                    mac
                }
                None => {
                    tracing::debug!(mac = %FALLBACK_MAC, "No usable interface found, using fallback MAC");
                    FALLBACK_MAC
                }
            }
        })
    }
}

/// Scan a sysfs-style network directory for the first usable hardware address.
fn scan_interfaces(root: &Path) -> Option<MacAddress> {
    let entries = fs::read_dir(root).ok()?;
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name != "lo")
        .collect();
    names.sort();

    names.iter().find_map(|name| {
        let raw = fs::read_to_string(root.join(name).join("address")).ok()?;
        let mac: MacAddress = raw.trim().parse().ok()?;
        (!mac.is_zero()).then_some(mac)
    })
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(|| ParseMacError(s.to_string()))?;
            if part.len() != 2 {
                return Err(ParseMacError(s.to_string()));
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| ParseMacError(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(ParseMacError(s.to_string()));
        }
        Ok(Self(octets))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
