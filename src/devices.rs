use serde::Serialize;
use std::{fmt, str::FromStr};

pub const ALL_DEVICES: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Device {
    pub id: u32,
    pub name: &'static str,
    pub location: &'static str,
}

const CATALOG: [Device; 8] = [
    Device { id: 33, name: "Bomba CAG", location: "Bomba CAG" },
    Device { id: 36, name: "Chiller", location: "Chiller" },
    Device { id: 37, name: "Fancoil Auditório", location: "Fancoil Auditório" },
    Device { id: 38, name: "Aquecimento de Água", location: "Aquecimento de Água" },
    Device { id: 39, name: "Bomba de Recalque", location: "Bomba de Recalque" },
    Device { id: 40, name: "Bomba de Esgoto", location: "Bomba de Esgoto" },
    Device { id: 41, name: "Dispositivo 41", location: "Dispositivo 41" },
    Device { id: 42, name: "Dispositivo 42", location: "Dispositivo 42" },
];

pub fn catalog() -> &'static [Device] {
    &CATALOG
}

pub fn find(id: u32) -> Option<&'static Device> {
    CATALOG.iter().find(|device| device.id == id)
}

pub fn all_device_ids() -> Vec<u32> {
    CATALOG.iter().map(|device| device.id).collect()
}

/// Either a single device or the aggregate of the whole catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceSelection {
    All,
    Device(u32),
}

impl fmt::Display for DeviceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelection::All => f.write_str(ALL_DEVICES),
            DeviceSelection::Device(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for DeviceSelection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case(ALL_DEVICES) {
            return Ok(DeviceSelection::All);
        }
        value
            .parse::<u32>()
            .map(DeviceSelection::Device)
            .map_err(|_| format!("device must be a numeric id or '{ALL_DEVICES}', got '{value}'"))
    }
}
