//! Department catalog.
//!
//! Departments are a fixed set; reports are routed to staff whose
//! departments overlap the report's.

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A municipal department, serialized by its display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Department {
    #[serde(rename = "Water Supply & Sewage Department")]
    WaterSupplySewage,
    #[serde(rename = "Public Health & Sanitation Department")]
    PublicHealthSanitation,
    #[serde(rename = "Roads & Infrastructure Department")]
    RoadsInfrastructure,
    #[serde(rename = "Street Lighting Department")]
    StreetLighting,
    #[serde(rename = "Parks & Horticulture Department")]
    ParksHorticulture,
    #[serde(rename = "Building & Construction Department")]
    BuildingConstruction,
    #[serde(rename = "Drainage Department")]
    Drainage,
    #[serde(rename = "Electricity Department")]
    Electricity,
    #[serde(rename = "Public Works Department")]
    PublicWorks,
    #[serde(rename = "Traffic & Transportation Department")]
    TrafficTransportation,
    #[serde(rename = "Solid Waste Management Department")]
    SolidWasteManagement,
    #[serde(rename = "Animal Control Department")]
    AnimalControl,
    #[serde(rename = "Health & Hospital Services")]
    HealthHospitalServices,
    #[serde(rename = "Fire & Emergency Services")]
    FireEmergencyServices,
    #[serde(rename = "Environmental Department")]
    Environmental,
    #[serde(rename = "Revenue Department")]
    Revenue,
    #[serde(rename = "Urban Planning & Development Authority")]
    UrbanPlanningDevelopment,
    #[serde(rename = "Public Grievance & Complaint Cell")]
    PublicGrievanceCell,
}

impl Department {
    /// Every department in catalog order.
    pub const ALL: [Self; 18] = [
        Self::WaterSupplySewage,
        Self::PublicHealthSanitation,
        Self::RoadsInfrastructure,
        Self::StreetLighting,
        Self::ParksHorticulture,
        Self::BuildingConstruction,
        Self::Drainage,
        Self::Electricity,
        Self::PublicWorks,
        Self::TrafficTransportation,
        Self::SolidWasteManagement,
        Self::AnimalControl,
        Self::HealthHospitalServices,
        Self::FireEmergencyServices,
        Self::Environmental,
        Self::Revenue,
        Self::UrbanPlanningDevelopment,
        Self::PublicGrievanceCell,
    ];

    /// Display name as stored and shown to users.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::WaterSupplySewage => "Water Supply & Sewage Department",
            Self::PublicHealthSanitation => "Public Health & Sanitation Department",
            Self::RoadsInfrastructure => "Roads & Infrastructure Department",
            Self::StreetLighting => "Street Lighting Department",
            Self::ParksHorticulture => "Parks & Horticulture Department",
            Self::BuildingConstruction => "Building & Construction Department",
            Self::Drainage => "Drainage Department",
            Self::Electricity => "Electricity Department",
            Self::PublicWorks => "Public Works Department",
            Self::TrafficTransportation => "Traffic & Transportation Department",
            Self::SolidWasteManagement => "Solid Waste Management Department",
            Self::AnimalControl => "Animal Control Department",
            Self::HealthHospitalServices => "Health & Hospital Services",
            Self::FireEmergencyServices => "Fire & Emergency Services",
            Self::Environmental => "Environmental Department",
            Self::Revenue => "Revenue Department",
            Self::UrbanPlanningDevelopment => "Urban Planning & Development Authority",
            Self::PublicGrievanceCell => "Public Grievance & Complaint Cell",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A set of departments stored as a JSON array column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct Departments(pub Vec<Department>);

impl Departments {
    /// Whether the two sets share at least one department.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.0.iter().any(|d| other.0.contains(d))
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deduplicate while keeping first-seen order.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let mut seen = Vec::with_capacity(self.0.len());
        self.0.retain(|d| {
            if seen.contains(d) {
                false
            } else {
                seen.push(*d);
                true
            }
        });
        self
    }
}

impl From<Vec<Department>> for Departments {
    fn from(value: Vec<Department>) -> Self {
        Self(value)
    }
}
