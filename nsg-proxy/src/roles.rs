//! Static role profiles and their dashboard menus.

use std::str::FromStr;

use serde::Serialize;

use crate::error::ProxyError;

/// Dashboard personas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Consultant,
    Psychologist,
    Manager,
    Patient,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Consultant,
        Role::Psychologist,
        Role::Manager,
        Role::Patient,
    ];

    pub fn profile(&self) -> RoleProfile {
        match self {
            Role::Consultant => RoleProfile {
                role: *self,
                name: "Dr. Arriaga",
                avatar: "DA",
                role_desc: "Senior Consultant",
                menu: CONSULTANT_MENU,
            },
            Role::Psychologist => RoleProfile {
                role: *self,
                name: "Lic. Sofia",
                avatar: "LS",
                role_desc: "Clinical Lead",
                menu: PSYCHOLOGIST_MENU,
            },
            Role::Manager => RoleProfile {
                role: *self,
                name: "Roberto V.",
                avatar: "RV",
                role_desc: "CEO",
                menu: MANAGER_MENU,
            },
            Role::Patient => RoleProfile {
                role: *self,
                name: "Paciente",
                avatar: "PA",
                role_desc: "Patient",
                menu: PATIENT_MENU,
            },
        }
    }
}

impl FromStr for Role {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "consultant" => Ok(Role::Consultant),
            "psychologist" => Ok(Role::Psychologist),
            "manager" => Ok(Role::Manager),
            "patient" => Ok(Role::Patient),
            _ => Err(ProxyError::UnknownRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleProfile {
    pub role: Role,
    pub name: &'static str,
    pub avatar: &'static str,
    pub role_desc: &'static str,
    pub menu: &'static [MenuItem],
}

/// One menu entry. `capability` names the view the client renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub id: &'static str,
    pub label: &'static str,
    pub capability: &'static str,
    pub special: bool,
}

const fn item(id: &'static str, label: &'static str, capability: &'static str) -> MenuItem {
    MenuItem {
        id,
        label,
        capability,
        special: false,
    }
}

const INTELLIGENCE: MenuItem = MenuItem {
    id: "nsg_ios",
    label: "NSG Intelligence",
    capability: "assistant",
    special: true,
};
const NEWS: MenuItem = item("nsg_news", "NSG News", "news");
const CLARITY: MenuItem = item("nsg_clarity", "NSG Clarity", "clarity");
const HORIZON: MenuItem = item("nsg_horizon", "NSG Horizon", "horizon");
const CALENDAR: MenuItem = item("calendar", "Agenda Maestra", "calendar");
const SETTINGS: MenuItem = item("settings", "Configuración", "settings");

const CONSULTANT_MENU: &[MenuItem] = &[
    INTELLIGENCE,
    NEWS,
    CLARITY,
    HORIZON,
    item("portfolio", "Cartera de Activos", "portfolio"),
    CALENDAR,
    item("reports", "Inteligencia de Datos", "reports"),
    SETTINGS,
];

const PSYCHOLOGIST_MENU: &[MenuItem] = &[
    INTELLIGENCE,
    NEWS,
    CLARITY,
    HORIZON,
    item("clinical_radar", "Análisis Multiaxial", "clinical_radar"),
    CALENDAR,
    item("patients", "Pacientes", "patients"),
    item("library", "Biblioteca", "library"),
    SETTINGS,
];

const MANAGER_MENU: &[MenuItem] = &[
    INTELLIGENCE,
    NEWS,
    CLARITY,
    HORIZON,
    CALENDAR,
    item("metrics", "P&L Financiero", "metrics"),
    item("strategy", "M&A Pipeline", "strategy"),
    item("reports", "Reportes Board", "reports"),
    SETTINGS,
];

const PATIENT_MENU: &[MenuItem] = &[
    INTELLIGENCE,
    CLARITY,
    NEWS,
    item("wellness", "Bienestar", "wellness"),
    item("calendar", "Agenda", "calendar"),
    SETTINGS,
];
