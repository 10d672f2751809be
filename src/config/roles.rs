use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Employee roles known to the role table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    ViceAdmin,
    Executive,
    SeniorManager,
    SalesManager,
    MarketingManager,
    ProjectManager,
    OperationsManager,
    HrManager,
    FinanceManager,
    ItManager,
    TeamLead,
    AssistantManager,
    User,
}

impl Role {
    pub const ALL: [Role; 14] = [
        Role::Admin,
        Role::ViceAdmin,
        Role::Executive,
        Role::SeniorManager,
        Role::SalesManager,
        Role::MarketingManager,
        Role::ProjectManager,
        Role::OperationsManager,
        Role::HrManager,
        Role::FinanceManager,
        Role::ItManager,
        Role::TeamLead,
        Role::AssistantManager,
        Role::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ViceAdmin => "vice_admin",
            Role::Executive => "executive",
            Role::SeniorManager => "senior_manager",
            Role::SalesManager => "sales_manager",
            Role::MarketingManager => "marketing_manager",
            Role::ProjectManager => "project_manager",
            Role::OperationsManager => "operations_manager",
            Role::HrManager => "hr_manager",
            Role::FinanceManager => "finance_manager",
            Role::ItManager => "it_manager",
            Role::TeamLead => "team_lead",
            Role::AssistantManager => "assistant_manager",
            Role::User => "user",
        }
    }

    /// Elevated roles bypass ownership checks on clients, expenses and tracking data
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn display_name(&self) -> String {
        role_table()
            .roles
            .get(self)
            .map(|entry| entry.display_name.clone())
            .unwrap_or_else(|| self.as_str().to_string())
    }

    pub fn department(&self) -> Option<String> {
        role_table().roles.get(self).and_then(|entry| entry.department.clone())
    }

    pub fn menu_access(&self) -> Vec<String> {
        role_table()
            .roles
            .get(self)
            .map(|entry| entry.menu_access.clone())
            .unwrap_or_default()
    }

    pub fn has_menu_access(&self, menu: &str) -> bool {
        self.menu_access().iter().any(|m| m == "*" || m == menu)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("Unknown role: {}", s))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleEntry {
    pub display_name: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub menu_access: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleTable {
    #[serde(default)]
    pub departments: BTreeMap<String, String>,
    #[serde(default)]
    pub roles: BTreeMap<Role, RoleEntry>,
}

static ROLE_TABLE: Lazy<RoleTable> = Lazy::new(|| {
    serde_yaml::from_str(include_str!("roles.yaml")).unwrap_or_else(|e| {
        tracing::error!("Embedded role table failed to parse: {}", e);
        RoleTable::default()
    })
});

pub fn role_table() -> &'static RoleTable {
    &ROLE_TABLE
}
