//! Which steps each customer type walks through, and what
//! each step syncs on completion.

use serde::{Deserialize, Serialize};

use crate::model::CustomerType;

/// A wizard step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    Identity,
    PersonalInfo,
    BusinessInfo,
    Addresses,
    BuildingAccess,
    Preferences,
    Security,
    ServicePlan,
    LinkedAccounts,
}

/// Remote call bound to completing a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncBinding {
    /// Create the root profile (step 0 only).
    CreateProfile,
    /// PATCH a 1:1 section of the root profile.
    PatchSection(&'static str),
    /// List steps: items were already synced one by one.
    None,
}

const DOMESTIC_PLAN: &[StepId] = &[
    StepId::Identity,
    StepId::PersonalInfo,
    StepId::Addresses,
    StepId::BuildingAccess,
    StepId::Preferences,
    StepId::Security,
    StepId::ServicePlan,
    StepId::LinkedAccounts,
];

const BUSINESS_PLAN: &[StepId] = &[
    StepId::Identity,
    StepId::BusinessInfo,
    StepId::Addresses,
    StepId::BuildingAccess,
    StepId::Preferences,
    StepId::Security,
    StepId::ServicePlan,
    StepId::LinkedAccounts,
];

/// Ordered steps for a customer type.
pub fn plan_for(customer_type: CustomerType) -> &'static [StepId] {
    match customer_type {
        CustomerType::Domestic => DOMESTIC_PLAN,
        CustomerType::Business => BUSINESS_PLAN,
    }
}

impl StepId {
    pub fn binding(&self) -> SyncBinding {
        match self {
            Self::Identity => SyncBinding::CreateProfile,
            Self::PersonalInfo => SyncBinding::PatchSection("personalInfo"),
            Self::BusinessInfo => SyncBinding::PatchSection("businessInfo"),
            Self::BuildingAccess => SyncBinding::PatchSection("buildingAccessInfo"),
            Self::Preferences => SyncBinding::PatchSection("preferences"),
            Self::Security => SyncBinding::PatchSection("security"),
            Self::ServicePlan => SyncBinding::PatchSection("servicePlan"),
            Self::Addresses | Self::LinkedAccounts => SyncBinding::None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Identity => "Identity",
            Self::PersonalInfo => "Personal information",
            Self::BusinessInfo => "Business information",
            Self::Addresses => "Addresses",
            Self::BuildingAccess => "Building access",
            Self::Preferences => "Preferences",
            Self::Security => "Security deposit",
            Self::ServicePlan => "Service plan",
            Self::LinkedAccounts => "Linked accounts",
        }
    }
}

impl std::fmt::Display for StepId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Identity => "identity",
            Self::PersonalInfo => "personal_info",
            Self::BusinessInfo => "business_info",
            Self::Addresses => "addresses",
            Self::BuildingAccess => "building_access",
            Self::Preferences => "preferences",
            Self::Security => "security",
            Self::ServicePlan => "service_plan",
            Self::LinkedAccounts => "linked_accounts",
        };
        write!(f, "{s}")
    }
}
