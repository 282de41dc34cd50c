//! Role table and enforcer.
//!
//! The table maps actor category → permitted skills, readable state scopes,
//! mutable state fields, and an artifact-type tag. It is injectable at
//! construction so new simulation domains supply their own table without
//! touching the enforcer.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// PermissionResult
// ---------------------------------------------------------------------------

/// Outcome of a single permission check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionResult {
    /// Whether the check passed.
    pub allowed: bool,
    /// Human-readable reason, set on both outcomes.
    pub reason: String,
}

impl PermissionResult {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// RolePermissions / RoleTable
// ---------------------------------------------------------------------------

/// Permissions granted to one actor category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RolePermissions {
    /// Skills the category may execute.
    pub allowed_skills: Vec<String>,
    /// State scopes the category may read.
    pub can_read_state: Vec<String>,
    /// State fields the category may mutate.
    pub can_modify: Vec<String>,
    /// Artifact tag stamped on this category's decisions.
    pub artifact_type: String,
}

/// Mapping from actor category to its permissions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleTable {
    pub categories: HashMap<String, RolePermissions>,
}

impl RoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a role table from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|e| ConfigError::RoleTable {
            message: e.to_string(),
        })
    }

    /// Load a role table from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::RoleTable {
            message: e.to_string(),
        })
    }

    pub fn insert(&mut self, category: impl Into<String>, permissions: RolePermissions) {
        self.categories.insert(category.into(), permissions);
    }

    pub fn get(&self, category: &str) -> Option<&RolePermissions> {
        self.categories.get(category)
    }
}

fn perms(
    skills: &[&str],
    read: &[&str],
    modify: &[&str],
    artifact: &str,
) -> RolePermissions {
    RolePermissions {
        allowed_skills: skills.iter().map(|s| s.to_string()).collect(),
        can_read_state: read.iter().map(|s| s.to_string()).collect(),
        can_modify: modify.iter().map(|s| s.to_string()).collect(),
        artifact_type: artifact.to_string(),
    }
}

static DEFAULT_TABLE: Lazy<RoleTable> = Lazy::new(|| {
    let mut table = RoleTable::new();
    table.insert(
        "household",
        perms(
            &["do_nothing", "buy_insurance", "elevate_house", "relocate"],
            &["own", "flood", "market", "neighbors"],
            &["elevated", "insured", "location"],
            "household_decision",
        ),
    );
    table.insert(
        "insurance",
        perms(
            &["do_nothing", "adjust_premium", "deny_coverage"],
            &["market", "claims", "flood"],
            &["premium_rate", "coverage_terms"],
            "policy_decision",
        ),
    );
    table.insert(
        "government",
        perms(
            &[
                "do_nothing",
                "update_building_code",
                "fund_protection",
                "subsidize_elevation",
            ],
            &["flood", "market", "budget", "population"],
            &["building_code", "subsidy_rate", "protection_level"],
            "regulation",
        ),
    );
    table.insert(
        "irrigator",
        perms(
            &[
                "do_nothing",
                "irrigate_full",
                "irrigate_deficit",
                "fallow",
                "invest_efficiency",
            ],
            &["own", "water", "market"],
            &["irrigation_level", "efficiency"],
            "irrigation_decision",
        ),
    );
    table
});

/// The documented default table for the flood-adaptation domain.
pub fn default_role_table() -> RoleTable {
    DEFAULT_TABLE.clone()
}

// ---------------------------------------------------------------------------
// RoleEnforcer
// ---------------------------------------------------------------------------

/// Checks skill, read-scope, and mutation legality against a role table.
#[derive(Debug, Clone)]
pub struct RoleEnforcer {
    table: RoleTable,
}

impl RoleEnforcer {
    pub fn new(table: RoleTable) -> Self {
        Self { table }
    }

    /// May `actor_category` execute `skill`?
    pub fn check_skill_permission(&self, actor_category: &str, skill: &str) -> PermissionResult {
        match self.table.get(actor_category) {
            None => PermissionResult::deny(format!("unknown actor category '{actor_category}'")),
            Some(p) if p.allowed_skills.iter().any(|s| s == skill) => {
                PermissionResult::allow(format!("'{skill}' is permitted for '{actor_category}'"))
            }
            Some(_) => PermissionResult::deny(format!(
                "skill '{skill}' is not in the allowed set for '{actor_category}'"
            )),
        }
    }

    /// May `actor_category` read state scope `scope`?
    pub fn check_state_access(&self, actor_category: &str, scope: &str) -> PermissionResult {
        match self.table.get(actor_category) {
            None => PermissionResult::deny(format!("unknown actor category '{actor_category}'")),
            Some(p) if p.can_read_state.iter().any(|s| s == scope) => {
                PermissionResult::allow(format!("scope '{scope}' is readable by '{actor_category}'"))
            }
            Some(_) => PermissionResult::deny(format!(
                "scope '{scope}' is not readable by '{actor_category}'"
            )),
        }
    }

    /// May `actor_category` mutate state field `field`?
    pub fn check_state_mutation(&self, actor_category: &str, field: &str) -> PermissionResult {
        match self.table.get(actor_category) {
            None => PermissionResult::deny(format!("unknown actor category '{actor_category}'")),
            Some(p) if p.can_modify.iter().any(|f| f == field) => {
                PermissionResult::allow(format!("field '{field}' is mutable by '{actor_category}'"))
            }
            Some(_) => PermissionResult::deny(format!(
                "field '{field}' is not mutable by '{actor_category}'"
            )),
        }
    }

    /// State scopes readable by a category, empty for unknown categories.
    pub fn readable_scopes(&self, actor_category: &str) -> Vec<String> {
        self.table
            .get(actor_category)
            .map(|p| p.can_read_state.clone())
            .unwrap_or_default()
    }

    /// Skills executable by a category, empty for unknown categories.
    pub fn allowed_skills(&self, actor_category: &str) -> Vec<String> {
        self.table
            .get(actor_category)
            .map(|p| p.allowed_skills.clone())
            .unwrap_or_default()
    }

    /// Artifact tag for a category's decisions.
    pub fn artifact_type(&self, actor_category: &str) -> Option<&str> {
        self.table
            .get(actor_category)
            .map(|p| p.artifact_type.as_str())
    }
}

impl Default for RoleEnforcer {
    fn default() -> Self {
        Self::new(default_role_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_category_fails_closed_on_every_check() {
        let enforcer = RoleEnforcer::default();
        assert!(!enforcer.check_skill_permission("martian", "do_nothing").allowed);
        assert!(!enforcer.check_state_access("martian", "flood").allowed);
        assert!(!enforcer.check_state_mutation("martian", "elevated").allowed);
        assert!(enforcer
            .check_skill_permission("martian", "do_nothing")
            .reason
            .contains("unknown actor category"));
    }

    #[test]
    fn skill_permission_respects_category_sets() {
        let mut table = RoleTable::new();
        table.insert(
            "insurance",
            RolePermissions {
                allowed_skills: vec!["adjust_premium".into()],
                ..Default::default()
            },
        );
        table.insert(
            "household",
            RolePermissions {
                allowed_skills: vec!["buy_insurance".into()],
                ..Default::default()
            },
        );
        let enforcer = RoleEnforcer::new(table);

        assert!(!enforcer.check_skill_permission("insurance", "buy_insurance").allowed);
        assert!(enforcer.check_skill_permission("household", "buy_insurance").allowed);
    }

    #[test]
    fn state_access_and_mutation_checks() {
        let enforcer = RoleEnforcer::default();
        assert!(enforcer.check_state_access("household", "flood").allowed);
        assert!(!enforcer.check_state_access("household", "claims").allowed);
        assert!(enforcer.check_state_mutation("government", "subsidy_rate").allowed);
        assert!(!enforcer.check_state_mutation("government", "elevated").allowed);
    }

    #[test]
    fn table_loads_from_yaml() {
        let yaml = r#"
levee_board:
  allowed_skills: [raise_levee, do_nothing]
  can_read_state: [flood, budget]
  can_modify: [levee_height]
  artifact_type: infrastructure_decision
"#;
        let table = RoleTable::from_yaml_str(yaml).unwrap();
        let enforcer = RoleEnforcer::new(table);
        assert!(enforcer.check_skill_permission("levee_board", "raise_levee").allowed);
        assert!(!enforcer.check_skill_permission("household", "do_nothing").allowed);
    }

    #[test]
    fn malformed_table_is_a_construction_error() {
        assert!(RoleTable::from_json_str("{not json").is_err());
    }
}
