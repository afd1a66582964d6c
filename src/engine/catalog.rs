//! Reference catalogue of default check types.
//!
//! Each database type belongs to exactly one check category, and each
//! category owns an ordered daily and weekly template of check-type names.
//! The table is static and validated once at startup before it is used to
//! seed the `check_types` table.

use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

use crate::db::{DatabaseType, Frequency};

/// Group of database types sharing one check template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckCategory {
    Standard,
    Oem,
    AuditVault,
    Firewall,
}

impl CheckCategory {
    pub const ALL: [CheckCategory; 4] = [
        CheckCategory::Standard,
        CheckCategory::Oem,
        CheckCategory::AuditVault,
        CheckCategory::Firewall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckCategory::Standard => "standard",
            CheckCategory::Oem => "oem",
            CheckCategory::AuditVault => "audit_vault",
            CheckCategory::Firewall => "firewall",
        }
    }

    pub fn for_type(db_type: DatabaseType) -> CheckCategory {
        match db_type {
            DatabaseType::Primary
            | DatabaseType::Standby
            | DatabaseType::Archive
            | DatabaseType::Gis
            | DatabaseType::Pilot => CheckCategory::Standard,
            DatabaseType::Oem => CheckCategory::Oem,
            DatabaseType::AuditVault => CheckCategory::AuditVault,
            DatabaseType::Firewall => CheckCategory::Firewall,
        }
    }

    /// Database types that map to this category
    pub fn database_types(&self) -> Vec<DatabaseType> {
        DatabaseType::ALL
            .into_iter()
            .filter(|t| CheckCategory::for_type(*t) == *self)
            .collect()
    }
}

impl std::fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CategoryTemplate {
    pub category: CheckCategory,
    pub daily: &'static [&'static str],
    pub weekly: &'static [&'static str],
}

pub static CHECK_TEMPLATES: &[CategoryTemplate] = &[
    CategoryTemplate {
        category: CheckCategory::Standard,
        daily: &[
            "DB Instance Availability",
            "Alert Log: Errors and Warnings",
            "Active Session Count",
            "DB Full Backup",
            "Archive Log Backup",
            "DB Load from OEM",
            "DB Jobs",
            "Check Cluster Services",
            "Check SCAN Services",
            "Long Running Queries",
            "Database Locks",
            "Listener Status",
            "Connection Test",
        ],
        weekly: &[
            "Production DB Size",
            "Archive DB Size",
            "Invalid Objects Count",
            "Instance Start Date",
            "Tablespace Usage",
        ],
    },
    CategoryTemplate {
        category: CheckCategory::Oem,
        daily: &[
            "OMS Status",
            "Instance Availability",
            "Errors and Warnings",
            "AWR Reports",
            "DB Full Backup",
            "DB Jobs",
            "Long Running Queries",
            "Repository DB Availability",
            "Repository DB Space",
            "Management Agents Status",
            "Agent Version Validation",
            "Database Targets Reachable",
            "Critical Alerts Review",
            "Performance Charts Review",
            "Compliance Standards Review",
        ],
        weekly: &["Repository DB Size", "Agent Health Summary", "Target Status Summary"],
    },
    CategoryTemplate {
        category: CheckCategory::AuditVault,
        daily: &[
            "Instance Availability",
            "System Status CPU",
            "System Status Memory",
            "System Status Disk Space",
            "Audit Trail Collection",
            "Repository Growth Monitoring",
            "Agents Online Status",
            "Agents Collecting Data",
            "Upload Backlog",
            "Upload Connectivity",
            "Logs Review",
        ],
        weekly: &["Repository Size", "Audit Data Growth", "Archive Status"],
    },
    CategoryTemplate {
        category: CheckCategory::Firewall,
        daily: &[
            "Instance Availability",
            "Firewall Policies Active",
            "Blocking Rules Validation",
            "Alerting Rules Validation",
        ],
        weekly: &["Policy Review", "Rule Effectiveness"],
    },
];

/// Seed descriptions keyed by check-type name
static DESCRIPTIONS: &[(&str, &str)] = &[
    ("DB Instance Availability", "Check if database instance is running"),
    ("Alert Log: Errors and Warnings", "Review alert log for errors"),
    ("Active Session Count", "Monitor active sessions"),
    ("DB Full Backup", "Verify full backup completion"),
    ("Archive Log Backup", "Check archive log backups"),
    ("DB Load from OEM", "Check database load metrics"),
    ("DB Jobs", "Verify database job status"),
    ("Check Cluster Services", "Verify cluster services running"),
    ("Check SCAN Services", "Verify SCAN listener status"),
    ("Long Running Queries", "Identify long-running queries"),
    ("Database Locks", "Check for blocking locks"),
    ("Listener Status", "Verify listener is running"),
    ("Connection Test", "Test database connectivity"),
    ("OMS Status", "Oracle Management Service status"),
    ("Repository DB Availability", "Check OEM repository"),
    ("Repository DB Space", "Monitor repository space"),
    ("Management Agents Status", "Verify agents are up"),
    ("Agent Version Validation", "Check agent versions"),
    ("Database Targets Reachable", "Confirm all targets reachable"),
    ("Critical Alerts Review", "Review critical incidents"),
    ("Performance Charts Review", "Check for anomalies"),
    ("Compliance Standards Review", "Review compliance violations"),
    ("Instance Availability", "Instance availability"),
    ("System Status CPU", "Check CPU usage"),
    ("System Status Memory", "Check memory usage"),
    ("System Status Disk Space", "Check disk space"),
    ("Audit Trail Collection", "Verify audit collection"),
    ("Repository Growth Monitoring", "Monitor repository growth"),
    ("Agents Online Status", "Check agent status"),
    ("Agents Collecting Data", "Verify data collection"),
    ("Upload Backlog", "Check upload backlog"),
    ("Upload Connectivity", "Verify upload connectivity"),
    ("Logs Review", "Review audit logs"),
    ("Firewall Policies Active", "Verify policies active"),
    ("Blocking Rules Validation", "Check blocking rules"),
    ("Alerting Rules Validation", "Validate alert rules"),
    ("Tablespace Usage", "Tablespace usage against allocated size"),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("no template defined for category {0}")]
    MissingCategory(CheckCategory),

    #[error("category {0} is defined more than once")]
    DuplicateCategory(CheckCategory),

    #[error("category {0} has an empty daily template")]
    EmptyDailyTemplate(CheckCategory),

    #[error("check '{name}' appears twice in the {frequency} template of {category}")]
    DuplicateName {
        category: CheckCategory,
        frequency: Frequency,
        name: &'static str,
    },
}

/// Ensure every database type resolves to a category with a usable template
pub fn validate_catalog(templates: &[CategoryTemplate]) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for template in templates {
        if !seen.insert(template.category) {
            return Err(CatalogError::DuplicateCategory(template.category));
        }
        if template.daily.is_empty() {
            return Err(CatalogError::EmptyDailyTemplate(template.category));
        }
        for (frequency, names) in [(Frequency::Daily, template.daily), (Frequency::Weekly, template.weekly)] {
            let mut names_seen = HashSet::new();
            for &name in names {
                if !names_seen.insert(name.to_lowercase()) {
                    return Err(CatalogError::DuplicateName {
                        category: template.category,
                        frequency,
                        name,
                    });
                }
            }
        }
    }

    for db_type in DatabaseType::ALL {
        let category = CheckCategory::for_type(db_type);
        if !seen.contains(&category) {
            return Err(CatalogError::MissingCategory(category));
        }
    }
    Ok(())
}

/// Template names for a database type, in display order
pub fn template_for(
    templates: &[CategoryTemplate],
    db_type: DatabaseType,
    frequency: Frequency,
) -> &'static [&'static str] {
    let category = CheckCategory::for_type(db_type);
    templates
        .iter()
        .find(|t| t.category == category)
        .map(|t| match frequency {
            Frequency::Daily => t.daily,
            Frequency::Weekly => t.weekly,
        })
        .unwrap_or(&[])
}

/// A check type row derived from the catalogue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedCheckType {
    pub name: &'static str,
    pub description: Option<&'static str>,
    pub database_types: Vec<DatabaseType>,
    pub is_daily: bool,
    pub is_weekly: bool,
    pub display_order: i64,
}

/// Merge all templates into one row per distinct check name.
///
/// A name shared by several categories applies to the union of their
/// database types and keeps its smallest template position.
pub fn seed_definitions(templates: &[CategoryTemplate]) -> Vec<SeedCheckType> {
    let mut rows: Vec<SeedCheckType> = Vec::new();

    for template in templates {
        let types = template.category.database_types();
        for (frequency, names) in [(Frequency::Daily, template.daily), (Frequency::Weekly, template.weekly)] {
            for (index, &name) in names.iter().enumerate() {
                let position = index as i64 + 1;
                let idx = match rows.iter().position(|r| r.name.eq_ignore_ascii_case(name)) {
                    Some(idx) => idx,
                    None => {
                        rows.push(SeedCheckType {
                            name,
                            description: DESCRIPTIONS
                                .iter()
                                .find(|(n, _)| *n == name)
                                .map(|(_, d)| *d),
                            database_types: Vec::new(),
                            is_daily: false,
                            is_weekly: false,
                            display_order: position,
                        });
                        rows.len() - 1
                    }
                };
                let row = &mut rows[idx];

                for t in &types {
                    if !row.database_types.contains(t) {
                        row.database_types.push(*t);
                    }
                }
                row.database_types.sort();
                match frequency {
                    Frequency::Daily => row.is_daily = true,
                    Frequency::Weekly => row.is_weekly = true,
                }
                row.display_order = row.display_order.min(position);
            }
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_is_valid() {
        assert_eq!(validate_catalog(CHECK_TEMPLATES), Ok(()));
    }

    #[test]
    fn test_catalog_missing_category_rejected() {
        let partial: Vec<CategoryTemplate> = CHECK_TEMPLATES
            .iter()
            .copied()
            .filter(|t| t.category != CheckCategory::Firewall)
            .collect();
        assert_eq!(
            validate_catalog(&partial),
            Err(CatalogError::MissingCategory(CheckCategory::Firewall))
        );
    }

    #[test]
    fn test_catalog_duplicate_name_rejected() {
        let broken = [CategoryTemplate {
            category: CheckCategory::Standard,
            daily: &["Listener Status", "listener status"],
            weekly: &[],
        }];
        assert!(matches!(
            validate_catalog(&broken),
            Err(CatalogError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_every_type_has_a_category() {
        assert_eq!(CheckCategory::for_type(DatabaseType::Pilot), CheckCategory::Standard);
        assert_eq!(CheckCategory::for_type(DatabaseType::AuditVault), CheckCategory::AuditVault);
        let covered: usize = CheckCategory::ALL.iter().map(|c| c.database_types().len()).sum();
        assert_eq!(covered, DatabaseType::ALL.len());
    }

    #[test]
    fn test_template_for_type() {
        let daily = template_for(CHECK_TEMPLATES, DatabaseType::Firewall, Frequency::Daily);
        assert_eq!(daily.first(), Some(&"Instance Availability"));
        let weekly = template_for(CHECK_TEMPLATES, DatabaseType::Standby, Frequency::Weekly);
        assert!(weekly.contains(&"Tablespace Usage"));
    }

    #[test]
    fn test_seed_definitions_merge_shared_names() {
        let rows = seed_definitions(CHECK_TEMPLATES);

        let backup = rows.iter().find(|r| r.name == "DB Full Backup").unwrap();
        assert!(backup.database_types.contains(&DatabaseType::Primary));
        assert!(backup.database_types.contains(&DatabaseType::Oem));
        assert!(!backup.database_types.contains(&DatabaseType::Firewall));
        assert_eq!(backup.display_order, 4);

        let availability = rows.iter().find(|r| r.name == "Instance Availability").unwrap();
        assert_eq!(
            availability.database_types,
            vec![DatabaseType::Oem, DatabaseType::AuditVault, DatabaseType::Firewall]
        );
        assert_eq!(availability.display_order, 1);

        let tablespace = rows.iter().find(|r| r.name == "Tablespace Usage").unwrap();
        assert!(tablespace.is_weekly && !tablespace.is_daily);

        let names: HashSet<_> = rows.iter().map(|r| r.name.to_lowercase()).collect();
        assert_eq!(names.len(), rows.len());
    }
}
