//! Member profile projections.
//!
//! Profiles are reference data owned by the wider organization-management
//! system. The scan engine only ever reads them joined with their
//! organization and (optional) department, so the only model here is that
//! joined projection.

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Flat row shape produced by the profile join query.
///
/// # Query Shape
///
/// ```sql
/// SELECT p.id, p.display_name,
///        o.id AS organization_id, o.name AS organization_name,
///        d.id AS department_id, d.name AS department_name
/// FROM profiles p
/// JOIN organizations o ON o.id = p.organization_id
/// LEFT JOIN departments d ON d.id = p.department_id
/// ```
#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub display_name: String,
    pub organization_id: Uuid,
    pub organization_name: String,
    pub department_id: Option<Uuid>,
    pub department_name: Option<String>,
}

/// Organization reference embedded in responses.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationRef {
    pub id: Uuid,
    pub name: String,
}

/// Department reference embedded in responses.
#[derive(Debug, Clone, Serialize)]
pub struct DepartmentRef {
    pub id: Uuid,
    pub name: String,
}

/// Profile summary returned to scanners and profile owners.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "display_name": "Ada Lovelace",
///   "organization": { "id": "…", "name": "Acme" },
///   "department": { "id": "…", "name": "Engineering" }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub id: Uuid,
    pub display_name: String,
    pub organization: OrganizationRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<DepartmentRef>,
}

impl From<ProfileRow> for ProfileSummary {
    fn from(row: ProfileRow) -> Self {
        let department = match (row.department_id, row.department_name) {
            (Some(id), Some(name)) => Some(DepartmentRef { id, name }),
            _ => None,
        };

        Self {
            id: row.id,
            display_name: row.display_name,
            organization: OrganizationRef {
                id: row.organization_id,
                name: row.organization_name,
            },
            department,
        }
    }
}
