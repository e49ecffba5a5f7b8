use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleRow {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SkillRow {
    pub id: i64,
    pub name: String,
    pub canonical_name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ToolRow {
    pub id: i64,
    pub name: String,
}

/// A skill and its weight for one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RankedSkill {
    pub name: String,
    pub weight: f64,
}
