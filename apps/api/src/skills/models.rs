//! Skill graph data model as returned by the LLM and stored in Postgres.

use serde::{Deserialize, Serialize};

/// Coarse taxonomy bucket for a skill. Unknown labels collapse to `Other`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Language,
    Framework,
    Library,
    Cloud,
    Db,
    Orchestration,
    Tool,
    Ml,
    Data,
    Devops,
    Testing,
    Security,
    Soft,
    Domain,
    #[default]
    #[serde(other)]
    Other,
}

impl SkillCategory {
    pub const ALL: [SkillCategory; 15] = [
        SkillCategory::Language,
        SkillCategory::Framework,
        SkillCategory::Library,
        SkillCategory::Cloud,
        SkillCategory::Db,
        SkillCategory::Orchestration,
        SkillCategory::Tool,
        SkillCategory::Ml,
        SkillCategory::Data,
        SkillCategory::Devops,
        SkillCategory::Testing,
        SkillCategory::Security,
        SkillCategory::Soft,
        SkillCategory::Domain,
        SkillCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SkillCategory::Language => "language",
            SkillCategory::Framework => "framework",
            SkillCategory::Library => "library",
            SkillCategory::Cloud => "cloud",
            SkillCategory::Db => "db",
            SkillCategory::Orchestration => "orchestration",
            SkillCategory::Tool => "tool",
            SkillCategory::Ml => "ml",
            SkillCategory::Data => "data",
            SkillCategory::Devops => "devops",
            SkillCategory::Testing => "testing",
            SkillCategory::Security => "security",
            SkillCategory::Soft => "soft",
            SkillCategory::Domain => "domain",
            SkillCategory::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    Beginner,
    Advanced,
    #[default]
    #[serde(other)]
    Intermediate,
}

/// Typed edge between two skills (or a skill and a tool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Requires,
    PartOf,
    CoOccursWith,
    UsesTool,
    #[serde(other)]
    RelatedTo,
}

impl Relation {
    pub const ALL: [Relation; 5] = [
        Relation::Requires,
        Relation::RelatedTo,
        Relation::PartOf,
        Relation::CoOccursWith,
        Relation::UsesTool,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Requires => "requires",
            Relation::RelatedTo => "related_to",
            Relation::PartOf => "part_of",
            Relation::CoOccursWith => "co_occurs_with",
            Relation::UsesTool => "uses_tool",
        }
    }
}

impl std::str::FromStr for Relation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Relation::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("unknown relation '{s}'"))
    }
}

fn default_weight() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillNode {
    pub name: String,
    #[serde(default)]
    pub category: SkillCategory,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Importance for this role, in [0, 1].
    #[serde(default = "default_weight")]
    pub importance: f64,
    #[serde(default)]
    pub level: SkillLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillEdge {
    pub source: String,
    pub target: String,
    pub relation: Relation,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillGraph {
    pub role_title: Option<String>,
    pub tags: Vec<String>,
    pub skills: Vec<SkillNode>,
    pub edges: Vec<SkillEdge>,
}

impl SkillGraph {
    /// Clamps weights into [0, 1] and drops nameless nodes and edges.
    pub fn normalized(mut self) -> Self {
        self.skills.retain(|n| !n.name.trim().is_empty());
        for node in &mut self.skills {
            node.name = node.name.trim().to_string();
            node.importance = clamp_unit(node.importance);
        }
        self.edges
            .retain(|e| !e.source.trim().is_empty() && !e.target.trim().is_empty());
        for edge in &mut self.edges {
            edge.source = edge.source.trim().to_string();
            edge.target = edge.target.trim().to_string();
            edge.weight = clamp_unit(edge.weight);
        }
        self.role_title = self
            .role_title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self
    }

    /// Skills ranked by importance desc; ties keep graph order.
    pub fn ranked_skills(&self) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .skills
            .iter()
            .map(|n| (n.name.clone(), n.importance))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        default_weight()
    } else {
        value.clamp(0.0, 1.0)
    }
}
