//! Read-side skill graph queries.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::models::skill::RankedSkill;
use crate::skills::models::Relation;

/// Category label for edge endpoints pulled in from outside the top-K set.
pub const NEIGHBOR_CATEGORY: &str = "neighbor";
const NEIGHBOR_WEIGHT: f64 = 0.1;

pub async fn role_name(pool: &PgPool, role_id: i64) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT name FROM roles WHERE id = $1")
        .bind(role_id)
        .fetch_optional(pool)
        .await
}

/// Top `k` skills for a role, by weight desc then name asc.
pub async fn top_k_skills_for_role(
    pool: &PgPool,
    role_id: i64,
    k: i64,
) -> Result<Vec<RankedSkill>, sqlx::Error> {
    sqlx::query_as::<_, RankedSkill>(
        r#"
        SELECT s.name, rs.weight
        FROM role_skills rs
        JOIN skills s ON s.id = rs.skill_id
        WHERE rs.role_id = $1
        ORDER BY rs.weight DESC, s.name ASC
        LIMIT $2
        "#,
    )
    .bind(role_id)
    .bind(k)
    .fetch_all(pool)
    .await
}

/// Skills reachable from `skill_name` over one outgoing `relation` edge.
pub async fn neighbors(
    pool: &PgPool,
    skill_name: &str,
    relation: Relation,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT dst.name
        FROM skill_edges e
        JOIN skills src ON src.id = e.src_skill_id
        JOIN skills dst ON dst.id = e.dst_skill_id
        WHERE src.name = $1 AND e.relation_type = $2
        ORDER BY e.weight DESC, dst.name ASC
        "#,
    )
    .bind(skill_name)
    .bind(relation.as_str())
    .fetch_all(pool)
    .await
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphSkill {
    pub id: Option<i64>,
    pub name: String,
    pub category: Option<String>,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub src: String,
    pub dst: String,
    pub relation_type: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleSkillGraph {
    pub role_title: String,
    pub skills: Vec<GraphSkill>,
    pub edges: Vec<GraphEdge>,
    pub tags: Vec<String>,
}

#[derive(Debug, FromRow)]
struct TopSkillRow {
    id: i64,
    name: String,
    category: Option<String>,
    weight: f64,
}

#[derive(Debug, FromRow)]
struct EdgeRow {
    src_skill_id: i64,
    dst_skill_id: i64,
    relation_type: String,
    weight: f64,
}

/// The role's top skills plus the strongest edges touching them.
///
/// `include_neighbors` caps the number of edges; zero skips edges entirely.
pub async fn build_role_skill_graph(
    pool: &PgPool,
    role_id: i64,
    top_k: i64,
    include_neighbors: i64,
) -> Result<RoleSkillGraph, sqlx::Error> {
    let role_title = role_name(pool, role_id)
        .await?
        .unwrap_or_else(|| format!("Role {role_id}"));

    let top: Vec<TopSkillRow> = sqlx::query_as(
        r#"
        SELECT s.id, s.name, s.category, rs.weight
        FROM role_skills rs
        JOIN skills s ON s.id = rs.skill_id
        WHERE rs.role_id = $1
        ORDER BY rs.weight DESC, s.name ASC
        LIMIT $2
        "#,
    )
    .bind(role_id)
    .bind(top_k)
    .fetch_all(pool)
    .await?;

    if top.is_empty() {
        return Ok(RoleSkillGraph {
            role_title,
            skills: Vec::new(),
            edges: Vec::new(),
            tags: Vec::new(),
        });
    }

    let mut id_to_name: HashMap<i64, String> =
        top.iter().map(|s| (s.id, s.name.clone())).collect();
    let tags = lowercase_tags(top.iter().map(|s| s.name.as_str()));
    let skills: Vec<GraphSkill> = top
        .into_iter()
        .map(|s| GraphSkill {
            id: Some(s.id),
            name: s.name,
            category: s.category,
            weight: s.weight,
        })
        .collect();

    let mut edges = Vec::new();
    if include_neighbors > 0 {
        let top_ids: Vec<i64> = id_to_name.keys().copied().collect();
        let rows: Vec<EdgeRow> = sqlx::query_as(
            r#"
            SELECT src_skill_id, dst_skill_id, relation_type, weight
            FROM skill_edges
            WHERE src_skill_id = ANY($1) OR dst_skill_id = ANY($1)
            ORDER BY weight DESC
            LIMIT $2
            "#,
        )
        .bind(&top_ids)
        .bind(include_neighbors)
        .fetch_all(pool)
        .await?;

        let missing: Vec<i64> = rows
            .iter()
            .flat_map(|r| [r.src_skill_id, r.dst_skill_id])
            .filter(|id| !id_to_name.contains_key(id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if !missing.is_empty() {
            let names: Vec<(i64, String)> =
                sqlx::query_as("SELECT id, name FROM skills WHERE id = ANY($1)")
                    .bind(&missing)
                    .fetch_all(pool)
                    .await?;
            id_to_name.extend(names);
        }

        edges = rows
            .into_iter()
            .filter_map(|r| {
                Some(GraphEdge {
                    src: id_to_name.get(&r.src_skill_id)?.clone(),
                    dst: id_to_name.get(&r.dst_skill_id)?.clone(),
                    relation_type: r.relation_type,
                    weight: r.weight,
                })
            })
            .collect();
    }

    Ok(RoleSkillGraph {
        role_title,
        skills: with_neighbor_nodes(skills, &edges),
        edges,
        tags,
    })
}

fn lowercase_tags<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    names
        .map(|n| n.to_lowercase())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Adds a low-weight node for every edge endpoint not already in `skills`.
fn with_neighbor_nodes(mut skills: Vec<GraphSkill>, edges: &[GraphEdge]) -> Vec<GraphSkill> {
    let mut have: HashSet<String> = skills.iter().map(|s| s.name.clone()).collect();
    for edge in edges {
        for name in [&edge.src, &edge.dst] {
            if have.insert(name.clone()) {
                skills.push(GraphSkill {
                    id: None,
                    name: name.clone(),
                    category: Some(NEIGHBOR_CATEGORY.to_string()),
                    weight: NEIGHBOR_WEIGHT,
                });
            }
        }
    }
    skills
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(name: &str, weight: f64) -> GraphSkill {
        GraphSkill {
            id: Some(1),
            name: name.into(),
            category: Some("language".into()),
            weight,
        }
    }

    #[test]
    fn test_lowercase_tags_are_sorted_and_unique() {
        let tags = lowercase_tags(["Python", "SQL", "python"].into_iter());
        assert_eq!(tags, vec!["python", "sql"]);
    }

    #[test]
    fn test_neighbor_nodes_added_once_for_missing_endpoints() {
        let skills = vec![skill("Python", 0.9)];
        let edges = vec![
            GraphEdge {
                src: "Python".into(),
                dst: "Pandas".into(),
                relation_type: "related_to".into(),
                weight: 0.7,
            },
            GraphEdge {
                src: "Pandas".into(),
                dst: "Python".into(),
                relation_type: "requires".into(),
                weight: 0.6,
            },
        ];
        let out = with_neighbor_nodes(skills, &edges);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].name, "Pandas");
        assert_eq!(out[1].id, None);
        assert_eq!(out[1].category.as_deref(), Some(NEIGHBOR_CATEGORY));
        assert_eq!(out[1].weight, NEIGHBOR_WEIGHT);
    }
}
