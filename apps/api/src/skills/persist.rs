//! Writes an inferred `SkillGraph` into Postgres inside one transaction.

use std::collections::HashMap;

use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

use crate::skills::models::{Relation, SkillGraph};

const UNKNOWN_ROLE: &str = "Unknown Role";
const EDGE_SOURCE: &str = "llm";

/// Persists the graph and returns `(role_id, skills ranked by importance)`.
///
/// Roles, skills and tools are get-or-create by name; role weights and edge
/// weights are last-write-wins. A `uses_tool` edge whose target is not a skill
/// of this graph is stored against the `tools` table instead. Other relations
/// are kept only between two distinct skills of the graph.
pub async fn persist_skill_graph(
    pool: &PgPool,
    graph: &SkillGraph,
) -> Result<(i64, Vec<(String, f64)>), sqlx::Error> {
    let role_title = graph.role_title.as_deref().unwrap_or(UNKNOWN_ROLE);
    let ranked = graph.ranked_skills();

    let mut tx = pool.begin().await?;
    let role_id = get_or_create_role(&mut tx, role_title).await?;

    let mut name_to_id: HashMap<&str, i64> = HashMap::new();
    for node in &graph.skills {
        let skill_id = get_or_create_skill(&mut tx, &node.name, node.category.as_str()).await?;
        name_to_id.insert(node.name.as_str(), skill_id);

        for alias in &node.aliases {
            let alias = alias.trim();
            if !alias.is_empty() && !alias.eq_ignore_ascii_case(&node.name) {
                add_alias(&mut tx, skill_id, alias).await?;
            }
        }
        upsert_role_skill(&mut tx, role_id, skill_id, node.importance).await?;
    }

    let mut stored_edges = 0usize;
    for edge in &graph.edges {
        let src = name_to_id.get(edge.source.as_str()).copied();
        let dst = name_to_id.get(edge.target.as_str()).copied();

        match (edge.relation, src, dst) {
            (Relation::UsesTool, Some(src), Some(dst)) => {
                upsert_edge(&mut tx, src, dst, edge.relation, edge.weight).await?;
                stored_edges += 1;
            }
            (Relation::UsesTool, Some(src), None) => {
                let tool_id = get_or_create_tool(&mut tx, &edge.target).await?;
                upsert_skill_tool(&mut tx, src, tool_id, edge.weight).await?;
                stored_edges += 1;
            }
            (_, Some(src), Some(dst)) if src != dst && edge.relation != Relation::UsesTool => {
                upsert_edge(&mut tx, src, dst, edge.relation, edge.weight).await?;
                stored_edges += 1;
            }
            _ => debug!(
                "Dropping edge {} -[{}]-> {}",
                edge.source,
                edge.relation.as_str(),
                edge.target
            ),
        }
    }

    tx.commit().await?;
    info!(
        "Persisted skill graph for role {role_id} ('{role_title}'): {} skills, {stored_edges} edges",
        graph.skills.len()
    );
    Ok((role_id, ranked))
}

pub async fn get_or_create_role(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
) -> Result<i64, sqlx::Error> {
    // DO UPDATE so RETURNING yields the id on conflict too.
    sqlx::query_scalar(
        r#"
        INSERT INTO roles (name) VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(name)
    .fetch_one(&mut **tx)
    .await
}

pub async fn get_or_create_skill(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
    category: &str,
) -> Result<i64, sqlx::Error> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM skills WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut **tx)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    sqlx::query_scalar(
        r#"
        INSERT INTO skills (name, canonical_name, category) VALUES ($1, $1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(category)
    .fetch_one(&mut **tx)
    .await
}

pub async fn add_alias(
    tx: &mut Transaction<'_, Postgres>,
    skill_id: i64,
    alias: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO skill_aliases (skill_id, alias) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(skill_id)
    .bind(alias)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn upsert_role_skill(
    tx: &mut Transaction<'_, Postgres>,
    role_id: i64,
    skill_id: i64,
    weight: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO role_skills (role_id, skill_id, weight) VALUES ($1, $2, $3)
        ON CONFLICT (role_id, skill_id) DO UPDATE SET weight = EXCLUDED.weight
        "#,
    )
    .bind(role_id)
    .bind(skill_id)
    .bind(weight)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn upsert_edge(
    tx: &mut Transaction<'_, Postgres>,
    src_skill_id: i64,
    dst_skill_id: i64,
    relation: Relation,
    weight: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO skill_edges (src_skill_id, dst_skill_id, relation_type, weight, source)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (src_skill_id, dst_skill_id, relation_type)
        DO UPDATE SET weight = EXCLUDED.weight, source = EXCLUDED.source
        "#,
    )
    .bind(src_skill_id)
    .bind(dst_skill_id)
    .bind(relation.as_str())
    .bind(weight)
    .bind(EDGE_SOURCE)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn get_or_create_tool(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO tools (name) VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(name)
    .fetch_one(&mut **tx)
    .await
}

pub async fn upsert_skill_tool(
    tx: &mut Transaction<'_, Postgres>,
    skill_id: i64,
    tool_id: i64,
    weight: f64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO skill_tools (skill_id, tool_id, relation_type, weight, source)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (skill_id, tool_id, relation_type)
        DO UPDATE SET weight = EXCLUDED.weight, source = EXCLUDED.source
        "#,
    )
    .bind(skill_id)
    .bind(tool_id)
    .bind(Relation::UsesTool.as_str())
    .bind(weight)
    .bind(EDGE_SOURCE)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
