// Skill graph inference prompts.

pub const SKILL_GRAPH_SYSTEM: &str = "You design compact skill graphs for technical interviews. \
    You respond with a single JSON object and nothing else.";

/// Placeholders: {categories}, {relations}, {parsed_json}, {jd_text}
pub const SKILL_GRAPH_PROMPT_TEMPLATE: &str = r#"Build a compact skill graph for interview design.
Given a parsed job description and its raw text, output a JSON SkillGraph capturing the key skills and their relations.

Rules:
- 10 to 30 skill nodes at most.
- Use canonical names ("PostgreSQL" not "Postgres", "Kubernetes" not "k8s").
- category is one of: {categories}
- importance is in [0, 1] for THIS role; higher means more important.
- level is one of: "beginner", "intermediate", "advanced".
- relation is one of: {relations}
  - "requires" for prerequisites (Docker -> Kubernetes)
  - "uses_tool" for tool usage (Python -> PyTest)
  - "part_of" for taxonomy (CNN -> Deep Learning)
  - "related_to" for conceptual linkage
  - "co_occurs_with" for frequent pairing in this JD
- Include "aliases" for name normalization.
- "tags" are short lowercase topic tags useful for searching question sites.

Schema:
{
  "role_title": "string or null",
  "tags": ["string"],
  "skills": [{"name": "string", "category": "string", "aliases": ["string"], "importance": 0.0, "level": "string"}],
  "edges": [{"source": "string", "target": "string", "relation": "string", "weight": 0.0}]
}

Parsed JD (JSON):
{parsed_json}

Raw JD:
{jd_text}"#;
