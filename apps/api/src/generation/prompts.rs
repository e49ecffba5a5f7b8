// Question-generation prompts.
// Reuses the type/difficulty fragments from llm_client::prompts.

/// Placeholders: {role_title}, {role_skills}, {target_type}, {count}, {code_lang},
/// {difficulty_policy}, {restrict_difficulty}, {types}, {difficulties}
pub const QNA_PROMPT_TEMPLATE: &str = r#"You are generating interview questions tailored to a specific role.

Role: {role_title}
Top role skills/tags: {role_skills}
Target round: {target_type}
Requested count: {count}
Coding language (if Coding): {code_lang}
Difficulty policy: {difficulty_policy}
Restrict difficulty: {restrict_difficulty}

Rules:
- If restrict difficulty is "Easy" / "Medium" / "Hard", set every item's difficulty exactly to that value.
- Technical = non-coding (concepts, debugging, systems, tradeoffs).
- Coding = clear problem statements (no full solutions; brief hints OK). Use {code_lang} terminology.
- Behavioral = STAR-style prompts tied to the role/skills.
- System Design = open-ended architecture prompts with explicit scale or constraints.
- Make tags informative (e.g., ["ml", "transformers", "optimization"], ["oops", "design patterns"]).
- {types}
- {difficulties}

Return a JSON object with this EXACT schema:
{
  "items": [
    {
      "question": "",
      "type": "",
      "difficulty": "",
      "evaluation_rubric": {"signals": [], "red_flags": [], "scoring": ""},
      "tags": [],
      "answer": null
    }
  ]
}"#;
