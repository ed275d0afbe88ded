// src/generate/prompt.rs
//! System and user prompt rendering.

use crate::model::{SearchResult, UserProfile};
use crate::text::truncate_chars;

/// Search snippets embedded in the user message are cut to this many chars.
const CONTEXT_SNIPPET_CHARS: usize = 600;

/// `- <label>: <age>yo, <weight>kg, <height>cm, <lifestyle>. Cond: a, b`
pub fn profile_line(p: &UserProfile) -> String {
    format!(
        "- {}: {}yo, {}kg, {}cm, {}. Cond: {}",
        p.label,
        p.age,
        p.weight,
        p.height,
        p.lifestyle.as_str(),
        p.conditions.join(", ")
    )
}

const SCHEMA_BLOCK: &str = r#"{
  "user_scenario": [
    { "scenario": "<exact profile label>", "verdict": "AVOID", "reasoning": "..." }
  ],
  "evidence": [
    {
      "notes": "High sodium increases hypertension risk...",
      "source_link": "https://...",
      "quote": "...",
      "relevant_scenarios": ["<exact profile label>"]
    }
  ],
  "scientific_summary": "...",
  "health_score": 50
}"#;

/// Instructions, the profile list and the report schema.
pub fn system_prompt(profiles: &[UserProfile], tool_available: bool) -> String {
    let profiles_text = profiles
        .iter()
        .map(profile_line)
        .collect::<Vec<_>>()
        .join("\n");

    let search_step = if tool_available {
        "1. Call the `optimized_search` tool (at most 3 queries in one call) for clinical evidence on the item's ingredients and the patients' conditions. Do not print the tool arguments as your answer."
    } else {
        "1. Use the search results provided with the item as your clinical evidence."
    };

    format!(
        "You are an expert Clinical Dietitian.\n\n\
         Your Objective:\n\
         Analyze the provided item against these specific patient profiles:\n\
         {profiles_text}\n\n\
         Instructions:\n\
         {search_step}\n\
         2. Consolidate your searches (search for the full meal profile rather than individual ingredients).\n\
         3. Determine a verdict (\"Recommended\", \"Caution\", \"Avoid\") for EACH profile.\n\
         4. Cite only sources you actually retrieved; every note must be supported by the page at source_link.\n\
         5. If the input is gibberish, return health_score: 0.\n\n\
         Output Format:\n\
         Return ONLY a VALID JSON object matching this schema.\n\n\
         {SCHEMA_BLOCK}\n\n\
         IMPORTANT:\n\
         - In \"relevant_scenarios\" and \"scenario\", copy the EXACT label from the profile list.\n\
         - health_score is an integer from 0 to 100.\n"
    )
}

/// The item text, followed by pre-fetched search results when there are any.
pub fn user_message(text: &str, context: &[SearchResult]) -> String {
    if context.is_empty() {
        return text.trim().to_string();
    }
    let mut out = String::from(text.trim());
    out.push_str("\n\nSearch results:\n");
    for (i, r) in context.iter().enumerate() {
        out.push_str(&format!(
            "[{}] {}\n{}\n{}\n",
            i + 1,
            r.title,
            r.url,
            truncate_chars(&r.content, CONTEXT_SNIPPET_CHARS)
        ));
    }
    out
}
