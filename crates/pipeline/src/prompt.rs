//! Instruction prompt sent to the content-generation oracle.

use deckfill_core::PlaceholderSet;

/// Build the instructions for filling `placeholders` from `content`.
pub fn build_prompt(content: &str, placeholders: &PlaceholderSet) -> String {
    // Serializing a set of strings cannot fail.
    let placeholders_json = serde_json::to_string_pretty(placeholders).unwrap_or_default();

    format!(
        "You fill the text boxes of a PowerPoint slide template.\n\
         \n\
         Inputs:\n\
         1. An image of the template. Use it for layout only; never copy text from it.\n\
         2. Free-form content supplied by the user.\n\
         3. The placeholders of the slide, keyed by their current text. \
         Each has a kind: \"text\" for a single block, \"list\" for one item per paragraph.\n\
         \n\
         Rules:\n\
         - Use only information present in the content. Do not invent facts.\n\
         - Summarize when the content is longer than the slide can hold; keep each value \
         close to the length of the placeholder it replaces.\n\
         - Give every placeholder a distinct, non-empty value. Never repeat a placeholder's own text.\n\
         - Placeholders that are plain numbers (\"01\", \"02\") are ordinals and may keep their value.\n\
         - Answer \"list\" placeholders with a JSON array of strings and \"text\" placeholders with a string.\n\
         - If the content is not enough to fill the slide, answer {{\"error\": \"<reason>\"}} instead.\n\
         \n\
         Output exactly one JSON object whose keys are the placeholder keys, and nothing else.\n\
         \n\
         Content:\n{content}\n\
         \n\
         Placeholders:\n{placeholders}\n",
        content = content.trim(),
        placeholders = placeholders_json
    )
}
