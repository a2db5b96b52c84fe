// Shared prompt fragments. Task-specific prompts live in `generation::prompts`.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// System prompt for free-text newsroom output.
pub const NEWSROOM_SYSTEM: &str = "You are an editor at a cryptocurrency news desk. \
    Write accurate, neutral copy. Never invent prices, dates or quotes that are \
    not present in the input. Reply with the requested text only.";
