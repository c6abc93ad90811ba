// Shared prompt fragments. Each feature that calls the completion endpoint keeps
// its own prompts.rs alongside it; this file holds only the cross-cutting pieces.

/// Instruction appended to prompts whose reply must be machine-readable.
pub const JSON_ONLY_INSTRUCTION: &str =
    "Верни ответ СТРОГО в формате JSON (без дополнительного текста):";

/// Tone fragment shared by every user-facing prompt.
pub const EMPATHY_INSTRUCTION: &str = "Пиши тепло, поддерживающе и без оценочных суждений. \
    Не ставь диагнозов и не используй медицинскую терминологию без необходимости.";
