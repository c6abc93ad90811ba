// All prompt text for the day-analysis feature.
// Cross-cutting fragments live in llm_client::prompts.

/// Default free-text system prompt, used when none is configured.
pub const FREE_TEXT_SYSTEM: &str = "Ты опытный нейропсихолог. Анализируй текст пользователя \
    и предоставь профессиональную психологическую оценку.";

/// Separator between a caller-supplied prompt and the user's text.
pub const CUSTOM_PROMPT_SEPARATOR: &str = "\n\nТекст для анализа:\n";

/// Placeholder substituted in free-text user templates.
pub const USER_TEXT_PLACEHOLDER: &str = "{user_text}";
/// Placeholder accepted in templates written for the older printf-style format.
pub const LEGACY_USER_TEXT_PLACEHOLDER: &str = "%s";

/// Default free-text user prompt. Replace: {user_text}, {json_only_instruction}
pub const FREE_TEXT_PROMPT_TEMPLATE: &str = r#"Проанализируй следующий текст пользователя о его дне с точки зрения нейропсихологии. Обрати внимание на эмоциональное состояние, когнитивные паттерны, возможные психологические особенности.

Текст пользователя:
{user_text}

{json_only_instruction}
{
  "dayRating": <число от 1 до 10, где 1 - очень плохой день, 10 - отличный день>,
  "recommendations": [
    "Рекомендация 1 по восстановлению и улучшению состояния",
    "Рекомендация 2 по восстановлению и улучшению состояния",
    "Рекомендация 3 по восстановлению и улучшению состояния"
  ]
}

Рекомендации должны быть конкретными, практичными и направленными на восстановление психологического состояния. Ровно 3 рекомендации."#;

/// Check-in system prompt. Replace: {empathy_instruction}
pub const CHECK_IN_SYSTEM_TEMPLATE: &str = "Ты внимательный и эмпатичный нейропсихолог. \
    Пользователь прошёл короткий чекап самочувствия: пять оценок по шкале от 1 до 5 \
    и три открытых ответа. Сначала дай краткое резюме его состояния (2–3 предложения), \
    затем нумерованный список из 3–5 конкретных рекомендаций на ближайшие дни. \
    {empathy_instruction}";

/// Check-in user prompt. Replace: {ratings_block}, {answers_block}
pub const CHECK_IN_PROMPT_TEMPLATE: &str = r#"Результаты чекапа.

Оценки (1 — очень низко, 5 — очень высоко):
{ratings_block}

Ответы пользователя:
{answers_block}"#;

pub const CALMNESS_LABEL: &str = "Спокойствие";
pub const ENERGY_LABEL: &str = "Энергия";
pub const SATISFACTION_LABEL: &str = "Удовлетворённость";
pub const CONNECTION_LABEL: &str = "Связь с людьми";
pub const ENGAGEMENT_LABEL: &str = "Вовлечённость";

pub const CURRENT_STATE_LABEL: &str = "Как ты себя сейчас чувствуешь";
pub const ENERGY_MOMENTS_LABEL: &str = "Что сегодня давало энергию";
pub const MISSING_ELEMENT_LABEL: &str = "Чего не хватало";

/// Canned guidance returned when free text is too short to analyse.
pub const NEEDS_MORE_DETAIL_MESSAGE: &str =
    "Пожалуйста, опишите свой день подробнее, чтобы мы могли его проанализировать.";
pub const NEEDS_MORE_DETAIL_PROMPTS: [&str; 3] = [
    "Расскажите, какие события сегодня запомнились больше всего.",
    "Опишите, какие эмоции вы испытывали в течение дня.",
    "Поделитесь, что сегодня придало вам сил, а что забрало энергию.",
];
