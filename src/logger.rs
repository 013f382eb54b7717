use super::Log;

impl<T> Log<T> {
    /// Label for rule-application trace lines, present at either level.
    pub fn rule_label(&self) -> Option<&T> {
        match self {
            Log::None => None,
            Log::Rules(label) | Log::Tokens(label) => Some(label),
        }
    }

    /// Label for per-token dispatch trace lines.
    pub fn token_label(&self) -> Option<&T> {
        match self {
            Log::Tokens(label) => Some(label),
            _ => None,
        }
    }
}
