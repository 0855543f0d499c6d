use std::fmt;

use uuid::Uuid;

/// Correlation ID that follows one monitoring session across cycles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceId(Uuid);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_hyphenated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_ids_are_unique() {
        assert_ne!(TraceId::new(), TraceId::new());
    }

    #[test]
    fn display_is_hyphenated_uuid() {
        let id = TraceId::new();
        let s = id.to_string();

        assert_eq!(s.len(), 36);
        assert_eq!(s, id.as_uuid().as_hyphenated().to_string());
    }
}
