use crate::rules::ErrorRule;

/// Error-signal detection; a section fails on the first line that yields a message.
#[derive(Clone, Debug)]
pub struct SectionClassifier {
    rules: Vec<ErrorRule>,
}

impl SectionClassifier {
    pub fn new(rules: &[ErrorRule]) -> Self {
        Self { rules: rules.to_vec() }
    }

    /// Error message carried by `line`, if it holds an error signal.
    /// Rules are tried in priority order, so an earlier rule beats a later one
    /// on the same line. The message may be empty (a bare `Error Type:`).
    pub fn detect(&self, line: &str) -> Option<String> {
        self.rules.iter().find_map(|r| r.apply(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Dialect, ScanRules};

    fn component() -> SectionClassifier {
        SectionClassifier::new(&ScanRules::for_dialect(Dialect::Component).error_rules)
    }

    #[test]
    fn priority_applies_within_one_line() {
        let c = component();
        assert_eq!(c.detect(" Error Type: verification failed here ").unwrap(), "Error Type: verification failed here");
        assert_eq!(c.detect("Error Type: NullPointerException").unwrap(), "NullPointerException");
    }

    #[test]
    fn plain_lines_carry_no_signal() {
        let c = component();
        assert!(c.detect("step ok").is_none());
        assert!(c.detect("error: lowercase is not a marker").is_none());
        assert_eq!(c.detect("java.lang.IllegalStateException").unwrap(), "java.lang.IllegalStateException");
    }

    #[test]
    fn bare_error_type_fails_with_empty_message() {
        assert_eq!(component().detect("   Error Type:   ").as_deref(), Some(""));
    }
}
