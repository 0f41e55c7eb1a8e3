//! Shell-glob matching for filter expressions
//!
//! Filters accept `*`, `?`, and `{a,b}` alternation; the glob is compiled
//! to an anchored regular expression and matched case-insensitively.

use regex::Regex;

use crate::error::{AirshipError, AirshipResult};

/// Compiled glob retaining its source for display
#[derive(Debug, Clone)]
pub struct GlobPredicate {
    glob: String,
    regex: Regex,
}

impl GlobPredicate {
    pub fn new(glob: &str) -> AirshipResult<GlobPredicate> {
        let pattern = glob_to_regex(glob);
        let regex = Regex::new(&pattern)
            .map_err(|e| AirshipError::invalid_spec(format!("invalid glob '{glob}': {e}")))?;
        Ok(GlobPredicate {
            glob: glob.to_string(),
            regex,
        })
    }

    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl std::fmt::Display for GlobPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.glob)
    }
}

/// Translate a shell glob into an anchored case-insensitive regex pattern
pub fn glob_to_regex(glob: &str) -> String {
    let glob = glob.trim();
    let mut regex = String::with_capacity(glob.len() * 2 + 8);
    regex.push_str("(?i)^");

    let mut escaped = false;
    let mut curly_depth = 0u32;
    for current in glob.chars() {
        match current {
            '*' => {
                regex.push_str(if escaped { "\\*" } else { ".*" });
                escaped = false;
            }
            '?' => {
                regex.push_str(if escaped { "\\?" } else { "." });
                escaped = false;
            }
            '.' | '(' | ')' | '+' | '|' | '^' | '$' => {
                regex.push('\\');
                regex.push(current);
                escaped = false;
            }
            '\\' => {
                if escaped {
                    regex.push_str("\\\\");
                    escaped = false;
                } else {
                    escaped = true;
                }
            }
            '{' => {
                if escaped {
                    regex.push_str("\\{");
                } else {
                    regex.push('(');
                    curly_depth += 1;
                }
                escaped = false;
            }
            '}' => {
                if curly_depth > 0 && !escaped {
                    regex.push(')');
                    curly_depth -= 1;
                } else {
                    regex.push_str("\\}");
                }
                escaped = false;
            }
            ',' => {
                if curly_depth > 0 && !escaped {
                    regex.push('|');
                } else {
                    regex.push(',');
                }
                escaped = false;
            }
            other => {
                escaped = false;
                if other.is_alphanumeric() || other == '-' || other == '_' || other == '/' {
                    regex.push(other);
                } else {
                    // escape anything else regex might interpret
                    regex.push_str(&regex::escape(&other.to_string()));
                }
            }
        }
    }

    regex.push('$');
    regex
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(glob: &str, value: &str) -> bool {
        GlobPredicate::new(glob).unwrap().matches(value)
    }

    #[test]
    fn test_literal() {
        assert!(matches("apple", "apple"));
        assert!(!matches("apple", "apples"));
        assert!(!matches("apple", "xapple"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(matches("Apple", "aPPLE"));
    }

    #[test]
    fn test_star() {
        assert!(matches("*.example.com", "agent1.example.com"));
        assert!(matches("agent*", "agent1.example.com"));
        assert!(matches("*", "anything"));
        assert!(!matches("*.example.com", "agent1.example.org"));
    }

    #[test]
    fn test_question_mark() {
        assert!(matches("agent?", "agent1"));
        assert!(!matches("agent?", "agent12"));
    }

    #[test]
    fn test_brace_alternation() {
        assert!(matches("agent{1,2}.example.com", "agent1.example.com"));
        assert!(matches("agent{1,2}.example.com", "agent2.example.com"));
        assert!(!matches("agent{1,2}.example.com", "agent3.example.com"));
    }

    #[test]
    fn test_dots_are_literal() {
        assert!(!matches("a.b", "axb"));
    }

    #[test]
    fn test_escaped_star() {
        assert!(matches("a\\*b", "a*b"));
        assert!(!matches("a\\*b", "axxb"));
    }
}
