//! Prefix utilities for short human-typable identifiers
//!
//! `shortest_unique_prefix` finds the minimum length at which truncating
//! every member of a string set still yields no collisions - used to print
//! short slot/agent ids instead of full UUIDs. `common_prefix_segments`
//! does the hierarchical analogue for `/`-delimited locations.

use std::collections::BTreeSet;

use crate::error::{AirshipError, AirshipResult};

/// Minimum prefix length that keeps every string in `strings` distinct,
/// floored at `min_size`
///
/// Fails on duplicate input - no prefix length can disambiguate equal
/// strings.
pub fn shortest_unique_prefix<'a>(
    strings: impl IntoIterator<Item = &'a str>,
    min_size: usize,
) -> AirshipResult<usize> {
    let strings: Vec<&str> = strings.into_iter().collect();
    if strings.len() < 2 {
        return Ok(min_size);
    }

    let sorted: BTreeSet<&str> = strings.iter().copied().collect();
    if sorted.len() != strings.len() {
        return Err(AirshipError::invalid_spec(
            "cannot compute unique prefix size for a collection with duplicate entries",
        ));
    }

    let sorted: Vec<&str> = sorted.into_iter().collect();
    Ok(shortest_unique_prefix_at(&sorted, 0).max(min_size))
}

// The algorithm, on the sorted list:
//   1. identify runs of strings sharing the character at char_position
//      (sorted input makes this a single scan)
//   2. recursively compute the unique prefix of each run, starting at the
//      next character position
//   3. the answer is 1 + the max over all runs
fn shortest_unique_prefix_at(strings: &[&str], char_position: usize) -> usize {
    let mut result = 1;

    let mut candidates = 0;
    let mut first = true;
    let mut common_char = '\0';
    let mut sequence_start = 0;

    for (index, value) in strings.iter().enumerate() {
        let Some(current_char) = value.chars().nth(char_position) else {
            // the string that is exactly the shared prefix; nothing to scan
            continue;
        };

        candidates += 1;

        if first {
            common_char = current_char;
            first = false;
            continue;
        }

        if current_char != common_char {
            if index - sequence_start > 1 {
                // only recurse into runs with more than one member
                result = result.max(
                    shortest_unique_prefix_at(&strings[sequence_start..index], char_position + 1)
                        + 1,
                );
            }
            sequence_start = index;
            common_char = current_char;
        }
    }

    // the last run
    if candidates > 1 && strings.len() - sequence_start > 1 {
        result = result.max(
            shortest_unique_prefix_at(&strings[sequence_start..], char_position + 1) + 1,
        );
    }

    result
}

/// Number of leading path segments shared by all of `strings`, capped so
/// that at least `min_size` distinguishing segments remain
///
/// Every string must start with the separator character.
pub fn common_prefix_segments<'a>(
    separator: char,
    strings: impl IntoIterator<Item = &'a str>,
    min_size: usize,
) -> AirshipResult<usize> {
    let mut parts_per_string: Vec<Vec<&str>> = Vec::new();
    let mut shortest = usize::MAX;
    for string in strings {
        let mut parts: Vec<&str> = string.split(separator).collect();
        if parts.first() != Some(&"") {
            return Err(AirshipError::invalid_spec(format!(
                "all strings must start with the separator character: {string}"
            )));
        }
        parts.remove(0);
        shortest = shortest.min(parts.len());
        parts_per_string.push(parts);
    }

    if parts_per_string.is_empty() {
        return Ok(0);
    }

    let max_shared = shortest.saturating_sub(min_size);

    let mut common = 0;
    while common < max_shared && segment_equal(common, &parts_per_string) {
        common += 1;
    }
    Ok(common)
}

fn segment_equal(segment: usize, parts_per_string: &[Vec<&str>]) -> bool {
    let Some(part) = parts_per_string[0].get(segment) else {
        return false;
    };
    parts_per_string
        .iter()
        .all(|parts| parts.get(segment) == Some(part))
}

/// Drop `segment_count` leading segments, keeping the leading separator
///
/// Strings with fewer segments than requested are returned unchanged.
pub fn trim_leading_segments(string: &str, separator: char, segment_count: usize) -> String {
    let mut segments: Vec<&str> = string.split(separator).collect();
    if segments.first() == Some(&"") {
        segments.remove(0);
    }
    if segments.len() < segment_count {
        return string.to_string();
    }
    let trimmed = segments[segment_count..].join(&separator.to_string());
    if trimmed.starts_with(separator) {
        trimmed
    } else {
        format!("{separator}{trimmed}")
    }
}

/// Truncate to at most `length` characters, never past the end
pub fn safe_truncate(string: &str, length: usize) -> String {
    string.chars().take(length).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_trivial_sets() {
        assert_eq!(shortest_unique_prefix([], 1).unwrap(), 1);
        assert_eq!(shortest_unique_prefix(["only"], 3).unwrap(), 3);
    }

    #[test]
    fn test_prefix_diverging_late() {
        // aaaa1 and aaaa2 only diverge at position 5
        assert_eq!(
            shortest_unique_prefix(["aaaa1", "aaaa2", "bbbb1"], 1).unwrap(),
            5
        );
    }

    #[test]
    fn test_prefix_diverging_early() {
        assert_eq!(shortest_unique_prefix(["apple", "banana"], 1).unwrap(), 1);
        assert_eq!(shortest_unique_prefix(["apple", "avocado"], 1).unwrap(), 2);
    }

    #[test]
    fn test_prefix_floor() {
        assert_eq!(shortest_unique_prefix(["apple", "banana"], 4).unwrap(), 4);
    }

    #[test]
    fn test_prefix_contained_string() {
        // "ab" is a prefix of "abc"; only length 3 separates them
        assert_eq!(shortest_unique_prefix(["ab", "abc"], 1).unwrap(), 3);
    }

    #[test]
    fn test_prefix_rejects_duplicates() {
        assert!(shortest_unique_prefix(["same", "same"], 1).is_err());
    }

    #[test]
    fn test_prefix_is_minimal() {
        // property check: the returned length disambiguates, one less does not
        let strings = ["cafebabe", "cafed00d", "deadbeef", "deadbea7"];
        let len = shortest_unique_prefix(strings, 1).unwrap();
        let truncated: BTreeSet<String> =
            strings.iter().map(|s| safe_truncate(s, len)).collect();
        assert_eq!(truncated.len(), strings.len());

        let shorter: BTreeSet<String> =
            strings.iter().map(|s| safe_truncate(s, len - 1)).collect();
        assert!(shorter.len() < strings.len());
    }

    #[test]
    fn test_common_segments() {
        assert_eq!(
            common_prefix_segments('/', ["/ec2/us-east/a/i-1", "/ec2/us-east/b/i-2"], 0).unwrap(),
            2
        );
        assert_eq!(
            common_prefix_segments('/', ["/ec2/us-east/a/i-1", "/ec2/us-west/b/i-2"], 0).unwrap(),
            1
        );
    }

    #[test]
    fn test_common_segments_keeps_min_size() {
        // identical paths: min_size distinguishing segments must survive
        assert_eq!(
            common_prefix_segments('/', ["/a/b/c", "/a/b/c"], 2).unwrap(),
            1
        );
    }

    #[test]
    fn test_common_segments_requires_leading_separator() {
        assert!(common_prefix_segments('/', ["a/b"], 0).is_err());
    }

    #[test]
    fn test_common_segments_empty() {
        assert_eq!(common_prefix_segments('/', [], 0).unwrap(), 0);
    }

    #[test]
    fn test_trim_leading_segments() {
        assert_eq!(trim_leading_segments("/a/b/c", '/', 0), "/a/b/c");
        assert_eq!(trim_leading_segments("/a/b/c", '/', 1), "/b/c");
        assert_eq!(trim_leading_segments("/a/b/c", '/', 2), "/c");
        // fewer segments than requested: unchanged
        assert_eq!(trim_leading_segments("/a", '/', 5), "/a");
    }

    #[test]
    fn test_safe_truncate() {
        assert_eq!(safe_truncate("abcdef", 3), "abc");
        assert_eq!(safe_truncate("ab", 5), "ab");
        assert_eq!(safe_truncate("", 5), "");
    }
}
