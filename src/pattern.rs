//! Glob patterns for `KEYS`
//!
//! Only `*` is special: it matches any byte sequence, including an empty
//! one. Every other byte matches itself. A pattern must match the whole key.

/// A compiled glob pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// Literal runs between stars, in order
    segments: Vec<Vec<u8>>,
    /// Whether the pattern contains at least one `*`
    has_star: bool,
}

impl Pattern {
    pub fn new(pattern: &[u8]) -> Self {
        let segments: Vec<Vec<u8>> = pattern.split(|&b| b == b'*').map(<[u8]>::to_vec).collect();
        Self {
            has_star: segments.len() > 1,
            segments,
        }
    }

    /// True if this is `*` (or `**`, ...) and so matches every key
    pub fn matches_all(&self) -> bool {
        self.has_star && self.segments.iter().all(Vec::is_empty)
    }

    pub fn matches(&self, key: &[u8]) -> bool {
        if !self.has_star {
            return self.segments[0] == key;
        }

        let (first, rest) = match self.segments.split_first() {
            Some(split) => split,
            None => return false,
        };
        let (last, middle) = match rest.split_last() {
            Some(split) => split,
            None => return false,
        };

        if key.len() < first.len() + last.len()
            || !key.starts_with(first)
            || !key.ends_with(last)
        {
            return false;
        }

        // Leftmost placement of each middle run leaves the most room for the
        // ones after it, so a greedy scan is enough.
        let mut window = &key[first.len()..key.len() - last.len()];
        for segment in middle.iter().filter(|s| !s.is_empty()) {
            match find(window, segment) {
                Some(pos) => window = &window[pos + segment.len()..],
                None => return false,
            }
        }
        true
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|candidate| candidate == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_everything() {
        let pattern = Pattern::new(b"*");
        assert!(pattern.matches_all());
        assert!(pattern.matches(b""));
        assert!(pattern.matches(b"foo"));
        assert!(Pattern::new(b"***").matches_all());
    }

    #[test]
    fn test_exact_match_without_star() {
        let pattern = Pattern::new(b"foo");
        assert!(!pattern.matches_all());
        assert!(pattern.matches(b"foo"));
        assert!(!pattern.matches(b"foobar"));
        assert!(!pattern.matches(b"xfoo"));
        assert!(Pattern::new(b"").matches(b""));
        assert!(!Pattern::new(b"").matches(b"a"));
    }

    #[test]
    fn test_prefix_suffix_and_infix() {
        let prefix = Pattern::new(b"user:*");
        assert!(prefix.matches(b"user:"));
        assert!(prefix.matches(b"user:42"));
        assert!(!prefix.matches(b"session:42"));

        let suffix = Pattern::new(b"*:count");
        assert!(suffix.matches(b"page:count"));
        assert!(!suffix.matches(b"page:counter"));

        let infix = Pattern::new(b"a*b*c");
        assert!(infix.matches(b"abc"));
        assert!(infix.matches(b"axxbyyc"));
        assert!(!infix.matches(b"acb"));
    }

    #[test]
    fn test_overlapping_prefix_and_suffix() {
        // "aa" cannot serve as both the leading and trailing "a"s of "a*a*a"
        assert!(!Pattern::new(b"a*a*a").matches(b"aa"));
        assert!(Pattern::new(b"a*a*a").matches(b"aaa"));
        assert!(!Pattern::new(b"ab*ba").matches(b"aba"));
    }

    #[test]
    fn test_other_glob_characters_are_literal() {
        let pattern = Pattern::new(b"h?llo");
        assert!(pattern.matches(b"h?llo"));
        assert!(!pattern.matches(b"hello"));
        assert!(Pattern::new(b"[ab]*").matches(b"[ab]x"));
    }
}
