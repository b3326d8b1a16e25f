//! Glob matching and cursor-based scanning shared by the local backends.

/// Number of keys examined per SCAN call when the caller gives no count.
pub const DEFAULT_SCAN_COUNT: u64 = 10;

/// Glob pattern matcher for SCAN.
///
/// Supports `*`, `?`, `[abc]`, `[^abc]`, `[a-z]` and `\` escapes.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: Vec<u8>,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.as_bytes().to_vec(),
        }
    }

    /// True for `*`, which matches everything.
    pub fn is_match_all(&self) -> bool {
        self.pattern == b"*"
    }

    pub fn matches(&self, text: &str) -> bool {
        Self::matches_at(&self.pattern, text.as_bytes())
    }

    fn matches_at(pattern: &[u8], text: &[u8]) -> bool {
        let Some((&first, rest)) = pattern.split_first() else {
            return text.is_empty();
        };

        match first {
            b'*' => (0..=text.len()).any(|i| Self::matches_at(rest, &text[i..])),
            b'?' => !text.is_empty() && Self::matches_at(rest, &text[1..]),
            b'[' => {
                let Some((&c, text_rest)) = text.split_first() else {
                    return false;
                };

                let mut i = 0;
                let negate = rest.first() == Some(&b'^');
                if negate {
                    i += 1;
                }

                let mut matched = false;
                while i < rest.len() && rest[i] != b']' {
                    if rest[i] == b'\\' && i + 1 < rest.len() {
                        i += 1;
                        matched |= rest[i] == c;
                    } else if i + 2 < rest.len() && rest[i + 1] == b'-' && rest[i + 2] != b']' {
                        matched |= rest[i] <= c && c <= rest[i + 2];
                        i += 2;
                    } else {
                        matched |= rest[i] == c;
                    }
                    i += 1;
                }

                // Unclosed class never matches
                if i >= rest.len() {
                    return false;
                }
                matched != negate && Self::matches_at(&rest[i + 1..], text_rest)
            }
            b'\\' if !rest.is_empty() => {
                text.first() == Some(&rest[0]) && Self::matches_at(&rest[1..], &text[1..])
            }
            c => text.first() == Some(&c) && Self::matches_at(rest, &text[1..]),
        }
    }
}

/// One SCAN step over keys already in ascending order.
///
/// Skips the `cursor` keys examined by earlier steps, examines up to `count` more
/// (0 falls back to [`DEFAULT_SCAN_COUNT`]) and returns the matching ones with the
/// next cursor, which is 0 once no keys remain.
pub fn scan_sorted<I, S>(keys: I, cursor: u64, pattern: &str, count: u64) -> (u64, Vec<String>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let count = if count == 0 { DEFAULT_SCAN_COUNT } else { count };
    let glob = GlobPattern::new(pattern);

    let mut remaining = keys.into_iter().skip(cursor as usize).peekable();
    let mut matched = Vec::new();
    let mut examined = 0;
    while examined < count {
        let Some(key) = remaining.next() else {
            break;
        };
        examined += 1;
        let key = key.as_ref();
        if glob.is_match_all() || glob.matches(key) {
            matched.push(key.to_string());
        }
    }

    let next = if remaining.peek().is_some() {
        cursor + examined
    } else {
        0
    };
    (next, matched)
}
