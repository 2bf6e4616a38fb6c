//! Glob key filter with the same syntax as `SCAN ... MATCH`

/// Compiled key pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern {
    raw: String,
}

impl KeyPattern {
    pub fn new(raw: &str) -> Result<Self, String> {
        if raw.is_empty() {
            return Err("key pattern must not be empty".to_string());
        }
        Ok(Self {
            raw: raw.to_string(),
        })
    }

    /// Pattern text as sent to SCAN MATCH
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern matches every key
    pub fn is_match_all(&self) -> bool {
        self.raw.bytes().all(|b| b == b'*')
    }

    pub fn matches(&self, key: &[u8]) -> bool {
        glob_match(self.raw.as_bytes(), key)
    }
}

impl Default for KeyPattern {
    fn default() -> Self {
        Self {
            raw: "*".to_string(),
        }
    }
}

fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Position to resume from after the last `*`
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'*' => {
                    while p < pattern.len() && pattern[p] == b'*' {
                        p += 1;
                    }
                    if p == pattern.len() {
                        return true;
                    }
                    backtrack = Some((p, t));
                    continue;
                }
                b'?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                b'[' => {
                    if let Some((matched, next)) = match_class(pattern, p, text[t]) {
                        if matched {
                            p = next;
                            t += 1;
                            continue;
                        }
                    } else if text[t] == b'[' {
                        p += 1;
                        t += 1;
                        continue;
                    }
                }
                b'\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                }
                c => {
                    if c == text[t] {
                        p += 1;
                        t += 1;
                        continue;
                    }
                }
            }
        }

        match backtrack {
            Some((bp, bt)) => {
                p = bp;
                t = bt + 1;
                backtrack = Some((bp, bt + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&b| b == b'*')
}

/// Match one byte against the class starting at `pattern[start] == '['`.
/// Returns `(matched, index after ']')`, or None if the class is unterminated.
fn match_class(pattern: &[u8], start: usize, c: u8) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = pattern.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    let mut first = true;
    loop {
        let b = *pattern.get(i)?;
        if b == b']' && !first {
            break;
        }
        first = false;

        let lo = if b == b'\\' {
            i += 1;
            *pattern.get(i)?
        } else {
            b
        };

        if pattern.get(i + 1) == Some(&b'-') && pattern.get(i + 2).is_some_and(|&e| e != b']') {
            let hi = pattern[i + 2];
            let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
            if (lo..=hi).contains(&c) {
                matched = true;
            }
            i += 3;
        } else {
            if lo == c {
                matched = true;
            }
            i += 1;
        }
    }

    Some((matched != negate, i + 1))
}
