//! Name matching tiers used by symbol searches.

/// How strictly a candidate name matched a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier
{
    /// Byte-for-byte equal.
    Exact,
    /// Equal ignoring ASCII case.
    CaseInsensitive,
    /// Matched a `*`/`?` wildcard pattern.
    Glob,
}

impl MatchTier
{
    /// Tiers in the order searches try them.
    pub const ALL: [MatchTier; 3] = [MatchTier::Exact, MatchTier::CaseInsensitive, MatchTier::Glob];

    /// Does `candidate` satisfy `query` at this tier?
    #[must_use]
    pub fn matches(self, query: &str, candidate: &str) -> bool
    {
        match self {
            MatchTier::Exact => query == candidate,
            MatchTier::CaseInsensitive => query.eq_ignore_ascii_case(candidate),
            MatchTier::Glob => has_wildcards(query) && glob_match(query, candidate),
        }
    }
}

/// True if the query contains `*` or `?`.
#[must_use]
pub fn has_wildcards(query: &str) -> bool
{
    query.contains(['*', '?'])
}

/// Case-insensitive wildcard match. `*` matches any run, `?` any one character.
#[must_use]
pub fn glob_match(pattern: &str, text: &str) -> bool
{
    let pattern: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let text: Vec<char> = text.chars().map(|c| c.to_ascii_lowercase()).collect();

    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, consumed)) => {
                    p = star + 1;
                    t = consumed + 1;
                    backtrack = Some((star, consumed + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_glob_star_and_question()
    {
        assert!(glob_match("Ke*Thread", "KeCreateThread"));
        assert!(glob_match("ke?lock", "KeXLock"));
        assert!(glob_match("*", ""));
        assert!(!glob_match("Ke?", "Ke"));
        assert!(!glob_match("Mm*Pool", "MmAllocatePoolEx"));
    }

    #[test]
    fn test_tiers()
    {
        assert!(MatchTier::Exact.matches("Node", "Node"));
        assert!(!MatchTier::Exact.matches("node", "Node"));
        assert!(MatchTier::CaseInsensitive.matches("node", "Node"));
        assert!(!MatchTier::Glob.matches("node", "Node"));
        assert!(MatchTier::Glob.matches("No*", "Node"));
    }
}
