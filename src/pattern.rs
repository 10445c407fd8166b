//! Object-name pattern handling.
//!
//! Queue managers accept one wildcard pattern per command and have no notion
//! of exclusions. A list such as `APP.*,!APP.TEMP*` is therefore resolved on
//! the client side: positive segments become queries, negative segments
//! filter what comes back.

/// Prefix marking an exclusion pattern.
pub const EXCLUDE_MARKER: char = '!';

/// Split a comma-separated list into trimmed, non-empty segments.
pub fn split(patterns: &str) -> Vec<&str> {
    patterns
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// How the status queries for a pattern list are issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPlan {
    /// One wildcard query per pattern.
    Batch(Vec<String>),
    /// One query per queue in the inventory, which was already filtered by
    /// the exclusions when it was built.
    PerObject,
}

impl QueryPlan {
    pub fn resolve(patterns: &str) -> Self {
        let segments = split(patterns);
        if segments.iter().any(|s| s.contains(EXCLUDE_MARKER)) {
            return Self::PerObject;
        }
        Self::Batch(segments.into_iter().map(str::to_string).collect())
    }

    /// The names to query, given the current inventory.
    pub fn targets(&self, inventory: &[String]) -> Vec<String> {
        match self {
            Self::Batch(patterns) => patterns.clone(),
            Self::PerObject => inventory
                .iter()
                .filter(|n| !n.trim().is_empty())
                .cloned()
                .collect(),
        }
    }

    pub fn is_per_object(&self) -> bool {
        matches!(self, Self::PerObject)
    }
}

/// Include and exclude patterns for inventory queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternSet {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl PatternSet {
    pub fn parse(patterns: &str) -> Self {
        let mut set = Self::default();
        for segment in split(patterns) {
            match segment.strip_prefix(EXCLUDE_MARKER) {
                Some(negative) => {
                    let negative = negative.trim();
                    if !negative.is_empty() {
                        set.exclude.push(negative.to_string());
                    }
                }
                None => set.include.push(segment.to_string()),
            }
        }
        set
    }

    /// Patterns to send to the queue manager. An exclusion-only list
    /// queries everything and filters afterwards.
    pub fn queries(&self) -> Vec<String> {
        if self.include.is_empty() && !self.exclude.is_empty() {
            return vec!["*".to_string()];
        }
        self.include.clone()
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.exclude.iter().any(|p| wildcard_match(p, name))
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// Match `name` against a pattern in which `*` stands for any run of
/// characters. Everything else matches literally.
///
/// Only `*` is special. `?`, `[` and `]` are plain characters, so a glob
/// matcher such as `glob::Pattern` would accept names this one rejects.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();

    let (mut pi, mut ni) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        match p.get(pi) {
            Some('*') => {
                star = Some((pi, ni));
                pi += 1;
            }
            Some(c) if *c == n[ni] => {
                pi += 1;
                ni += 1;
            }
            _ => match star {
                // Let the last star swallow one more character.
                Some((sp, sn)) => {
                    pi = sp + 1;
                    ni = sn + 1;
                    star = Some((sp, sn + 1));
                }
                None => return false,
            },
        }
    }

    p.get(pi..).is_some_and(|rest| rest.iter().all(|c| *c == '*'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_trims_and_drops_empty() {
        assert_eq!(split(" A* , ,B*,"), vec!["A*", "B*"]);
        assert!(split("").is_empty());
        assert!(split(" , ").is_empty());
    }

    #[test]
    fn test_positive_patterns_are_batched() {
        let plan = QueryPlan::resolve("A*,B*");
        assert_eq!(
            plan,
            QueryPlan::Batch(vec!["A*".to_string(), "B*".to_string()])
        );
        assert_eq!(plan.targets(&["IGNORED".to_string()]), vec!["A*", "B*"]);
    }

    #[test]
    fn test_exclusion_switches_to_per_object() {
        let plan = QueryPlan::resolve("A*,!B1");
        assert!(plan.is_per_object());

        let inventory = vec!["A1".to_string(), String::new(), "A2".to_string()];
        let targets = plan.targets(&inventory);
        assert_eq!(targets, vec!["A1", "A2"]);
        assert!(!targets.iter().any(|t| t == "A*" || t == "!B1"));
    }

    #[test]
    fn test_empty_list_is_an_empty_batch() {
        assert_eq!(QueryPlan::resolve(""), QueryPlan::Batch(Vec::new()));
    }

    #[test]
    fn test_pattern_set_splits_include_and_exclude() {
        let set = PatternSet::parse("APP.*, !APP.TEMP*, SYSTEM.ADMIN.COMMAND.QUEUE");
        assert_eq!(set.queries(), vec!["APP.*", "SYSTEM.ADMIN.COMMAND.QUEUE"]);
        assert!(set.is_excluded("APP.TEMP.1"));
        assert!(!set.is_excluded("APP.ORDERS"));
    }

    #[test]
    fn test_exclusion_only_queries_everything() {
        let set = PatternSet::parse("!SYSTEM.*");
        assert_eq!(set.queries(), vec!["*"]);
        assert!(set.is_excluded("SYSTEM.DEFAULT.LOCAL.QUEUE"));
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("*", "ANY"));
        assert!(wildcard_match("APP.*", "APP."));
        assert!(wildcard_match("APP.*", "APP.IN"));
        assert!(!wildcard_match("APP.*", "AP"));
        assert!(wildcard_match("A*B*C", "AxxBxxC"));
        assert!(wildcard_match("A*C", "ABCBC"));
        assert!(!wildcard_match("A*C", "ABCB"));
        assert!(wildcard_match("Q1", "Q1"));
        assert!(!wildcard_match("Q1", "Q10"));
    }

    #[test]
    fn test_only_star_is_special() {
        assert!(!wildcard_match("Q?", "Q1"));
        assert!(wildcard_match("Q?", "Q?"));
        assert!(!wildcard_match("Q[12]", "Q1"));
        assert!(wildcard_match("Q[12]*", "Q[12].IN"));
    }
}
