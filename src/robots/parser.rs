//! Robots.txt parser implementation
//!
//! Tokenizing is delegated to the robotstxt crate (Google's robots.txt parser
//! port); this module groups the emitted directives by user agent and keeps
//! the allow/disallow patterns that apply to us, in declaration order.

use robotstxt::{parse_robotstxt, RobotsParseHandler};
use std::time::Duration;

/// Smallest Crawl-delay honoured; lower values are raised to this
pub const MIN_CRAWL_DELAY: Duration = Duration::from_millis(500);

/// Largest Crawl-delay honoured; higher values are lowered to this
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(60 * 60);

/// Rules from a robots.txt that apply to one user agent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRules {
    pub allow_rules: Vec<String>,
    pub disallow_rules: Vec<String>,
    pub crawl_delay: Option<Duration>,
}

impl ParsedRules {
    /// Rules that allow everything
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Rules that disallow everything
    pub fn disallow_all() -> Self {
        Self {
            disallow_rules: vec!["/".to_string()],
            ..Self::default()
        }
    }

    /// Checks a path (plus query) against the rules
    ///
    /// The matching pattern with the most literal characters wins; when an
    /// allow and a disallow pattern are equally specific, allow wins. A path
    /// no disallow pattern matches is allowed.
    pub fn is_allowed(&self, path: &str) -> bool {
        let longest_match = |rules: &[String]| {
            rules
                .iter()
                .filter(|pattern| pattern_matches(path, pattern))
                .map(|pattern| specificity(pattern))
                .max()
        };

        match longest_match(&self.disallow_rules) {
            None => true,
            Some(disallow) => longest_match(&self.allow_rules).is_some_and(|allow| allow >= disallow),
        }
    }
}

/// Parses robots.txt content and returns the rules for `user_agent`
///
/// Groups naming our product token (the part of the user agent before the
/// first `/`, case-insensitive) take precedence over the `*` group. If any
/// group names us, the `*` group is ignored entirely, even when our group
/// has no rules.
pub fn parse_rules(content: &str, user_agent: &str) -> ParsedRules {
    let mut collector = GroupCollector::new(product_token(user_agent));
    parse_robotstxt(content, &mut collector);
    collector.finish()
}

/// Extracts the lowercase product token from a user agent string
///
/// ```
/// use tidepool::robots::product_token;
///
/// assert_eq!(product_token("Tidepool/0.1 (+https://example.org)"), "tidepool");
/// assert_eq!(product_token("  *  "), "*");
/// ```
pub fn product_token(user_agent: &str) -> String {
    user_agent
        .trim()
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Number of literal characters in a pattern (wildcards don't count)
pub fn specificity(pattern: &str) -> usize {
    pattern.chars().filter(|c| *c != '*' && *c != '$').count()
}

/// Matches a robots.txt pattern against a path
///
/// Patterns are prefix matches; `*` matches any run of characters and a
/// trailing `$` anchors the pattern at the end of the path.
pub fn pattern_matches(path: &str, pattern: &str) -> bool {
    let path = path.as_bytes();
    let pattern = pattern.as_bytes();

    // Every position in `path` the pattern prefix could have consumed up to
    let mut positions = vec![0usize];

    for (i, &c) in pattern.iter().enumerate() {
        if c == b'$' && i + 1 == pattern.len() {
            return positions.contains(&path.len());
        }

        if c == b'*' {
            let first = positions[0];
            positions = (first..=path.len()).collect();
            continue;
        }

        positions = positions
            .into_iter()
            .filter(|&p| p < path.len() && path[p] == c)
            .map(|p| p + 1)
            .collect();

        if positions.is_empty() {
            return false;
        }
    }

    true
}

#[derive(Debug, Default)]
struct RuleSet {
    allow: Vec<String>,
    disallow: Vec<String>,
    crawl_delay: Option<Duration>,
}

/// Receives directives from the robotstxt tokenizer and sorts them into groups
struct GroupCollector {
    token: String,
    /// Agents named by the user-agent lines of the current group
    current_agents: Vec<String>,
    /// True while consecutive user-agent lines are being read
    reading_agents: bool,
    specific: RuleSet,
    wildcard: RuleSet,
    seen_specific: bool,
}

impl GroupCollector {
    fn new(token: String) -> Self {
        Self {
            token,
            current_agents: Vec::new(),
            reading_agents: false,
            specific: RuleSet::default(),
            wildcard: RuleSet::default(),
            seen_specific: false,
        }
    }

    /// Rule sets the current group contributes to
    fn targets(&mut self) -> Vec<&mut RuleSet> {
        self.reading_agents = false;
        let names_us = self.current_agents.iter().any(|a| *a == self.token);
        let names_all = self.current_agents.iter().any(|a| a == "*");

        let mut targets = Vec::with_capacity(2);
        if names_us {
            targets.push(&mut self.specific);
        }
        if names_all {
            targets.push(&mut self.wildcard);
        }
        targets
    }

    fn finish(self) -> ParsedRules {
        let chosen = if self.seen_specific {
            self.specific
        } else {
            self.wildcard
        };

        ParsedRules {
            allow_rules: chosen.allow,
            disallow_rules: chosen.disallow,
            crawl_delay: chosen.crawl_delay,
        }
    }
}

impl RobotsParseHandler for GroupCollector {
    fn handle_robots_start(&mut self) {}

    fn handle_robots_end(&mut self) {}

    fn handle_user_agent(&mut self, _line_num: u32, user_agent: &str) {
        if !self.reading_agents {
            self.current_agents.clear();
            self.reading_agents = true;
        }

        let agent = product_token(user_agent);
        if agent == self.token {
            self.seen_specific = true;
        }
        self.current_agents.push(agent);
    }

    fn handle_allow(&mut self, _line_num: u32, value: &str) {
        let value = value.trim();
        for target in self.targets() {
            if !value.is_empty() {
                target.allow.push(value.to_string());
            }
        }
    }

    fn handle_disallow(&mut self, _line_num: u32, value: &str) {
        let value = value.trim();
        for target in self.targets() {
            // An empty Disallow means "nothing is disallowed"
            if !value.is_empty() {
                target.disallow.push(value.to_string());
            }
        }
    }

    fn handle_sitemap(&mut self, _line_num: u32, _value: &str) {}

    fn handle_unknown_action(&mut self, _line_num: u32, action: &str, value: &str) {
        if !action.trim().eq_ignore_ascii_case("crawl-delay") {
            return;
        }

        let delay = match value.trim().parse::<f64>() {
            Ok(secs) if secs.is_finite() && secs >= 0.0 => Duration::try_from_secs_f64(secs)
                .unwrap_or(MAX_CRAWL_DELAY)
                .clamp(MIN_CRAWL_DELAY, MAX_CRAWL_DELAY),
            _ => return,
        };

        for target in self.targets() {
            target.crawl_delay = Some(delay);
        }
    }
}
