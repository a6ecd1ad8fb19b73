//! Robots.txt handling module
//!
//! This module fetches, parses, and caches robots.txt files and answers
//! whether a URL may be fetched under our user agent.

mod cache;
mod evaluator;
mod parser;

pub use cache::{ComplianceCache, CrawlPolicy, PolicyOrigin};
pub use evaluator::{RobotsDecision, RobotsEvaluator};
pub use parser::{
    parse_rules, pattern_matches, product_token, specificity, ParsedRules, MAX_CRAWL_DELAY,
    MIN_CRAWL_DELAY,
};
