use crate::domain::model::{MatchResult, TagMatch, Taxonomy};
use serde::{Deserialize, Serialize};
use std::ops::Range;

const MAX_TAGS: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// First two tags in taxonomy order that occur anywhere in the name.
    Simple,
    /// Longest tags first, without overlapping ranges in the name.
    #[default]
    Longest,
}

/// Finds up to two tags from a taxonomy inside a fund name.
#[derive(Debug, Clone, Copy, Default)]
pub struct TagMatcher {
    policy: MatchPolicy,
    all_occurrences: bool,
}

struct Candidate<'a> {
    tag: &'a str,
    category: &'a str,
    chars: usize,
}

impl TagMatcher {
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            policy,
            all_occurrences: false,
        }
    }

    /// Longest policy only: when the first occurrence of a tag overlaps an
    /// accepted one, try its later occurrences instead of dropping it.
    pub fn with_all_occurrences(mut self, enabled: bool) -> Self {
        self.all_occurrences = enabled;
        self
    }

    pub fn match_name(&self, name: &str, taxonomy: &Taxonomy) -> MatchResult {
        if name.is_empty() || taxonomy.is_empty() {
            return MatchResult::empty();
        }
        match self.policy {
            MatchPolicy::Simple => match_simple(name, taxonomy),
            MatchPolicy::Longest => self.match_longest(name, taxonomy),
        }
    }

    fn match_longest(&self, name: &str, taxonomy: &Taxonomy) -> MatchResult {
        let mut candidates: Vec<Candidate> = taxonomy
            .entries()
            .filter(|(tag, _)| !tag.is_empty() && name.contains(tag))
            .map(|(tag, category)| Candidate {
                tag,
                category,
                chars: tag.chars().count(),
            })
            .collect();
        // stable: equal lengths keep taxonomy order
        candidates.sort_by(|a, b| b.chars.cmp(&a.chars));

        let mut claimed: Vec<Range<usize>> = Vec::new();
        let mut accepted: Vec<TagMatch> = Vec::new();

        for candidate in candidates {
            if accepted.iter().any(|m| m.tag == candidate.tag) {
                continue;
            }
            let Some(range) = self.free_range(name, candidate.tag, &claimed) else {
                continue;
            };
            claimed.push(range);
            accepted.push(TagMatch::new(candidate.tag, candidate.category));
            if accepted.len() >= MAX_TAGS {
                break;
            }
        }

        MatchResult::from_matches(accepted)
    }

    fn free_range(&self, name: &str, tag: &str, claimed: &[Range<usize>]) -> Option<Range<usize>> {
        let is_free = |range: &Range<usize>| !claimed.iter().any(|c| overlaps(c, range));

        if self.all_occurrences {
            name.match_indices(tag)
                .map(|(start, _)| start..start + tag.len())
                .find(|range| is_free(range))
        } else {
            let start = name.find(tag)?;
            let range = start..start + tag.len();
            is_free(&range).then_some(range)
        }
    }
}

fn match_simple(name: &str, taxonomy: &Taxonomy) -> MatchResult {
    let mut accepted: Vec<TagMatch> = Vec::new();

    for (tag, category) in taxonomy.entries() {
        if tag.is_empty() || !name.contains(tag) {
            continue;
        }
        if accepted.iter().any(|m| m.tag == tag) {
            continue;
        }
        accepted.push(TagMatch::new(tag, category));
        if accepted.len() >= MAX_TAGS {
            break;
        }
    }

    MatchResult::from_matches(accepted)
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}
