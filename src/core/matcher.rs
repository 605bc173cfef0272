use crate::core::normalize::normalize;
use crate::domain::model::{MatchRule, RuleSource};

impl MatchRule {
    /// Builds a rule from raw table text. Pattern and scope are normalized; a
    /// blank scope means "any town".
    pub fn new(pattern: &str, target_label: &str, scope_location: Option<&str>, source: RuleSource) -> Self {
        let scope_location = scope_location.map(normalize).filter(|s| !s.is_empty());

        Self {
            pattern: normalize(pattern),
            target_label: target_label.trim().to_string(),
            scope_location,
            source,
        }
    }

    fn applies_to_town(&self, normalized_town: &str) -> bool {
        match &self.scope_location {
            Some(scope) => normalized_town.contains(scope.as_str()),
            None => true,
        }
    }

    fn matches_address(&self, normalized_address: &str) -> bool {
        !self.pattern.is_empty() && normalized_address.contains(self.pattern.as_str())
    }
}

/// Returns the first rule, in slice order, whose scope admits the town and
/// whose pattern occurs in the address. An empty pattern never matches.
pub fn find_match<'a>(
    normalized_address: &str,
    normalized_town: &str,
    rules: &'a [MatchRule],
) -> Option<&'a MatchRule> {
    rules
        .iter()
        .filter(|rule| rule.applies_to_town(normalized_town))
        .find(|rule| rule.matches_address(normalized_address))
}

/// Rules ordered longest pattern first, ties kept in load order, so the most
/// specific pattern wins when several overlap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<MatchRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<MatchRule>) -> Self {
        let mut rules: Vec<MatchRule> = rules
            .into_iter()
            .filter(|rule| !rule.pattern.is_empty() && !rule.target_label.is_empty())
            .collect();

        rules.sort_by_key(|rule| std::cmp::Reverse(rule.pattern.chars().count()));

        Self { rules }
    }

    pub fn rules(&self) -> &[MatchRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn find(&self, normalized_address: &str, normalized_town: &str) -> Option<&MatchRule> {
        find_match(normalized_address, normalized_town, &self.rules)
    }
}

impl FromIterator<MatchRule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = MatchRule>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
