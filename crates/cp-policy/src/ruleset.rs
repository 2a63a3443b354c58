// ruleset.rs — The <ruleset> document root.
//
// Rules are kept in document order together with an id → position index.
// Ids are unique within a rule set: `add`, `update`, `modify` and parsing
// all refuse a duplicate.

use std::collections::HashMap;
use std::ops::Index;

use crate::document::{self, COMMON_POLICY, NAMESPACE};
use crate::element::Element;
use crate::error::{PolicyError, PolicyResult};
use crate::rule::Rule;
use crate::xml::{self, SerializeOptions, XmlNode, XmlWriter};

/// An ordered collection of rules, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a common-policy document.
    pub fn from_xml(input: &str) -> PolicyResult<Self> {
        document::init();
        let root = xml::parse_tree(input)?;
        let ruleset = Self::parse(&root)?;
        tracing::debug!(rules = ruleset.len(), "parsed ruleset");
        Ok(ruleset)
    }

    /// Serialize with the default options (indented, with XML declaration).
    pub fn to_xml(&self) -> PolicyResult<String> {
        self.to_xml_with(&SerializeOptions::default())
    }

    pub fn to_xml_with(&self, options: &SerializeOptions) -> PolicyResult<String> {
        let mut writer = XmlWriter::new(COMMON_POLICY, options)?;
        self.write(&mut writer)?;
        writer.finish()
    }

    /// Append a rule; fails if its id is already taken.
    pub fn add(&mut self, rule: Rule) -> PolicyResult<()> {
        if self.index.contains_key(rule.id()) {
            return Err(PolicyError::DuplicateRuleId {
                id: rule.id().to_string(),
            });
        }
        self.index.insert(rule.id().to_string(), self.rules.len());
        self.rules.push(rule);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Rule> {
        self.index.get(id).map(|&position| &self.rules[position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Remove and return the rule with this id.
    pub fn remove(&mut self, id: &str) -> PolicyResult<Rule> {
        let position = self.index.remove(id).ok_or_else(|| PolicyError::RuleNotFound {
            id: id.to_string(),
        })?;
        let rule = self.rules.remove(position);
        self.reindex();
        Ok(rule)
    }

    /// Change a rule in place. If the change renames the rule onto an id
    /// that is already taken, the rule is restored and the call fails.
    pub fn modify<F>(&mut self, id: &str, change: F) -> PolicyResult<()>
    where
        F: FnOnce(&mut Rule),
    {
        let position = *self.index.get(id).ok_or_else(|| PolicyError::RuleNotFound {
            id: id.to_string(),
        })?;
        let original = self.rules[position].clone();
        change(&mut self.rules[position]);

        let renamed = self.rules[position].id().to_string();
        if renamed != id {
            if self.index.contains_key(&renamed) {
                self.rules[position] = original;
                return Err(PolicyError::DuplicateRuleId { id: renamed });
            }
            self.index.remove(id);
            self.index.insert(renamed, position);
        }
        Ok(())
    }

    /// Replace every rule. On a duplicate id the rule set is left unchanged.
    pub fn update(&mut self, rules: impl IntoIterator<Item = Rule>) -> PolicyResult<()> {
        let mut replacement = RuleSet::new();
        for rule in rules {
            replacement.add(rule)?;
        }
        *self = replacement;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.rules.clear();
        self.index.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    /// Rule ids in document order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(Rule::id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn reindex(&mut self) {
        self.index = self
            .rules
            .iter()
            .enumerate()
            .map(|(position, rule)| (rule.id().to_string(), position))
            .collect();
    }
}

// Equality is over the rules in order; the index is derived from them.
impl PartialEq for RuleSet {
    fn eq(&self, other: &Self) -> bool {
        self.rules == other.rules
    }
}

impl Index<&str> for RuleSet {
    type Output = Rule;

    /// Panics when no rule has this id; use `get` to check first.
    fn index(&self, id: &str) -> &Rule {
        match self.get(id) {
            Some(rule) => rule,
            None => panic!("no rule with id '{}'", id),
        }
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

impl Element for RuleSet {
    const NAMESPACE: &'static str = NAMESPACE;
    const TAG: &'static str = "ruleset";

    fn from_node(node: &XmlNode) -> PolicyResult<Self> {
        let mut ruleset = RuleSet::new();
        for child in &node.children {
            if child.name == Rule::qname() {
                ruleset.add(Rule::from_node(child)?)?;
            } else {
                tracing::debug!(element = %child.name, "ignoring unknown child of <ruleset>");
            }
        }
        Ok(ruleset)
    }

    fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()> {
        self.check_validity()?;
        if self.rules.is_empty() {
            return writer.empty(&Self::qname(), &[]);
        }
        writer.start(&Self::qname(), &[])?;
        for rule in &self.rules {
            rule.write(writer)?;
        }
        writer.end()
    }

    fn check_validity(&self) -> PolicyResult<()> {
        self.rules.iter().try_for_each(Rule::check_validity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_rules() -> RuleSet {
        let mut ruleset = RuleSet::new();
        ruleset.add(Rule::new("a")).unwrap();
        ruleset.add(Rule::new("b")).unwrap();
        ruleset
    }

    #[test]
    fn index_and_delete() {
        let mut ruleset = two_rules();
        assert_eq!(ruleset["a"].id(), "a");
        let removed = ruleset.remove("a").unwrap();
        assert_eq!(removed.id(), "a");
        assert!(ruleset.get("a").is_none());
        assert_eq!(ruleset["b"].id(), "b");
        match ruleset.remove("a") {
            Err(PolicyError::RuleNotFound { id }) => assert_eq!(id, "a"),
            other => panic!("expected RuleNotFound, got {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "no rule with id 'a'")]
    fn indexing_a_missing_id_panics() {
        let mut ruleset = two_rules();
        ruleset.remove("a").unwrap();
        let _ = &ruleset["a"];
    }

    #[test]
    fn duplicate_ids_are_rejected_and_reinsert_works() {
        let mut ruleset = two_rules();
        match ruleset.add(Rule::new("a")) {
            Err(PolicyError::DuplicateRuleId { id }) => assert_eq!(id, "a"),
            other => panic!("expected DuplicateRuleId, got {:?}", other),
        }
        ruleset.remove("a").unwrap();
        ruleset.add(Rule::new("a")).unwrap();
        assert_eq!(ruleset.ids().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn modify_reindexes_and_refuses_collisions() {
        let mut ruleset = two_rules();
        ruleset.modify("a", |rule| rule.set_id("c")).unwrap();
        assert!(ruleset.get("a").is_none());
        assert_eq!(ruleset["c"].id(), "c");

        match ruleset.modify("c", |rule| rule.set_id("b")) {
            Err(PolicyError::DuplicateRuleId { id }) => assert_eq!(id, "b"),
            other => panic!("expected DuplicateRuleId, got {:?}", other),
        }
        assert_eq!(ruleset.ids().collect::<Vec<_>>(), vec!["c", "b"]);
        assert!(ruleset.modify("zzz", |_| {}).is_err());
    }

    #[test]
    fn update_is_all_or_nothing() {
        let mut ruleset = two_rules();
        let result = ruleset.update([Rule::new("x"), Rule::new("x")]);
        assert!(result.is_err());
        assert_eq!(ruleset.len(), 2);

        ruleset.update([Rule::new("x")]).unwrap();
        assert_eq!(ruleset.ids().collect::<Vec<_>>(), vec!["x"]);
    }

    #[test]
    fn parse_rejects_duplicate_ids() {
        let input = format!(
            r#"<ruleset xmlns="{}"><rule id="a"/><rule id="a"/></ruleset>"#,
            NAMESPACE
        );
        assert!(matches!(
            RuleSet::from_xml(&input),
            Err(PolicyError::DuplicateRuleId { .. })
        ));
    }

    #[test]
    fn wrong_root_is_rejected() {
        match RuleSet::from_xml("<policy/>") {
            Err(PolicyError::UnexpectedElement { found, .. }) => assert_eq!(found, "policy"),
            other => panic!("expected UnexpectedElement, got {:?}", other),
        }
    }

    #[test]
    fn empty_ruleset_round_trips() {
        let text = RuleSet::new().to_xml().unwrap();
        assert!(text.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(RuleSet::from_xml(&text).unwrap().is_empty());
    }
}
