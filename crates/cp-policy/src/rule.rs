// rule.rs — A single <rule>.
//
// Children are always written as conditions, actions, transformations,
// then rule extensions (such as display-name) in the order they were set.

use crate::actions::{Actions, Transformations};
use crate::conditions::Conditions;
use crate::container::{ChildList, UNORDERED};
use crate::document::NAMESPACE;
use crate::element::Element;
use crate::error::{PolicyError, PolicyResult};
use crate::extensions::RuleDisplayName;
use crate::field::{self, FieldDef, FieldLocation, FieldType, FieldValue, Fields};
use crate::registry::{self, Capability, ExtensionElement, TypedExtension};
use crate::xml::{XmlNode, XmlWriter};

/// A named bundle of conditions, actions and transformations.
#[derive(Debug, Clone)]
pub struct Rule {
    id: String,
    conditions: Option<Conditions>,
    actions: Option<Actions>,
    transformations: Option<Transformations>,
    extensions: ChildList<Box<dyn ExtensionElement>>,
}

// An empty id counts as missing.
fn get_id(rule: &Rule) -> Option<FieldValue> {
    Some(rule.id.clone())
        .filter(|id| !id.is_empty())
        .map(FieldValue::Text)
}

fn set_id(rule: &mut Rule, value: Option<FieldValue>) -> Option<FieldValue> {
    let id = value.and_then(FieldValue::into_text).unwrap_or_default();
    Some(std::mem::replace(&mut rule.id, id))
        .filter(|id| !id.is_empty())
        .map(FieldValue::Text)
}

impl Fields for Rule {
    const ELEMENT: &'static str = "rule";
    const FIELDS: &'static [FieldDef<Self>] = &[FieldDef {
        name: "id",
        namespace: "",
        wire_name: "id",
        location: FieldLocation::Attribute,
        value_type: FieldType::Text,
        required: true,
        test_equal: true,
        get: get_id,
        set: set_id,
        onset: None,
    }];
}

impl Rule {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            conditions: None,
            actions: None,
            transformations: None,
            extensions: ChildList::new(&UNORDERED),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Rename the rule. A rule held by a `RuleSet` must be renamed through
    /// `RuleSet::modify`, which keeps ids unique.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn with_conditions(mut self, conditions: Conditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    pub fn with_actions(mut self, actions: Actions) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn with_transformations(mut self, transformations: Transformations) -> Self {
        self.transformations = Some(transformations);
        self
    }

    pub fn conditions(&self) -> Option<&Conditions> {
        self.conditions.as_ref()
    }

    pub fn conditions_mut(&mut self) -> Option<&mut Conditions> {
        self.conditions.as_mut()
    }

    pub fn set_conditions(&mut self, conditions: Option<Conditions>) {
        self.conditions = conditions;
    }

    pub fn actions(&self) -> Option<&Actions> {
        self.actions.as_ref()
    }

    pub fn actions_mut(&mut self) -> Option<&mut Actions> {
        self.actions.as_mut()
    }

    pub fn set_actions(&mut self, actions: Option<Actions>) {
        self.actions = actions;
    }

    pub fn transformations(&self) -> Option<&Transformations> {
        self.transformations.as_ref()
    }

    pub fn transformations_mut(&mut self) -> Option<&mut Transformations> {
        self.transformations.as_mut()
    }

    pub fn set_transformations(&mut self, transformations: Option<Transformations>) {
        self.transformations = transformations;
    }

    /// Rule extensions, in wire order.
    pub fn extensions(&self) -> impl Iterator<Item = &dyn ExtensionElement> {
        self.extensions.iter().map(|extension| &**extension)
    }

    /// Attach a rule extension; its kind must be registered under
    /// `Capability::RuleExtension`.
    pub fn add_extension(&mut self, extension: impl ExtensionElement) -> PolicyResult<()> {
        self.add_boxed_extension(Box::new(extension))
    }

    pub fn add_boxed_extension(&mut self, extension: Box<dyn ExtensionElement>) -> PolicyResult<()> {
        registry::ensure_accepted(Capability::RuleExtension, Self::TAG, &extension.kind())?;
        self.extensions.add(extension);
        Ok(())
    }

    /// The first rule extension of type `T`.
    pub fn extension<T: ExtensionElement>(&self) -> Option<&T> {
        self.extensions()
            .find_map(|extension| extension.as_any().downcast_ref::<T>())
    }

    /// Replace every extension of `T`'s kind with `value`.
    pub fn set_extension<T: TypedExtension>(&mut self, value: T) -> PolicyResult<()> {
        registry::ensure_accepted(Capability::RuleExtension, Self::TAG, &T::qname())?;
        self.remove_extension::<T>();
        self.extensions.add(Box::new(value));
        Ok(())
    }

    /// Remove the first rule extension equal to `extension`.
    pub fn remove_boxed_extension(
        &mut self,
        extension: &dyn ExtensionElement,
    ) -> Option<Box<dyn ExtensionElement>> {
        self.extensions
            .remove_where(|existing| existing.eq_dyn(extension))
    }

    /// Remove every extension of `T`'s kind; returns how many were removed.
    pub fn remove_extension<T: TypedExtension>(&mut self) -> usize {
        let kind = T::qname();
        let mut removed = 0;
        while self
            .extensions
            .remove_where(|extension| extension.kind() == kind)
            .is_some()
        {
            removed += 1;
        }
        removed
    }

    pub fn display_name(&self) -> Option<&RuleDisplayName> {
        self.extension::<RuleDisplayName>()
    }

    /// Set or clear the display name.
    pub fn set_display_name(&mut self, display_name: Option<RuleDisplayName>) -> PolicyResult<()> {
        match display_name {
            Some(display_name) => self.set_extension(display_name),
            None => {
                self.remove_extension::<RuleDisplayName>();
                Ok(())
            }
        }
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        field::fields_equal(self, other)
            && self.conditions == other.conditions
            && self.actions == other.actions
            && self.transformations == other.transformations
            && self.extensions == other.extensions
    }
}

fn parse_once<T: Element>(slot: &mut Option<T>, node: &XmlNode) -> PolicyResult<()> {
    if slot.is_some() {
        return Err(PolicyError::validation(
            Rule::ELEMENT,
            format!("more than one <{}> element", T::TAG),
        ));
    }
    *slot = Some(T::from_node(node)?);
    Ok(())
}

impl Element for Rule {
    const NAMESPACE: &'static str = NAMESPACE;
    const TAG: &'static str = "rule";

    fn from_node(node: &XmlNode) -> PolicyResult<Self> {
        let mut rule = Rule::new(String::new());
        field::parse_fields(&mut rule, node)?;
        for child in &node.children {
            if child.name == Conditions::qname() {
                parse_once(&mut rule.conditions, child)?;
            } else if child.name == Actions::qname() {
                parse_once(&mut rule.actions, child)?;
            } else if child.name == Transformations::qname() {
                parse_once(&mut rule.transformations, child)?;
            } else if let Some(parse) = registry::lookup(Capability::RuleExtension, &child.name) {
                rule.extensions.add(parse(child)?);
            } else {
                tracing::debug!(rule = %rule.id, element = %child.name, "skipping unregistered rule extension");
            }
        }
        Ok(rule)
    }

    fn write(&self, writer: &mut XmlWriter) -> PolicyResult<()> {
        self.check_validity()?;
        writer.start(&Self::qname(), &field::attributes(self))?;
        if let Some(conditions) = &self.conditions {
            conditions.write(writer)?;
        }
        if let Some(actions) = &self.actions {
            actions.write(writer)?;
        }
        if let Some(transformations) = &self.transformations {
            transformations.write(writer)?;
        }
        for extension in &self.extensions {
            extension.write(writer)?;
        }
        writer.end()
    }

    fn check_validity(&self) -> PolicyResult<()> {
        field::check_required(self)?;
        if let Some(conditions) = &self.conditions {
            conditions.check_validity()?;
        }
        if let Some(actions) = &self.actions {
            actions.check_validity()?;
        }
        if let Some(transformations) = &self.transformations {
            transformations.check_validity()?;
        }
        self.extensions
            .iter()
            .try_for_each(|extension| extension.check_validity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::Sphere;
    use crate::document::{AGP_NAMESPACE, COMMON_POLICY};
    use crate::extensions::FalseCondition;
    use crate::xml::{parse_tree, SerializeOptions};

    fn write(rule: &Rule) -> PolicyResult<String> {
        let options = SerializeOptions {
            indent: 0,
            declaration: false,
        };
        let mut writer = XmlWriter::new(COMMON_POLICY, &options)?;
        rule.write(&mut writer)?;
        writer.finish()
    }

    #[test]
    fn children_are_written_in_fixed_order() {
        let mut rule = Rule::new("r1");
        rule.set_display_name(Some(RuleDisplayName::new("Work hours")))
            .unwrap();
        rule.set_transformations(Some(Transformations::new()));
        rule.set_actions(Some(Actions::new()));
        let mut conditions = Conditions::new();
        conditions.add(Sphere::new("work")).unwrap();
        rule.set_conditions(Some(conditions));

        let text = write(&rule).unwrap();
        let positions: Vec<usize> = [
            "cp:conditions",
            "cp:actions",
            "cp:transformations",
            "agp-cp:display-name",
        ]
        .iter()
        .map(|tag| text.find(tag).unwrap())
        .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "{}", text);

        let reparsed = Rule::parse(&parse_tree(&text).unwrap()).unwrap();
        assert_eq!(reparsed, rule);
        assert_eq!(
            reparsed.display_name().and_then(RuleDisplayName::value),
            Some("Work hours")
        );
    }

    #[test]
    fn rule_without_id_fails_to_parse_and_write() {
        let tree = parse_tree(&format!(r#"<rule xmlns="{}"/>"#, NAMESPACE)).unwrap();
        match Rule::parse(&tree) {
            Err(PolicyError::Validation { element, .. }) => assert_eq!(element, "rule"),
            other => panic!("expected Validation error, got {:?}", other),
        }
        assert!(write(&Rule::new("")).is_err());
    }

    #[test]
    fn display_name_replaces_and_clears() {
        let mut rule = Rule::new("r");
        rule.set_display_name(Some(RuleDisplayName::new("one"))).unwrap();
        rule.set_display_name(Some(RuleDisplayName::new("two").with_lang("en")))
            .unwrap();
        assert_eq!(rule.extensions().count(), 1);
        assert_eq!(rule.display_name().and_then(RuleDisplayName::lang), Some("en"));

        rule.set_display_name(None).unwrap();
        assert!(rule.display_name().is_none());
    }

    #[test]
    fn remove_boxed_extension_takes_the_equal_one() {
        let mut rule = Rule::new("r");
        rule.add_extension(RuleDisplayName::new("Work").with_lang("en"))
            .unwrap();
        rule.add_extension(RuleDisplayName::new("Travail").with_lang("fr"))
            .unwrap();

        let removed = rule
            .remove_boxed_extension(&RuleDisplayName::new("Travail").with_lang("fr"))
            .unwrap();
        assert_eq!(
            removed.as_any().downcast_ref::<RuleDisplayName>().and_then(RuleDisplayName::lang),
            Some("fr")
        );
        assert_eq!(rule.extensions().count(), 1);
        assert_eq!(rule.display_name().and_then(RuleDisplayName::value), Some("Work"));
        assert!(rule
            .remove_boxed_extension(&RuleDisplayName::new("Travail").with_lang("fr"))
            .is_none());
    }

    #[test]
    fn condition_kinds_are_not_rule_extensions() {
        let mut rule = Rule::new("r");
        assert!(rule.add_extension(FalseCondition).is_err());
    }

    #[test]
    fn duplicate_conditions_block_is_rejected() {
        let tree = parse_tree(&format!(
            r#"<rule xmlns="{}" id="r"><conditions/><conditions/></rule>"#,
            NAMESPACE
        ))
        .unwrap();
        assert!(Rule::parse(&tree).is_err());
    }

    #[test]
    fn unknown_children_are_skipped() {
        let tree = parse_tree(&format!(
            r#"<rule xmlns="{}" xmlns:a="{}" xmlns:v="urn:vendor" id="r">
                 <v:note>ignored</v:note>
                 <a:display-name>Kept</a:display-name>
               </rule>"#,
            NAMESPACE, AGP_NAMESPACE
        ))
        .unwrap();
        let rule = Rule::parse(&tree).unwrap();
        assert_eq!(rule.extensions().count(), 1);
        assert_eq!(rule.display_name().and_then(RuleDisplayName::value), Some("Kept"));
    }
}
