//! Whole-document parse/serialize tests through the public API.

use cp_policy::{
    register_namespace, register_opaque, Actions, Capability, Conditions, Element, FalseCondition,
    Identity, IdentityExcept, IdentityMany, IdentityOne, OpaqueElement, PolicyError, QName, Rule,
    RuleDisplayName, RuleSet, SerializeOptions, Sphere, Validity, ValidityInterval, XmlNode,
    AGP_NAMESPACE, COMMON_POLICY, NAMESPACE,
};

const PRES_RULES: &str = "urn:ietf:params:xml:ns:pres-rules";

const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- written by hand, with unusual prefixes -->
<ruleset xmlns="urn:ietf:params:xml:ns:common-policy"
         xmlns:ext="urn:ag-projects:xml:ns:common-policy"
         xmlns:pr="urn:ietf:params:xml:ns:pres-rules">
  <rule id="friends">
    <ext:display-name xml:lang="en">Friends</ext:display-name>
    <actions>
      <pr:sub-handling>allow</pr:sub-handling>
    </actions>
    <conditions>
      <validity>
        <from>2024-01-01T00:00:00Z</from>
        <until>2025-01-01T00:00:00+01:00</until>
      </validity>
      <identity>
        <one id="sip:alice@example.com"/>
        <many domain="example.com">
          <except id="sip:bob@example.com"/>
          <except domain="example.com"/>
        </many>
      </identity>
      <sphere value="work"/>
    </conditions>
  </rule>
  <rule id="blocked">
    <conditions>
      <ext:false-condition/>
    </conditions>
    <transformations/>
  </rule>
</ruleset>
"#;

// Every test that serializes vendor content registers the same entries, so
// the registries look identical to all of them whatever the test order.
fn register_vendor_kinds() {
    cp_policy::init();
    register_namespace(COMMON_POLICY, PRES_RULES, "pr", None).unwrap();
    register_opaque(Capability::Action, QName::new(PRES_RULES, "sub-handling"));
}

#[test]
fn parses_a_hand_written_document() {
    register_vendor_kinds();
    let ruleset = RuleSet::from_xml(DOCUMENT).unwrap();
    assert_eq!(ruleset.ids().collect::<Vec<_>>(), vec!["friends", "blocked"]);

    let friends = &ruleset["friends"];
    assert_eq!(
        friends.display_name().and_then(RuleDisplayName::value),
        Some("Friends")
    );
    let conditions = friends.conditions().unwrap();
    let kinds: Vec<String> = conditions
        .iter()
        .map(|item| match item {
            cp_policy::ConditionItem::Identity(_) => "identity".to_string(),
            cp_policy::ConditionItem::Sphere(_) => "sphere".to_string(),
            cp_policy::ConditionItem::Validity(_) => "validity".to_string(),
            cp_policy::ConditionItem::Extension(ext) => ext.kind().to_string(),
        })
        .collect();
    assert_eq!(kinds, vec!["identity", "sphere", "validity"]);

    let identity = conditions.identity().unwrap();
    assert!(identity.matches("sip:alice@example.com"));
    // Every example.com identity is excepted, so only alice matches.
    assert!(!identity.matches("sip:carol@example.com"));
    assert_eq!(conditions.sphere().and_then(Sphere::value), Some("work"));
    assert_eq!(conditions.validity().map(Validity::len), Some(1));

    let actions = friends.actions().unwrap();
    let sub_handling = actions.get::<OpaqueElement>().unwrap();
    assert_eq!(sub_handling.node().text, "allow");

    let blocked = &ruleset["blocked"];
    assert!(blocked
        .conditions()
        .and_then(|c| c.extension::<FalseCondition>())
        .is_some());
    assert!(blocked.transformations().unwrap().is_empty());
}

#[test]
fn serialized_document_parses_back_equal() {
    register_vendor_kinds();
    let ruleset = RuleSet::from_xml(DOCUMENT).unwrap();
    let text = ruleset.to_xml().unwrap();

    assert!(text.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
    assert!(text.contains(&format!(r#"xmlns:cp="{}""#, NAMESPACE)));
    assert!(text.contains(&format!(r#"xmlns:agp-cp="{}""#, AGP_NAMESPACE)));
    // Rule children come out in canonical order.
    let conditions_at = text.find("<cp:conditions>").unwrap();
    let actions_at = text.find("<cp:actions>").unwrap();
    let display_name_at = text.find("<agp-cp:display-name").unwrap();
    assert!(conditions_at < actions_at && actions_at < display_name_at);

    let reparsed = RuleSet::from_xml(&text).unwrap();
    assert_eq!(reparsed, ruleset);

    // A second pass is byte-for-byte stable.
    assert_eq!(reparsed.to_xml().unwrap(), text);
}

#[test]
fn registered_vendor_prefix_is_used() {
    register_vendor_kinds();

    let mut actions = Actions::new();
    actions
        .add(OpaqueElement::new(
            XmlNode::new(QName::new(PRES_RULES, "sub-handling")).with_text("confirm"),
        ))
        .unwrap();
    let mut ruleset = RuleSet::new();
    ruleset.add(Rule::new("r").with_actions(actions)).unwrap();

    let text = ruleset
        .to_xml_with(&SerializeOptions {
            indent: 0,
            declaration: false,
        })
        .unwrap();
    assert!(text.contains("<pr:sub-handling>confirm</pr:sub-handling>"), "{}", text);
}

#[test]
fn built_document_round_trips() {
    let mut conditions = Conditions::new();
    conditions
        .add(Validity::new([ValidityInterval::parse(
            "2024-06-01T08:00:00+02:00",
            "2024-06-01T18:00:00+02:00",
        )
        .unwrap()]))
        .unwrap();
    conditions
        .add(Identity::new([
            IdentityOne::new("sip:boss@corp.example").into(),
            IdentityMany::new()
                .with_exception(IdentityExcept::with_domain("spam.example"))
                .into(),
        ]))
        .unwrap();

    let mut rule = Rule::new("office-hours").with_conditions(conditions);
    rule.set_display_name(Some(RuleDisplayName::new("Office hours").with_lang("en")))
        .unwrap();

    let mut ruleset = RuleSet::new();
    ruleset.add(rule).unwrap();
    ruleset.add(Rule::new("default")).unwrap();

    let compact = SerializeOptions {
        indent: 0,
        declaration: false,
    };
    let text = ruleset.to_xml_with(&compact).unwrap();
    assert!(!text.starts_with("<?xml"));
    assert_eq!(RuleSet::from_xml(&text).unwrap(), ruleset);
}

#[test]
fn display_name_whitespace_survives_round_trip() {
    for value in ["  Work  ", "", "   ", "\tTabbed"] {
        let mut rule = Rule::new("r");
        rule.set_display_name(Some(RuleDisplayName::new(value)))
            .unwrap();
        let mut ruleset = RuleSet::new();
        ruleset.add(rule).unwrap();
        ruleset.check_validity().unwrap();

        for indent in [0, 2] {
            let text = ruleset
                .to_xml_with(&SerializeOptions {
                    indent,
                    declaration: true,
                })
                .unwrap();
            let parsed = RuleSet::from_xml(&text)
                .unwrap_or_else(|e| panic!("{:?} did not parse back: {}", value, e));
            assert_eq!(
                parsed["r"].display_name().and_then(RuleDisplayName::value),
                Some(value)
            );
            assert_eq!(parsed, ruleset);
        }
    }
}

#[test]
fn odd_validity_sequence_keeps_one_interval() {
    let input = format!(
        r#"<cp:ruleset xmlns:cp="{ns}">
             <cp:rule id="r">
               <cp:conditions>
                 <cp:validity>
                   <cp:from>2024-01-01T00:00:00Z</cp:from>
                   <cp:until>2024-02-01T00:00:00Z</cp:until>
                   <cp:from>2024-03-01T00:00:00Z</cp:from>
                 </cp:validity>
               </cp:conditions>
             </cp:rule>
           </cp:ruleset>"#,
        ns = NAMESPACE
    );
    let ruleset = RuleSet::from_xml(&input).unwrap();
    let validity = ruleset["r"].conditions().unwrap().validity().unwrap();
    assert_eq!(validity.len(), 1);
}

#[test]
fn empty_validity_cannot_be_serialized() {
    let mut conditions = Conditions::new();
    conditions.add(Validity::default()).unwrap();
    let mut ruleset = RuleSet::new();
    ruleset.add(Rule::new("r").with_conditions(conditions)).unwrap();

    match ruleset.to_xml() {
        Err(PolicyError::Validation { element, .. }) => assert_eq!(element, "validity"),
        other => panic!("expected Validation error, got {:?}", other),
    }
    assert!(ruleset.check_validity().is_err());
}

#[test]
fn index_then_delete() {
    let mut ruleset = RuleSet::new();
    ruleset.add(Rule::new("a")).unwrap();
    ruleset.add(Rule::new("b")).unwrap();
    assert_eq!(ruleset["a"].id(), "a");
    ruleset.remove("a").unwrap();
    assert!(ruleset.get("a").is_none());
    assert!(matches!(
        ruleset.remove("a"),
        Err(PolicyError::RuleNotFound { .. })
    ));
}

#[test]
fn malformed_xml_is_an_error() {
    assert!(matches!(
        RuleSet::from_xml("<ruleset xmlns=\"urn:ietf:params:xml:ns:common-policy\">"),
        Err(PolicyError::Xml { .. })
    ));
    assert!(matches!(
        RuleSet::from_xml(&format!(r#"<ruleset xmlns="{}"><rule/></ruleset>"#, NAMESPACE)),
        Err(PolicyError::Validation { .. })
    ));
}
