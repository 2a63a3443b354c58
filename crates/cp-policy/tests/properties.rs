use chrono::{DateTime, FixedOffset, TimeZone};
use cp_policy::{
    ConditionItem, Conditions, Identity, IdentityAlternative, IdentityExcept, IdentityMany,
    IdentityOne, Rule, RuleDisplayName, RuleSet, SerializeOptions, Sphere, Validity,
    ValidityInterval,
};
use proptest::prelude::*;

fn uri() -> impl Strategy<Value = String> {
    ("[a-z]{1,8}", "[a-z]{1,6}").prop_map(|(user, host)| format!("sip:{user}@{host}.example"))
}

fn domain() -> impl Strategy<Value = String> {
    "[a-z]{1,6}".prop_map(|host| format!("{host}.example"))
}

fn timestamp() -> impl Strategy<Value = DateTime<FixedOffset>> {
    // 2000-01-01 .. 2040-01-01, whole seconds, offsets on quarter hours.
    (946_684_800i64..2_208_988_800i64, -48i32..=56i32).prop_map(|(secs, quarters)| {
        let offset = FixedOffset::east_opt(quarters * 15 * 60).unwrap();
        offset.timestamp_opt(secs, 0).unwrap()
    })
}

fn except() -> impl Strategy<Value = IdentityExcept> {
    prop_oneof![
        uri().prop_map(IdentityExcept::with_id),
        domain().prop_map(IdentityExcept::with_domain),
    ]
}

fn alternative() -> impl Strategy<Value = IdentityAlternative> {
    prop_oneof![
        uri().prop_map(|id| IdentityOne::new(id).into()),
        (
            prop::option::of(domain()),
            prop::collection::vec(except(), 0..3)
        )
            .prop_map(|(domain, excepts)| {
                let mut many = IdentityMany::new();
                many.set_domain(domain);
                many.update_exceptions(excepts);
                many.into()
            }),
    ]
}

fn validity() -> impl Strategy<Value = Validity> {
    prop::collection::vec((timestamp(), timestamp()), 1..4).prop_map(|pairs| {
        Validity::new(
            pairs
                .into_iter()
                .map(|(from, until)| ValidityInterval::new(from, until)),
        )
    })
}

fn conditions() -> impl Strategy<Value = Conditions> {
    (
        prop::option::of(prop::collection::vec(alternative(), 0..4)),
        prop::option::of("[a-z]{1,10}"),
        prop::option::of(validity()),
    )
        .prop_map(|(alternatives, sphere, validity)| {
            let mut conditions = Conditions::new();
            conditions.set_validity(validity);
            conditions.set_sphere(sphere.map(Sphere::new));
            conditions.set_identity(alternatives.map(Identity::new));
            conditions
        })
}

fn rule_body() -> impl Strategy<Value = (Option<Conditions>, Option<String>)> {
    // Display names may be empty, blank or padded; all of it must survive.
    (
        prop::option::of(conditions()),
        prop::option::of("[A-Za-z \t]{0,16}"),
    )
}

fn ruleset() -> impl Strategy<Value = RuleSet> {
    prop::collection::vec(rule_body(), 0..5).prop_map(|bodies| {
        let mut ruleset = RuleSet::new();
        for (index, (conditions, display_name)) in bodies.into_iter().enumerate() {
            let mut rule = Rule::new(format!("rule-{index}"));
            rule.set_conditions(conditions);
            rule.set_display_name(display_name.map(RuleDisplayName::new))
                .unwrap();
            ruleset.add(rule).unwrap();
        }
        ruleset
    })
}

fn item_kind(item: &ConditionItem) -> &'static str {
    match item {
        ConditionItem::Identity(_) => "identity",
        ConditionItem::Sphere(_) => "sphere",
        ConditionItem::Validity(_) => "validity",
        ConditionItem::Extension(_) => "extension",
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 96,
        max_shrink_iters: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn ruleset_round_trips(ruleset in ruleset(), indent in 0usize..4) {
        let options = SerializeOptions { indent, declaration: true };
        let text = ruleset.to_xml_with(&options).unwrap();
        let parsed = RuleSet::from_xml(&text).unwrap();
        prop_assert_eq!(&parsed, &ruleset);
        prop_assert_eq!(parsed.to_xml_with(&options).unwrap(), text);
    }

    #[test]
    fn conditions_keep_wire_order(
        order in Just(vec![0usize, 1, 2]).prop_shuffle(),
        sphere in "[a-z]{1,10}",
        validity in validity(),
    ) {
        let items: Vec<ConditionItem> = vec![
            Identity::new([IdentityOne::new("sip:a@b.example").into()]).into(),
            Sphere::new(sphere).into(),
            validity.into(),
        ];
        let mut conditions = Conditions::new();
        for index in order {
            conditions.add(items[index].clone()).unwrap();
        }
        let kinds: Vec<&str> = conditions.iter().map(item_kind).collect();
        prop_assert_eq!(kinds, vec!["identity", "sphere", "validity"]);
    }

    #[test]
    fn many_without_domain_matches_unless_excepted(
        excepts in prop::collection::vec(except(), 0..4),
        candidate in uri(),
    ) {
        let excepted = excepts.iter().any(|except| !except.matches(&candidate));
        let mut many = IdentityMany::new();
        many.update_exceptions(excepts);
        prop_assert_eq!(many.matches(&candidate), !excepted);
    }
}
