//! Cross-crate behavior checks
//!
//! Each test pins one observable rule of the variable store, the registry or
//! the filters as seen through the public APIs together.

use pretty_assertions::assert_eq;
use regex::Regex;
use rig_config::Configuration;
use rig_servers::{Criteria, Filter, FilterKind, FilterValue, Properties, Server, Servers};
use rig_vars::{Slot, Value, Variables};
use rstest::rstest;
use serde_json::json;

fn servers(names: &[&str]) -> Vec<Server> {
    names.iter().copied().map(Server::new).collect()
}

fn kept(filter: &Filter, candidates: &[Server]) -> Vec<String> {
    filter
        .filter(candidates)
        .into_iter()
        .map(|s| s.hostname().to_string())
        .collect()
}

mod store {
    use super::*;
    use pretty_assertions::assert_eq;

    #[rstest]
    #[case(Value::from("x"))]
    #[case(Value::from(42))]
    #[case(Value::list(["a", "b"]))]
    #[case(Value::from(json!({"nested": {"deep": [1, 2]}})))]
    fn set_then_fetch_returns_the_value(#[case] value: Value) {
        let mut vars = Variables::new();
        vars.set("key", value.clone()).unwrap();
        assert_eq!(vars.fetch_value("key").unwrap(), value);
    }

    #[test]
    fn nested_deferrals_unwind() {
        let mut vars = Variables::new();
        vars.set(
            "key",
            Slot::deferred(|_| Ok(Slot::deferred(|_| Ok(Slot::from("X"))))),
        )
        .unwrap();
        assert_eq!(vars.fetch_value("key").unwrap(), Value::from("X"));
    }

    #[test]
    fn one_argument_callables_come_back_unresolved() {
        let mut vars = Variables::new();
        vars.set(
            "greeting",
            Slot::callable(|name| Ok(Value::from(format!("hello {}", name.to_plain_string())))),
        )
        .unwrap();

        let callable = vars.fetch("greeting").unwrap().callable().unwrap();
        assert_eq!(
            callable.call(&Value::from("ops")).unwrap(),
            Value::from("hello ops")
        );
    }

    #[test]
    fn store_merge_is_shallow() {
        let mut vars = Variables::new();
        vars.set("a", Value::from(json!({"y": 2}))).unwrap();
        vars.merge([("a", Value::from(json!({"x": 1})))]).unwrap();
        assert_eq!(vars.fetch_value("a").unwrap(), Value::from(json!({"x": 1})));
    }
}

mod properties {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn property_merge_is_deep_and_type_aware() {
        let mut props = Properties::from_json(json!({"a": [2], "b": {"y": 2}}));
        props.merge([
            ("a", Value::from(json!([1]))),
            ("b", Value::from(json!({"x": 1}))),
        ]);
        assert_eq!(props.fetch("a"), Some(&Value::from(json!([2, 1]))));
        assert_eq!(props.fetch("b"), Some(&Value::from(json!({"x": 1, "y": 2}))));
    }

    #[test]
    fn re_registering_a_host_updates_it() {
        let mut registry = Servers::new();
        for user in ["alice", "bob"] {
            registry
                .add_host(
                    &format!("{}@h", user),
                    Properties::from_json(json!({"port": 2222})),
                )
                .unwrap();
        }
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.iter().next().unwrap().user(), Some("bob"));
    }

    #[test]
    fn role_records_never_leak_other_roles() {
        let mut registry = Servers::new();
        registry
            .add_host(
                "h",
                Properties::from_json(
                    json!({"roles": ["app", "db"], "app": {"x": 1}, "db": {"y": 2}}),
                ),
            )
            .unwrap();

        for include_non_role in [false, true] {
            let records = registry.role_properties_for(&[":app"], include_non_role).unwrap();
            assert!(!records.is_empty());
            for record in &records {
                assert_eq!(record.get("role"), Some(&Value::from("app")));
                assert_eq!(record.get("x"), Some(&Value::from(1)));
                assert!(record.get("y").is_none());
            }
        }
    }

    #[test]
    fn later_primary_wins() {
        let mut registry = Servers::new();
        registry
            .add_role("app", ["first"], &Properties::new())
            .unwrap();
        registry
            .add_role(
                "app",
                ["second"],
                &Properties::from_json(json!({"primary": true})),
            )
            .unwrap();
        assert_eq!(
            registry.fetch_primary(":app").unwrap().unwrap().hostname(),
            "second"
        );
    }

    #[test]
    fn criteria_apply_after_role_matching() {
        let mut registry = Servers::new();
        registry
            .add_role("app", ["web1", "web2"], &Properties::new())
            .unwrap();
        registry
            .add_host("web2", Properties::from_json(json!({"no_release": true})))
            .unwrap();

        let found = registry
            .roles_for(["app"], &Criteria::new().exclude_property("no_release"))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].hostname(), "web1");
    }
}

mod filters {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_criterion_matches_nothing() {
        let candidates = servers(&["web1", "db1"]);
        let filter = Filter::new(FilterKind::Host, Vec::<FilterValue>::new()).unwrap();
        assert!(kept(&filter, &candidates).is_empty());
    }

    #[rstest]
    #[case(FilterKind::Host)]
    #[case(FilterKind::Role)]
    fn all_passes_everything_through(#[case] kind: FilterKind) {
        let candidates = servers(&["web1", "db1"]);
        let filter = Filter::new(kind, ["all"]).unwrap();
        assert_eq!(kept(&filter, &candidates), vec!["web1", "db1"]);
    }

    #[rstest]
    #[case("web1", &["web1"])]
    #[case("web.*", &["web1", "web10"])]
    #[case("web1,db1", &["web1", "db1"])]
    #[case("^db", &["db1"])]
    fn host_value_forms(#[case] value: &str, #[case] expected: &[&str]) {
        let candidates = servers(&["web1", "web10", "db1"]);
        let filter = Filter::new(FilterKind::Host, [value]).unwrap();
        assert_eq!(kept(&filter, &candidates), expected.to_vec());
    }

    #[test]
    fn precompiled_patterns_are_used_verbatim() {
        let candidates = servers(&["web1", "web10", "db1"]);
        let pattern = Regex::new(r"0$").unwrap();
        let filter = Filter::new(FilterKind::Host, [FilterValue::from(pattern)]).unwrap();
        assert_eq!(kept(&filter, &candidates), vec!["web10"]);
    }

    #[test]
    fn role_filter_skips_role_less_candidates() {
        let names = vec!["app".to_string(), "web1".to_string()];
        let filter = Filter::new(FilterKind::Role, ["app"]).unwrap();
        assert!(filter.filter(&names).is_empty());
    }

    #[test]
    fn role_filter_forms() {
        let mut web = Server::new("web1");
        web.add_roles(["app", "web"]);
        let mut worker = Server::new("worker1");
        worker.add_role("app_worker");
        let candidates = vec![web, worker];

        let exact = Filter::new(FilterKind::Role, ["app"]).unwrap();
        assert_eq!(kept(&exact, &candidates), vec!["web1"]);

        let regex = Filter::new(FilterKind::Role, ["/^app/"]).unwrap();
        assert_eq!(kept(&regex, &candidates), vec!["web1", "worker1"]);
    }
}

mod facade {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn append_then_remove_on_an_unset_key() {
        let mut config = Configuration::new();
        assert_eq!(
            config.append("linked_dirs", ["a", "b"]).unwrap(),
            vec![Value::from("a"), Value::from("b")]
        );
        assert_eq!(
            config.remove("linked_dirs", ["a"]).unwrap(),
            vec![Value::from("b")]
        );
    }
}
