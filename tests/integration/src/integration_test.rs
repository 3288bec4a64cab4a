//! End-to-end integration test for a deployment configuration
//!
//! This test exercises the complete flow: initial variables -> server and
//! role declarations -> filtering -> per-host property merge -> diagnostics.

use pretty_assertions::assert_eq;
use rig_config::{Configuration, FilterEnv};
use rig_servers::{Properties, Server};
use rig_vars::{Slot, Value};
use serde_json::json;

const STAGE: &str = r#"
application = "shop"
repo_url = "git@example.com:acme/shop.git"
keep_releases = 5
linked_dirs = ["log", "tmp/pids"]

[default_env]
RAILS_ENV = "production"
"#;

/// Load the stage the way a deploy run would: seed variables, derive paths,
/// then declare the fleet.
fn load_stage(env: FilterEnv) -> Configuration {
    let mut config = Configuration::from_toml_str(STAGE)
        .unwrap()
        .with_filter_env(env);

    config
        .set_deferred("deploy_to", |vars| {
            let app = vars.fetch_value("application")?.to_plain_string();
            Ok(Slot::from(format!("/var/www/{}", app)))
        })
        .unwrap();
    config
        .set_deferred("release_path", |vars| {
            let root = vars.fetch_value("deploy_to")?.to_plain_string();
            Ok(Slot::from(format!("{}/current", root)))
        })
        .unwrap();

    config
        .role("app", ["deploy@web1", "deploy@web2"], &Properties::new())
        .unwrap();
    config
        .role(
            "db",
            ["db1", "db2"],
            &Properties::from_json(json!({"db": {"migrations": true}})),
        )
        .unwrap();
    config
        .server(
            "db2",
            Properties::from_json(json!({"primary": true, "db": {"pool": 10}})),
        )
        .unwrap();
    config
        .server(
            "deploy@worker1:2222",
            Properties::from_json(json!({"roles": ["worker"], "worker": [
                {"queue": "mail"},
                {"queue": "reports"}
            ]})),
        )
        .unwrap();

    config
}

fn hostnames(servers: &[&Server]) -> Vec<String> {
    servers.iter().map(|s| s.hostname().to_string()).collect()
}

#[test]
fn test_stage_loads_variables_and_servers() {
    let config = load_stage(FilterEnv::new());

    assert_eq!(
        config.fetch_value("release_path").unwrap(),
        Value::from("/var/www/shop/current")
    );
    assert_eq!(config.fetch_value("keep_releases").unwrap(), Value::from(5));
    assert_eq!(config.servers().len(), 5);

    let worker = config.servers().iter().find(|s| s.hostname() == "worker1").unwrap();
    assert_eq!(worker.port(), Some(2222));
    assert_eq!(worker.user(), Some("deploy"));
}

#[test]
fn test_primary_and_role_records() {
    let config = load_stage(FilterEnv::new());

    let primary = config.primary("db").unwrap().unwrap();
    assert_eq!(primary.hostname(), "db2");

    let records = config.role_properties_for(&["db"], false).unwrap();
    let db2 = records
        .iter()
        .find(|r| r.get("hostname") == Some(&Value::from("db2")))
        .unwrap();
    assert_eq!(db2.get("migrations"), Some(&Value::from(true)));
    assert_eq!(db2.get("pool"), Some(&Value::from(10)));

    let queues = config.role_properties_for(&["worker"], false).unwrap();
    assert_eq!(queues.len(), 2);
}

#[test]
fn test_filters_select_deploy_targets() {
    let mut config = load_stage(FilterEnv::new().with_roles("app,db"));
    config.add_cmdline_filter("host", ["web.*", "db2"]).unwrap();

    let targets = config.filtered_servers().unwrap();
    assert_eq!(hostnames(&targets), vec!["web1", "web2", "db2"]);
}

#[test]
fn test_per_host_merge_then_list_helpers() {
    let mut config = load_stage(FilterEnv::new());

    config.merge_properties("db2", "db").unwrap();
    assert_eq!(config.fetch_value("pool").unwrap(), Value::from(10));
    assert_eq!(config.fetch_value("primary").unwrap(), Value::from(true));

    let dirs = config.append("linked_dirs", ["public/uploads"]).unwrap();
    assert_eq!(dirs.len(), 3);
    let dirs = config.remove("linked_dirs", ["tmp/pids"]).unwrap();
    assert_eq!(dirs, vec![Value::from("log"), Value::from("public/uploads")]);
}

#[test]
fn test_diagnostics_after_a_run() {
    let mut config = load_stage(FilterEnv::new());
    {
        let mut plugin = config.variables_mut().untrusted();
        plugin.set("plugin_setting", "on").unwrap();
    }

    config.fetch_value("release_path").unwrap();
    config.fetch_value("keep_releases").unwrap();

    let unused = config.variables().unused_keys();
    assert!(unused.contains(&"repo_url".to_string()));
    assert!(unused.contains(&"plugin_setting".to_string()));
    assert!(!unused.contains(&"deploy_to".to_string()));

    assert_eq!(
        config.variables().untrusted_keys(),
        vec!["plugin_setting".to_string()]
    );

    let sites = config.variables().source_locations("plugin_setting").unwrap();
    assert_eq!(sites.len(), 1);
    assert!(sites[0].file.ends_with("integration_test.rs"));
}
