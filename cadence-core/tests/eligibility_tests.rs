//! Snapshot construction properties: id flattening, port and health-check
//! filtering, and absence of empty groups.

use cadence_core::{AppId, Application, AppsResponse, HealthCheckResult, Snapshot, Task};
use rstest::rstest;
use serde_json::json;

fn task(id: &str, ports: &[u16], results: &[bool]) -> Task {
    Task {
        id: id.to_string(),
        host: "10.0.0.7".to_string(),
        ports: ports.to_vec(),
        health_check_results: results
            .iter()
            .map(|alive| HealthCheckResult {
                alive: *alive,
                ..HealthCheckResult::default()
            })
            .collect(),
        ..Task::default()
    }
}

fn app(id: &str, health_checked: bool, tasks: Vec<Task>) -> Application {
    Application {
        id: id.to_string(),
        health_checks: if health_checked {
            vec![json!({ "protocol": "HTTP", "path": "/health" })]
        } else {
            vec![]
        },
        tasks,
        ..Application::default()
    }
}

// ---------------------------------------------------------------------------
// 1. Identifier flattening
// ---------------------------------------------------------------------------

#[rstest]
#[case("/products/stores/someservice", "products-stores-someservice")]
#[case("/foo", "foo")]
#[case("/a/b/c", "a-b-c")]
#[case("/", "")]
fn flatten_ids(#[case] raw: &str, #[case] expected: &str) {
    assert_eq!(AppId::flatten(raw).as_str(), expected);
}

#[test]
fn snapshot_keys_are_flattened() {
    let snapshot = Snapshot::from_applications(&[app(
        "/products/stores/someservice",
        false,
        vec![task("t1", &[31000], &[])],
    )]);
    assert!(snapshot.contains(&AppId::from("products-stores-someservice")));
}

// ---------------------------------------------------------------------------
// 2. Eligibility
// ---------------------------------------------------------------------------

#[rstest]
#[case::no_ports_no_checks(false, &[], &[], false)]
#[case::no_ports_healthy(true, &[], &[true], false)]
#[case::ported_no_checks(false, &[31000], &[], true)]
#[case::checks_declared_no_results(true, &[31000], &[], false)]
#[case::one_failing(true, &[31000], &[true, false], false)]
#[case::all_alive(true, &[31000, 31001], &[true, true], true)]
#[case::results_ignored_without_declared_checks(false, &[31000], &[false], true)]
fn instance_eligibility(
    #[case] health_checked: bool,
    #[case] ports: &[u16],
    #[case] results: &[bool],
    #[case] included: bool,
) {
    let snapshot =
        Snapshot::from_applications(&[app("/svc", health_checked, vec![task("t1", ports, results)])]);
    assert_eq!(snapshot.contains(&AppId::from("svc")), included);
}

#[test]
fn only_serviceable_instances_are_kept_in_order() {
    let snapshot = Snapshot::from_applications(&[app(
        "/svc",
        true,
        vec![
            task("a", &[1], &[true]),
            task("b", &[2], &[]),
            task("c", &[3], &[false]),
            task("d", &[4], &[true, true]),
        ],
    )]);
    let group = snapshot.get(&AppId::from("svc")).expect("group present");
    let ids: Vec<&str> = group.instances.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "d"]);
}

// ---------------------------------------------------------------------------
// 3. Absence of empty groups
// ---------------------------------------------------------------------------

#[test]
fn group_without_eligible_instances_is_absent() {
    let snapshot = Snapshot::from_applications(&[
        app("/deploying", true, vec![task("t1", &[31000], &[])]),
        app("/portless", false, vec![task("t2", &[], &[])]),
        app("/scaled-to-zero", false, vec![]),
        app("/live", false, vec![task("t3", &[31002], &[])]),
    ]);
    assert_eq!(snapshot.group_count(), 1);
    assert!(snapshot.get(&AppId::from("deploying")).is_none());
    assert!(snapshot.get(&AppId::from("portless")).is_none());
    assert!(snapshot.get(&AppId::from("scaled-to-zero")).is_none());
    assert!(snapshot.groups.values().all(|g| !g.instances.is_empty()));
}

// ---------------------------------------------------------------------------
// 4. Full payload
// ---------------------------------------------------------------------------

#[test]
fn marathon_payload_builds_expected_snapshot() {
    let payload = json!({
        "apps": [
            {
                "id": "/shop/web",
                "env": { "STAGE": "prod", "SECRET": { "secret": "s1" } },
                "labels": { "cadence.vhost": "shop.example.com" },
                "healthChecks": [{ "protocol": "HTTP" }],
                "tasks": [
                    {
                        "id": "shop_web.1",
                        "appId": "/shop/web",
                        "host": "10.1.0.1",
                        "ports": [31500],
                        "servicePorts": [10001],
                        "healthCheckResults": [{ "alive": true }]
                    },
                    {
                        "id": "shop_web.2",
                        "appId": "/shop/web",
                        "host": "10.1.0.2",
                        "ports": [31501],
                        "healthCheckResults": []
                    }
                ]
            },
            { "id": "/batch/job", "tasks": [] }
        ]
    });
    let response: AppsResponse = serde_json::from_value(payload).expect("parse payload");
    let snapshot = Snapshot::from_applications(&response.apps);

    assert_eq!(snapshot.group_count(), 1);
    let group = snapshot.get(&AppId::from("shop-web")).expect("shop-web");
    assert_eq!(group.instances.len(), 1);
    assert_eq!(group.instances[0].host, "10.1.0.1");
    assert_eq!(group.instances[0].service_ports, vec![10001]);
    assert_eq!(group.env.get("STAGE").map(String::as_str), Some("prod"));
    assert!(!group.env.contains_key("SECRET"));
    assert_eq!(
        group.labels.get("cadence.vhost").map(String::as_str),
        Some("shop.example.com")
    );
}
