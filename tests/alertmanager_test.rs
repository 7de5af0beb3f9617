use cloud_runbooks::adapters::alertmanager::AlertmanagerClient;
use cloud_runbooks::domain::model::SilenceMatcher;
use cloud_runbooks::domain::ports::AlertSilencer;
use anyhow::Result;
use httpmock::prelude::*;
use std::time::Duration;

#[tokio::test]
async fn creating_a_silence_posts_the_matchers() -> Result<()> {
    let server = MockServer::start();
    let create_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v2/silences")
            .json_body_partial(
                r#"{"matchers": [{"name": "service", "value": "~.*ceph.*", "isRegex": true}]}"#,
            );
        then.status(200)
            .json_body(serde_json::json!({"silenceID": "abc-123"}));
    });

    let client = AlertmanagerClient::new(&server.base_url(), "runbook/admin");
    let silence_id = client
        .silence(
            &[SilenceMatcher::regex("service", "~.*ceph.*")],
            Duration::from_secs(4 * 3600),
            "maintenance",
        )
        .await?;

    create_mock.assert();
    assert_eq!(silence_id, "abc-123");
    Ok(())
}

#[tokio::test]
async fn a_failed_create_is_an_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v2/silences");
        then.status(500).body("kaboom");
    });

    let client = AlertmanagerClient::new(&server.base_url(), "runbook/admin");
    let result = client
        .silence(
            &[SilenceMatcher::exact("instance", "cloudcephosd1001")],
            Duration::from_secs(60),
            "maintenance",
        )
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn expiring_a_silence_deletes_it() -> Result<()> {
    let server = MockServer::start();
    let delete_mock = server.mock(|when, then| {
        when.method(DELETE).path("/api/v2/silence/abc-123");
        then.status(200);
    });

    let client = AlertmanagerClient::new(&server.base_url(), "runbook/admin");
    client.expire(&"abc-123".to_string()).await?;

    delete_mock.assert();
    Ok(())
}
