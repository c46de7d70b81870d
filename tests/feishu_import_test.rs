use anyhow::Result;
use fund_sync::adapters::csv_store::parse_rows;
use fund_sync::config::toml_config::FeishuConfig;
use fund_sync::core::sync::SyncOptions;
use fund_sync::core::Throttle;
use fund_sync::utils::cancel::CancelFlag;
use fund_sync::utils::retry::RetryPolicy;
use fund_sync::{DryRunStore, FeishuStore, RecordSynchronizer, SyncEngine};
use httpmock::prelude::*;
use serde_json::json;

const RECORDS_PATH: &str = "/open-apis/bitable/v1/apps/bascnApp/tables/tblHoldings/records";

const EXPORT: &str = "\u{feff}序号,基金代码,基金名称,交易账户,持有份额,资产情况（结算币种）
1,000001,华夏成长,A100,\"1,000.00\",\"1,523.40\"
2,110011,易方达优质精选,A100,500,800.5
3,161725,招商中证白酒,B200,10,20
,,,,,
打印时间：2025-06-30 15:00,,,,,
";

fn config(server: &MockServer) -> FeishuConfig {
    FeishuConfig {
        base_url: server.base_url(),
        app_id: Some("cli_test".to_string()),
        app_secret: Some("secret".to_string()),
        app_token: "bascnApp".to_string(),
        table_id: "tblHoldings".to_string(),
        ..Default::default()
    }
}

fn options() -> SyncOptions {
    SyncOptions {
        throttle: Throttle::none(),
        page_size: 500,
        ..Default::default()
    }
}

fn mock_remote(server: &MockServer) {
    server.mock(|when, then| {
        when.method(POST).path("/open-apis/auth/v3/tenant_access_token/internal");
        then.status(200).json_body(json!({
            "code": 0, "msg": "ok", "tenant_access_token": "t-import", "expire": 7200
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path(RECORDS_PATH).query_param("page_size", "500");
        then.status(200).json_body(json!({
            "code": 0,
            "data": {
                "items": [
                    {"record_id": "recA", "fields": {
                        "基金代码": "000001", "交易账户": "A100", "基金名称": "华夏成长",
                        "序号": 1, "持有份额": 900, "资产情况": 1400.1
                    }},
                    {"record_id": "recB", "fields": {
                        "基金代码": "110011", "交易账户": "A100", "基金名称": "易方达优质精选",
                        "序号": 2, "持有份额": 500, "资产情况": 800.5
                    }}
                ],
                "has_more": false
            }
        }));
    });
}

#[tokio::test]
async fn test_import_updates_changed_and_creates_new() -> Result<()> {
    let server = MockServer::start();
    mock_remote(&server);

    let update = server.mock(|when, then| {
        when.method(PUT)
            .path(format!("{}/recA", RECORDS_PATH))
            .header("authorization", "Bearer t-import")
            .json_body(json!({"fields": {"持有份额": 1000.0, "资产情况": 1523.4}}));
        then.status(200).json_body(json!({"code": 0, "data": {}}));
    });
    let unchanged = server.mock(|when, then| {
        when.method(PUT).path(format!("{}/recB", RECORDS_PATH));
        then.status(200).json_body(json!({"code": 0, "data": {}}));
    });
    let create = server.mock(|when, then| {
        when.method(POST)
            .path(RECORDS_PATH)
            .body_contains("161725");
        then.status(200).json_body(json!({
            "code": 0,
            "data": {"record": {"record_id": "recC", "fields": {}}}
        }));
    });

    let store = FeishuStore::new(config(&server))?.with_retry(RetryPolicy::none());
    let rows = parse_rows(EXPORT.as_bytes())?;
    let job = RecordSynchronizer::new(store, rows, options());
    let summary = SyncEngine::new(job).run(&CancelFlag::new()).await?;

    assert_eq!(summary.total, 5);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.created, 1);
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.failed, 0);
    update.assert();
    unchanged.assert_hits(0);
    create.assert();
    Ok(())
}

#[tokio::test]
async fn test_dry_run_sends_no_writes() -> Result<()> {
    let server = MockServer::start();
    mock_remote(&server);
    let writes = server.mock(|when, then| {
        when.method(PUT);
        then.status(500);
    });

    let remote = FeishuStore::new(config(&server))?.with_retry(RetryPolicy::none());
    let store = DryRunStore::new(remote);
    let rows = parse_rows(EXPORT.as_bytes())?;
    let job = RecordSynchronizer::new(store, rows, options());
    let summary = SyncEngine::new(job).run(&CancelFlag::new()).await?;

    assert_eq!(summary.updated, 1);
    assert_eq!(summary.created, 1);
    writes.assert_hits(0);
    Ok(())
}
