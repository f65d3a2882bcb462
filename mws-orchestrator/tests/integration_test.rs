//! Integration tests for mws-orchestrator
//!
//! Drives the workspace lifecycle against a scripted control plane: creation,
//! status polling, failure explanation, compensation and deletion.

use std::sync::Arc;
use std::time::Duration;

use mws_orchestrator::test_utils::{
    aws_workspace, missing_error, ReadStep, ScriptedControlPlane, StaticProbe,
};
use mws_orchestrator::{
    ApiError, Cloud, Network, NetworkHealth, PollPolicy, ProbePolicy, ProvisionError, Workspace,
    WorkspaceOrchestrator, WorkspaceStatus,
};

const HOST: &str = "https://accounts.cloud.example.com";
const INTERVAL: Duration = Duration::from_secs(10);
const TIMEOUT: Duration = Duration::from_secs(20 * 60);

fn orchestrator(
    control_plane: &Arc<ScriptedControlPlane>,
    probe: &Arc<StaticProbe>,
) -> WorkspaceOrchestrator {
    WorkspaceOrchestrator::new(control_plane.clone(), probe.clone())
        .with_poll_policy(PollPolicy::fixed(INTERVAL, TIMEOUT))
}

#[tokio::test(start_paused = true)]
async fn test_create_reaches_running() {
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST)
            .then_status(WorkspaceStatus::Provisioning, "Setting up")
            .then_status(WorkspaceStatus::Provisioning, "Almost there")
            .then_status(WorkspaceStatus::Running, "Workspace is running"),
    );
    let probe = Arc::new(StaticProbe::reachable());

    let mut ws = aws_workspace("acc-1", "foo");
    orchestrator(&cp, &probe)
        .create(&mut ws, TIMEOUT)
        .await
        .expect("create should succeed");

    assert_eq!(cp.reads(), 3);
    assert_eq!(probe.calls(), 1);
    assert_eq!(cp.deletes(), 0);
    assert_eq!(ws.workspace_id, Some(1000));
    assert_eq!(ws.workspace_status, WorkspaceStatus::Running);
    assert_eq!(ws.workspace_url, "https://foo.cloud.example.com");
}

#[tokio::test(start_paused = true)]
async fn test_create_waits_for_dns() {
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST).then_status(WorkspaceStatus::Running, "running"),
    );
    let probe = Arc::new(StaticProbe::unreachable_times(2));

    let mut ws = aws_workspace("acc-1", "foo");
    orchestrator(&cp, &probe)
        .create(&mut ws, TIMEOUT)
        .await
        .expect("create should succeed once reachable");

    assert_eq!(probe.calls(), 3);
    assert_eq!(cp.reads(), 3);
    assert!(!ws.workspace_url.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_workspace_is_explained_and_removed() {
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST)
            .then_status(WorkspaceStatus::Provisioning, "Setting up")
            .then_status(WorkspaceStatus::Failed, "Quota exceeded for VPCs")
            .then(ReadStep::Missing),
    );
    let probe = Arc::new(StaticProbe::reachable());

    let mut ws = aws_workspace("acc-1", "foo");
    let err = orchestrator(&cp, &probe)
        .create(&mut ws, TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Terminal(_)));
    assert!(err.to_string().contains("Quota exceeded for VPCs"));
    assert_eq!(cp.deletes(), 1);
    assert_eq!(probe.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_canceled_workspace_is_terminal() {
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST)
            .then_status(WorkspaceStatus::Canceled, "Cancelled by user")
            .then(ReadStep::Missing),
    );
    let probe = Arc::new(StaticProbe::reachable());

    let mut ws = aws_workspace("acc-1", "foo");
    let err = orchestrator(&cp, &probe)
        .create(&mut ws, TIMEOUT)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Cancelled by user");
    assert_eq!(cp.deletes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failure_includes_network_diagnostics() {
    let network = Network {
        account_id: "acc-1".into(),
        network_id: "net-1".into(),
        network_name: "prod-vpc".into(),
        vpc_status: "BROKEN".into(),
        error_messages: vec![
            NetworkHealth {
                error_type: "securityGroup".into(),
                error_message: "sg-1 blocks egress".into(),
            },
            NetworkHealth {
                error_type: "subnet".into(),
                error_message: "subnet-2 is too small".into(),
            },
        ],
    };
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST)
            .with_network(network)
            .then_status(WorkspaceStatus::Failed, "Network validation failed")
            .then(ReadStep::Missing),
    );
    let probe = Arc::new(StaticProbe::reachable());

    let mut ws = aws_workspace("acc-1", "foo");
    ws.network_id = "net-1".into();
    let err = orchestrator(&cp, &probe)
        .create(&mut ws, TIMEOUT)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Workspace failed to create: Network validation failed, network error message: \
         error: securityGroup; error_msg: sg-1 blocks egress; \
         error: subnet; error_msg: subnet-2 is too small; "
    );
    assert_eq!(cp.network_reads(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_network_becomes_the_error() {
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST)
            .with_network_error("net-9", ApiError::Transport("connection refused".into()))
            .then_status(WorkspaceStatus::Failed, "Network validation failed")
            .then(ReadStep::Missing),
    );
    let probe = Arc::new(StaticProbe::reachable());

    let mut ws = aws_workspace("acc-1", "foo");
    ws.network_id = "net-9".into();
    let err = orchestrator(&cp, &probe)
        .create(&mut ws, TIMEOUT)
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "failed to start workspace. Cannot read network: transport error: connection refused"
    );
}

#[tokio::test(start_paused = true)]
async fn test_failed_compensation_reports_both_errors() {
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST)
            .then_status(WorkspaceStatus::Failed, "Credentials are invalid")
            .fail_delete(ApiError::Response {
                status: 403,
                error_code: "PERMISSION_DENIED".into(),
                message: "not allowed to delete".into(),
            }),
    );
    let probe = Arc::new(StaticProbe::reachable());

    let mut ws = aws_workspace("acc-1", "foo");
    let err = orchestrator(&cp, &probe)
        .create(&mut ws, TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::Compensation { .. }));
    let text = err.to_string();
    assert!(text.contains("Credentials are invalid"));
    assert!(text.contains("not allowed to delete"));
    assert_eq!(cp.deletes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_create_timeout_triggers_compensation() {
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST).then_status(WorkspaceStatus::Provisioning, "Setting up"),
    );
    let probe = Arc::new(StaticProbe::reachable());

    let mut ws = aws_workspace("acc-1", "foo");
    let orchestrator = orchestrator(&cp, &probe).with_delete_timeout(INTERVAL * 3);
    let err = orchestrator
        .create(&mut ws, INTERVAL * 2)
        .await
        .unwrap_err();

    // provisioning never finishes and the workspace never disappears either
    match err {
        ProvisionError::Compensation { original, cleanup } => {
            assert!(original.is_timeout());
            assert!(original.to_string().contains("Setting up"));
            assert!(cleanup.is_timeout());
        }
        other => panic!("expected compensation error, got {other:?}"),
    }
    assert_eq!(cp.deletes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_create_error_skips_polling() {
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST).fail_create(ApiError::Response {
            status: 400,
            error_code: "INVALID_PARAMETER_VALUE".into(),
            message: "deployment name taken".into(),
        }),
    );
    let probe = Arc::new(StaticProbe::reachable());

    let mut ws = aws_workspace("acc-1", "foo");
    let err = orchestrator(&cp, &probe)
        .create(&mut ws, TIMEOUT)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("deployment name taken"));
    assert_eq!(cp.reads(), 0);
    assert_eq!(cp.deletes(), 0);
    assert!(ws.workspace_id.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_create_validates_required_fields() {
    let cp = Arc::new(ScriptedControlPlane::new(HOST));
    let probe = Arc::new(StaticProbe::reachable());

    let mut ws = Workspace::new("acc-1", "foo");
    let err = orchestrator(&cp, &probe)
        .create(&mut ws, TIMEOUT)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::InvalidInput(_)));
    assert!(cp.created().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_gcp_create_tags_cloud() {
    let cp = Arc::new(
        ScriptedControlPlane::new("https://accounts.gcp.databricks.com")
            .with_cloud(Cloud::Gcp)
            .then_status(WorkspaceStatus::Running, "running"),
    );
    let probe = Arc::new(StaticProbe::reachable());

    let mut ws = Workspace::new("acc-1", "analytics");
    ws.location = "us-central1".into();
    ws.customer_managed_key_id = "cmk-1".into();
    orchestrator(&cp, &probe)
        .create(&mut ws, TIMEOUT)
        .await
        .expect("create should succeed");

    let sent = &cp.created()[0];
    assert_eq!(sent.cloud, Some(Cloud::Gcp));
    assert_eq!(sent.managed_services_customer_managed_key_id, "cmk-1");
    assert!(sent.customer_managed_key_id.is_empty());
    assert_eq!(ws.workspace_url, "https://analytics.gcp.databricks.com");
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_running_deadline() {
    let existing = aws_workspace("acc-1", "foo");
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST)
            .with_workspace(existing.clone())
            .then_status(WorkspaceStatus::Provisioning, "Still provisioning"),
    );
    let probe = Arc::new(StaticProbe::reachable());

    let mut ws = existing;
    ws.workspace_id = Some(77);
    let err = orchestrator(&cp, &probe)
        .wait_for_running(&ws, INTERVAL * 2)
        .await
        .unwrap_err();

    assert_eq!(cp.reads(), 2);
    match err {
        ProvisionError::Timeout { last_message, .. } => {
            assert_eq!(last_message, "Still provisioning")
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_read_error_aborts_wait() {
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST)
            .then_status(WorkspaceStatus::Provisioning, "Setting up")
            .then(ReadStep::Error(ApiError::Transport("connection reset".into()))),
    );
    let probe = Arc::new(StaticProbe::reachable());

    let mut ws = aws_workspace("acc-1", "foo");
    ws.workspace_id = Some(5);
    let err = orchestrator(&cp, &probe)
        .wait_for_running(&ws, TIMEOUT)
        .await
        .unwrap_err();

    assert_eq!(cp.reads(), 2);
    assert!(matches!(err, ProvisionError::Api(ApiError::Transport(_))));
}

#[tokio::test(start_paused = true)]
async fn test_wait_without_id_is_rejected() {
    let cp = Arc::new(ScriptedControlPlane::new(HOST));
    let probe = Arc::new(StaticProbe::reachable());

    let ws = aws_workspace("acc-1", "foo");
    let err = orchestrator(&cp, &probe)
        .wait_for_running(&ws, TIMEOUT)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::InvalidInput(_)));
    assert_eq!(cp.reads(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_skip_probe_policy() {
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST).then_status(WorkspaceStatus::Running, "running"),
    );
    let probe = Arc::new(StaticProbe::unreachable_times(u32::MAX));

    let mut ws = aws_workspace("acc-1", "e2e-900150983cd24fb0");
    orchestrator(&cp, &probe)
        .with_probe_policy(ProbePolicy::SkipMatching("900150983cd24fb0".into()))
        .create(&mut ws, TIMEOUT)
        .await
        .expect("probe should be skipped");

    assert_eq!(probe.calls(), 0);
    assert_eq!(cp.reads(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_update_sends_whitelist_and_waits() {
    let mut existing = aws_workspace("acc-1", "foo");
    existing.network_id = "net-1".into();
    existing.storage_customer_managed_key_id = "skey-2".into();
    existing.pricing_tier = "ENTERPRISE".into();
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST)
            .with_workspace(existing.clone())
            .then_status(WorkspaceStatus::Provisioning, "Applying update")
            .then_status(WorkspaceStatus::Running, "running"),
    );
    let probe = Arc::new(StaticProbe::reachable());

    let mut ws = existing;
    ws.workspace_id = Some(42);
    ws.credentials_id = "creds-2".into();
    let running = orchestrator(&cp, &probe)
        .update_running(&ws, TIMEOUT)
        .await
        .expect("update should succeed");

    let updates = cp.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].credentials_id, "creds-2");
    assert_eq!(updates[0].network_id, "net-1");
    assert_eq!(
        updates[0].storage_customer_managed_key_id.as_deref(),
        Some("skey-2")
    );
    assert_eq!(cp.reads(), 2);
    assert_eq!(running.workspace_status, WorkspaceStatus::Running);
}

#[tokio::test(start_paused = true)]
async fn test_update_error_is_returned() {
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST).fail_update(ApiError::Response {
            status: 400,
            error_code: "INVALID_STATE".into(),
            message: "workspace is being deleted".into(),
        }),
    );
    let probe = Arc::new(StaticProbe::reachable());

    let mut ws = aws_workspace("acc-1", "foo");
    ws.workspace_id = Some(42);
    let err = orchestrator(&cp, &probe)
        .update_running(&ws, TIMEOUT)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("workspace is being deleted"));
    assert_eq!(cp.reads(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_read_synthesizes_url_deterministically() {
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST)
            .with_workspace(aws_workspace("acc-1", "foo"))
            .then_status(WorkspaceStatus::Running, "running"),
    );
    let probe = Arc::new(StaticProbe::reachable());
    let orchestrator = orchestrator(&cp, &probe);

    let first = orchestrator.read("acc-1", 9).await.expect("read");
    let second = orchestrator.read("acc-1", 9).await.expect("read");

    assert_eq!(first.workspace_url, "https://foo.cloud.example.com");
    assert_eq!(first, second);
}

#[tokio::test(start_paused = true)]
async fn test_read_keeps_returned_url() {
    let mut existing = aws_workspace("acc-1", "foo");
    existing.workspace_url = "https://dbc-1234.cloud.example.com".into();
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST)
            .with_workspace(existing)
            .then_status(WorkspaceStatus::Running, "running"),
    );
    let probe = Arc::new(StaticProbe::reachable());

    let ws = orchestrator(&cp, &probe)
        .read("acc-1", 9)
        .await
        .expect("read");
    assert_eq!(ws.workspace_url, "https://dbc-1234.cloud.example.com");
}

#[tokio::test(start_paused = true)]
async fn test_list_synthesizes_urls() {
    let cp = Arc::new(
        ScriptedControlPlane::new("http://10.0.0.1:8080")
            .with_workspace(aws_workspace("acc-1", "foo")),
    );
    let probe = Arc::new(StaticProbe::reachable());

    let all = orchestrator(&cp, &probe).list("acc-1").await.expect("list");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].workspace_url, "https://foo.cloud.databricks.com");
}

#[tokio::test(start_paused = true)]
async fn test_refresh_defaults_public_ip_flag() {
    let mut existing = aws_workspace("acc-1", "foo");
    existing.is_no_public_ip_enabled = false;
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST)
            .with_workspace(existing)
            .then_status(WorkspaceStatus::Running, "running"),
    );
    let probe = Arc::new(StaticProbe::reachable());

    let ws = orchestrator(&cp, &probe)
        .refresh("acc-1", 3, TIMEOUT)
        .await
        .expect("refresh");
    assert!(ws.is_no_public_ip_enabled);
    assert_eq!(cp.reads(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_delete_polls_until_missing() {
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST)
            .with_workspace(aws_workspace("acc-1", "foo"))
            .then_status(WorkspaceStatus::Running, "Deleting")
            .then(ReadStep::Missing),
    );
    let probe = Arc::new(StaticProbe::reachable());

    orchestrator(&cp, &probe)
        .delete("acc-1", 11)
        .await
        .expect("delete should succeed");

    assert_eq!(cp.deletes(), 1);
    assert_eq!(cp.reads(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_delete_aborts_on_other_errors() {
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST).then(ReadStep::Error(ApiError::Response {
            status: 500,
            error_code: "INTERNAL_ERROR".into(),
            message: "backend unavailable".into(),
        })),
    );
    let probe = Arc::new(StaticProbe::reachable());

    let err = orchestrator(&cp, &probe)
        .delete("acc-1", 11)
        .await
        .unwrap_err();

    assert!(!err.is_missing());
    assert!(err.to_string().contains("backend unavailable"));
    assert_eq!(cp.reads(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_delete_call_failure_skips_polling() {
    let cp = Arc::new(ScriptedControlPlane::new(HOST).fail_delete(missing_error()));
    let probe = Arc::new(StaticProbe::reachable());

    let err = orchestrator(&cp, &probe)
        .delete("acc-1", 11)
        .await
        .unwrap_err();

    assert!(err.is_missing());
    assert_eq!(cp.reads(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_aborts_create_wait() {
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST)
            .then_status(WorkspaceStatus::Provisioning, "Setting up"),
    );
    let probe = Arc::new(StaticProbe::reachable());
    let orchestrator = orchestrator(&cp, &probe);
    let cancel = orchestrator.cancellation_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(25)).await;
        cancel.cancel();
    });

    let ws = {
        let mut ws = aws_workspace("acc-1", "foo");
        ws.workspace_id = Some(1);
        ws
    };
    let err = orchestrator
        .wait_for_running(&ws, TIMEOUT)
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(matches!(err, ProvisionError::Cancelled { .. }));
    assert_eq!(cp.reads(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_create_issues_delete_without_waiting() {
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST)
            .then_status(WorkspaceStatus::Provisioning, "Setting up")
            .then_status(WorkspaceStatus::Provisioning, "Setting up")
            .then_status(WorkspaceStatus::Provisioning, "Setting up")
            .then_status(WorkspaceStatus::Running, "Deleting"),
    );
    let probe = Arc::new(StaticProbe::reachable());
    let orchestrator = orchestrator(&cp, &probe);
    let cancel = orchestrator.cancellation_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(25)).await;
        cancel.cancel();
    });

    let mut ws = aws_workspace("acc-1", "foo");
    let err = orchestrator.create(&mut ws, TIMEOUT).await.unwrap_err();

    assert!(err.is_timeout());
    match err {
        ProvisionError::Cancelled { last_message, .. } => assert_eq!(last_message, "Setting up"),
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert_eq!(cp.deletes(), 1);
    assert_eq!(cp.reads(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_create_with_failed_delete() {
    let cp = Arc::new(
        ScriptedControlPlane::new(HOST)
            .then_status(WorkspaceStatus::Provisioning, "Setting up")
            .fail_delete(ApiError::Transport("connection reset".into())),
    );
    let probe = Arc::new(StaticProbe::reachable());
    let orchestrator = orchestrator(&cp, &probe);
    let cancel = orchestrator.cancellation_token();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(15)).await;
        cancel.cancel();
    });

    let mut ws = aws_workspace("acc-1", "foo");
    let err = orchestrator.create(&mut ws, TIMEOUT).await.unwrap_err();

    assert!(err.is_timeout());
    match err {
        ProvisionError::Compensation { original, cleanup } => {
            assert!(matches!(*original, ProvisionError::Cancelled { .. }));
            assert!(cleanup.to_string().contains("connection reset"));
        }
        other => panic!("expected compensation error, got {other:?}"),
    }
    assert_eq!(cp.deletes(), 1);
    assert_eq!(cp.reads(), 2);
}

