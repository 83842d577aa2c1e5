#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::time::Duration;

use authz_engine::domain::BreakerState;
use authz_engine::{AuthzEngineModule, FallbackMode};
use authz_engine_sdk::{AuthzEngineError, DecisionSource, Dependency, ErrorCode, Privilege, deny_codes};
use common::{RemoteBehavior, ScriptedRemote, Tree, remote_config};
use tracing_test::traced_test;

#[tokio::test]
async fn remote_decides_for_configured_types_only() {
    let tree = Tree::new();
    let remote = ScriptedRemote::new(RemoteBehavior::Deny);
    let svc = AuthzEngineModule::new(remote_config(FallbackMode::Deny))
        .with_repository(tree.repo())
        .with_remote_evaluator(remote.clone())
        .build_service()
        .unwrap();
    let member = tree.member();

    let decision = svc.evaluate(&member, &tree.space, Privilege::Read).await.unwrap();
    assert!(!decision.granted);
    assert_eq!(decision.source, DecisionSource::Remote);
    assert_eq!(
        decision.deny_reason.unwrap().error_code,
        deny_codes::REMOTE_DENIED
    );
    assert_eq!(remote.calls(), 1);

    // Cached: no second round trip for the same question.
    svc.evaluate(&member, &tree.space, Privilege::Read).await.unwrap();
    assert_eq!(remote.calls(), 1);

    // Callouts are not routed remotely.
    let local = svc.evaluate(&member, &tree.callout, Privilege::Read).await.unwrap();
    assert!(local.granted);
    assert_eq!(local.source, DecisionSource::Local);
    assert_eq!(remote.calls(), 1);
}

#[tokio::test]
async fn module_requires_a_remote_client_when_enabled() {
    let tree = Tree::new();
    let result = AuthzEngineModule::new(remote_config(FallbackMode::Deny))
        .with_repository(tree.repo())
        .build();
    assert!(result.is_err());
}

#[tokio::test]
async fn deny_fallback_reports_unavailable_with_dependency() {
    let tree = Tree::new();
    let remote = ScriptedRemote::new(RemoteBehavior::Unreachable);
    let engine = AuthzEngineModule::new(remote_config(FallbackMode::Deny))
        .with_repository(tree.repo())
        .with_remote_evaluator(remote.clone())
        .build()
        .unwrap();

    let err = engine
        .evaluate(&tree.member(), &tree.space, Privilege::Read)
        .await
        .unwrap_err();
    match err {
        AuthzEngineError::Unavailable {
            code, dependency, ..
        } => {
            assert_eq!(code, ErrorCode::DependencyUnavailable);
            assert_eq!(dependency, Some(Dependency::Nats));
        }
        other => panic!("expected unavailable, got {other:?}"),
    }
}

#[tokio::test]
#[traced_test]
async fn local_fallback_resolves_locally_and_is_not_cached() {
    let tree = Tree::new();
    let remote = ScriptedRemote::new(RemoteBehavior::Unreachable);
    let svc = AuthzEngineModule::new(remote_config(FallbackMode::Local))
        .with_repository(tree.repo())
        .with_remote_evaluator(remote.clone())
        .build_service()
        .unwrap();
    let member = tree.member();

    for attempt in 1..=2 {
        let decision = svc.evaluate(&member, &tree.space, Privilege::Read).await.unwrap();
        assert!(decision.granted);
        assert_eq!(decision.source, DecisionSource::LocalFallback);
        assert_eq!(remote.calls(), attempt);
    }
    assert!(logs_contain("falling back to local resolution"));

    // Once the remote recovers its answer replaces the fallback.
    remote.set(RemoteBehavior::Deny);
    let decision = svc.evaluate(&member, &tree.space, Privilege::Read).await.unwrap();
    assert!(!decision.granted);
    assert_eq!(decision.source, DecisionSource::Remote);
}

#[tokio::test(start_paused = true)]
async fn breaker_opens_after_timeouts_and_recovers_after_cooldown() {
    let tree = Tree::new();
    let remote = ScriptedRemote::new(RemoteBehavior::Hang);
    let svc = AuthzEngineModule::new(remote_config(FallbackMode::Deny))
        .with_repository(tree.repo())
        .with_remote_evaluator(remote.clone())
        .build_service()
        .unwrap();
    let breaker = || svc.remote().unwrap().breaker_state();

    // Five timeouts inside the window open the breaker.
    for _ in 0..5 {
        let err = svc
            .evaluate(&tree.member(), &tree.space, Privilege::Read)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            authz_engine::domain::DomainError::RemoteUnavailable {
                code: ErrorCode::DependencyUnavailable,
                ..
            }
        ));
    }
    assert_eq!(remote.calls(), 5);
    assert_eq!(breaker(), BreakerState::Open);

    // The sixth call is refused without touching the network.
    let err = svc
        .evaluate(&tree.member(), &tree.space, Privilege::Read)
        .await
        .unwrap_err();
    match err {
        authz_engine::domain::DomainError::RemoteUnavailable {
            code,
            retry_after_ms,
            ..
        } => {
            assert_eq!(code, ErrorCode::CircuitBreakerOpen);
            let hint = retry_after_ms.unwrap();
            assert!(hint > 0 && hint <= 30_000);
        }
        other => panic!("expected breaker rejection, got {other:?}"),
    }
    assert_eq!(remote.calls(), 5);

    // After the cooldown a successful trial closes the breaker.
    tokio::time::advance(Duration::from_secs(31)).await;
    remote.set(RemoteBehavior::Allow);
    let decision = svc
        .evaluate(&tree.member(), &tree.space, Privilege::Read)
        .await
        .unwrap();
    assert!(decision.granted);
    assert_eq!(decision.source, DecisionSource::Remote);
    assert_eq!(remote.calls(), 6);
    assert_eq!(breaker(), BreakerState::Closed);
}

#[tokio::test(start_paused = true)]
async fn failed_trial_reopens_the_breaker() {
    let tree = Tree::new();
    let remote = ScriptedRemote::new(RemoteBehavior::Unreachable);
    let mut config = remote_config(FallbackMode::Local);
    config.remote.breaker.failure_threshold = 1;
    let svc = AuthzEngineModule::new(config)
        .with_repository(tree.repo())
        .with_remote_evaluator(remote.clone())
        .build_service()
        .unwrap();

    svc.evaluate(&tree.member(), &tree.space, Privilege::Read).await.unwrap();
    assert_eq!(svc.remote().unwrap().breaker_state(), BreakerState::Open);

    tokio::time::advance(Duration::from_secs(30)).await;
    let decision = svc.evaluate(&tree.member(), &tree.space, Privilege::Read).await.unwrap();
    assert_eq!(decision.source, DecisionSource::LocalFallback);
    assert_eq!(remote.calls(), 2);
    assert_eq!(svc.remote().unwrap().breaker_state(), BreakerState::Open);
}

#[tokio::test(start_paused = true)]
async fn disabled_breaker_still_times_out_every_call() {
    let tree = Tree::new();
    let remote = ScriptedRemote::new(RemoteBehavior::Hang);
    let mut config = remote_config(FallbackMode::Deny);
    config.remote.breaker.enabled = false;
    let svc = AuthzEngineModule::new(config)
        .with_repository(tree.repo())
        .with_remote_evaluator(remote.clone())
        .build_service()
        .unwrap();

    for _ in 0..8 {
        let err = svc
            .evaluate(&tree.member(), &tree.space, Privilege::Read)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            authz_engine::domain::DomainError::RemoteUnavailable {
                code: ErrorCode::DependencyUnavailable,
                ..
            }
        ));
    }
    assert_eq!(remote.calls(), 8);
    assert_eq!(svc.remote().unwrap().breaker_state(), BreakerState::Closed);
}
