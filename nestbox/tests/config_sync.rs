//! Integration tests for container configuration reconciliation.

use std::path::Path;

use nestbox::errors::NestboxError;
use nestbox::{ConfigSyncOutcome, ContainerDeclaration, ContainerStatus, CreateOptions};
use nestbox_test_utils::TestRuntime;

async fn running(ctx: &TestRuntime, name: &str) -> nestbox::Container {
    let container = ctx.runtime.container(name);
    container
        .create(
            &ContainerDeclaration::new(name, "localhost"),
            CreateOptions::default(),
        )
        .await
        .unwrap();
    container
}

#[tokio::test]
async fn reconcile_running_container_restarts_once() {
    let ctx = TestRuntime::new();
    let web = running(&ctx, "web").await;
    let show_ip = ctx.host.count("show-ip web");

    let outcome = web
        .reconcile_config(Path::new("/nix/store/22222222-web.conf"), true)
        .await
        .unwrap();

    assert_eq!(outcome, ConfigSyncOutcome::Applied);
    assert_eq!(ctx.host.count("nixos-container stop web"), 1);
    assert_eq!(ctx.host.count("nixos-container start web"), 2);
    assert!(ctx.host.count("show-ip web") > show_ip);

    let info = web.info().unwrap();
    assert_eq!(
        info.applied_config.as_deref(),
        Some("/nix/store/22222222-web.conf")
    );
    assert_eq!(info.status, ContainerStatus::Up);
    assert_eq!(
        ctx.host.container("web").unwrap().config.as_deref(),
        Some("/nix/store/22222222-web.conf")
    );
}

#[tokio::test]
async fn reconcile_same_path_twice_is_skipped() {
    let ctx = TestRuntime::new();
    let web = running(&ctx, "web").await;
    let config = Path::new("/nix/store/22222222-web.conf");

    web.reconcile_config(config, true).await.unwrap();
    let installs = ctx.host.count("/etc/containers/web.conf");

    let outcome = web.reconcile_config(config, false).await.unwrap();

    assert_eq!(outcome, ConfigSyncOutcome::Skipped);
    assert_eq!(ctx.host.count("/etc/containers/web.conf"), installs);
    assert_eq!(ctx.host.count("nixos-container stop web"), 1);
}

#[tokio::test]
async fn reconcile_without_permission_requires_restart() {
    let ctx = TestRuntime::new();
    let web = running(&ctx, "web").await;
    web.reconcile_config(Path::new("/nix/store/aaaaaaaa-web.conf"), true)
        .await
        .unwrap();

    let err = web
        .reconcile_config(Path::new("/nix/store/bbbbbbbb-web.conf"), false)
        .await
        .unwrap_err();

    assert!(matches!(err, NestboxError::RestartRequired { ref name } if name == "web"));
    assert_eq!(
        web.info().unwrap().applied_config.as_deref(),
        Some("/nix/store/aaaaaaaa-web.conf")
    );
    assert_eq!(ctx.host.count("bbbbbbbb"), 0);
}

#[tokio::test]
async fn reconcile_stopped_container_needs_no_restart() {
    let ctx = TestRuntime::new();
    let web = running(&ctx, "web").await;
    web.stop().await.unwrap();

    let outcome = web
        .reconcile_config(Path::new("/nix/store/22222222-web.conf"), false)
        .await
        .unwrap();

    assert_eq!(outcome, ConfigSyncOutcome::Applied);
    assert_eq!(ctx.host.count("nixos-container start web"), 1);
    assert_eq!(web.info().unwrap().status, ContainerStatus::Stopped);
}

#[tokio::test]
async fn reconcile_requires_created_container() {
    let ctx = TestRuntime::new();

    let err = ctx
        .runtime
        .container("ghost")
        .reconcile_config(Path::new("/nix/store/22222222-ghost.conf"), true)
        .await
        .unwrap_err();
    assert!(matches!(err, NestboxError::InvalidState(_)));
}

#[tokio::test]
async fn create_applies_built_config_before_first_start() {
    let ctx = TestRuntime::new();
    ctx.builder
        .set_config_path("web", "/nix/store/33333333-web.conf");
    let mut declaration = ContainerDeclaration::new("web", "localhost");
    declaration.write_container_config = true;
    let web = ctx.runtime.container("web");

    web.create(&declaration, CreateOptions::default())
        .await
        .unwrap();

    let info = web.info().unwrap();
    assert_eq!(
        info.applied_config.as_deref(),
        Some("/nix/store/33333333-web.conf")
    );
    assert_eq!(info.status, ContainerStatus::Up);
    assert_eq!(ctx.host.count("nixos-container stop web"), 0);

    let commands = ctx.host.commands();
    let install = commands
        .iter()
        .position(|c| c.contains("/etc/containers/web.conf"))
        .unwrap();
    let start = commands
        .iter()
        .position(|c| c.contains("nixos-container start web"))
        .unwrap();
    assert!(install < start);
}

#[tokio::test]
async fn create_with_changed_config_honours_allow_reboot() {
    let ctx = TestRuntime::new();
    let mut declaration = ContainerDeclaration::new("web", "localhost");
    declaration.write_container_config = true;
    let web = ctx.runtime.container("web");
    web.create(&declaration, CreateOptions::default())
        .await
        .unwrap();

    ctx.builder
        .set_config_path("web", "/nix/store/44444444-web.conf");
    let err = web
        .create(&declaration, CreateOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, NestboxError::RestartRequired { .. }));

    web.create(
        &declaration,
        CreateOptions {
            allow_reboot: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(
        web.info().unwrap().applied_config.as_deref(),
        Some("/nix/store/44444444-web.conf")
    );
    assert_eq!(ctx.host.count("nixos-container stop web"), 1);
}
