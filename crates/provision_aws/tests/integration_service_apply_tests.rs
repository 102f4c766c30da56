mod support;

use std::path::PathBuf;

use provision_core::engine::{Engine, PlannedAction, RunPhase};
use provision_core::error::ProvisionError;
use provision_core::spec::ServiceSpec;
use provision_core::state::ProvisionState;

use provision_aws::service::LambdaService;

use support::{StaticSecretResolver, TestStack};

fn spec_with(env_vars: &[&str]) -> ServiceSpec {
    ServiceSpec::new(
        "viral-vault",
        env_vars.iter().map(|name| name.to_string()).collect(),
        None,
    )
    .expect("spec should pass")
}

fn state_path(dir: &tempfile::TempDir) -> PathBuf {
    dir.path().join("provision-state.json")
}

#[test]
fn fresh_apply_exposes_service_urls() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let stack = TestStack::new();
    let adapters = stack.adapters(StaticSecretResolver::with(&[("A", "1"), ("B", "2")]));

    let mut engine = Engine::new(state_path(&dir)).expect("engine should construct");
    let service = LambdaService::declare(&mut engine, &spec_with(&["A", "B"]), &adapters)
        .expect("declare should pass");

    // Outputs are deferred; nothing is readable before apply.
    let error = service.get_url().resolve().expect_err("url should be deferred");
    assert_eq!(error, ProvisionError::Unresolved("api_url".to_string()));

    engine.apply().expect("apply should pass");
    assert_eq!(engine.phase(), RunPhase::Applied);

    let api_url = service.get_url().resolve().expect("url should resolve");
    assert!(api_url.starts_with("https://"));

    let repository_url = service
        .get_ecr_repository_url()
        .resolve()
        .expect("repository url should resolve");
    assert!(repository_url.contains("viral-vault"));

    assert_eq!(stack.runtime.deployment_count(), 1);
    let deployment = stack.runtime.last_deployment().expect("one deployment");
    assert!(deployment.image_ref.ends_with(":latest"));
    assert_eq!(deployment.env_bindings.len(), 2);
}

#[test]
fn reapplying_identical_inputs_changes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = state_path(&dir);
    let stack = TestStack::new();

    let adapters = stack.adapters(StaticSecretResolver::with(&[("A", "1")]));
    let mut first = Engine::new(&path).expect("engine should construct");
    let first_service = LambdaService::declare(&mut first, &spec_with(&["A"]), &adapters)
        .expect("declare should pass");
    first.apply().expect("apply should pass");

    let adapters = stack.adapters(StaticSecretResolver::with(&[("A", "1")]));
    let mut second = Engine::new(&path).expect("engine should construct");
    let second_service = LambdaService::declare(&mut second, &spec_with(&["A"]), &adapters)
        .expect("declare should pass");
    let summary = second.apply().expect("apply should pass");

    assert_eq!(summary.changed(), 0);
    assert_eq!(summary.unchanged, 3);
    assert_eq!(stack.runtime.deployment_count(), 1);
    assert_eq!(stack.registry.ensure_calls(), 1);
    assert_eq!(
        first_service.get_url().resolve().expect("url resolves"),
        second_service.get_url().resolve().expect("url resolves"),
    );
    assert_eq!(
        first_service
            .get_ecr_repository_url()
            .resolve()
            .expect("repository url resolves"),
        second_service
            .get_ecr_repository_url()
            .resolve()
            .expect("repository url resolves"),
    );
}

#[test]
fn new_digest_under_latest_tag_redeploys_only_the_function() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = state_path(&dir);
    let stack = TestStack::new();

    let adapters = stack.adapters(StaticSecretResolver::with(&[("A", "1")]));
    let mut first = Engine::new(&path).expect("engine should construct");
    let first_service = LambdaService::declare(&mut first, &spec_with(&["A"]), &adapters)
        .expect("declare should pass");
    first.apply().expect("apply should pass");
    let url_before = first_service.get_url().resolve().expect("url resolves");

    // CI pushes new code under the same tag; only the digest moves.
    stack.registry.push_image("viral-vault", "latest", "sha256:bbb");

    let adapters = stack.adapters(StaticSecretResolver::with(&[("A", "1")]));
    let mut second = Engine::new(&path).expect("engine should construct");
    let second_service = LambdaService::declare(&mut second, &spec_with(&["A"]), &adapters)
        .expect("declare should pass");

    let plan = second.plan().expect("plan should pass");
    let action_of = |name: &str| {
        plan.iter()
            .find(|step| step.name == name)
            .map(|step| step.action)
            .expect("step should be planned")
    };
    assert_eq!(action_of("viral-vault-repository"), PlannedAction::Noop);
    assert_eq!(action_of("viral-vault-function"), PlannedAction::Update);
    assert_eq!(action_of("viral-vault-endpoint"), PlannedAction::Noop);

    second.apply().expect("apply should pass");
    assert_eq!(stack.runtime.deployment_count(), 2);
    assert_eq!(
        second_service.get_url().resolve().expect("url resolves"),
        url_before,
    );
}

#[test]
fn missing_secret_fails_the_function_and_keeps_the_repository() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = state_path(&dir);
    let stack = TestStack::new();

    let adapters = stack.adapters(StaticSecretResolver::with(&[("A", "1")]));
    let mut engine = Engine::new(&path).expect("engine should construct");
    LambdaService::declare(&mut engine, &spec_with(&["A", "B"]), &adapters)
        .expect("declare should pass");

    let error = engine.apply().expect_err("apply should fail");
    assert_eq!(error, ProvisionError::MissingSecret("B".to_string()));
    assert_eq!(engine.phase(), RunPhase::Failed);
    assert_eq!(stack.runtime.deployment_count(), 0);

    let saved = ProvisionState::load(&path).expect("state should load");
    assert!(saved.resources.contains_key("viral-vault-repository"));
    assert!(!saved.resources.contains_key("viral-vault-function"));
    assert!(!saved.resources.contains_key("viral-vault-endpoint"));
}

#[test]
fn retry_after_missing_secret_reconciles_without_duplicating() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = state_path(&dir);
    let stack = TestStack::new();

    let adapters = stack.adapters(StaticSecretResolver::with(&[("A", "1")]));
    let mut failed = Engine::new(&path).expect("engine should construct");
    LambdaService::declare(&mut failed, &spec_with(&["A", "B"]), &adapters)
        .expect("declare should pass");
    failed.apply().expect_err("apply should fail");

    // Operator supplies the missing value and re-runs.
    let adapters = stack.adapters(StaticSecretResolver::with(&[("A", "1"), ("B", "2")]));
    let mut retry = Engine::new(&path).expect("engine should construct");
    let service = LambdaService::declare(&mut retry, &spec_with(&["A", "B"]), &adapters)
        .expect("declare should pass");
    let summary = retry.apply().expect("apply should pass");

    assert_eq!(stack.registry.ensure_calls(), 1);
    assert_eq!(stack.runtime.deployment_count(), 1);
    assert_eq!(summary.created, 2);
    assert_eq!(summary.unchanged, 1);
    assert!(service
        .get_url()
        .resolve()
        .expect("url resolves")
        .starts_with("https://"));
}

#[test]
fn duplicate_env_var_fails_before_any_declaration() {
    let error = ServiceSpec::new(
        "viral-vault",
        vec!["A".to_string(), "A".to_string()],
        None,
    )
    .expect_err("spec should fail");
    assert!(matches!(error, ProvisionError::Configuration(_)));
}
