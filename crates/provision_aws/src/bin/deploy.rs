use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use provision_aws::adapters::endpoint::LambdaFunctionUrls;
use provision_aws::adapters::functions::LambdaFunctions;
use provision_aws::adapters::registry::EcrRegistry;
use provision_aws::adapters::secrets::EnvSecretResolver;
use provision_aws::service::{LambdaService, ServiceAdapters};
use provision_core::engine::Engine;
use provision_core::error::ProvisionError;
use provision_core::spec::ServiceSpec;
use provision_core::state::ProvisionState;

/// Every variable the deployed service needs bound into its runtime
/// environment. Values are resolved from the deploying environment at
/// apply time; a missing one fails the run naming the variable.
const REQUIRED_ENV_VARS: [&str; 18] = [
    "NOTION_API_KEY",
    "NOTION_DATABASE_ID",
    "STRIPE_API_KEY",
    "FIREBASE_PROJECT_ID",
    "FIREBASE_CLIENT_EMAIL",
    "FIREBASE_PRIVATE_KEY",
    "FIREBASE_AUTH_DOMAIN",
    "FIREBASE_STORAGE_BUCKET",
    "FIREBASE_MESSAGING_SENDER_ID",
    "FIREBASE_APP_ID",
    "FIREBASE_MEASUREMENT_ID",
    "CLAUDE_API_KEY",
    "FRONTEND_URL",
    "OPENAI_API_KEY",
    "R2_ACCOUNT_ID",
    "R2_ACCESS_KEY_ID",
    "R2_SECRET_ACCESS_KEY",
    "R2_BUCKET_NAME",
];

#[derive(Parser)]
#[command(
    name = "deploy",
    about = "Provision the Lambda-backed service stack",
    long_about = "Declares an ECR repository, a container Lambda function, and a\n\
                  public function URL for one named service, then applies them in\n\
                  dependency order against the recorded state."
)]
struct Cli {
    /// JSON state file tracked across runs
    #[arg(long, default_value = "provision-state.json")]
    state_file: PathBuf,
    /// Logical service name; every resource name derives from it
    #[arg(long, default_value = "viral-vault")]
    name: String,
    /// Container image tag to deploy
    #[arg(long, env = "IMAGE_TAG", default_value = "latest")]
    image_tag: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan and apply, then print the exported URLs
    Up,
    /// Show per-resource actions without changing anything
    Preview,
    /// Print the exports recorded by the last successful apply
    Outputs,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        eprintln!("error: {error}");
        exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), ProvisionError> {
    match cli.command {
        Commands::Outputs => print_recorded_outputs(&cli),
        Commands::Preview => {
            let (mut engine, _service) = declare_stack(&cli).await?;
            for step in engine.plan()? {
                println!(
                    "{:<7} {} ({})",
                    step.action.as_str(),
                    step.name,
                    step.kind.as_str()
                );
            }
            Ok(())
        }
        Commands::Up => {
            let (mut engine, service) = declare_stack(&cli).await?;
            let summary = engine.apply()?;
            println!(
                "applied: {} created, {} updated, {} unchanged",
                summary.created, summary.updated, summary.unchanged
            );
            println!("api_url = {}", service.get_url().resolve()?);
            println!(
                "ecr_repository_url = {}",
                service.get_ecr_repository_url().resolve()?
            );
            Ok(())
        }
    }
}

async fn declare_stack(cli: &Cli) -> Result<(Engine, LambdaService), ProvisionError> {
    let spec = ServiceSpec::new(
        cli.name.clone(),
        REQUIRED_ENV_VARS.iter().map(|name| name.to_string()).collect(),
        Some(cli.image_tag.clone()),
    )?;

    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let lambda_client = aws_sdk_lambda::Client::new(&config);
    let adapters = ServiceAdapters {
        registry: Arc::new(EcrRegistry::new(aws_sdk_ecr::Client::new(&config))),
        runtime: Arc::new(LambdaFunctions::new(
            lambda_client.clone(),
            aws_sdk_iam::Client::new(&config),
        )),
        endpoints: Arc::new(LambdaFunctionUrls::new(lambda_client)),
        secrets: Arc::new(EnvSecretResolver),
    };

    let mut engine = Engine::new(cli.state_file.clone())?;
    let service = LambdaService::declare(&mut engine, &spec, &adapters)?;
    Ok((engine, service))
}

fn print_recorded_outputs(cli: &Cli) -> Result<(), ProvisionError> {
    let state = ProvisionState::load(&cli.state_file)?;
    if state.exports.is_empty() {
        return Err(ProvisionError::Unresolved("exports".to_string()));
    }
    for (key, value) in &state.exports {
        println!("{key} = {value}");
    }
    Ok(())
}
