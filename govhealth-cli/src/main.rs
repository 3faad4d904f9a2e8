//! gov-health sandbox CLI: provision, tear down, and exercise the
//! athenahealth integration environment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use clap::{Parser, Subcommand};
use colored::Colorize;

use govhealth_provision::confirm::TerminalConfirmation;
use govhealth_provision::{
    DeployConfig, DeploySummary, ProvisionService, TeardownConfig, DEFAULT_ENVIRONMENT,
    FOUNDATION_TEMPLATE, INTEGRATION_TEMPLATE,
};
use govhealth_token::authcode::{
    authorize_url, AuthorizeRequest, CallbackListener, PREVIEW_AUTHORIZE_URL,
};
use govhealth_token::credentials::ApiCredentials;
use govhealth_token::fhir::{FhirClient, NewPatient};
use govhealth_token::oauth::TokenEndpoint;
use govhealth_token::service::PREVIEW_TOKEN_URL;
use govhealth_token::signed::SignedTokenClient;

#[derive(Parser)]
#[command(
    name = "govhealth",
    version,
    about = "Operations for the gov-health athenahealth sandbox"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deploy the foundation and integration stacks
    Deploy {
        /// AWS region, e.g. us-east-1
        region: String,
        /// EC2 key pair passed to the foundation template
        #[arg(long)]
        key_pair: Option<String>,
        #[arg(long, default_value = DEFAULT_ENVIRONMENT)]
        environment: String,
        #[arg(long, default_value = FOUNDATION_TEMPLATE)]
        foundation_template: PathBuf,
        #[arg(long, default_value = INTEGRATION_TEMPLATE)]
        integration_template: PathBuf,
    },
    /// Delete both stacks, integration first
    Teardown {
        /// AWS region, e.g. us-east-1
        region: String,
        #[arg(long, default_value = DEFAULT_ENVIRONMENT)]
        environment: String,
    },
    /// Delete a single stack by name
    TeardownStack {
        stack_name: String,
        /// AWS region, e.g. us-east-1
        region: String,
    },
    /// Fetch an access token from the deployed token endpoint
    Token {
        /// Token endpoint URL (the API Gateway URL in front of the Lambda)
        #[arg(long, env = "GOVHEALTH_TOKEN_URL")]
        url: String,
        #[arg(long, default_value = "us-east-1")]
        region: String,
    },
    /// Search sandbox patients and list the first match's appointments
    SearchPatients {
        #[arg(long, default_value = "smith")]
        name: String,
        /// Token endpoint URL (the API Gateway URL in front of the Lambda)
        #[arg(long, env = "GOVHEALTH_TOKEN_URL")]
        url: String,
        #[arg(long, default_value = "us-east-1")]
        region: String,
    },
    /// Create a demo patient through the authorization-code flow
    CreatePatient {
        #[arg(long, env = "ATHENA_CLIENT_ID")]
        client_id: String,
        #[arg(long, env = "ATHENA_CLIENT_SECRET", hide_env_values = true)]
        client_secret: String,
        /// Local port for the OAuth callback listener
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Seconds to wait for the browser login
        #[arg(long, default_value_t = 180)]
        timeout_secs: u64,
        #[arg(long, default_value = "Smith")]
        family: String,
        #[arg(long, default_value = "John")]
        given: String,
        #[arg(long, default_value = "male")]
        gender: String,
        #[arg(long, default_value = "1980-01-01")]
        birth_date: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Deploy {
            region,
            key_pair,
            environment,
            foundation_template,
            integration_template,
        } => {
            let config = DeployConfig {
                environment,
                key_pair_name: key_pair,
                foundation_template,
                integration_template,
            };
            deploy(&region, &config).await
        }
        Command::Teardown {
            region,
            environment,
        } => teardown(&region, &TeardownConfig { environment }).await,
        Command::TeardownStack { stack_name, region } => {
            teardown_stack(&stack_name, &region).await
        }
        Command::Token { url, region } => fetch_token(&url, &region).await,
        Command::SearchPatients { name, url, region } => {
            search_patients(&name, &url, &region).await
        }
        Command::CreatePatient {
            client_id,
            client_secret,
            port,
            timeout_secs,
            family,
            given,
            gender,
            birth_date,
        } => {
            let patient = NewPatient {
                family,
                given,
                gender,
                birth_date,
            };
            create_patient(client_id, client_secret, port, timeout_secs, &patient).await
        }
    }
}

fn banner(title: &str) {
    let line = "=".repeat(40);
    println!("{}", line.blue());
    println!("{}", title.blue());
    println!("{}", line.blue());
}

async fn deploy(region: &str, config: &DeployConfig) -> anyhow::Result<()> {
    banner("AWS Infrastructure Deployment");
    println!("Environment: {}", config.environment);
    println!("Region: {region}");
    println!("Foundation Stack: {}", config.foundation_stack_name());
    println!("Integration Stack: {}", config.integration_stack_name());
    if let Some(key_pair) = &config.key_pair_name {
        println!("Key Pair: {key_pair}");
    }
    println!();

    let service = ProvisionService::new(region).await?;
    let summary = service.deploy(config, &TerminalConfirmation).await?;

    print_deploy_summary(region, &summary);
    Ok(())
}

fn print_deploy_summary(region: &str, summary: &DeploySummary) {
    println!();
    println!("{}", "Deployment Complete!".green());
    println!();
    println!("Key Resources:");
    println!("  - VPC ID: {}", summary.vpc_id);
    println!("  - KMS Key ID: {}", summary.kms_key_id);
    println!(
        "  - RDS Endpoint: {}",
        summary.rds_endpoint.as_deref().unwrap_or("N/A")
    );
    println!(
        "  - API Gateway: {}",
        summary.api_gateway_endpoint.as_deref().unwrap_or("N/A")
    );
    println!();
    println!("{}", "Next Steps:".yellow());
    println!("1. Store the athenahealth API credentials in Secrets Manager");
    println!("2. Initialize the RDS database schema");
    println!("3. Test the integration endpoints");
    println!();
    println!("{}", "To tear down this infrastructure:".yellow());
    println!("govhealth teardown {region}");
}

async fn teardown(region: &str, config: &TeardownConfig) -> anyhow::Result<()> {
    banner("AWS Infrastructure Teardown");
    println!("Environment: {}", config.environment);
    println!("Region: {region}");
    println!();
    println!("{}", "WARNING: This will delete ALL resources including:".red());
    println!("  - RDS Database (a final snapshot will be created)");
    println!("  - Lambda Functions and API Gateway");
    println!("  - Secrets Manager secrets");
    println!("  - VPC, subnets, and security groups");
    println!("  - S3 Buckets (PHI data and logs)");
    println!("  - KMS Keys");
    println!();

    let service = ProvisionService::new(region).await?;
    let report = service.teardown(config, &TerminalConfirmation).await?;

    println!();
    println!("{}", "Teardown Complete!".green());
    println!();
    println!("Summary:");
    if report.integration_deleted {
        println!("  - Integration stack deleted");
    }
    if report.foundation_deleted {
        println!("  - Foundation stack deleted");
    }
    for bucket in &report.emptied_buckets {
        println!("  - Emptied bucket {bucket}");
    }
    for snapshot in &report.deleted_snapshots {
        println!("  - Deleted snapshot {snapshot}");
    }
    println!();
    println!("{}", "Potential remaining costs:".yellow());
    println!("  - RDS snapshots (storage)");
    println!("  - Secrets Manager (recovery window)");
    Ok(())
}

async fn teardown_stack(stack_name: &str, region: &str) -> anyhow::Result<()> {
    banner("CloudFormation Stack Teardown");
    println!("Stack Name: {stack_name}");
    println!("Region: {region}");
    println!();

    let service = ProvisionService::new(region).await?;
    let report = service
        .teardown_stack(stack_name, &TerminalConfirmation)
        .await?;

    println!();
    println!("{}", "Teardown Complete!".green());
    println!("  - Stack {} deleted", report.stack);
    if let Some(instance) = &report.db_instance {
        println!("  - RDS instance {instance} deleted (snapshot may exist)");
    }
    for snapshot in &report.deleted_snapshots {
        println!("  - Deleted snapshot {snapshot}");
    }
    Ok(())
}

async fn fetch_token(url: &str, region: &str) -> anyhow::Result<()> {
    let client = SignedTokenClient::from_env(region).await?;
    let token = client.fetch_token(url).await?;
    println!("{token}");
    Ok(())
}

async fn search_patients(name: &str, url: &str, region: &str) -> anyhow::Result<()> {
    let client = SignedTokenClient::from_env(region).await?;
    let token = client.fetch_token(url).await?;

    let fhir = FhirClient::preview();
    let patients = fhir.search_patients(&token, name).await?;
    println!("Found {} '{name}' patients", patients.total);

    let Some(patient_id) = patients.first_patient_id() else {
        println!("No patients matched");
        return Ok(());
    };
    println!("Checking patient {patient_id}");

    let appointments = fhir.patient_appointments(&token, &patient_id).await?;
    println!("{}", serde_json::to_string_pretty(&appointments)?);
    Ok(())
}

async fn create_patient(
    client_id: String,
    client_secret: String,
    port: u16,
    timeout_secs: u64,
    patient: &NewPatient,
) -> anyhow::Result<()> {
    let redirect_uri = format!("http://localhost:{port}/callback");
    let listener = CallbackListener::bind(port).await?;

    let request = AuthorizeRequest::new(client_id.clone(), redirect_uri.clone());
    let url = authorize_url(PREVIEW_AUTHORIZE_URL, &request)?;
    println!("Open this URL in your browser to sign in:\n  {url}\n");
    println!("Waiting for login (you have {timeout_secs} seconds)...");

    let callback = listener.recv(Duration::from_secs(timeout_secs)).await?;
    if callback.state.as_deref() != Some(request.state.as_str()) {
        bail!("state mismatch in OAuth callback");
    }
    println!("{}", "Got authorization code!".green());

    let creds = ApiCredentials {
        client_id,
        client_secret,
    };
    let endpoint = TokenEndpoint::new(PREVIEW_TOKEN_URL);
    let grant = endpoint
        .authorization_code(&creds, &callback.code, &redirect_uri)
        .await?;
    println!("Got user token!");

    let fhir = FhirClient::preview();
    let id = fhir.create_patient(&grant.access_token, patient).await?;
    println!("{} Patient ID: {id}", "SUCCESS!".green());
    Ok(())
}
