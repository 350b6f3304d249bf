use crate::demo::{run_demo, DemoArgs};
use crate::infra::parse_mock_fixture;
use crate::server;
use clap::{Args, Parser, Subcommand};
use idv_proofing::config::AppConfig;
use idv_proofing::error::AppError;
use idv_proofing::jobs::BackgroundProofingArgEncryptor;
use idv_proofing::proofing::mock::MockFixture;
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "IdV Proofing Worker",
    about = "Run the identity-resolution proofing worker and its development helpers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service and background job worker (default command)
    Serve(ServeArgs),
    /// Run the end-to-end proofing scenarios against mock vendors
    Demo(DemoArgs),
    /// Encrypt an applicant PII file into a job argument payload
    EncryptArgs(EncryptArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Fixture every mock vendor answers with (pass, fail, review, timeout, unavailable)
    #[arg(long, value_parser = parse_mock_fixture)]
    pub(crate) mock_fixture: Option<MockFixture>,
}

#[derive(Args, Debug)]
pub(crate) struct EncryptArgs {
    /// JSON file holding either the applicant PII object or `{"applicant_pii": {...}}`
    #[arg(long)]
    pub(crate) file: PathBuf,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => run_demo(args),
        Command::EncryptArgs(args) => run_encrypt_args(args),
    }
}

fn run_encrypt_args(args: EncryptArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let raw = std::fs::read_to_string(&args.file)?;
    let payload = job_arguments(&raw)?;
    let encryptor = BackgroundProofingArgEncryptor::new(config.proofing.argument_encryption_key);
    println!("{}", encryptor.encrypt(&payload.to_string())?);
    Ok(())
}

fn job_arguments(raw: &str) -> Result<Value, AppError> {
    let parsed: Value = serde_json::from_str(raw)
        .map_err(|err| AppError::InvalidInput(format!("pii file is not valid JSON: {err}")))?;
    match parsed {
        Value::Object(map) if map.contains_key("applicant_pii") => Ok(Value::Object(map)),
        Value::Object(map) => Ok(json!({ "applicant_pii": map })),
        _ => Err(AppError::InvalidInput(
            "pii file must contain a JSON object".to_string(),
        )),
    }
}
