//! Coordinator daemon: wires the vault client and coordinator together and
//! serves the coordinator interface over a thin HTTP adapter.

use anyhow::{anyhow, Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use potshot_chain::VaultClient;
use potshot_coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorStatus, Error as CoordinatorError,
};
use potshot_types::AuthorizationPayload;
use serde::Deserialize;
use std::{env, fs, sync::Arc};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Coordinator daemon for the potshot sealed-number game")]
struct Args {
    /// Listen address for the HTTP adapter
    #[arg(long, default_value = "0.0.0.0:8081")]
    listen: String,

    /// EVM JSON-RPC endpoint URL
    #[arg(long)]
    evm_rpc_url: Option<String>,

    /// GuessVault contract address
    #[arg(long)]
    vault_address: Option<String>,

    /// Coordinator private key hex (omit to run read-only)
    #[arg(long)]
    signer_key: Option<String>,

    /// Path to file with the coordinator private key hex
    #[arg(long)]
    signer_key_file: Option<String>,

    /// EVM chain id
    #[arg(long, default_value = "1")]
    chain_id: u64,

    /// Confirmations required for transaction finality
    #[arg(long, default_value = "3")]
    confirmations: usize,

    /// Bound on each chain confirmation wait, in seconds
    #[arg(long, default_value = "90")]
    confirmation_timeout_secs: u64,
}

type Service = Arc<Coordinator<VaultClient>>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let rpc_url = require_arg_or_env(args.evm_rpc_url, "POTSHOT_EVM_RPC_URL")?;
    let vault_address = require_arg_or_env(args.vault_address, "POTSHOT_VAULT_ADDRESS")?;
    let signer_key = optional_arg_or_env_or_file(
        args.signer_key,
        args.signer_key_file,
        "POTSHOT_SIGNER_KEY",
        "POTSHOT_SIGNER_KEY_FILE",
    )?;
    let chain_id = env_u64("POTSHOT_CHAIN_ID").unwrap_or(args.chain_id);

    let config = CoordinatorConfig::from_env(
        rpc_url.clone(),
        vault_address.clone(),
        signer_key,
        chain_id,
        args.confirmations,
        args.confirmation_timeout_secs,
    );
    config
        .validate()
        .map_err(|err| anyhow!("invalid configuration: {err}"))?;

    let vault = VaultClient::connect(&config.vault_config())
        .map_err(|err| anyhow!("vault connection failed: {err}"))?;
    if let Some(signer) = vault.signer_address() {
        info!(signer = %format!("{signer:#x}"), "vault writes enabled");
    }
    let coordinator = Arc::new(
        Coordinator::new(vault, config).map_err(|err| anyhow!("coordinator setup failed: {err}"))?,
    );

    info!(
        rpc_url = %rpc_url,
        vault = %vault_address,
        chain_id,
        confirmations = args.confirmations,
        "potshot coordinator starting"
    );

    // Best-effort: a failed bootstrap leaves the coordinator in
    // Bootstrapping and the next guess retries it.
    match coordinator.bootstrap().await {
        Ok(status) => info!(phase = status.phase.as_str(), "startup bootstrap complete"),
        Err(err) => warn!(error = %err, "startup bootstrap failed; will retry on next guess"),
    }

    let app = Router::new()
        .route("/v1/state", get(get_state))
        .route("/v1/guess", post(post_guess))
        .route("/v1/admin/reset", post(post_reset))
        .route("/v1/admin/settle-retry", post(post_settle_retry))
        .with_state(coordinator);

    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    info!(listen = %args.listen, "serving coordinator interface");
    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}

async fn get_state(State(service): State<Service>) -> Json<CoordinatorStatus> {
    Json(service.public_state().await)
}

#[derive(Debug, Deserialize)]
struct GuessRequest {
    player: String,
    guess_value: String,
    authorization: AuthorizationPayload,
}

async fn post_guess(State(service): State<Service>, Json(request): Json<GuessRequest>) -> Response {
    match service
        .submit_guess(&request.player, &request.guess_value, request.authorization)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResetRequest {
    buy_in: Option<u128>,
}

async fn post_reset(State(service): State<Service>, Json(request): Json<ResetRequest>) -> Response {
    match service.reset_round(request.buy_in).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn post_settle_retry(State(service): State<Service>) -> Response {
    match service.retry_settlement().await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: CoordinatorError) -> Response {
    let status = match &err {
        CoordinatorError::Validation(_) => StatusCode::BAD_REQUEST,
        CoordinatorError::Authorization(_) => StatusCode::UNAUTHORIZED,
        CoordinatorError::Replay { .. } => StatusCode::CONFLICT,
        CoordinatorError::ChainTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        CoordinatorError::Chain(_) => StatusCode::BAD_GATEWAY,
        CoordinatorError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        status,
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}

fn require_arg_or_env(value: Option<String>, env_key: &str) -> Result<String> {
    if let Some(value) = value {
        return Ok(value);
    }
    if let Ok(value) = env::var(env_key) {
        return Ok(value);
    }
    Err(anyhow!("Missing {env_key} (flag or env var)"))
}

fn optional_arg_or_env_or_file(
    value: Option<String>,
    file: Option<String>,
    env_key: &str,
    env_file: &str,
) -> Result<Option<String>> {
    if let Some(value) = value {
        return Ok(Some(value));
    }
    if let Some(path) = file {
        return read_secret_file(&path).map(Some);
    }
    if let Ok(value) = env::var(env_key) {
        return Ok(Some(value));
    }
    if let Ok(path) = env::var(env_file) {
        return read_secret_file(&path).map(Some);
    }
    Ok(None)
}

fn read_secret_file(path: &str) -> Result<String> {
    let contents = fs::read_to_string(path).context("Failed to read secret file")?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Secret file is empty: {path}"));
    }
    Ok(trimmed.to_string())
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|value| value.parse().ok())
}
