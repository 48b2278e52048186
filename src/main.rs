use clap::Parser;
use disburse::application::status::BatchStatusService;
use disburse::domain::context::RawTransactionRequest;
use disburse::infrastructure::in_memory::InMemoryBatchStore;
use disburse::infrastructure::simulated::SimulatedGateway;
use disburse::{CircuitBreaker, ConcurrencyLimiter, Orchestrator};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Dry-run a payout batch through the full orchestration pipeline against
/// the in-memory ledger and the simulated payout network.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Recipients CSV file (source_record_id,user_id,payout_email,amount,currency,note)
    input: PathBuf,

    /// Payout cycle identifier
    #[arg(long)]
    cycle: i64,

    /// Admin identifier triggering the batch
    #[arg(long)]
    admin: i64,

    /// Idempotency key shared with the payout network (derived if omitted)
    #[arg(long)]
    sender_batch_id: Option<String>,

    /// Request identifier (derived if omitted)
    #[arg(long)]
    request_id: Option<String>,

    /// Simulate a payout-network outage
    #[arg(long)]
    fail_submission: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = disburse::interfaces::csv::recipient_reader::RecipientReader::new(file);
    let mut recipients = Vec::new();
    for row in reader.recipients() {
        match row {
            Ok(recipient) => recipients.push(recipient),
            Err(e) => warn!("skipping unreadable recipient row: {e}"),
        }
    }

    let total_amount: i64 = recipients.iter().filter_map(|r| r.amount).sum();
    let epoch_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .into_diagnostic()?
        .as_secs();
    let request = RawTransactionRequest {
        cycle_id: Some(cli.cycle),
        admin_id: Some(cli.admin),
        recipients: Some(recipients),
        total_amount: Some(total_amount),
        request_id: Some(
            cli.request_id
                .unwrap_or_else(|| format!("cli-{epoch_secs}")),
        ),
        sender_batch_id: Some(
            cli.sender_batch_id
                .unwrap_or_else(|| format!("cycle-{}-{epoch_secs}", cli.cycle)),
        ),
    };

    let store = Arc::new(InMemoryBatchStore::new());
    let gateway = if cli.fail_submission {
        Arc::new(SimulatedGateway::failing("simulated outage"))
    } else {
        Arc::new(SimulatedGateway::succeeding())
    };

    let orchestrator = Orchestrator::new(
        store.clone(),
        gateway,
        Arc::new(CircuitBreaker::default()),
        Arc::new(ConcurrencyLimiter::default()),
    );

    let result = orchestrator.execute_transaction(&request).await;
    println!("{}", serde_json::to_string_pretty(&result).into_diagnostic()?);

    if let Some(phase1) = &result.phase1 {
        let status = BatchStatusService::new(store)
            .status(phase1.batch_id)
            .await
            .into_diagnostic()?;
        println!("{}", serde_json::to_string_pretty(&status).into_diagnostic()?);
    }

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
