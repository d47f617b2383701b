use anyhow::{anyhow, Context, Result};
use clap::Parser;
use common_observability::ReimbursementMetrics;
use reimbursement_service::{
    load_reimbursement_config, AuditNotifier, PgReimbursementStore, ReimbursementNotifier, ReimbursementService,
    ReimbursementStore,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(about = "Create, preview and perform reimbursements", long_about = None)]
struct Options {
    /// Build and create a reimbursement from this customer return, then perform it
    #[arg(long = "customer-return", value_name = "UUID", conflicts_with = "reimbursement")]
    customer_return: Option<Uuid>,

    /// Perform an existing reimbursement
    #[arg(long = "reimbursement", value_name = "UUID")]
    reimbursement: Option<Uuid>,

    /// Print the refund and exchange plan without writing anything
    #[arg(long = "dry-run")]
    dry_run: bool,

    /// Apply pending schema migrations before running
    #[arg(long = "migrate")]
    migrate: bool,

    /// Dump prometheus metrics to stderr on exit
    #[arg(long = "metrics")]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let opts = Options::parse();
    if opts.customer_return.is_none() && opts.reimbursement.is_none() {
        return Err(anyhow!("pass --customer-return or --reimbursement"));
    }

    let config = load_reimbursement_config()?;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set for reimburse")?;
    let pool = PgPool::connect(&database_url).await.context("Failed to connect to DATABASE_URL")?;
    let pg = PgReimbursementStore::new(pool);
    if opts.migrate {
        pg.migrate().await.context("Failed to apply migrations")?;
    }
    let store: Arc<dyn ReimbursementStore> = Arc::new(pg);
    let notifier = build_notifier(&config.audit_topic, &config.source_service)?;
    let metrics = Arc::new(ReimbursementMetrics::new());
    let service = ReimbursementService::new(store.clone(), notifier, config, metrics.clone());

    let outcome = run(&opts, &service, &*store).await;
    if opts.metrics {
        eprintln!("{}", metrics.render());
    }
    outcome
}

async fn run(opts: &Options, service: &ReimbursementService, store: &dyn ReimbursementStore) -> Result<()> {
    if let Some(customer_return_id) = opts.customer_return {
        if opts.dry_run {
            let customer_return = store
                .customer_return(customer_return_id)
                .await?
                .ok_or_else(|| anyhow!("customer return {customer_return_id} not found"))?;
            let preview = service.build_from_customer_return(&customer_return);
            println!("{}", serde_json::to_string_pretty(&preview)?);
            println!("total: {}", service.display_total(&preview).await?);
            return Ok(());
        }
        let created = service
            .create_from_customer_return(customer_return_id)
            .await
            .with_context(|| format!("Failed to create reimbursement for customer return {customer_return_id}"))?;
        return perform(service, created.id).await;
    }

    if let Some(reimbursement_id) = opts.reimbursement {
        if opts.dry_run {
            let plan = service.simulate(reimbursement_id).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
            if !plan.is_complete() {
                println!("payments fall short by {}", plan.shortfall);
            }
            return Ok(());
        }
        return perform(service, reimbursement_id).await;
    }
    Ok(())
}

async fn perform(service: &ReimbursementService, id: Uuid) -> Result<()> {
    let performed = service
        .perform(id)
        .await
        .with_context(|| format!("Failed to perform reimbursement {id}"))?;
    println!("{}", serde_json::to_string_pretty(&performed)?);
    println!("refunded: {}", service.display_total(&performed).await?);
    Ok(())
}

#[cfg(any(feature = "kafka", feature = "kafka-producer"))]
fn build_notifier(topic: &str, source_service: &str) -> Result<Arc<dyn ReimbursementNotifier>> {
    use common_audit::KafkaAuditSink;
    let bootstrap = std::env::var("KAFKA_BOOTSTRAP").unwrap_or_else(|_| "localhost:9092".into());
    let sink = KafkaAuditSink::from_bootstrap(&bootstrap).context("Failed to create Kafka audit sink")?;
    Ok(Arc::new(AuditNotifier::new(sink, topic, source_service)))
}

#[cfg(not(any(feature = "kafka", feature = "kafka-producer")))]
fn build_notifier(topic: &str, source_service: &str) -> Result<Arc<dyn ReimbursementNotifier>> {
    use common_audit::NoopAuditSink;
    Ok(Arc::new(AuditNotifier::new(NoopAuditSink, topic, source_service)))
}
