//! Serve command - run the swipe ingestion service
//!
//! Card identifiers are read as hex lines from stdin, one swipe per line.

use std::sync::Arc;

use anyhow::{Context, Result};
use kasse_core::adapters::reader::LineReader;
use kasse_core::adapters::reporter::{BroadcastReporter, TracingReporter};
use kasse_core::ports::ResultReporter;
use kasse_core::services::{EntryPoint, LoggingService};
use kasse_core::{KasseContext, SwipeReport, User};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use super::{get_context, get_logger};
use crate::output;

pub struct ServeOptions {
    pub register_user: Option<String>,
    pub description: Option<String>,
    /// Report through the log only, no terminal display
    pub headless: bool,
    pub json: bool,
}

pub fn run(options: ServeOptions) -> Result<()> {
    let ctx = Arc::new(get_context()?);
    let logger = get_logger(EntryPoint::Service).map(Arc::new);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let result = runtime.block_on(serve(ctx, logger, options));
    // A pending stdin read cannot be cancelled
    runtime.shutdown_background();
    result
}

async fn serve(ctx: Arc<KasseContext>, logger: Option<Arc<LoggingService>>, options: ServeOptions) -> Result<()> {
    let reporter: Arc<dyn ResultReporter> = if options.headless {
        Arc::new(TracingReporter)
    } else {
        let reporter = BroadcastReporter::new(16);
        tokio::spawn(display(reporter.subscribe(), options.json));
        Arc::new(reporter)
    };

    let mut service = ctx.ingest_service(reporter);
    if let Some(logger) = &logger {
        service = service.with_logger(Arc::clone(logger));
        if let Err(e) = logger.log_event("service_started") {
            warn!(error = %e, "failed to write event log");
        }
    }

    if let Some(name) = options.register_user {
        let user = ctx.accounts.get_user(&name)?;
        tokio::spawn(enroll(Arc::clone(&ctx), user, options.description));
    }

    if !options.headless && atty::is(atty::Stream::Stdin) {
        output::info("Type or scan card ids as hex, one per line. Ctrl-D stops the service.");
    }
    info!(
        debit = ctx.ledger.debit_amount(),
        low_balance_threshold = ctx.config.low_balance_threshold,
        "reading card ids from stdin"
    );

    tokio::select! {
        result = service.run(Box::new(LineReader::stdin())) => {
            result.context("Reader failed")?;
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }
    Ok(())
}

/// Terminal display fed by the broadcast reporter
async fn display(mut reports: broadcast::Receiver<SwipeReport>, json: bool) {
    loop {
        match reports.recv().await {
            Ok(report) if json => match serde_json::to_string(&report) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!(error = %e, "failed to encode report"),
            },
            Ok(report) => output::print_report(&report),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "display fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}

async fn enroll(ctx: Arc<KasseContext>, user: User, description: Option<String>) {
    output::info(&format!(
        "Swipe the card to register for {} within {}s",
        user.name,
        ctx.config.registration_timeout.as_secs()
    ));
    match ctx.router.enroll(&user, description.as_deref()).await {
        Ok(Some(card)) => output::success(&format!("Registered card {} for {}", card.id, user.name)),
        Ok(None) => output::warning("No card swiped, registration window closed"),
        Err(e) => output::error(&format!("Registration failed: {}", e)),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
