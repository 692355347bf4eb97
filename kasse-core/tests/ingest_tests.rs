//! End-to-end ingestion tests: reader -> router -> ledger/registration -> reporter
//!
//! Run with: cargo test --test ingest_tests -- --nocapture

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;

use kasse_core::adapters::reader::{ChannelReader, ReaderHandle};
use kasse_core::adapters::reporter::BroadcastReporter;
use kasse_core::config::Config;
use kasse_core::ports::{CardReader, CardScanner};
use kasse_core::services::{EntryPoint, LoggingService};
use kasse_core::{CardId, Error, KasseContext, ResultCode, SwipeReport};

fn card(id: &str) -> CardId {
    CardId::new(id.as_bytes().to_vec())
}

fn context() -> Arc<KasseContext> {
    let config = Config {
        registration_timeout: Duration::from_secs(5),
        ..Config::default()
    };
    let ctx = KasseContext::in_memory(config).unwrap();
    let mero = ctx.accounts.register("Merovius", "password").unwrap();
    ctx.cards.add_card(&mero, card("aaaa"), None).unwrap();
    ctx.accounts.top_up("Merovius", 800).unwrap();
    Arc::new(ctx)
}

struct Running {
    handle: ReaderHandle,
    reports: broadcast::Receiver<SwipeReport>,
    service: tokio::task::JoinHandle<kasse_core::Result<()>>,
}

fn start(ctx: &Arc<KasseContext>) -> Running {
    let reporter = Arc::new(BroadcastReporter::new(16));
    let reports = reporter.subscribe();
    let (reader, handle) = ChannelReader::new();

    let ctx = Arc::clone(ctx);
    let service = tokio::spawn(async move {
        ctx.ingest_service(reporter).run(Box::new(reader)).await
    });
    Running {
        handle,
        reports,
        service,
    }
}

#[tokio::test]
async fn test_swipe_is_charged_and_reported() {
    let ctx = context();
    let mut running = start(&ctx);

    running.handle.swipe(card("aaaa").as_bytes().to_vec()).await.unwrap();
    let report = running.reports.recv().await.unwrap();
    assert_eq!(report.code, ResultCode::PaymentMade);
    assert_eq!(report.user, "Merovius");
    assert_eq!(report.balance, 700);
    assert_eq!(report.card, "61616161");

    running.handle.swipe(b"foobar".to_vec()).await.unwrap();
    let report = running.reports.recv().await.unwrap();
    assert_eq!(report.code, ResultCode::CardNotFound);
    assert_eq!(report.user, "");

    drop(running.handle);
    running.service.await.unwrap().unwrap();
    assert_eq!(ctx.accounts.balance("Merovius").unwrap().balance, 700);
}

#[tokio::test]
async fn test_enrollment_claims_next_swipe() {
    let ctx = context();
    let mut running = start(&ctx);
    let koebi = ctx.accounts.register("Koebi", "password1").unwrap();

    let enrolling = {
        let ctx = Arc::clone(&ctx);
        let koebi = koebi.clone();
        tokio::spawn(async move { ctx.router.enroll(&koebi, Some("blue tag")).await })
    };
    while !ctx.registration.is_open() {
        tokio::task::yield_now().await;
    }

    // Claimed by the window: not charged, not reported
    running.handle.swipe(b"baaa".to_vec()).await.unwrap();
    let enrolled = enrolling.await.unwrap().unwrap().unwrap();
    assert_eq!(enrolled.id, card("baaa"));
    assert_eq!(enrolled.user_id, koebi.id);
    assert_eq!(enrolled.description.as_deref(), Some("blue tag"));
    assert_eq!(ctx.repository.count_transactions(koebi.id).unwrap(), 0);

    // The next swipe of the same card is charged
    running.handle.swipe(b"baaa".to_vec()).await.unwrap();
    let report = running.reports.recv().await.unwrap();
    assert_eq!(report.code, ResultCode::AccountEmpty);
    assert_eq!(report.user, "Koebi");

    drop(running.handle);
    running.service.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_second_registration_is_rejected_while_one_is_open() {
    let ctx = context();
    let running = start(&ctx);

    let window = ctx.registration.try_begin().unwrap();
    assert!(matches!(ctx.registration.try_begin(), Err(Error::RegistrationBusy)));

    running.handle.swipe(b"aaaa".to_vec()).await.unwrap();
    assert_eq!(window.wait(Duration::from_secs(5)).await, Some(card("aaaa")));
    assert_eq!(ctx.accounts.balance("Merovius").unwrap().balance, 800);

    assert!(ctx.registration.try_begin().is_ok());
    drop(running.handle);
    running.service.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_expired_registration_reverts_to_charging() {
    let ctx = context();
    let mut running = start(&ctx);
    let mero = ctx.accounts.get_user("Merovius").unwrap();

    let enrolled = ctx.router.enroll(&mero, None).await.unwrap();
    assert!(enrolled.is_none());

    running.handle.swipe(b"aaaa".to_vec()).await.unwrap();
    let report = running.reports.recv().await.unwrap();
    assert_eq!(report.code, ResultCode::PaymentMade);

    drop(running.handle);
    running.service.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_reader_fault_ends_service_and_is_logged() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Arc::new(LoggingService::new(temp_dir.path(), EntryPoint::Service, "test").unwrap());
    let ctx = context();

    let reporter = Arc::new(BroadcastReporter::new(16));
    let mut reports = reporter.subscribe();
    let (reader, handle) = ChannelReader::new();
    let service = ctx.ingest_service(reporter).with_logger(Arc::clone(&logger));

    handle.swipe(b"aaaa".to_vec()).await.unwrap();
    handle.fail(Error::reader("device unplugged")).await.unwrap();

    let err = service.run(Box::new(reader)).await.unwrap_err();
    assert!(matches!(err, Error::Reader(_)));
    assert_eq!(reports.recv().await.unwrap().code, ResultCode::PaymentMade);

    let events: Vec<_> = logger
        .get_recent(10)
        .unwrap()
        .into_iter()
        .map(|e| (e.event, e.outcome))
        .collect();
    assert!(events.contains(&("swipe_processed".to_string(), Some("payment_made".to_string()))));
    assert!(events.iter().any(|(event, _)| event == "reader_error"));

    // Nothing identifying ends up in the event log
    for entry in logger.get_recent(10).unwrap() {
        let text = serde_json::to_string(&entry).unwrap();
        assert!(!text.contains("Merovius"));
        assert!(!text.contains("61616161"));
    }
}

/// Reports an empty field a fixed number of times, then one card
struct SlowPresenter {
    empty_scans: usize,
}

impl CardScanner for SlowPresenter {
    fn scan(&mut self) -> kasse_core::Result<Vec<Vec<u8>>> {
        if self.empty_scans == 0 {
            return Ok(vec![b"aaaa".to_vec()]);
        }
        self.empty_scans -= 1;
        Ok(Vec::new())
    }
}

#[tokio::test(start_paused = true)]
async fn test_polling_reader_uses_configured_interval() {
    let config = Config {
        polling_interval: Duration::from_millis(250),
        ..Config::default()
    };
    let ctx = KasseContext::in_memory(config).unwrap();
    let mut reader = ctx.polling_reader(SlowPresenter { empty_scans: 2 });

    let started = tokio::time::Instant::now();
    assert_eq!(reader.next_uid().await.unwrap(), b"aaaa".to_vec());
    let elapsed = started.elapsed();

    // Two empty scans, each followed by one configured pause
    assert!(elapsed >= Duration::from_millis(500), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(750), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_polling_reader_feeds_ingestion() {
    let ctx = context();
    let reporter = Arc::new(BroadcastReporter::new(16));
    let mut reports = reporter.subscribe();
    let reader = ctx.polling_reader(SlowPresenter { empty_scans: 3 });

    let service = {
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move { ctx.ingest_service(reporter).run(Box::new(reader)).await })
    };

    let report = reports.recv().await.unwrap();
    assert_eq!(report.code, ResultCode::PaymentMade);
    assert_eq!(report.balance, 700);
    service.abort();
}
