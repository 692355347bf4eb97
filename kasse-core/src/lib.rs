//! Kasse Core - card-swipe ingestion and balance ledger
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities (User, Card, Transaction, SwipeResult)
//! - **ports**: Trait definitions for external dependencies (CardReader, ResultReporter)
//! - **services**: Business logic orchestration (ledger, registration, routing, ingestion)
//! - **adapters**: Concrete implementations (DuckDB, readers, reporters)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use adapters::duckdb::DuckDbRepository;
use adapters::reader::PollingReader;
use config::Config;
use ports::{CardScanner, ResultReporter};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, Result};
pub use domain::{
    Card, CardEvent, CardId, ResultCode, SwipeRejection, SwipeReport, SwipeResult, Transaction, User,
};

/// Main context for Kasse operations
///
/// Holds the store, configuration and every service, wired together once.
/// There is no global state; everything that handles swipes shares the
/// registration rendezvous through this context.
pub struct KasseContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub repository: Arc<DuckDbRepository>,
    pub accounts: AccountService,
    pub cards: Arc<CardService>,
    pub ledger: Arc<LedgerService>,
    pub registration: Arc<Registration>,
    pub router: Arc<CardRouter>,
    pub status: StatusService,
}

impl KasseContext {
    /// Load `settings.json` from `data_dir` and open the configured database
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        Self::with_config(data_dir, config)
    }

    pub fn with_config(data_dir: &Path, config: Config) -> Result<Self> {
        config.validate()?;
        let repository = DuckDbRepository::new(&config.database_path(data_dir))?;
        Self::build(data_dir, config, repository)
    }

    /// Context over an in-memory database; nothing is persisted
    pub fn in_memory(config: Config) -> Result<Self> {
        config.validate()?;
        Self::build(Path::new("."), config, DuckDbRepository::in_memory()?)
    }

    fn build(data_dir: &Path, config: Config, repository: DuckDbRepository) -> Result<Self> {
        repository.ensure_schema()?;
        let repository = Arc::new(repository);

        let cards = Arc::new(CardService::new(Arc::clone(&repository)));
        let ledger = Arc::new(LedgerService::new(Arc::clone(&repository), &config));
        let registration = Arc::new(Registration::new());
        let router = Arc::new(CardRouter::new(
            Arc::clone(&registration),
            Arc::clone(&ledger),
            Arc::clone(&cards),
            config.registration_timeout,
        ));

        Ok(Self {
            accounts: AccountService::new(Arc::clone(&repository)),
            status: StatusService::new(Arc::clone(&repository)),
            data_dir: data_dir.to_path_buf(),
            config,
            repository,
            cards,
            ledger,
            registration,
            router,
        })
    }

    /// Ingestion service reporting to `reporter`, sharing this context's router
    pub fn ingest_service(&self, reporter: Arc<dyn ResultReporter>) -> IngestService {
        IngestService::new(Arc::clone(&self.router), reporter)
    }

    /// Reader polling `scanner` at the configured `polling_interval`
    pub fn polling_reader<S: CardScanner + 'static>(&self, scanner: S) -> PollingReader<S> {
        PollingReader::new(scanner, self.config.polling_interval)
    }
}
