//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod accounts;
mod cards;
mod ingest;
mod ledger;
pub mod logging;
pub mod migration;
mod registration;
mod router;
mod status;

pub use accounts::{AccountService, BalanceSummary};
pub use cards::CardService;
pub use ingest::IngestService;
pub use ledger::LedgerService;
pub use logging::{EntryPoint, EventCount, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use registration::{Registration, RegistrationWindow};
pub use router::{CardRouter, RouteOutcome};
pub use status::{StatusService, StatusSummary};
