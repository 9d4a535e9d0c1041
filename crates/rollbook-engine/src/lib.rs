//! rollbook Reconciliation Engine
//!
//! Everything between the membership database and the machines it
//! describes. The engine resolves new and renewing members against the
//! college registries, allocates UIDs from the on-disk counter, and
//! replays a season of front-end changes onto the OS in five ordered
//! passes (rename, convert, delete, add, renew).
//!
//! - [`resolver`] - registry lookup and category inference
//! - [`allocator`] - file-locked UID counter with commit-on-success leases
//! - [`changelog`] - the front end's append-only change log
//! - [`chain`] - rename-chain folding into net per-handle change sets
//! - [`snapshot`] - the directory state captured at presync
//! - [`pipeline`] - the five-pass sync and the presync capture
//! - [`provision`] - home directory operations behind a trait seam
//! - [`notify`] - account detail mail and per-season renewal markers
//! - [`shells`] - valid shell list and the previous generation's backups
//! - [`report`] - machine-readable per-pass outcome summaries

pub mod allocator;
pub mod chain;
pub mod changelog;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod provision;
pub mod report;
pub mod resolver;
pub mod shells;
pub mod snapshot;

pub use allocator::{CounterError, UidCounter, UidLease};
pub use chain::DerivedChanges;
pub use changelog::{read_changelog, ChangeLogEntry, ChangeLogError, LogAction};
pub use error::{EngineError, EngineResult};
pub use notify::{LoggingNotifier, MailNotifier, Notifier, NotifyConfig, NotifyError, RenewalMarkers};
pub use pipeline::{capture_presync, SyncOptions, SyncPipeline};
pub use provision::{AccountProvisioner, PosixProvisioner, ProvisionError};
pub use report::{MemberOutcome, Outcome, Pass, PassReport, SyncReport};
pub use resolver::{resolve, resolve_for_renewal, RegistrySource, Resolution};
pub use shells::{BackupShells, ShellsError, ValidShells};
pub use snapshot::{SnapshotEntry, SnapshotError, SyncSnapshot};
