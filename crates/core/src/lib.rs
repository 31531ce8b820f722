pub mod claim;
pub mod command;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod feed;
pub mod fileops;
pub mod job;
pub mod ledger;
pub mod mail;
pub mod metrics;
pub mod pipeline;
pub mod poller;
pub mod stamper;
pub mod steps;
pub mod testing;
pub mod worker;

pub use claim::{AcquireOutcome, Claim, ClaimError, ClaimGuard, ClaimStore, SqliteClaimStore};
pub use command::{CommandConfig, CommandError, CommandOutput};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LogFormat,
    SanitizedConfig,
};
pub use coordinator::{CandidateOutcome, CandidateState, Coordinator, CoordinatorError};
pub use db::{Database, DatabaseError};
pub use feed::{FeedError, FeedQuery, JobFeed, SqliteJobFeed};
pub use fileops::{CopiedFile, FileOps, FsError, LocalFileOps};
pub use job::{AllowList, ArrivalKey, JdeTimestamp, JobCandidate, ProcessKind, UnknownProcessKind};
pub use ledger::{Ledger, LedgerEntry, LedgerError, LedgerFilter, SqliteLedger};
pub use mail::{
    CommandMailSender, MailError, MailMessage, MailOption, MailOptionsStore, MailSender,
    OptionType, SqliteMailOptions,
};
pub use pipeline::{
    PipelineRunner, RunContext, RunFailure, RunOutcome, RunReport, Step, StepError, StepOutput,
    StepResult,
};
pub use poller::{Marker, PollError, Poller};
pub use stamper::{CommandStamper, Stamper, StamperError};
pub use steps::{logo_pipeline, mail_pipeline, LogoPaths};
pub use worker::{CycleSummary, PipelineLoop, PipelineLoopStatus, Worker, WorkerStatus};
