//! Report mailing: recipient configuration, message assembly and delivery.
//!
//! Recipient configuration is kept per report with optional per-version
//! overrides. A version option of some type fully replaces the report-level
//! options of that type; every other report-level option still applies.

mod error;
mod message;
mod options;
mod sender;
mod store;

pub use error::MailError;
pub use message::MailMessage;
pub use options::{merge_mail_options, MailOption, OptionType, DEFAULT_VERSION};
pub use sender::{CommandMailSender, MailSender};
pub use store::{MailOptionsStore, SqliteMailOptions};
