//! Concrete step lists for the two pipeline kinds.

mod logo;
mod mail;

pub use logo::{
    logo_pipeline, ApplyLogoStep, BackupOriginalStep, EnsureWorkDirStep, LogoPaths,
    ReplaceOriginalStep,
};
pub use mail::{mail_pipeline, BuildMessageStep, SendMessageStep};
