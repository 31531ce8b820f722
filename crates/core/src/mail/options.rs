use serde::{Deserialize, Serialize};

/// Version name under which report-wide defaults are stored.
pub const DEFAULT_VERSION: &str = "*ALL";

/// Known option types. Unknown types are carried through untouched.
pub struct OptionType;

impl OptionType {
    pub const TO: &'static str = "EMAIL_TO";
    pub const CC: &'static str = "EMAIL_CC";
    pub const BCC: &'static str = "EMAIL_BCC";
    pub const FROM: &'static str = "EMAIL_FROM";
    pub const SUBJECT: &'static str = "EMAIL_SUBJECT";
    pub const TEXT: &'static str = "EMAIL_TEXT";
}

/// One configured mail option, e.g. `EMAIL_TO = ap@example.com`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailOption {
    pub option_type: String,
    pub value: String,
}

impl MailOption {
    pub fn new(option_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            option_type: option_type.into().trim().to_string(),
            value: value.into().trim().to_string(),
        }
    }
}

/// Combine report defaults with version overrides.
///
/// Every report option whose type appears among the version options is
/// dropped; the version options are then appended.
pub fn merge_mail_options(report: &[MailOption], version: &[MailOption]) -> Vec<MailOption> {
    let mut merged: Vec<MailOption> = report
        .iter()
        .filter(|r| !version.iter().any(|v| v.option_type == r.option_type))
        .cloned()
        .collect();
    merged.extend(version.iter().cloned());
    merged
}
