use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{MailError, MailOption, OptionType};

/// A fully addressed message carrying one report as attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailMessage {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub from: Option<String>,
    pub subject: String,
    pub body: String,
    pub attachment_path: PathBuf,
    /// File name shown to the recipient, `<file_id>.pdf`.
    pub attachment_name: String,
}

impl MailMessage {
    /// Assemble the message for `file_id` from its resolved options.
    ///
    /// Address options may list several addresses separated by `,` or `;`.
    /// Fails when no `EMAIL_TO` address remains.
    pub fn from_options(
        file_id: &str,
        options: &[MailOption],
        attachment_path: PathBuf,
    ) -> Result<Self, MailError> {
        let addresses = |kind: &str| -> Vec<String> {
            options
                .iter()
                .filter(|o| o.option_type == kind)
                .flat_map(|o| o.value.split([',', ';']))
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(String::from)
                .collect()
        };
        let single = |kind: &str| -> Option<String> {
            options
                .iter()
                .find(|o| o.option_type == kind && !o.value.is_empty())
                .map(|o| o.value.clone())
        };

        let to = addresses(OptionType::TO);
        if to.is_empty() {
            return Err(MailError::NoRecipients {
                file_id: file_id.to_string(),
            });
        }

        let body = options
            .iter()
            .filter(|o| o.option_type == OptionType::TEXT)
            .map(|o| o.value.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Ok(Self {
            to,
            cc: addresses(OptionType::CC),
            bcc: addresses(OptionType::BCC),
            from: single(OptionType::FROM),
            subject: single(OptionType::SUBJECT).unwrap_or_else(|| format!("Report {}", file_id)),
            body,
            attachment_path,
            attachment_name: format!("{}.pdf", file_id),
        })
    }
}
