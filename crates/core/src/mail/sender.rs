use async_trait::async_trait;

use super::{MailError, MailMessage};
use crate::command::CommandConfig;

/// Delivers an assembled message.
#[async_trait]
pub trait MailSender: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Hands the message to an external mail program.
///
/// Arguments may use `{to}`, `{cc}`, `{bcc}`, `{from}`, `{subject}`,
/// `{attachment}` and `{attachment_name}`; address lists are comma
/// separated. The body is written to the program's stdin.
pub struct CommandMailSender {
    command: CommandConfig,
}

impl CommandMailSender {
    pub fn new(command: CommandConfig) -> Self {
        Self { command }
    }
}

#[async_trait]
impl MailSender for CommandMailSender {
    fn name(&self) -> &str {
        &self.command.program
    }

    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        if !tokio::fs::try_exists(&message.attachment_path)
            .await
            .unwrap_or(false)
        {
            return Err(MailError::AttachmentMissing {
                path: message.attachment_path.display().to_string(),
            });
        }

        let to = message.to.join(",");
        let cc = message.cc.join(",");
        let bcc = message.bcc.join(",");
        let from = message.from.clone().unwrap_or_default();
        let attachment = message.attachment_path.to_string_lossy();

        self.command
            .run(
                &[
                    ("to", to.as_str()),
                    ("cc", cc.as_str()),
                    ("bcc", bcc.as_str()),
                    ("from", from.as_str()),
                    ("subject", message.subject.as_str()),
                    ("attachment", attachment.as_ref()),
                    ("attachment_name", message.attachment_name.as_str()),
                ],
                Some(message.body.as_bytes()),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn message(attachment_path: PathBuf) -> MailMessage {
        MailMessage {
            to: vec!["a@example.com".to_string(), "b@example.com".to_string()],
            cc: vec![],
            bcc: vec![],
            from: Some("jde@example.com".to_string()),
            subject: "Freeze".to_string(),
            body: "Attached.".to_string(),
            attachment_path,
            attachment_name: "R1_A_1.pdf".to_string(),
        }
    }

    #[tokio::test]
    async fn test_command_receives_fields_and_body() {
        let temp = TempDir::new().unwrap();
        let attachment = temp.path().join("R1_A_1");
        let capture = temp.path().join("sent.txt");
        tokio::fs::write(&attachment, b"%PDF").await.unwrap();

        let script = format!(
            "{{ echo '{{to}}|{{from}}|{{subject}}|{{attachment_name}}'; cat; }} > {}",
            capture.display()
        );
        let sender = CommandMailSender::new(CommandConfig::new(
            "sh",
            vec!["-c".to_string(), script],
        ));

        sender.send(&message(attachment)).await.unwrap();

        let sent = tokio::fs::read_to_string(&capture).await.unwrap();
        assert_eq!(
            sent,
            "a@example.com,b@example.com|jde@example.com|Freeze|R1_A_1.pdf\nAttached."
        );
    }

    #[tokio::test]
    async fn test_missing_attachment_is_error() {
        let temp = TempDir::new().unwrap();
        let sender = CommandMailSender::new(CommandConfig::new("true", vec![]));
        let err = sender
            .send(&message(temp.path().join("missing")))
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::AttachmentMissing { .. }));
    }
}
