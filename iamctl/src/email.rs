//! Outbound mail: initial credentials and password reset links.

use lettre::{
    Address, AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::{path::Path, time::Duration};
use tracing::{debug, instrument};

use crate::{
    config::{Config, EmailTransportConfig},
    errors::Error,
};

/// What a new employee needs to sign in for the first time.
#[derive(Debug, Clone)]
pub struct CredentialContext {
    pub name: String,
    pub username: String,
    pub password: String,
    pub role: String,
    pub department: String,
}

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
    reset_ttl: Duration,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                let emails_dir = Path::new(path);
                std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                    operation: format!("create emails directory: {e}"),
                })?;
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
            reset_ttl: config.auth.password_reset.token_ttl,
        })
    }

    /// Send a new employee their username and generated password.
    #[instrument(skip(self, context), err)]
    pub async fn send_credential_email(&self, to_email: &str, context: &CredentialContext) -> Result<(), Error> {
        let body = credential_body(context);
        self.send_email(to_email, &context.name, "Your account has been created", &body)
            .await
    }

    /// Send a password reset link.
    #[instrument(skip(self, link), err)]
    pub async fn send_password_reset_email(&self, to_email: &str, to_name: &str, link: &str) -> Result<(), Error> {
        let body = reset_body(to_name, link, self.reset_ttl);
        self.send_email(to_email, to_name, "Password Reset Request", &body).await
    }

    async fn send_email(&self, to_email: &str, to_name: &str, subject: &str, body: &str) -> Result<(), Error> {
        let from_address = self.from_email.parse::<Address>().map_err(|e| Error::Internal {
            operation: format!("parse from email: {e}"),
        })?;
        let from = Mailbox::new(Some(self.from_name.clone()), from_address);

        let to_address = to_email.parse::<Address>().map_err(|e| Error::Mail {
            message: format!("invalid recipient {to_email}: {e}"),
        })?;
        let to = Mailbox::new(Some(to_name.to_string()), to_address);

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Mail { message: e.to_string() })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Mail { message: e.to_string() })?;
            }
        }

        debug!(subject, "Email sent");
        Ok(())
    }
}

const STYLE: &str = r#"body { font-family: Arial, sans-serif; line-height: 1.6; color: #333; }
        .container { max-width: 600px; margin: 0 auto; padding: 20px; }
        .footer { margin-top: 30px; font-size: 12px; color: #666; }"#;

fn page(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <style>
        {STYLE}
    </style>
</head>
<body>
    <div class="container">
        <h2>{title}</h2>
{content}
        <div class="footer">
            <p>This is an automated message, please do not reply to this email.</p>
        </div>
    </div>
</body>
</html>"#
    )
}

fn credential_body(context: &CredentialContext) -> String {
    let content = format!(
        r#"        <p>Hello {name},</p>

        <p>An account has been created for you as <strong>{role}</strong> in the <strong>{department}</strong> department.</p>

        <p>Username: <code>{username}</code><br>
        Password: <code>{password}</code></p>

        <p>Please sign in and change your password.</p>
"#,
        name = context.name,
        role = context.role,
        department = context.department,
        username = context.username,
        password = context.password,
    );
    page("Welcome", &content)
}

fn reset_body(to_name: &str, reset_link: &str, ttl: Duration) -> String {
    let minutes = (ttl.as_secs() / 60).max(1);
    let content = format!(
        r#"        <p>Hello {to_name},</p>

        <p>We received a request to reset your password. If you didn't make this request, you can safely ignore this email.</p>

        <p><a href="{reset_link}">Reset your password</a></p>

        <p>Or copy and paste this link into your browser:</p>
        <p>{reset_link}</p>

        <p>This link will expire in {minutes} minutes.</p>
"#
    );
    page("Password Reset Request", &content)
}
