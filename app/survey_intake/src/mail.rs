use std::future::Future;
use std::pin::Pin;

use framework::exception;
use framework::exception::CoreRsResult;
use lettre::AsyncSmtpTransport;
use lettre::AsyncTransport;
use lettre::Message;
use lettre::Tokio1Executor;
use lettre::message::Attachment;
use lettre::message::Mailbox;
use lettre::message::MultiPart;
use lettre::message::SinglePart;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use tracing::debug;

use crate::config::MailConfig;
use crate::report::LOGO_CONTENT_ID;
use crate::report::Mail;

const IMPLICIT_TLS_PORT: u16 = 465;

pub trait MailTransport: Send + Sync {
    fn send<'a>(
        &'a self,
        mail: &'a Mail,
        recipients: &'a [String],
    ) -> Pin<Box<dyn Future<Output = CoreRsResult<()>> + Send + 'a>>;
}

pub struct SmtpMailTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailTransport {
    pub fn new(config: &MailConfig) -> CoreRsResult<Self> {
        let from = config.from.parse::<Mailbox>().map_err(|err| {
            exception!(
                message = format!("invalid sender address, from={}", config.from),
                source = err
            )
        })?;
        // 465 is smtps, any other port upgrades with STARTTLS
        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };
        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .build();
        Ok(Self { transport, from })
    }

    async fn send_message(&self, mail: &Mail, recipients: &[String]) -> CoreRsResult<()> {
        let message = self.build_message(mail, recipients)?;
        let response = self.transport.send(message).await?;
        debug!(code = %response.code(), subject = %mail.subject, "mail sent");
        Ok(())
    }

    // html body and logo travel as multipart/related, the body refers to the logo by content id
    fn build_message(&self, mail: &Mail, recipients: &[String]) -> CoreRsResult<Message> {
        if recipients.is_empty() {
            return Err(exception!(message = "no recipient configured"));
        }
        let mut builder = Message::builder().from(self.from.clone()).subject(mail.subject.clone());
        for recipient in recipients {
            let mailbox = recipient.parse::<Mailbox>().map_err(|err| {
                exception!(message = format!("invalid recipient address, to={recipient}"), source = err)
            })?;
            builder = builder.to(mailbox);
        }
        let logo_type = ContentType::parse(mail.logo.mime_type())?;
        let logo = Attachment::new_inline(LOGO_CONTENT_ID.to_owned()).body(mail.logo.bytes().to_vec(), logo_type);
        let body = MultiPart::related()
            .singlepart(SinglePart::html(mail.html_body.clone()))
            .singlepart(logo);
        Ok(builder.multipart(body)?)
    }
}

impl MailTransport for SmtpMailTransport {
    fn send<'a>(
        &'a self,
        mail: &'a Mail,
        recipients: &'a [String],
    ) -> Pin<Box<dyn Future<Output = CoreRsResult<()>> + Send + 'a>> {
        Box::pin(self.send_message(mail, recipients))
    }
}
