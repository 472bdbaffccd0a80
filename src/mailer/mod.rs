use async_trait::async_trait;

/// Messages the API sends to users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Template {
    UserWelcome {
        name: String,
        user_id: i64,
        activation_token: String,
    },
    TokenActivation {
        activation_token: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub plain_body: String,
}

impl Template {
    pub fn render(&self) -> Email {
        match self {
            Template::UserWelcome {
                name,
                user_id,
                activation_token,
            } => Email {
                subject: "Welcome to Greenlight!".to_string(),
                plain_body: format!(
                    "Hi {name},\n\n\
                     Thanks for signing up for a Greenlight account. We're excited to have you on board!\n\n\
                     For future reference, your user ID number is {user_id}.\n\n\
                     Please send a request to the `PUT /v1/users/activated` endpoint with the following JSON \
                     body to activate your account:\n\n\
                     {{\"token\": \"{activation_token}\"}}\n\n\
                     Please note that this is a one-time use token and it will expire in 3 days.\n\n\
                     Thanks,\n\nThe Greenlight Team\n"
                ),
            },
            Template::TokenActivation { activation_token } => Email {
                subject: "Activate your Greenlight account".to_string(),
                plain_body: format!(
                    "Hi,\n\n\
                     Please send a `PUT /v1/users/activated` request with the following JSON body to \
                     activate your account:\n\n\
                     {{\"token\": \"{activation_token}\"}}\n\n\
                     Please note that this is a one-time use token and it will expire in 3 days.\n\n\
                     Thanks,\n\nThe Greenlight Team\n"
                ),
            },
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, recipient: &str, template: Template) -> anyhow::Result<()>;
}

/// Renders mail and writes it to the log instead of delivering it.
pub struct LogMailer {
    sender: String,
}

impl LogMailer {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, recipient: &str, template: Template) -> anyhow::Result<()> {
        let email = template.render();
        tracing::info!(
            from = %self.sender,
            to = %recipient,
            subject = %email.subject,
            "email queued"
        );
        tracing::debug!(body = %email.plain_body, "email body");
        Ok(())
    }
}
