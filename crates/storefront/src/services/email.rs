//! Order emails through SendGrid or EmailJS.
//!
//! Bodies for SendGrid are rendered from Askama templates. EmailJS renders
//! on its side from `template_params`, so only the parameters are sent.
//! Delivery is best-effort: callers spawn it and failures are only logged.

use askama::Template;
use pinkaura_core::{Order, Price};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::config::{EmailConfig, EmailProvider};

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// One line of an order as shown in email.
#[derive(Debug, Clone)]
struct EmailLine {
    name: String,
    units: u32,
    price: String,
}

/// Order fields shared by every template.
#[derive(Debug, Clone)]
struct OrderEmail {
    order_number: String,
    customer_name: String,
    customer_email: String,
    phone: String,
    address: String,
    subtotal: String,
    shipping: String,
    total: String,
    payment_proof_url: String,
    lines: Vec<EmailLine>,
}

impl From<&Order> for OrderEmail {
    fn from(order: &Order) -> Self {
        Self {
            order_number: order.order_number.to_string(),
            customer_name: order.customer.name.clone(),
            customer_email: order.customer.email.clone(),
            phone: order.customer.phone.clone(),
            address: order.customer.full_address(),
            subtotal: order.subtotal.display_inr(),
            shipping: order.shipping.display_inr(),
            total: order.total.display_inr(),
            payment_proof_url: order.payment_proof_url.clone(),
            lines: order
                .items
                .iter()
                .map(|item| EmailLine {
                    name: format!("{} ({})", item.product_name, item.variant_label),
                    units: item.quantity,
                    price: item.line_total.display_inr(),
                })
                .collect(),
        }
    }
}

/// HTML template for the customer confirmation.
#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    email: &'a OrderEmail,
}

/// Plain text template for the customer confirmation.
#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    email: &'a OrderEmail,
}

/// Plain text template for the store-owner notification.
#[derive(Template)]
#[template(path = "email/new_order.txt")]
struct NewOrderText<'a> {
    email: &'a OrderEmail,
}

// =============================================================================
// Provider payloads
// =============================================================================

#[derive(Serialize)]
struct SendGridMessage<'a> {
    personalizations: [SendGridPersonalization<'a>; 1],
    from: SendGridAddress<'a>,
    subject: String,
    content: Vec<SendGridContent>,
}

#[derive(Serialize)]
struct SendGridPersonalization<'a> {
    to: [SendGridAddress<'a>; 1],
}

#[derive(Serialize)]
struct SendGridAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
struct SendGridContent {
    #[serde(rename = "type")]
    kind: &'static str,
    value: String,
}

#[derive(Serialize)]
struct EmailJsRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
    template_params: EmailJsParams,
}

/// Parameters the EmailJS order template expects.
#[derive(Debug, Clone, Serialize)]
struct EmailJsParams {
    order_id: String,
    user_email: String,
    customer_name: String,
    customer_address: String,
    customer_phone: String,
    orders: Vec<EmailJsLine>,
    cost: EmailJsCost,
}

#[derive(Debug, Clone, Serialize)]
struct EmailJsLine {
    name: String,
    units: String,
    price: String,
}

#[derive(Debug, Clone, Serialize)]
struct EmailJsCost {
    shipping: String,
    tax: String,
    total: String,
}

fn two_places(price: Price) -> String {
    format!("{:.2}", price.amount())
}

impl EmailJsParams {
    fn for_order(order: &Order, recipient: &str) -> Self {
        Self {
            order_id: order.order_number.to_string(),
            user_email: recipient.to_string(),
            customer_name: order.customer.name.clone(),
            customer_address: order.customer.full_address(),
            customer_phone: order.customer.phone.clone(),
            orders: order
                .items
                .iter()
                .map(|item| EmailJsLine {
                    name: format!("{} ({})", item.product_name, item.variant_label),
                    units: item.quantity.to_string(),
                    price: two_places(item.line_total),
                })
                .collect(),
            cost: EmailJsCost {
                shipping: two_places(order.shipping),
                tax: two_places(Price::ZERO),
                total: two_places(order.total),
            },
        }
    }
}

/// Sends order emails with the configured provider.
#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    provider: EmailProvider,
    store_owner: Option<String>,
}

impl Mailer {
    /// Create a mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &EmailConfig) -> Result<Self, EmailError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            provider: config.provider.clone(),
            store_owner: config.store_owner_email.clone(),
        })
    }

    /// Whether any provider is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !matches!(self.provider, EmailProvider::Disabled)
    }

    /// Send the customer confirmation and, if a store owner address is
    /// configured, the new-order notification.
    ///
    /// # Errors
    ///
    /// Returns the first delivery or rendering error.
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub async fn send_order_emails(&self, order: &Order) -> Result<(), EmailError> {
        match &self.provider {
            EmailProvider::Disabled => Ok(()),
            EmailProvider::SendGrid { api_key, from, api_url } => {
                let email = OrderEmail::from(order);
                let html = OrderConfirmationHtml { email: &email }.render()?;
                let text = OrderConfirmationText { email: &email }.render()?;
                let subject = format!("Your Pinkaura order {}", email.order_number);
                self.send_sendgrid(
                    api_key,
                    api_url,
                    from,
                    (email.customer_email.as_str(), Some(email.customer_name.as_str())),
                    subject,
                    vec![
                        SendGridContent {
                            kind: "text/plain",
                            value: text,
                        },
                        SendGridContent {
                            kind: "text/html",
                            value: html,
                        },
                    ],
                )
                .await?;

                if let Some(owner) = &self.store_owner {
                    let text = NewOrderText { email: &email }.render()?;
                    let subject = format!("New order {} ({})", email.order_number, email.total);
                    self.send_sendgrid(
                        api_key,
                        api_url,
                        from,
                        (owner.as_str(), None),
                        subject,
                        vec![SendGridContent {
                            kind: "text/plain",
                            value: text,
                        }],
                    )
                    .await?;
                }
                info!("Order emails sent via SendGrid");
                Ok(())
            }
            EmailProvider::EmailJs {
                service_id,
                template_id,
                public_key,
                private_key,
                api_url,
            } => {
                let target = EmailJsTarget {
                    api_url,
                    service_id,
                    template_id,
                    public_key,
                    private_key: private_key.as_ref(),
                };
                self.send_emailjs(&target, EmailJsParams::for_order(order, &order.customer.email))
                    .await?;
                if let Some(owner) = &self.store_owner {
                    self.send_emailjs(&target, EmailJsParams::for_order(order, owner))
                        .await?;
                }
                info!("Order emails sent via EmailJS");
                Ok(())
            }
        }
    }

    /// Send order emails in the background, logging failures.
    pub fn spawn_order_emails(&self, order: Order) {
        if !self.is_enabled() {
            return;
        }
        let mailer = self.clone();
        tokio::spawn(async move {
            if let Err(e) = mailer.send_order_emails(&order).await {
                warn!(
                    error = %e,
                    order_number = %order.order_number,
                    "Failed to send order emails"
                );
            }
        });
    }

    async fn send_sendgrid(
        &self,
        api_key: &SecretString,
        api_url: &str,
        from: &str,
        to: (&str, Option<&str>),
        subject: String,
        content: Vec<SendGridContent>,
    ) -> Result<(), EmailError> {
        let message = SendGridMessage {
            personalizations: [SendGridPersonalization {
                to: [SendGridAddress {
                    email: to.0,
                    name: to.1,
                }],
            }],
            from: SendGridAddress {
                email: from,
                name: Some("Pinkaura"),
            },
            subject,
            content,
        };

        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.expose_secret()))
            .map_err(|e| EmailError::Api {
                status: 0,
                message: format!("Invalid API key format: {e}"),
            })?;
        let response = self
            .client
            .post(format!("{}/v3/mail/send", api_url.trim_end_matches('/')))
            .header(AUTHORIZATION, auth)
            .json(&message)
            .send()
            .await?;
        check_response(response).await
    }

    async fn send_emailjs(
        &self,
        target: &EmailJsTarget<'_>,
        params: EmailJsParams,
    ) -> Result<(), EmailError> {
        let request = EmailJsRequest {
            service_id: target.service_id,
            template_id: target.template_id,
            user_id: target.public_key,
            access_token: target.private_key.map(|k| k.expose_secret()),
            template_params: params,
        };
        let response = self
            .client
            .post(format!(
                "{}/api/v1.0/email/send",
                target.api_url.trim_end_matches('/')
            ))
            .json(&request)
            .send()
            .await?;
        check_response(response).await
    }
}

struct EmailJsTarget<'a> {
    api_url: &'a str,
    service_id: &'a str,
    template_id: &'a str,
    public_key: &'a str,
    private_key: Option<&'a SecretString>,
}

async fn check_response(response: reqwest::Response) -> Result<(), EmailError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let message = response.text().await.unwrap_or_default();
    Err(EmailError::Api {
        status: status.as_u16(),
        message,
    })
}
