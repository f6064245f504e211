use super::sendmail::{MailError, Mailer, render_template};

const WELCOME_TEMPLATE: &str = include_str!("templates/Welcome-email.html");
const RESET_PASSWORD_TEMPLATE: &str = include_str!("templates/ResetPassword-email.html");
const REPORT_PUBLISHED_TEMPLATE: &str = include_str!("templates/ReportPublished-email.html");

pub async fn send_welcome_email(
    mailer: &Mailer,
    to_email: &str,
    username: &str,
    frontend_url: &str,
) -> Result<(), MailError> {
    let subject = format!("Hello {}, welcome to BAT App!", username);
    let html = render_template(
        WELCOME_TEMPLATE,
        &[("username", username), ("website_url", frontend_url)],
    );

    mailer.send_email(to_email, &subject, html).await
}

pub async fn send_forgot_password_email(
    mailer: &Mailer,
    to_email: &str,
    username: &str,
    token: &str,
    frontend_url: &str,
) -> Result<(), MailError> {
    let reset_link = format!("{}/reset-password?token={}", frontend_url, token);
    let html = render_template(
        RESET_PASSWORD_TEMPLATE,
        &[("username", username), ("reset_link", &reset_link)],
    );

    mailer.send_email(to_email, "Set your new password", html).await
}

/// Tell the owner a report is out, with a copy to whoever published it.
pub async fn send_report_published_email(
    mailer: &Mailer,
    owner_email: &str,
    owner_username: &str,
    publisher_email: &str,
    report_name: &str,
    frontend_url: &str,
) -> Result<(), MailError> {
    let html = render_template(
        REPORT_PUBLISHED_TEMPLATE,
        &[
            ("username", owner_username),
            ("report_name", report_name),
            ("website_url", frontend_url),
        ],
    );

    mailer
        .send_email(owner_email, "New report is now accessible.", html.clone())
        .await?;
    mailer
        .send_email(publisher_email, "COPY: New report is now accessible.", html)
        .await
}
