pub mod mails;
pub mod sendmail;

pub use sendmail::{Mailer, SmtpSettings};
