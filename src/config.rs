use serde::Deserialize;

/// Options for issuing verification codes and the email that carries them.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    pub code_len: usize,
    pub email_subject: String,
    pub email_from: String,
    /// Body template; `{code}` interpolates the plaintext code.
    pub email_body: String,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            code_len: 4,
            email_subject: "Your Verification Code".into(),
            email_from: "webmaster@example.com".into(),
            email_body: "Your verification code is {code}".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// SMTP connection URL; when absent, emails are logged instead of sent.
    pub smtp_url: Option<String>,
    pub verification: VerificationConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let smtp_url = std::env::var("SMTP_URL").ok();

        let defaults = VerificationConfig::default();
        let verification = VerificationConfig {
            code_len: std::env::var("VERIFICATION_CODE_LEN")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(defaults.code_len),
            email_subject: std::env::var("VERIFICATION_EMAIL_SUBJECT")
                .unwrap_or(defaults.email_subject),
            email_from: std::env::var("VERIFICATION_EMAIL_FROM").unwrap_or(defaults.email_from),
            email_body: std::env::var("VERIFICATION_EMAIL_BODY").unwrap_or(defaults.email_body),
        };

        Ok(Self {
            database_url,
            smtp_url,
            verification,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_defaults_match_the_documented_ones() {
        let v = VerificationConfig::default();
        assert_eq!(v.code_len, 4);
        assert_eq!(v.email_subject, "Your Verification Code");
        assert_eq!(v.email_from, "webmaster@example.com");
        assert!(v.email_body.contains("{code}"));
    }
}
