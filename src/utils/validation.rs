use crate::utils::error::{Result, RunbookError};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Short hostnames must not contain dots, matching the remote inventory convention.
pub fn validate_hostname(field_name: &str, hostname: &str) -> Result<()> {
    if hostname.is_empty() {
        return Err(RunbookError::ValidationError {
            field: field_name.to_string(),
            value: hostname.to_string(),
            reason: "hostname cannot be empty".to_string(),
        });
    }

    if hostname.contains('.') {
        return Err(RunbookError::ValidationError {
            field: field_name.to_string(),
            value: hostname.to_string(),
            reason: "contains a dot, likely not a short hostname".to_string(),
        });
    }

    Ok(())
}

pub fn validate_fqdn(field_name: &str, fqdn: &str) -> Result<()> {
    if !fqdn.contains('.') {
        return Err(RunbookError::ValidationError {
            field: field_name.to_string(),
            value: fqdn.to_string(),
            reason: "expected a fully qualified domain name".to_string(),
        });
    }

    Ok(())
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(RunbookError::ValidationError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(RunbookError::ValidationError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(RunbookError::ValidationError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(RunbookError::ValidationError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_with_domain_is_rejected() {
        assert!(validate_hostname("osd-host", "cloudcephosd1001.eqiad.wmnet").is_err());
        assert!(validate_hostname("osd-host", "cloudcephosd1001").is_ok());
    }

    #[test]
    fn fqdn_without_domain_is_rejected() {
        assert!(validate_fqdn("fqdn-to-reboot", "cloudcephosd1001").is_err());
        assert!(validate_fqdn("fqdn-to-reboot", "cloudcephosd1001.eqiad.wmnet").is_ok());
    }

    #[test]
    fn only_http_urls_are_accepted() {
        assert!(validate_url("alertmanager-url", "http://alertmanager.svc:9093").is_ok());
        assert!(validate_url("alertmanager-url", "ftp://alertmanager.svc").is_err());
        assert!(validate_url("alertmanager-url", "").is_err());
    }
}
