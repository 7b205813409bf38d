//! Per-market HTTP header policy.
//!
//! User-Agent selection and authentication depend on the host being fetched:
//! SEC requires a contact string, Companies House requires HTTP Basic with
//! the API key as username and an iXBRL Accept header, everything else gets
//! the generic agent.

use reqwest::RequestBuilder;

use filing_hub_core::config::CredentialsConfig;

pub const DEFAULT_USER_AGENT: &str = "FilingHub/0.1";

/// Accept value requesting iXBRL from the Companies House Document API
pub const ACCEPT_IXBRL: &str = "application/xhtml+xml";

/// Companies House hosts (metadata API and document API)
const COMPANIES_HOUSE_HOSTS: &[&str] = &[
    "document-api.company-information.service.gov.uk",
    "api.companieshouse.gov.uk",
];

const SEC_HOSTS: &[&str] = &["sec.gov", "www.sec.gov", "data.sec.gov"];

/// Whether a URL points at the Companies House APIs
pub fn is_companies_house_url(url: &str) -> bool {
    COMPANIES_HOUSE_HOSTS.iter().any(|host| url.contains(host))
}

/// Whether a URL points at an SEC host
pub fn is_sec_url(url: &str) -> bool {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(String::from))
        .map(|host| {
            SEC_HOSTS
                .iter()
                .any(|sec| host == *sec || host.ends_with(".sec.gov"))
        })
        .unwrap_or(false)
}

/// User-Agent for a URL, per market policy
pub fn user_agent_for(url: &str, credentials: &CredentialsConfig) -> String {
    if is_companies_house_url(url) {
        credentials.uk_ch_user_agent.clone()
    } else if is_sec_url(url) {
        credentials.sec_user_agent.clone()
    } else {
        DEFAULT_USER_AGENT.to_string()
    }
}

/// Attach the market-appropriate headers and auth to a request.
///
/// Companies House additionally gets HTTP Basic with `apikey:` (empty
/// password) and an iXBRL-preferring Accept header.
pub fn apply_market_headers(
    builder: RequestBuilder,
    url: &str,
    credentials: &CredentialsConfig,
) -> RequestBuilder {
    apply_market_headers_with_accept(builder, url, credentials, None)
}

/// Same as [`apply_market_headers`] but with an explicit Accept value that
/// overrides the market default. Used by the content-negotiation ladder.
pub fn apply_market_headers_with_accept(
    builder: RequestBuilder,
    url: &str,
    credentials: &CredentialsConfig,
    accept: Option<&str>,
) -> RequestBuilder {
    let mut builder = builder.header(reqwest::header::USER_AGENT, user_agent_for(url, credentials));

    if is_companies_house_url(url) {
        builder = builder.header(reqwest::header::ACCEPT, accept.unwrap_or(ACCEPT_IXBRL));
        if let Some(api_key) = &credentials.uk_ch_api_key {
            builder = builder.basic_auth(api_key, Some(""));
        } else {
            tracing::warn!("UK Companies House API key not configured");
        }
    } else if let Some(accept) = accept {
        builder = builder.header(reqwest::header::ACCEPT, accept);
    }

    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> CredentialsConfig {
        CredentialsConfig {
            sec_user_agent: "FilingHub admin@filinghub.example".to_string(),
            uk_ch_api_key: Some("test-key".to_string()),
            uk_ch_user_agent: "FilingHub-UK/0.1".to_string(),
        }
    }

    #[test]
    fn test_host_detection() {
        // REQUIREMENT: Header policy is selected by host
        // PURPOSE: Verify host classification for all three classes
        assert!(is_companies_house_url(
            "https://document-api.company-information.service.gov.uk/document/abc/content"
        ));
        assert!(is_companies_house_url(
            "https://api.companieshouse.gov.uk/company/00000006"
        ));
        assert!(is_sec_url(
            "https://www.sec.gov/Archives/edgar/data/320193/xbrl.zip"
        ));
        assert!(is_sec_url("https://data.sec.gov/submissions/CIK0000320193.json"));
        assert!(!is_sec_url("https://notsec.gov.example.com/x"));
        assert!(!is_companies_house_url("https://xbrl.fasb.org/us-gaap/2024.zip"));
    }

    #[test]
    fn test_user_agent_selection() {
        // REQUIREMENT: SEC gets the contact UA, CH its own, others the default
        // PURPOSE: Verify the selection ladder
        let creds = credentials();

        assert_eq!(
            user_agent_for("https://www.sec.gov/Archives/x.zip", &creds),
            "FilingHub admin@filinghub.example"
        );
        assert_eq!(
            user_agent_for("https://api.companieshouse.gov.uk/company/1", &creds),
            "FilingHub-UK/0.1"
        );
        assert_eq!(
            user_agent_for("https://xbrl.fasb.org/us-gaap/2024.zip", &creds),
            DEFAULT_USER_AGENT
        );
    }
}
