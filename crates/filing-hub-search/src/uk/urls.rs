//! Companies House URL construction.

/// Metadata/REST API host
pub const API_BASE_URL: &str = "https://api.companieshouse.gov.uk";

/// Document API host (content downloads)
pub const DOCUMENT_BASE_URL: &str = "https://document-api.company-information.service.gov.uk";

/// Accounts category used for filing history filtering
pub const CATEGORY_ACCOUNTS: &str = "accounts";

pub fn company_profile_url(company_number: &str) -> String {
    format!("{}/company/{}", API_BASE_URL, company_number)
}

pub fn company_search_url(query: &str, items_per_page: usize) -> String {
    format!(
        "{}/search/companies?q={}&items_per_page={}",
        API_BASE_URL,
        urlencoding(query),
        items_per_page
    )
}

pub fn filing_history_url(company_number: &str, category: &str, items_per_page: usize) -> String {
    format!(
        "{}/company/{}/filing-history?category={}&items_per_page={}",
        API_BASE_URL, company_number, category, items_per_page
    )
}

pub fn document_metadata_url(document_id: &str) -> String {
    format!("{}/document/{}", DOCUMENT_BASE_URL, document_id)
}

pub fn document_content_url(document_id: &str) -> String {
    format!("{}/document/{}/content", DOCUMENT_BASE_URL, document_id)
}

/// Pull the document id out of a filing's `document_metadata` link.
/// Links arrive absolute (`https://document-api…/document/{id}`) or relative
/// (`/document/{id}/metadata`).
pub fn extract_document_id(metadata_url: &str) -> Option<String> {
    let marker = "/document/";
    let start = metadata_url.find(marker)? + marker.len();
    let rest = &metadata_url[start..];
    let id = rest.split('/').next()?;

    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

fn urlencoding(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' => out.push(c),
            ' ' => out.push('+'),
            _ => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).as_bytes() {
                    out.push_str(&format!("%{:02X}", byte));
                }
            }
        }
    }
    out
}
