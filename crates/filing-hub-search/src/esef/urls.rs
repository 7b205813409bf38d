//! filings.xbrl.org URL construction (JSON-API query syntax).

pub const BASE_URL: &str = "https://filings.xbrl.org";

pub const FILINGS_ENDPOINT: &str = "/api/filings";

const MAX_PAGE_SIZE: usize = 100;

/// Build the filings query URL.
///
/// The aggregator cannot filter by report type server-side; callers filter
/// client-side after fetching.
pub fn filings_url(
    country: Option<&str>,
    lei: Option<&str>,
    period_end_from: Option<&str>,
    period_end_to: Option<&str>,
    page_size: usize,
) -> String {
    let mut params: Vec<(String, String)> = Vec::new();

    if let Some(country) = country {
        params.push(("filter[country]".to_string(), country.to_uppercase()));
    }
    if let Some(lei) = lei {
        params.push(("filter[entity.identifier]".to_string(), lei.to_uppercase()));
    }
    if let Some(from) = period_end_from {
        params.push(("filter[period_end][gte]".to_string(), from.to_string()));
    }
    if let Some(to) = period_end_to {
        params.push(("filter[period_end][lte]".to_string(), to.to_string()));
    }

    params.push(("page[size]".to_string(), page_size.min(MAX_PAGE_SIZE).to_string()));
    params.push(("include".to_string(), "entity".to_string()));
    params.push(("sort".to_string(), "-date_added".to_string()));

    let query: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect();

    format!("{}{}?{}", BASE_URL, FILINGS_ENDPOINT, query.join("&"))
}

/// The aggregator returns relative artifact paths; resolve them against the
/// base host.
pub fn ensure_full_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if url.starts_with('/') {
        format!("{}{}", BASE_URL, url)
    } else {
        format!("{}/{}", BASE_URL, url)
    }
}

fn encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
