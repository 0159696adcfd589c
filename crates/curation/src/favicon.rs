//! Favicon URL derivation. Probing candidates over the network lives in the
//! client; this module only computes URLs.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use url::Url;

pub const FAVICON_SIZE: u32 = 64;
const PLACEHOLDER_DOMAIN: &str = "example.com";

/// Host of `website_url` without a leading `www.`. Accepts bare hosts such as
/// `example.org/apply` that do not parse as absolute URLs.
pub fn domain_of(website_url: &str) -> Option<String> {
    let trimmed = website_url.trim();
    if trimmed.is_empty() {
        return None;
    }
    let host = match Url::parse(trimmed) {
        Ok(url) => url.host_str().map(str::to_string),
        Err(_) => manual_host(trimmed),
    }?;
    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

fn manual_host(raw: &str) -> Option<String> {
    let rest = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))
        .unwrap_or(raw);
    let host = rest.split(['/', '?', '#']).next()?.trim();
    if host.is_empty() || host.contains(char::is_whitespace) {
        None
    } else {
        Some(host.to_string())
    }
}

pub fn google_favicon_url(domain: &str) -> String {
    format!("https://www.google.com/s2/favicons?domain={domain}&sz={FAVICON_SIZE}")
}

pub fn duckduckgo_favicon_url(domain: &str) -> String {
    format!("https://icons.duckduckgo.com/ip3/{domain}.ico")
}

/// Best guess without any network round trip.
pub fn favicon_url(website_url: &str) -> Option<String> {
    domain_of(website_url).map(|domain| google_favicon_url(&domain))
}

/// Like [`favicon_url`] but never empty; used when a record must carry a logo.
pub fn favicon_url_or_default(website_url: &str) -> String {
    favicon_url(website_url).unwrap_or_else(|| google_favicon_url(PLACEHOLDER_DOMAIN))
}

/// Candidate icon URLs, most reliable first.
pub fn favicon_candidates(website_url: &str) -> Vec<String> {
    let Some(domain) = domain_of(website_url) else {
        return Vec::new();
    };
    let origin_icon = match Url::parse(website_url.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            Some(format!("{}/favicon.ico", url.origin().ascii_serialization()))
        }
        _ => Some(format!("https://{domain}/favicon.ico")),
    };

    let mut candidates = vec![google_favicon_url(&domain), duckduckgo_favicon_url(&domain)];
    candidates.extend(origin_icon);
    candidates
}

/// A generated square icon with the label's initial, as a `data:` URI.
pub fn placeholder_data_uri(label: &str) -> String {
    let initial = label
        .chars()
        .find(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .unwrap_or('?');
    let hue = label_hue(label);
    let svg = format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{size}" height="{size}" viewBox="0 0 {size} {size}">"#,
            r#"<rect width="{size}" height="{size}" rx="12" fill="hsl({hue},55%,45%)"/>"#,
            r##"<text x="50%" y="50%" dy=".35em" text-anchor="middle" font-family="sans-serif" font-size="30" fill="#ffffff">{initial}</text>"##,
            "</svg>"
        ),
        size = FAVICON_SIZE,
        hue = hue,
        initial = initial,
    );
    format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg))
}

// FNV-1a, folded to a hue so the same label always gets the same colour.
fn label_hue(label: &str) -> u32 {
    let hash = label
        .bytes()
        .fold(0x811c_9dc5_u32, |hash, byte| {
            (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
        });
    hash % 360
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_www_and_lowercases_host() {
        assert_eq!(
            domain_of("https://WWW.Example.org/apply?ref=1").as_deref(),
            Some("example.org")
        );
    }

    #[test]
    fn accepts_bare_hosts() {
        assert_eq!(domain_of("grants.example.org/apply").as_deref(), Some("grants.example.org"));
        assert_eq!(domain_of("   "), None);
    }

    #[test]
    fn candidates_are_ordered_google_duckduckgo_origin() {
        let candidates = favicon_candidates("http://www.example.org/program");
        assert_eq!(
            candidates,
            vec![
                "https://www.google.com/s2/favicons?domain=example.org&sz=64".to_string(),
                "https://icons.duckduckgo.com/ip3/example.org.ico".to_string(),
                "http://www.example.org/favicon.ico".to_string(),
            ]
        );
    }

    #[test]
    fn unparseable_url_falls_back_to_default_domain() {
        assert!(favicon_candidates("not a url").is_empty());
        assert_eq!(
            favicon_url_or_default("not a url"),
            "https://www.google.com/s2/favicons?domain=example.com&sz=64"
        );
    }

    #[test]
    fn placeholder_is_stable_svg_data_uri() {
        let first = placeholder_data_uri("Startup Grant");
        assert!(first.starts_with("data:image/svg+xml;base64,"));
        assert_eq!(first, placeholder_data_uri("Startup Grant"));

        let encoded = first.trim_start_matches("data:image/svg+xml;base64,");
        let svg = String::from_utf8(STANDARD.decode(encoded).expect("base64")).expect("utf8");
        assert!(svg.contains(r##"fill="#ffffff">S</text>"##));
        assert!(svg.ends_with("</svg>"));
    }
}
