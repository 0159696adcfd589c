/// The only category tags the listing filters on.
pub const PREDEFINED_TAGS: [&str; 7] = [
    "Bootcamp",
    "Grant",
    "Student Benefit",
    "AI",
    "Accelerator",
    "Startup Benefits",
    "Other",
];

pub fn is_predefined_tag(tag: &str) -> bool {
    PREDEFINED_TAGS.contains(&tag)
}

/// Drops unknown tags and duplicates, keeping first-seen order.
pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags.iter().map(AsRef::as_ref) {
        if is_predefined_tag(tag) && !normalized.iter().any(|seen| seen == tag) {
            normalized.push(tag.to_string());
        }
    }
    normalized
}

/// Category tags for an opportunity created from a visitor submission.
/// Unknown types are carried through verbatim.
pub fn tags_for_submission_type(opportunity_type: &str) -> Vec<String> {
    let tags: &[&str] = match opportunity_type.trim().to_lowercase().as_str() {
        "bootcamp" => &["Bootcamp"],
        "grant" => &["Grant", "Funding"],
        "fellowship" => &["Fellowship"],
        "funding" => &["Funding"],
        "credits" => &["Credits"],
        "program" => &["Program"],
        "scholarship" => &["Scholarship"],
        "other" => &["Other"],
        _ => return vec![opportunity_type.trim().to_string()],
    };
    tags.iter().map(|tag| tag.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_keeps_catalog_tags_once_in_order() {
        let tags = ["AI", "Funding", "Grant", "AI", "grant"];
        assert_eq!(normalize_tags(&tags), vec!["AI", "Grant"]);
    }

    #[test]
    fn catalog_membership_is_exact() {
        assert!(is_predefined_tag("Grant"));
        assert!(!is_predefined_tag("grant"));
        assert!(!is_predefined_tag("Funding"));
    }

    #[test]
    fn submission_types_map_case_insensitively() {
        assert_eq!(tags_for_submission_type("Grant"), vec!["Grant", "Funding"]);
        assert_eq!(tags_for_submission_type(" bootcamp "), vec!["Bootcamp"]);
        assert_eq!(tags_for_submission_type("Hackathon"), vec!["Hackathon"]);
    }
}
