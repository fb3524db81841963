//! Language utilities for target language tags
//!
//! Target languages are given as BCP 47 style tags such as `fr`, `pt-BR` or
//! `zh_Hant`. Only the primary subtag is checked against ISO 639; the rest is
//! kept verbatim so the prompt can mention the regional variant.

use anyhow::{Result, anyhow};
use isolang::Language;

/// ISO 639-2/B codes that differ from their 639-2/T form
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// Split a tag into its primary subtag and the optional remainder
pub fn split_language_tag(tag: &str) -> (String, Option<String>) {
    let tag = tag.trim();
    match tag.find(|c: char| c == '-' || c == '_') {
        Some(idx) => {
            let region = tag[idx + 1..].trim();
            let region = if region.is_empty() { None } else { Some(region.to_string()) };
            (tag[..idx].to_lowercase(), region)
        }
        None => (tag.to_lowercase(), None),
    }
}

/// Resolve the primary subtag of a tag to an ISO 639 language
pub fn resolve_language(tag: &str) -> Result<Language> {
    let (primary, _) = split_language_tag(tag);

    let language = match primary.len() {
        2 => Language::from_639_1(&primary),
        3 => {
            let part2t = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(b, _)| *b == primary)
                .map(|(_, t)| *t)
                .unwrap_or(primary.as_str());
            Language::from_639_3(part2t)
        }
        _ => None,
    };

    language.ok_or_else(|| anyhow!("Invalid language code: {}", tag))
}

/// Validate a target language tag
pub fn validate_language_tag(tag: &str) -> Result<()> {
    resolve_language(tag).map(|_| ())
}

/// Check if two tags name the same primary language
pub fn language_codes_match(tag1: &str, tag2: &str) -> bool {
    match (resolve_language(tag1), resolve_language(tag2)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Human readable name for a tag, e.g. `Portuguese (BR)` for `pt-BR`
pub fn get_language_name(tag: &str) -> Result<String> {
    let language = resolve_language(tag)?;
    let (_, region) = split_language_tag(tag);

    Ok(match region {
        Some(region) => format!("{} ({})", language.to_name(), region),
        None => language.to_name().to_string(),
    })
}
