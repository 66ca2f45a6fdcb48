//! Country-prefix matching for patent family expansion.
//!
//! Publication numbers start with a jurisdiction code followed by a separator
//! (`US-1234567-B2`, `EP 1234567`). Matching is purely textual; identifiers
//! that do not follow the convention match no country.

/// True when `member` starts with `country` (ASCII case-insensitive) and the
/// next character is a separator, i.e. present and not alphanumeric.
pub fn matches_country(member: &str, country: &str) -> bool {
    let member = member.trim_start();
    let country = country.trim();
    if country.is_empty() || member.len() <= country.len() {
        return false;
    }
    let Some(head) = member.get(..country.len()) else {
        return false;
    };
    if !head.eq_ignore_ascii_case(country) {
        return false;
    }
    member[country.len()..]
        .chars()
        .next()
        .is_some_and(|c| !c.is_ascii_alphanumeric())
}

/// Members of `family` belonging to `country`, in source order.
pub fn members_for_country<'a>(family: &'a [String], country: &str) -> Vec<&'a str> {
    family
        .iter()
        .map(String::as_str)
        .filter(|member| matches_country(member, country))
        .collect()
}

/// Per target country, the first `max_per_country` matching members in source
/// order. Countries keep the caller's order; a zero cap selects nothing.
pub fn select_family_members<'a>(
    family: &'a [String],
    countries: &[String],
    max_per_country: usize,
) -> Vec<CountrySelection<'a>> {
    if max_per_country == 0 {
        return Vec::new();
    }
    countries
        .iter()
        .map(|country| {
            let matching = members_for_country(family, country);
            let found = matching.len();
            let selected = matching.into_iter().take(max_per_country).collect();
            CountrySelection {
                country: country.clone(),
                found,
                selected,
            }
        })
        .collect()
}

/// Result of filtering one family list for one country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountrySelection<'a> {
    pub country: String,
    /// Number of members matching the country before the cap.
    pub found: usize,
    pub selected: Vec<&'a str>,
}

/// Leading alphabetic run of an identifier when followed by a separator.
pub fn country_prefix(identifier: &str) -> Option<&str> {
    let trimmed = identifier.trim_start();
    let end = trimmed
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphabetic())
        .map(|(idx, _)| idx)?;
    if end == 0 {
        return None;
    }
    let next = trimmed[end..].chars().next()?;
    if next.is_ascii_alphanumeric() {
        None
    } else {
        Some(&trimmed[..end])
    }
}
