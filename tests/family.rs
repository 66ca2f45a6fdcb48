use patent_harvest::patents::family::{
    country_prefix, matches_country, members_for_country, select_family_members,
};

fn family(members: &[&str]) -> Vec<String> {
    members.iter().map(|m| m.to_string()).collect()
}

#[test]
fn boundary_fixture_table() {
    let cases = [
        ("US-1234-A1", "US", true),
        ("US 1234 A1", "US", true),
        ("us-1234-a1", "US", true),
        ("US-1234-A1", "us", true),
        ("US_1234", "US", true),
        ("USX-999", "US", false),
        ("US1234567B2", "US", false),
        ("US", "US", false),
        ("US-", "US", true),
        ("EP-5678-A1", "US", false),
        ("AUS-1", "US", false),
        ("US-1234-A1", "", false),
        ("  US-1234-A1", "US", true),
    ];
    for (member, country, expected) in cases {
        assert_eq!(
            matches_country(member, country),
            expected,
            "member {member:?} country {country:?}"
        );
    }
}

#[test]
fn mixed_family_selects_only_separated_prefix() {
    let members = family(&["US-1234-A1", "EP-5678-A1", "USX-999"]);
    assert_eq!(members_for_country(&members, "US"), vec!["US-1234-A1"]);
    assert_eq!(members_for_country(&members, "EP"), vec!["EP-5678-A1"]);
}

#[test]
fn selection_takes_first_members_in_source_order() {
    let members = family(&[
        "US-1-A1", "EP-1-A1", "US-2-A1", "US-3-A1", "US-4-A1", "EP-2-A1",
    ]);
    let countries = vec!["US".to_string(), "EP".to_string(), "JP".to_string()];
    let selections = select_family_members(&members, &countries, 2);

    assert_eq!(selections.len(), 3);
    assert_eq!(selections[0].country, "US");
    assert_eq!(selections[0].found, 4);
    assert_eq!(selections[0].selected, vec!["US-1-A1", "US-2-A1"]);
    assert_eq!(selections[1].selected, vec!["EP-1-A1", "EP-2-A1"]);
    assert_eq!(selections[2].found, 0);
    assert!(selections[2].selected.is_empty());
}

#[test]
fn zero_cap_selects_nothing() {
    let members = family(&["US-1-A1", "US-2-A1"]);
    assert!(select_family_members(&members, &["US".to_string()], 0).is_empty());
}

#[test]
fn country_prefix_requires_separator() {
    assert_eq!(country_prefix("WO-2024184281-A1"), Some("WO"));
    assert_eq!(country_prefix("EP 1234567"), Some("EP"));
    assert_eq!(country_prefix("US1234567B2"), None);
    assert_eq!(country_prefix("-123"), None);
    assert_eq!(country_prefix("USPTO"), None);
}
