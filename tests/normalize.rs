use proptest::prelude::*;
use proptest::sample::select;
use sheet_loader::{ident::is_valid_identifier, normalize::normalize};

const FRAGMENTS: &[&str] = &[
    "Use", "Uses", "User", "Land", "Owner", "Value", "1", " - ", " ", "-", ".", "#", "$", "(", ")",
    "_",
];

fn header() -> impl Strategy<Value = String> {
    prop::collection::vec(select(FRAGMENTS), 0..10).prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn normalizing_twice_changes_nothing(raw in header()) {
        let once = normalize(&raw).into_owned();
        let twice = normalize(&once).into_owned();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn arbitrary_text_is_idempotent(raw in "[A-Za-z0-9 #$().-]{0,24}") {
        let once = normalize(&raw).into_owned();
        let again = normalize(&once);
        prop_assert_eq!(again.as_ref(), once.as_str());
    }

    #[test]
    fn handled_punctuation_never_survives(raw in header()) {
        let normalized = normalize(&raw);
        prop_assert!(!normalized.contains([' ', '-', '.', '#', '$', '(', ')']));
        prop_assert!(!normalized.split('_').any(|token| token == "Use"));
    }
}

#[test]
fn typical_headers_become_valid_identifiers() {
    for raw in ["Parcel ID", "Owner - Mailing Address", "Est. Value ($)", "Unit #", "Land Use"] {
        let normalized = normalize(raw);
        assert!(is_valid_identifier(&normalized), "{raw} -> {normalized}");
    }
}
