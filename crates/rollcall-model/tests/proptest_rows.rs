use proptest::prelude::*;
use proptest::test_runner::Config;
use rollcall_model::{Record, RowNumber, SchemaPolicy};

proptest! {
    #![proptest_config(Config::with_cases(128))]
    #[test]
    fn row_numbers_above_header_round_trip_through_text(row in 2_u32..1_000_000) {
        let parsed = RowNumber::parse(&row.to_string()).expect("row above header");
        prop_assert_eq!(parsed.get(), row);
        prop_assert_eq!(parsed.zero_based(), row - 1);
    }

    #[test]
    fn inferred_headers_follow_first_seen_key_order(
        keys in prop::collection::vec("[A-Za-z ]{1,12}", 1..12)
    ) {
        let headers = SchemaPolicy::InferFromFirstWrite
            .bootstrap_headers(keys.iter().map(String::as_str));
        let mut expected: Vec<String> = Vec::new();
        for k in &keys {
            if !expected.contains(k) {
                expected.push(k.clone());
            }
        }
        prop_assert_eq!(headers, expected);
    }

    #[test]
    fn records_with_any_text_are_not_blank(value in "[a-z0-9]{1,8}") {
        let record: Record = [("NRP", ""), ("Nama", value.as_str())].into_iter().collect();
        prop_assert!(!record.is_blank());
    }
}

#[test]
fn row_one_is_always_rejected() {
    assert!(RowNumber::new(1).is_err());
    assert!(RowNumber::parse("1").is_err());
}
