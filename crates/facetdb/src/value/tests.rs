use super::*;
use proptest::prelude::*;

#[test]
fn plain_encodings() {
    assert_eq!(Value::from("John").plain(), "John");
    assert_eq!(Value::from(30).plain(), "30");
    assert_eq!(Value::from(true).plain(), "true");
    assert_eq!(Value::Null.plain(), "null");
    assert_eq!(Value::from(Decimal::new(10_000, 2)).plain(), "100.00");
}

#[test]
fn datetime_encodes_as_rfc3339() {
    let dt = NaiveDate::from_ymd_opt(2021, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    // Naive datetimes are assumed UTC.
    assert_eq!(
        Value::from(dt).plain(),
        "2021-01-01T00:00:00+00:00"
    );
    assert_eq!(
        Value::from(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()).plain(),
        "2021-01-01"
    );
}

#[test]
fn option_maps_to_null() {
    assert_eq!(Value::from(None::<&str>), Value::Null);
    assert_eq!(Value::from(Some("x")), Value::from("x"));
}

#[test]
fn untagged_round_trip_keeps_scalar_kind() {
    let values = [
        Value::Null,
        Value::from(true),
        Value::from(30),
        Value::from(2.5),
        Value::from(Decimal::new(10_000, 2)),
        Value::from("John"),
        Value::from(Uuid::new_v4()),
        Value::from(Ulid::new()),
    ];
    for value in values {
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value, "via {json}");
    }
}

#[test]
fn field_value_serializes_as_pair() {
    let field = FieldValue::new("name", "John");
    assert_eq!(
        serde_json::to_value(&field).unwrap(),
        serde_json::json!(["name", "John"])
    );
}

proptest! {
    #[test]
    fn int_lex_order_matches_value_order(a in any::<i64>(), b in any::<i64>()) {
        let (lex_a, lex_b) = (Value::from(a).lex(), Value::from(b).lex());
        prop_assert_eq!(a.cmp(&b), lex_a.cmp(&lex_b));
    }

    #[test]
    fn float_lex_order_matches_value_order(
        a in -1.0e9_f64..1.0e9,
        b in -1.0e9_f64..1.0e9,
    ) {
        // Compare at the encoder's fractional precision; values closer than
        // the 10-digit fraction collapse onto the same encoding.
        let quantize = |f: f64| (f * 1e10).round();
        prop_assume!((quantize(a) - quantize(b)).abs() >= 2.0);
        let (lex_a, lex_b) = (Value::from(a).lex(), Value::from(b).lex());
        prop_assert_eq!(a < b, lex_a < lex_b);
    }

    #[test]
    fn decimal_lex_order_matches_value_order(
        a in -1_000_000_000_000_i64..1_000_000_000_000,
        b in -1_000_000_000_000_i64..1_000_000_000_000,
        scale in 0_u32..6,
    ) {
        let (da, db) = (Decimal::new(a, scale), Decimal::new(b, scale));
        let (lex_a, lex_b) = (Value::from(da).lex(), Value::from(db).lex());
        prop_assert_eq!(da.cmp(&db), lex_a.cmp(&lex_b));
    }

    #[test]
    fn string_lex_is_identity(s in "\\PC*") {
        prop_assert_eq!(Value::from(s.as_str()).lex(), s);
    }
}
