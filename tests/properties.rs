use graphpack::{decode, encode, Value};
use proptest::prelude::*;

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        // Quarters print and parse exactly.
        (-40_000i32..40_000).prop_map(|n| Value::from(n as f64 / 4.0)),
        "[a-z0-9 #]{0,12}".prop_map(Value::from),
    ]
}

fn tree() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(4, 64, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::seq),
            prop::collection::vec(("[a-z]{1,6}", inner), 0..6).prop_map(Value::map),
        ]
    })
}

proptest! {
    #[test]
    fn acyclic_values_round_trip(v in tree()) {
        let text = encode(&v).unwrap();
        let back = decode(&text).unwrap();
        prop_assert_eq!(&back, &v);
        prop_assert_eq!(encode(&back).unwrap(), text);
    }

    #[test]
    fn scalars_never_take_slots(v in scalar()) {
        let text = encode(&v).unwrap();
        prop_assert!(text.starts_with(r#"{"d":"#), "{}", text);
        prop_assert!(text.ends_with(r#","s":[]}"#), "{}", text);
    }

    #[test]
    fn shared_children_decode_shared(child in tree(), copies in 1usize..8) {
        let wrapped = Value::seq(vec![child]);
        let v = Value::seq(vec![wrapped; copies]);
        let back = decode(&encode(&v).unwrap()).unwrap();
        for i in 1..copies {
            prop_assert!(back.at(i).same(&back.at(0)));
        }
        prop_assert_eq!(&back, &v);
    }
}
