// tests/property/decode_test.rs

//! Property-based tests for frame classification and event decoding.

use chrono::Local;
use otprelay::core::protocol::{InboundFrame, NO_CODE, Namespace, SmsEvent, extract_code};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_six_digit_code_is_found(
        prefix in "[a-zA-Z ,:]{0,40}",
        code in "[0-9]{6}",
        suffix in "[a-zA-Z .!]{0,40}"
    ) {
        let message = format!("{prefix} {code} {suffix}");
        prop_assert_eq!(extract_code(&message), code);
    }

    #[test]
    fn test_split_code_is_found(
        prefix in "[a-zA-Z ,:]{0,40}",
        left in "[0-9]{3}",
        sep in prop::sample::select(vec!["-", " "]),
        right in "[0-9]{3}",
        suffix in "[a-zA-Z .!]{0,40}"
    ) {
        let code = format!("{left}{sep}{right}");
        let message = format!("{prefix} {code} {suffix}");
        prop_assert_eq!(extract_code(&message), code);
    }

    #[test]
    fn test_message_without_digits_has_no_code(message in "[^\\p{Nd}]{0,200}") {
        prop_assert_eq!(extract_code(&message), NO_CODE);
    }

    #[test]
    fn test_decode_is_deterministic(
        message in ".{0,200}",
        originator in "[a-zA-Z0-9 ]{0,20}",
        recipient in "[0-9+]{0,15}",
        country in "[a-z]{2}"
    ) {
        let payload = serde_json::json!([
            "sms",
            {
                "message": message,
                "originator": originator,
                "recipient": recipient,
                "country_iso": country,
            }
        ])
        .to_string();
        let now = Local::now();

        let first = SmsEvent::from_payload(&payload, now).unwrap();
        let second = SmsEvent::from_payload(&payload, now).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&first.message, &message);
        prop_assert_eq!(first.country, country.to_uppercase());
        prop_assert_eq!(first.code, extract_code(&message));
    }

    #[test]
    fn test_decode_never_panics(payload in ".{0,200}") {
        let _ = SmsEvent::from_payload(&payload, Local::now());
    }

    #[test]
    fn test_event_frame_payload_is_the_remainder(payload in ".{0,200}") {
        let ns = Namespace::default();
        let frame = format!("42/livesms,{payload}");
        prop_assert_eq!(ns.classify(&frame), InboundFrame::ApplicationEvent(payload.as_str()));
    }
}
