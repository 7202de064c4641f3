//! Property-based tests for the note block codec: every valid
//! `(NoteMeta, body)` pair survives an encode/decode round trip, and
//! concatenated blocks decode back in order.

use chrono::{TimeZone, Utc};
use gitmemory::codec::{decode, encode, join_blocks, validate, NoteMeta};
use gitmemory::{MemoryStatus, Namespace};
use proptest::prelude::*;

fn arb_namespace() -> impl Strategy<Value = Namespace> {
    prop_oneof![
        Just(Namespace::Inception),
        Just(Namespace::Elicitation),
        Just(Namespace::Research),
        Just(Namespace::Decisions),
        Just(Namespace::Progress),
        Just(Namespace::Blockers),
        Just(Namespace::Reviews),
        Just(Namespace::Learnings),
        Just(Namespace::Retrospective),
        Just(Namespace::Patterns),
    ]
}

fn arb_summary() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,80}".prop_map(|s| s.trim().to_string()).prop_filter("non-empty", |s| !s.is_empty())
}

fn arb_body() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 \n]{0,400}"
}

fn arb_tags() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{2,10}", 0..4)
}

fn meta_for(namespace: Namespace, summary: String, tags: Vec<String>) -> NoteMeta {
    NoteMeta {
        namespace,
        timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        summary,
        spec: None,
        phase: None,
        tags,
        status: MemoryStatus::Active,
        relates_to: Vec::new(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn encode_decode_round_trips(namespace in arb_namespace(), summary in arb_summary(), body in arb_body(), tags in arb_tags()) {
        let meta = meta_for(namespace, summary.clone(), tags.clone());
        prop_assume!(validate(&meta, &body).is_ok());

        let encoded = encode(&meta, &body).expect("encode should succeed for a validated block");
        let decoded = decode(&encoded).expect("decode should succeed for freshly encoded text");

        prop_assert_eq!(decoded.len(), 1);
        let (decoded_meta, decoded_body) = &decoded[0];
        prop_assert_eq!(&decoded_meta.summary, &summary);
        prop_assert_eq!(decoded_meta.namespace, namespace);
        prop_assert_eq!(&decoded_meta.tags, &tags);
        prop_assert_eq!(decoded_body.trim_end(), body.trim_end());
    }

    #[test]
    fn concatenated_blocks_preserve_append_order(
        summaries in prop::collection::vec(arb_summary(), 1..6),
    ) {
        let blocks: Vec<String> = summaries
            .iter()
            .enumerate()
            .map(|(i, summary)| {
                let meta = meta_for(Namespace::Decisions, summary.clone(), Vec::new());
                encode(&meta, &format!("body {i}")).unwrap()
            })
            .collect();
        let note = join_blocks(&blocks);
        let decoded = decode(&note).unwrap();

        prop_assert_eq!(decoded.len(), summaries.len());
        for (i, (meta, body)) in decoded.iter().enumerate() {
            prop_assert_eq!(&meta.summary, &summaries[i]);
            prop_assert_eq!(body, &format!("body {i}"));
        }
    }
}
