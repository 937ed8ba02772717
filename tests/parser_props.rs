//! Property tests for the expression grammar.

use chapipe::pipeline::parse_all;
use chapipe::{Error, Expression};
use proptest::prelude::*;

fn arb_name() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_]{1,12}"
}

fn arb_space() -> impl Strategy<Value = String> {
    "[ \t]{0,3}"
}

/// Option payloads: printable, no newline, colons allowed.
fn arb_options() -> impl Strategy<Value = String> {
    "[ -~]{0,40}".prop_filter("no leading whitespace", |s| !s.starts_with([' ', '\t']))
}

proptest! {
    #[test]
    fn splits_at_the_first_colon(
        lead in arb_space(),
        name in arb_name(),
        before in arb_space(),
        after in arb_space(),
        options in arb_options(),
    ) {
        let raw = format!("{lead}{name}{before}:{after}{options}");
        let parsed = Expression::parse(&raw).unwrap();
        prop_assert_eq!(parsed.task, name);
        prop_assert_eq!(parsed.options, options);
    }

    #[test]
    fn strings_without_a_colon_are_malformed(raw in "[^:]{0,30}") {
        let is_malformed = matches!(Expression::parse(&raw), Err(Error::MalformedExpression(_)));
        prop_assert!(is_malformed);
    }

    #[test]
    fn batch_fails_if_any_element_fails(
        good in prop::collection::vec((arb_name(), arb_options()), 0..5),
        bad in "[^:]{0,10}",
        at in 0usize..5,
    ) {
        let mut exprs: Vec<String> = good.iter().map(|(n, o)| format!("{n}: {o}")).collect();
        prop_assert_eq!(parse_all(exprs.clone()).unwrap().len(), good.len());

        let at = at.min(exprs.len());
        exprs.insert(at, bad);
        prop_assert!(parse_all(exprs).is_err());
    }
}
