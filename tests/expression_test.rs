//! Integration tests for path expressions as seen from outside the crate.

use rstest::rstest;

use fixtree::domain::{DomainError, Index, PathExpression};

#[test]
fn given_concrete_and_wildcard_index_when_comparing_then_unequal_but_matching() {
    // Arrange
    let concrete = PathExpression::from("a.b[0]").unwrap();
    let wildcard = PathExpression::from("a.b[*]").unwrap();

    // Act / Assert
    assert_ne!(concrete, wildcard);
    assert!(concrete.matches(&wildcard));
    assert!(wildcard.matches(&concrete));
}

#[rstest]
#[case(Index::All, Index::At(3), true)]
#[case(Index::At(3), Index::At(3), true)]
#[case(Index::At(3), Index::At(4), false)]
fn given_indices_when_matching_then_wildcard_matches_everything(
    #[case] a: Index,
    #[case] b: Index,
    #[case] expected: bool,
) {
    assert_eq!(a.matches(b), expected);
    assert_eq!(b.matches(a), expected);
}

#[test]
fn given_expressions_when_sorting_then_specific_indices_order_deterministically() {
    let mut expressions: Vec<PathExpression> = ["items[0]", "items[*]", "items[2]", "owner", "items"]
        .into_iter()
        .map(|e| PathExpression::from(e).unwrap())
        .collect();

    expressions.sort();

    let rendered: Vec<String> = expressions.iter().map(ToString::to_string).collect();
    assert_eq!(rendered, vec!["items[*]", "items[2]", "items[0]", "items", "owner"]);
}

#[rstest]
#[case("orders[1].items[*].sku")]
#[case("$.owner")]
#[case("$[0]")]
#[case("matrix[0][*]")]
fn given_expression_when_round_tripping_then_text_is_kept(#[case] input: &str) {
    let parsed = PathExpression::from(input).unwrap();
    assert_eq!(parsed.to_string(), input);
    assert_eq!(PathExpression::from(&parsed.to_string()).unwrap(), parsed);
}

#[rstest]
#[case("")]
#[case("items[")]
#[case("items[-1]")]
#[case("a..b")]
fn given_malformed_expression_when_parsing_then_syntax_error(#[case] input: &str) {
    let err = PathExpression::from(input).unwrap_err();
    assert!(matches!(err, DomainError::ExpressionSyntax { .. }));
}
