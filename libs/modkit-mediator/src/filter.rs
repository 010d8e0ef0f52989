//! Abstract filter operators and their translation to data-access tokens.
//!
//! Callers speak in [`FilterOp`]; the data-access layer (sea-query) speaks in
//! [`BinOper`]. The mapping between the two is a fixed table, see
//! [`native_operator`].

use std::fmt;
use std::str::FromStr;

use sea_orm::sea_query::BinOper;

use crate::error::MediatorError;

/// Comparison operators accepted by [`Mediator::filter`](crate::Mediator::filter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOp {
    /// Greater than: field gt value
    Gt,
    /// Less than: field lt value
    Lt,
    /// Equality: field eq value
    Eq,
    /// Inequality: field ne value
    Ne,
    /// Greater than or equal: field ge value
    Ge,
    /// Less than or equal: field le value
    Le,
    /// SQL pattern match, the value carries its own wildcards
    Like,
    /// field is null (value ignored)
    IsNull,
    /// field is not null (value ignored)
    IsNotNull,
}

impl FilterOp {
    pub const ALL: [FilterOp; 9] = [
        FilterOp::Gt,
        FilterOp::Lt,
        FilterOp::Eq,
        FilterOp::Ne,
        FilterOp::Ge,
        FilterOp::Le,
        FilterOp::Like,
        FilterOp::IsNull,
        FilterOp::IsNotNull,
    ];

    /// Wire token used by resource controllers.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            FilterOp::Gt => "gt",
            FilterOp::Lt => "lt",
            FilterOp::Eq => "eq",
            FilterOp::Ne => "ne",
            FilterOp::Ge => "ge",
            FilterOp::Le => "le",
            FilterOp::Like => "like",
            FilterOp::IsNull => "null",
            FilterOp::IsNotNull => "notnull",
        }
    }

    /// Null checks compare against SQL `NULL` and take no operand.
    #[must_use]
    pub const fn is_null_check(self) -> bool {
        matches!(self, FilterOp::IsNull | FilterOp::IsNotNull)
    }

    /// Operator used when the operand is missing or `null`: equality becomes
    /// a null check, ordering and pattern operators have none.
    #[must_use]
    pub const fn null_operator(self) -> Option<BinOper> {
        match self {
            FilterOp::Eq | FilterOp::IsNull => Some(BinOper::Is),
            FilterOp::Ne | FilterOp::IsNotNull => Some(BinOper::IsNot),
            _ => None,
        }
    }
}

impl fmt::Display for FilterOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for FilterOp {
    type Err = MediatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterOp::ALL
            .iter()
            .copied()
            .find(|op| op.token().eq_ignore_ascii_case(s))
            .ok_or_else(|| MediatorError::UnknownOperator(s.to_owned()))
    }
}

/// Abstract operator → sea-query operator, indexed in [`FilterOp::ALL`] order.
const NATIVE_OPERATORS: [(FilterOp, BinOper); 9] = [
    (FilterOp::Gt, BinOper::GreaterThan),
    (FilterOp::Lt, BinOper::SmallerThan),
    (FilterOp::Eq, BinOper::Equal),
    (FilterOp::Ne, BinOper::NotEqual),
    (FilterOp::Ge, BinOper::GreaterThanOrEqual),
    (FilterOp::Le, BinOper::SmallerThanOrEqual),
    (FilterOp::Like, BinOper::Like),
    (FilterOp::IsNull, BinOper::Is),
    (FilterOp::IsNotNull, BinOper::IsNot),
];

/// Translates an abstract operator into the data-access layer's native token.
#[must_use]
pub fn native_operator(op: FilterOp) -> BinOper {
    NATIVE_OPERATORS[op as usize].1
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn translation_table_is_aligned_with_enum_order() {
        for (idx, op) in FilterOp::ALL.iter().enumerate() {
            assert_eq!(NATIVE_OPERATORS[idx].0, *op);
            assert_eq!(*op as usize, idx);
        }
    }

    #[test]
    fn every_operator_has_its_native_token() {
        assert_eq!(native_operator(FilterOp::Gt), BinOper::GreaterThan);
        assert_eq!(native_operator(FilterOp::Lt), BinOper::SmallerThan);
        assert_eq!(native_operator(FilterOp::Eq), BinOper::Equal);
        assert_eq!(native_operator(FilterOp::Ne), BinOper::NotEqual);
        assert_eq!(native_operator(FilterOp::Ge), BinOper::GreaterThanOrEqual);
        assert_eq!(native_operator(FilterOp::Le), BinOper::SmallerThanOrEqual);
        assert_eq!(native_operator(FilterOp::Like), BinOper::Like);
        assert_eq!(native_operator(FilterOp::IsNull), BinOper::Is);
        assert_eq!(native_operator(FilterOp::IsNotNull), BinOper::IsNot);
    }

    #[test]
    fn tokens_round_trip_through_from_str() {
        for op in FilterOp::ALL {
            assert_eq!(op.token().parse::<FilterOp>().unwrap(), op);
        }
        assert_eq!("NotNull".parse::<FilterOp>().unwrap(), FilterOp::IsNotNull);
    }

    #[test]
    fn unknown_token_is_rejected() {
        let err = "between".parse::<FilterOp>().unwrap_err();
        assert!(matches!(err, MediatorError::UnknownOperator(ref t) if t == "between"));
    }

    #[test]
    fn only_null_checks_skip_the_operand() {
        let unary: Vec<_> = FilterOp::ALL
            .into_iter()
            .filter(|op| op.is_null_check())
            .collect();
        assert_eq!(unary, vec![FilterOp::IsNull, FilterOp::IsNotNull]);
    }

    #[test]
    fn equality_without_operand_becomes_a_null_check() {
        assert_eq!(FilterOp::Eq.null_operator(), Some(BinOper::Is));
        assert_eq!(FilterOp::Ne.null_operator(), Some(BinOper::IsNot));
        for op in [FilterOp::Gt, FilterOp::Lt, FilterOp::Ge, FilterOp::Le, FilterOp::Like] {
            assert_eq!(op.null_operator(), None);
        }
    }
}
