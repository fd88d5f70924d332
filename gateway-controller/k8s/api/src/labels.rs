use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub type Map = BTreeMap<String, String>;

pub type Expressions = Vec<Expression>;

/// The namespace entry that selects resources from every namespace.
pub const ALL_NAMESPACES: &str = "*";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub struct Expression {
    pub key: String,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub values: BTreeSet<String>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
pub enum Operator {
    Equals,
    DoubleEquals,
    NotEquals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
    GreaterThan,
    LessThan,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum InvalidExpression {
    #[error("label key must not be empty")]
    EmptyKey,

    #[error("{key}: operator {operator:?} does not accept values")]
    UnexpectedValues { key: String, operator: Operator },

    #[error("{key}: operator {operator:?} requires exactly one value")]
    SingleValue { key: String, operator: Operator },

    #[error("{key}: operator {operator:?} requires at least one value")]
    MissingValues { key: String, operator: Operator },

    #[error("{key}: operator {operator:?} requires an integer value, got {value:?}")]
    NotAnInteger {
        key: String,
        operator: Operator,
        value: String,
    },
}

/// Selects resources by namespace, exact label values and label expressions.
///
/// An empty namespace list restricts the selection to the selecting
/// resource's own namespace; [`ALL_NAMESPACES`] lifts the restriction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Map,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expressions: Expressions,
}

// === Selector ===

impl Selector {
    pub fn from_expressions(expressions: Expressions) -> Self {
        Self {
            expressions,
            ..Self::default()
        }
    }

    pub fn from_map(labels: Map) -> Self {
        Self {
            labels,
            ..Self::default()
        }
    }

    pub fn in_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.namespaces = namespaces.into_iter().map(|ns| ns.to_string()).collect();
        self
    }

    /// Both exact labels and expressions are set.
    pub fn is_ambiguous(&self) -> bool {
        !self.labels.is_empty() && !self.expressions.is_empty()
    }

    pub fn matches_namespace(&self, owner: &str, candidate: &str) -> bool {
        if self.namespaces.is_empty() {
            return owner == candidate;
        }
        self.namespaces
            .iter()
            .any(|ns| ns == ALL_NAMESPACES || ns == candidate)
    }

    /// Evaluates the exact labels and then every expression against `labels`.
    pub fn matches_labels(&self, labels: &Map) -> Result<bool, InvalidExpression> {
        if !matches_exact(&self.labels, labels) {
            return Ok(false);
        }
        matches_expressions(&self.expressions, labels)
    }
}

impl std::iter::FromIterator<(String, String)> for Selector {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}

impl std::iter::FromIterator<(&'static str, &'static str)> for Selector {
    fn from_iter<T: IntoIterator<Item = (&'static str, &'static str)>>(iter: T) -> Self {
        Self::from_map(
            iter.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

impl std::iter::FromIterator<Expression> for Selector {
    fn from_iter<T: IntoIterator<Item = Expression>>(iter: T) -> Self {
        Self::from_expressions(iter.into_iter().collect())
    }
}

/// Strict equality over every entry of `selector`. An empty selector matches
/// everything.
pub fn matches_exact(selector: &Map, labels: &Map) -> bool {
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

/// Validates every expression and then requires all of them to match.
pub fn matches_expressions(
    expressions: &[Expression],
    labels: &Map,
) -> Result<bool, InvalidExpression> {
    for expr in expressions {
        expr.validate()?;
    }
    Ok(expressions.iter().all(|expr| expr.matches(labels)))
}

// === Expression ===

impl Expression {
    pub fn new<I, S>(key: impl ToString, operator: Operator, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self {
            key: key.to_string(),
            operator,
            values: values.into_iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn validate(&self) -> Result<(), InvalidExpression> {
        let key = || self.key.clone();
        let operator = self.operator;
        if self.key.is_empty() {
            return Err(InvalidExpression::EmptyKey);
        }
        match operator {
            Operator::In | Operator::NotIn => {
                if self.values.is_empty() {
                    return Err(InvalidExpression::MissingValues { key: key(), operator });
                }
            }
            Operator::Equals | Operator::DoubleEquals | Operator::NotEquals => {
                if self.values.len() != 1 {
                    return Err(InvalidExpression::SingleValue { key: key(), operator });
                }
            }
            Operator::Exists | Operator::DoesNotExist => {
                if !self.values.is_empty() {
                    return Err(InvalidExpression::UnexpectedValues { key: key(), operator });
                }
            }
            Operator::GreaterThan | Operator::LessThan => {
                let mut values = self.values.iter();
                match (values.next(), values.next()) {
                    (Some(value), None) => {
                        if value.parse::<i64>().is_err() {
                            return Err(InvalidExpression::NotAnInteger {
                                key: key(),
                                operator,
                                value: value.clone(),
                            });
                        }
                    }
                    _ => return Err(InvalidExpression::SingleValue { key: key(), operator }),
                }
            }
        }
        Ok(())
    }

    /// Evaluates the requirement. Expressions are assumed to be valid.
    pub fn matches(&self, labels: &Map) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Equals | Operator::DoubleEquals | Operator::In => {
                value.is_some_and(|v| self.values.contains(v))
            }
            Operator::NotEquals | Operator::NotIn => match value {
                Some(v) => !self.values.contains(v),
                None => true,
            },
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
            Operator::GreaterThan | Operator::LessThan => {
                let label = value.and_then(|v| v.parse::<i64>().ok());
                let bound = self.values.iter().next().and_then(|v| v.parse::<i64>().ok());
                match (label, bound) {
                    (Some(label), Some(bound)) if self.operator == Operator::GreaterThan => {
                        label > bound
                    }
                    (Some(label), Some(bound)) => label < bound,
                    _ => false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;
    use rstest::rstest;

    fn labels() -> Map {
        btreemap! {
            "app".to_string() => "web".to_string(),
            "tier".to_string() => "3".to_string(),
        }
    }

    #[rstest]
    #[case(Expression::new("app", Operator::Equals, ["web"]), true)]
    #[case(Expression::new("app", Operator::DoubleEquals, ["api"]), false)]
    #[case(Expression::new("app", Operator::NotEquals, ["api"]), true)]
    #[case(Expression::new("missing", Operator::NotEquals, ["api"]), true)]
    #[case(Expression::new("app", Operator::In, ["api", "web"]), true)]
    #[case(Expression::new("app", Operator::NotIn, ["api", "web"]), false)]
    #[case(Expression::new("missing", Operator::NotIn, ["web"]), true)]
    #[case(Expression::new("app", Operator::Exists, Vec::<String>::new()), true)]
    #[case(Expression::new("app", Operator::DoesNotExist, Vec::<String>::new()), false)]
    #[case(Expression::new("tier", Operator::GreaterThan, ["2"]), true)]
    #[case(Expression::new("tier", Operator::LessThan, ["2"]), false)]
    #[case(Expression::new("app", Operator::GreaterThan, ["2"]), false)]
    fn expression_matches(#[case] expr: Expression, #[case] matches: bool) {
        expr.validate().expect("expression must be valid");
        assert_eq!(expr.matches(&labels()), matches, "{expr:?}");
    }

    #[rstest]
    #[case(Expression::new("", Operator::Exists, Vec::<String>::new()))]
    #[case(Expression::new("app", Operator::In, Vec::<String>::new()))]
    #[case(Expression::new("app", Operator::Equals, ["a", "b"]))]
    #[case(Expression::new("app", Operator::Exists, ["a"]))]
    #[case(Expression::new("tier", Operator::GreaterThan, ["three"]))]
    #[case(Expression::new("tier", Operator::LessThan, ["1", "2"]))]
    fn invalid_expressions(#[case] expr: Expression) {
        assert!(expr.validate().is_err(), "{expr:?}");
    }

    #[test]
    fn selector_matches() {
        for (selector, matches, msg) in [
            (Selector::default(), true, "empty match"),
            (
                Selector::from_iter(Some(("app", "web"))),
                true,
                "exact label match",
            ),
            (
                Selector::from_iter(Some(("app", "api"))),
                false,
                "label mismatch",
            ),
            (
                Selector::from_iter(Some(Expression::new("tier", Operator::In, ["3"]))),
                true,
                "expression match",
            ),
        ] {
            assert_eq!(selector.matches_labels(&labels()), Ok(matches), "{msg}");
        }
    }

    #[test]
    fn selector_namespaces() {
        let owner = Selector::default();
        assert!(owner.matches_namespace("a", "a"));
        assert!(!owner.matches_namespace("a", "b"));

        let listed = Selector::default().in_namespaces(["b", "c"]);
        assert!(listed.matches_namespace("a", "c"));
        assert!(!listed.matches_namespace("a", "a"));

        let all = Selector::default().in_namespaces(["b", ALL_NAMESPACES]);
        assert!(all.matches_namespace("a", "z"));
    }

    #[test]
    fn invalid_expression_surfaces_from_selector() {
        let selector = Selector::from_iter(Some(Expression::new("app", Operator::In, Vec::<String>::new())));
        assert!(selector.matches_labels(&labels()).is_err());
    }
}
