//! Conditional expressions.
//!
//! A conditional binding carries a condition tree — comparisons and logic
//! groups whose operands are literals or further bindings — plus optional
//! `ifTrue`/`ifFalse` branch values. Evaluating the tree collects the
//! data-source handles its operands depend on, so a watched conditional
//! re-evaluates whenever any operand's source changes.
//!
//! Operand resolution shares the unresolved-reference taxonomy of the rest
//! of the engine: a reference that resolves to nothing is treated as
//! undefined, never an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::eval::{EvalContext, ObservableHandle, resolve_operand};

/// `{ kind: "conditional", condition, ifTrue?, ifFalse? }`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalExpression {
    /// The condition tree to test.
    pub condition: Condition,
    /// Value produced when the condition holds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_true: Option<Value>,
    /// Value produced when it does not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub if_false: Option<Value>,
}

/// A condition: a literal, a single comparison, or a logic group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    /// A constant outcome.
    Literal(bool),
    /// One comparison.
    Expression(Expression),
    /// Several conditions combined.
    Group(LogicGroup),
}

/// A single comparison between two operands. Operands may themselves be
/// bindings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    pub left: Value,
    pub operator: Operator,
    /// Unused by unary operators.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub right: Value,
}

/// Conditions combined under one logical operator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicGroup {
    pub logical_operator: LogicalOperator,
    pub statements: Vec<Condition>,
}

/// How a [`LogicGroup`] combines its statements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOperator {
    /// Every statement holds.
    And,
    /// At least one statement holds.
    Or,
    /// Exactly one statement holds.
    Xor,
}

/// Comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    NotEquals,
    IsTruthy,
    IsFalsy,
    IsDefined,
    IsNull,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    StartsWith,
    EndsWith,
}

impl ConditionalExpression {
    /// Evaluate the expression: test the condition, then resolve the chosen
    /// branch. Returns the produced value and every observable handle any
    /// operand depended on. With no branch values declared, the outcome
    /// itself is the value.
    pub fn resolve(&self, ctx: &EvalContext) -> (Option<Value>, Vec<ObservableHandle>) {
        let mut deps = Vec::new();
        let outcome = self.condition.test(ctx, &mut deps);
        let branch = if outcome { &self.if_true } else { &self.if_false };
        let value = match branch {
            Some(raw) => resolve_operand(raw, ctx, &mut deps),
            None => Some(Value::Bool(outcome)),
        };
        (value, deps)
    }
}

impl Condition {
    fn test(&self, ctx: &EvalContext, deps: &mut Vec<ObservableHandle>) -> bool {
        match self {
            Self::Literal(value) => *value,
            Self::Expression(expression) => expression.test(ctx, deps),
            Self::Group(group) => group.test(ctx, deps),
        }
    }
}

impl Expression {
    fn test(&self, ctx: &EvalContext, deps: &mut Vec<ObservableHandle>) -> bool {
        let left = resolve_operand(&self.left, ctx, deps);
        let right = resolve_operand(&self.right, ctx, deps);
        self.operator.apply(left.as_ref(), right.as_ref())
    }
}

impl LogicGroup {
    fn test(&self, ctx: &EvalContext, deps: &mut Vec<ObservableHandle>) -> bool {
        // Every statement is evaluated — no short-circuit — so dependencies
        // register for the whole group.
        let outcomes: Vec<bool> = self
            .statements
            .iter()
            .map(|statement| statement.test(ctx, deps))
            .collect();
        match self.logical_operator {
            LogicalOperator::And => outcomes.iter().all(|b| *b),
            LogicalOperator::Or => outcomes.iter().any(|b| *b),
            LogicalOperator::Xor => outcomes.iter().filter(|b| **b).count() == 1,
        }
    }
}

impl Operator {
    fn apply(self, left: Option<&Value>, right: Option<&Value>) -> bool {
        use std::cmp::Ordering;
        match self {
            Self::Equals => loose_eq(left, right),
            Self::NotEquals => !loose_eq(left, right),
            Self::IsTruthy => left.is_some_and(truthy),
            Self::IsFalsy => !left.is_some_and(truthy),
            Self::IsDefined => left.is_some(),
            Self::IsNull => matches!(left, Some(Value::Null)),
            Self::GreaterThan => compare(left, right) == Some(Ordering::Greater),
            Self::GreaterThanOrEqual => {
                matches!(compare(left, right), Some(Ordering::Greater | Ordering::Equal))
            }
            Self::LessThan => compare(left, right) == Some(Ordering::Less),
            Self::LessThanOrEqual => {
                matches!(compare(left, right), Some(Ordering::Less | Ordering::Equal))
            }
            Self::Contains => strings(left, right).is_some_and(|(l, r)| l.contains(r)),
            Self::StartsWith => strings(left, right).is_some_and(|(l, r)| l.starts_with(r)),
            Self::EndsWith => strings(left, right).is_some_and(|(l, r)| l.ends_with(r)),
        }
    }
}

/// JS-style truthiness: `null`, `false`, `0`, and `""` are falsy;
/// containers are always truthy.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn loose_eq(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(l), Some(r)) => {
            if let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) {
                return a == b;
            }
            l == r
        }
        _ => false,
    }
}

fn compare(left: Option<&Value>, right: Option<&Value>) -> Option<std::cmp::Ordering> {
    left?.as_f64()?.partial_cmp(&right?.as_f64()?)
}

fn strings<'a>(left: Option<&'a Value>, right: Option<&'a Value>) -> Option<(&'a str, &'a str)> {
    Some((left?.as_str()?, right?.as_str()?))
}
