use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClauseError;

/// Expression that always holds.
const MATCH_ALL: &str = "1 = 1";

/// A boolean filter expression over the subject population, with named
/// parameters bound to it.
///
/// The expression uses `:name` placeholders. What the expression selects is up
/// to the predicate that produced it; consumers only combine and execute it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionClause {
  pub expression: String,
  #[serde(default)]
  pub params: BTreeMap<String, Value>,
}

impl SelectionClause {
  pub fn new(expression: impl Into<String>) -> Self {
    Self {
      expression: expression.into(),
      params: BTreeMap::new(),
    }
  }

  /// Bind a parameter.
  pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
    self.params.insert(name.into(), value.into());
    self
  }

  /// The clause selecting every subject.
  pub fn match_all() -> Self {
    Self::new(MATCH_ALL)
  }

  pub fn is_match_all(&self) -> bool {
    self.expression == MATCH_ALL && self.params.is_empty()
  }

  /// Conjunction of `clauses`, in order.
  ///
  /// Parameters are merged; binding one name to two different values is an
  /// error. No clauses yields [`SelectionClause::match_all`].
  pub fn all(clauses: impl IntoIterator<Item = SelectionClause>) -> Result<Self, ClauseError> {
    let mut expressions = Vec::new();
    let mut params = BTreeMap::new();

    for clause in clauses {
      for (name, value) in clause.params {
        match params.get(&name) {
          Some(existing) if existing != &value => {
            return Err(ClauseError::ConflictingParameter { name });
          }
          Some(_) => {}
          None => {
            params.insert(name, value);
          }
        }
      }
      expressions.push(clause.expression);
    }

    let expression = match expressions.len() {
      0 => return Ok(Self::match_all()),
      1 => expressions.remove(0),
      _ => expressions
        .iter()
        .map(|e| format!("({e})"))
        .collect::<Vec<_>>()
        .join(" AND "),
    };

    Ok(Self { expression, params })
  }
}
