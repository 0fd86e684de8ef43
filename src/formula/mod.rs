//! Model formulas in the familiar `response ~ a + b + C(c)` notation.
//!
//! A formula is parsed once, when the parameter file is loaded, into a
//! response name and a term list. Supported right-hand side pieces:
//!
//! - `name`: the column as-is (string columns are treated as categorical)
//! - `C(name)`: the column as a categorical, treatment coded
//! - `1`: explicit intercept (the default)
//! - `0` or `- 1`: drop the intercept

use std::fmt;

use crate::domain::Table;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Numeric(String),
    Categorical(String),
}

impl Term {
    pub fn field(&self) -> &str {
        match self {
            Term::Numeric(name) | Term::Categorical(name) => name,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Numeric(name) => write!(f, "{name}"),
            Term::Categorical(name) => write!(f, "C({name})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    pub response: String,
    pub terms: Vec<Term>,
    pub intercept: bool,
}

impl Formula {
    pub fn parse(input: &str) -> Result<Self, String> {
        let (lhs, rhs) = input
            .split_once('~')
            .ok_or_else(|| format!("Formula '{input}' has no `~`."))?;
        if rhs.contains('~') {
            return Err(format!("Formula '{input}' has more than one `~`."));
        }

        let response = lhs.trim();
        if !is_identifier(response) {
            return Err(format!("Invalid response name '{response}'."));
        }

        let mut terms: Vec<Term> = Vec::new();
        let mut intercept = true;

        for (idx, (negated, piece)) in split_terms(rhs).into_iter().enumerate() {
            let piece = piece.trim();
            if piece.is_empty() {
                if idx == 0 && !negated && rhs.trim_start().starts_with('-') {
                    continue;
                }
                return Err(format!("Formula '{input}' has an empty term."));
            }

            match (negated, piece) {
                (true, "1") | (false, "0") => intercept = false,
                (false, "1") => intercept = true,
                (true, _) => {
                    return Err(format!(
                        "Cannot remove '{piece}': only the intercept can be removed."
                    ));
                }
                (false, _) => {
                    let term = parse_term(piece)?;
                    if terms.iter().any(|t| t.field() == term.field()) {
                        return Err(format!("Column '{}' appears more than once.", term.field()));
                    }
                    if term.field() == response {
                        return Err(format!("Response '{response}' cannot also be a covariate."));
                    }
                    terms.push(term);
                }
            }
        }

        if terms.is_empty() && !intercept {
            return Err(format!("Formula '{input}' has no columns."));
        }

        Ok(Formula {
            response: response.to_string(),
            terms,
            intercept,
        })
    }

    /// Covariate column names, in formula order.
    pub fn covariates(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(Term::field)
    }

    /// Check every covariate exists in `table`.
    ///
    /// The error names the first absent column in formula order.
    pub fn check_columns(&self, model_id: u32, table: &Table) -> Result<(), AppError> {
        match self.covariates().find(|name| !table.has_column(name)) {
            Some(field) => Err(AppError::UnknownCovariate {
                model_id,
                field: field.to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        if !self.intercept {
            parts.push("0".to_string());
        }
        parts.extend(self.terms.iter().map(|t| t.to_string()));
        if parts.is_empty() {
            parts.push("1".to_string());
        }
        write!(f, "{} ~ {}", self.response, parts.join(" + "))
    }
}

fn split_terms(rhs: &str) -> Vec<(bool, String)> {
    let mut out = Vec::new();
    let mut negated = false;
    let mut current = String::new();
    for ch in rhs.chars() {
        match ch {
            '+' | '-' => {
                out.push((negated, std::mem::take(&mut current)));
                negated = ch == '-';
            }
            _ => current.push(ch),
        }
    }
    out.push((negated, current));
    out
}

fn parse_term(piece: &str) -> Result<Term, String> {
    if let Some(inner) = piece.strip_prefix("C(").and_then(|s| s.strip_suffix(')')) {
        let name = inner.trim();
        if !is_identifier(name) {
            return Err(format!("Invalid column name '{name}' in '{piece}'."));
        }
        return Ok(Term::Categorical(name.to_string()));
    }
    if !is_identifier(piece) {
        return Err(format!("Invalid term '{piece}'."));
    }
    Ok(Term::Numeric(piece.to_string()))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Column, ColumnData};

    #[test]
    fn parses_numeric_and_categorical_terms() {
        let f = Formula::parse("did_pass ~ cma_score + C(imd) + is_female").unwrap();
        assert_eq!(f.response, "did_pass");
        assert!(f.intercept);
        assert_eq!(
            f.terms,
            vec![
                Term::Numeric("cma_score".into()),
                Term::Categorical("imd".into()),
                Term::Numeric("is_female".into()),
            ]
        );
        assert_eq!(f.to_string(), "did_pass ~ cma_score + C(imd) + is_female");
    }

    #[test]
    fn intercept_can_be_dropped() {
        let a = Formula::parse("y ~ x - 1").unwrap();
        let b = Formula::parse("y ~ 0 + x").unwrap();
        assert!(!a.intercept);
        assert_eq!(a, b);
        assert_eq!(Formula::parse(&a.to_string()).unwrap(), a);
    }

    #[test]
    fn intercept_only_is_allowed() {
        let f = Formula::parse("y ~ 1").unwrap();
        assert!(f.terms.is_empty());
        assert_eq!(f.to_string(), "y ~ 1");
    }

    #[test]
    fn rejects_malformed_formulas() {
        for bad in [
            "did_pass cma_score",
            "did_pass ~ cma_score ~ age",
            "did_pass ~ cma_score +",
            "did_pass ~ cma_score - age",
            "did_pass ~ C(imd",
            "did_pass ~ x + x",
            "did_pass ~ did_pass",
            "y ~ 0",
            "1y ~ x",
        ] {
            assert!(Formula::parse(bad).is_err(), "expected error for '{bad}'");
        }
    }

    #[test]
    fn check_columns_names_first_missing_field() {
        let table = Table::new(vec![
            Column::new("did_pass", ColumnData::Integer(vec![Some(1)])),
            Column::new("estimated_age", ColumnData::Integer(vec![Some(30)])),
        ])
        .unwrap();
        let f = Formula::parse("did_pass ~ cma_score + best_prev_mod_score + estimated_age").unwrap();
        match f.check_columns(5, &table) {
            Err(AppError::UnknownCovariate { model_id, field }) => {
                assert_eq!(model_id, 5);
                assert_eq!(field, "cma_score");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
