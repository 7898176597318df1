//! Lowering of arithmetic expressions into relationships.
//!
//! Every operator and function call gets a fresh transient variable for its
//! result, so `C = L + (W / 2)` becomes
//!
//! ```text
//! $1 = W / 2
//! $2 = L + $1
//! C = $2
//! ```

use absolution_core::{ConstraintError, Expression};

use crate::relationship::{RelationshipId, RelationshipKind};
use crate::system::{System, Value};

impl System {
    /// Parse `text` and constrain `name` to equal it.
    ///
    /// ```
    /// use absolution_constraint::System;
    ///
    /// let mut system = System::new();
    /// system.set_text("C", "L + (W / 2)").unwrap();
    /// system.assign("L", 10.0);
    /// system.assign("W", 10.0);
    /// system.solve_next().unwrap();
    /// assert_eq!(system.get("C"), Ok(15.0));
    /// ```
    pub fn set_text(&mut self, name: &str, text: &str) -> Result<RelationshipId, ConstraintError> {
        let expr = absolution_parser::parse_expression(text)?;
        self.set_node(name, &expr)
    }

    /// Constrain `name` to equal an already parsed expression.
    ///
    /// Unknown functions are reported before anything is declared. If a
    /// declaration contradicts, every relationship lowered for `expr` is
    /// destroyed again.
    pub fn set_node(&mut self, name: &str, expr: &Expression) -> Result<RelationshipId, ConstraintError> {
        self.check_functions(expr)?;
        let mark = self.relationship_mark();
        let result = self.lower(expr).and_then(|value| self.equals(name, value));
        if result.is_err() {
            self.destroy_since(mark);
        }
        result
    }

    fn check_functions(&self, expr: &Expression) -> Result<(), ConstraintError> {
        match expr {
            Expression::Number(_) | Expression::Ident(_) | Expression::Property { .. } => Ok(()),
            Expression::BinaryOp { left, right, .. } => {
                self.check_functions(left)?;
                self.check_functions(right)
            }
            Expression::Call { name, args } => {
                if !self.has_function(name) {
                    return Err(ConstraintError::UnknownFunction { name: name.clone() });
                }
                args.iter().try_for_each(|arg| self.check_functions(arg))
            }
        }
    }

    /// Declare the relationships for `expr` and return what holds its value.
    fn lower(&mut self, expr: &Expression) -> Result<Value, ConstraintError> {
        match expr {
            Expression::Number(n) => Ok(Value::Number(*n)),
            Expression::Ident(_) | Expression::Property { .. } => {
                let name = expr.variable_name().unwrap_or_default();
                Ok(Value::Name(name))
            }
            Expression::BinaryOp { left, op, right } => {
                let left = self.lower(left)?;
                let right = self.lower(right)?;
                let result = self.create_transient();
                self.binary(
                    RelationshipKind::from_operator(*op),
                    Value::Variable(result),
                    left,
                    right,
                )?;
                Ok(Value::Variable(result))
            }
            Expression::Call { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.lower(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                let result = self.create_transient();
                self.call(name, result, args)?;
                Ok(Value::Variable(result))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use absolution_core::ParseError;

    use crate::function::FunctionRegistry;
    use crate::variable::Provenance;

    use super::*;

    #[test]
    fn test_set_text_simple() {
        let mut system = System::new();
        system.set_text("A", "B + 1").unwrap();
        system.assign("B", 10.0);
        system.solve_next().unwrap();
        assert_eq!(system.get("A"), Ok(11.0));
    }

    #[test]
    fn test_set_text_nested() {
        let mut system = System::new();
        system.set_text("W", "R - L").unwrap();
        system.set_text("C", "L + (W / 2)").unwrap();
        system.assign("L", 10.0);
        system.assign("R", 20.0);
        system.solve_next().unwrap();
        assert_eq!(system.get("W"), Ok(10.0));
        assert_eq!(system.get("C"), Ok(15.0));
    }

    #[test]
    fn test_set_text_back_solves() {
        let mut system = System::new();
        system.set_text("C", "L + (W / 2)").unwrap();
        system.assign("C", 15.0);
        system.assign("W", 10.0);
        system.solve_next().unwrap();
        assert_eq!(system.get("L"), Ok(10.0));
    }

    #[test]
    fn test_property_references() {
        let mut system = System::new();
        system.set_text("content.left", "sidebar.right + 8").unwrap();
        system.assign("sidebar.right", 200.0);
        system.solve_next().unwrap();
        assert_eq!(system.get("content.left"), Ok(208.0));
    }

    #[test]
    fn test_literal_expression() {
        let mut system = System::new();
        system.set_text("x", "1 + 2").unwrap();
        assert_eq!(system.get("x"), Ok(3.0));
        system.set_text("y", "-4").unwrap();
        assert_eq!(system.get("y"), Ok(-4.0));
    }

    #[test]
    fn test_transients() {
        let mut system = System::new();
        system.set_text("C", "L + (W / 2)").unwrap();
        let transients: Vec<_> = system
            .variable_names()
            .filter(|n| system.variable(n).map_or(false, |v| v.is_transient()))
            .collect();
        assert_eq!(transients, vec!["$1", "$2"]);
        assert_eq!(system.provenance("$1"), Some(Provenance::Unset));
    }

    #[test]
    fn test_function_call() {
        let mut system = System::new().with_functions(FunctionRegistry::with_builtins());
        system.set_text("w", "max(a.width, 100)").unwrap();
        system.assign("a.width", 40.0);
        system.solve_next().unwrap();
        assert_eq!(system.get("w"), Ok(100.0));
        assert_eq!(system.dump(Some("max")), "$1 = max(a.width, 100)");
    }

    #[test]
    fn test_unknown_function_declares_nothing() {
        let mut system = System::new();
        let err = system.set_text("x", "1 + nope(2)").unwrap_err();
        assert_eq!(err, ConstraintError::UnknownFunction { name: "nope".into() });
        assert_eq!(system.relationship_count(), 0);
        assert_eq!(system.variable_names().count(), 0);
    }

    #[test]
    fn test_contradicting_expression_declares_nothing() {
        let mut system = System::new();
        system.assign("A", 1.0);
        system.assign("C", 5.0);
        system.set_text("B", "A * 2").unwrap();
        let before = system.relationship_count();

        let err = system.set_text("C", "A + 1").unwrap_err();
        assert!(matches!(err, ConstraintError::Contradiction { .. }));
        assert_eq!(system.relationship_count(), before);
        assert_eq!(system.dump(None), "$1 = A * 2\nB = $1");
        assert!(!system.has("$2"));

        system.solve_next().unwrap();
        assert_eq!(system.get("B"), Ok(2.0));
    }

    #[test]
    fn test_parse_error() {
        let mut system = System::new();
        let err = system.set_text("x", "").unwrap_err();
        assert_eq!(err, ConstraintError::Parse(ParseError::Empty));
    }
}
