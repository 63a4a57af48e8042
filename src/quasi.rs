// Quasiquote expansion
//
// A template becomes list/append/vector construction nodes. Nested
// quasiquotes raise the depth; only depth-1 unquotes are evaluated.

use crate::analyzer::{AnalysisContext, ConstructOp, Expr};
use crate::error::{Error, EvalResult};
use crate::eval::Interpreter;
use crate::symbol::SymbolId;
use crate::types::Value;

impl Interpreter {
    pub(crate) fn analyze_quasi(
        &mut self,
        template: &Value,
        depth: usize,
        cx: &mut AnalysisContext,
    ) -> EvalResult<Expr> {
        match template {
            Value::Cons(_) => {
                if let Some((op, arg)) = self.quasi_marker(template) {
                    let sf = &self.special_forms;
                    let inner_depth = if op == sf.quasiquote {
                        depth + 1
                    } else if depth == 1 {
                        if op == sf.unquote {
                            return self.analyze(&arg, cx);
                        }
                        return Err(Error::compile(
                            ",@ is only allowed inside a list",
                            cx.loc_of(template),
                        ));
                    } else {
                        depth - 1
                    };
                    let inner = self.analyze_quasi(&arg, inner_depth, cx)?;
                    return Ok(Expr::Construct(
                        ConstructOp::List,
                        vec![Expr::Literal(Value::Symbol(op)), inner],
                    ));
                }
                self.quasi_list(template, depth, cx)
            }
            Value::Vector(items) => {
                let as_list = Value::list(items.borrow().clone());
                let inner = self.quasi_list(&as_list, depth, cx)?;
                Ok(Expr::Construct(ConstructOp::Vector, vec![inner]))
            }
            other => Ok(Expr::Literal(other.clone())),
        }
    }

    /// `(unquote x)`, `(unquote-splicing x)` or `(quasiquote x)`
    fn quasi_marker(&self, form: &Value) -> Option<(SymbolId, Value)> {
        let cell = form.as_cons()?;
        let op = cell.car.as_symbol()?;
        let sf = &self.special_forms;
        if op != sf.unquote && op != sf.unquote_splicing && op != sf.quasiquote {
            return None;
        }
        let rest = cell.cdr.as_cons()?;
        if !rest.cdr.is_null() {
            return None;
        }
        Some((op, rest.car.clone()))
    }

    fn quasi_list(&mut self, list: &Value, depth: usize, cx: &mut AnalysisContext) -> EvalResult<Expr> {
        let mut segments = Vec::new();
        let mut group = Vec::new();
        let mut tail = None;
        let mut current = list.clone();
        let mut first = true;

        loop {
            let cell = match &current {
                Value::Null => break,
                Value::Cons(cell) => cell.clone(),
                other => {
                    tail = Some(Expr::Literal(other.clone()));
                    break;
                }
            };
            // `(a . ,b)` leaves an unquote form in tail position
            if !first && self.quasi_marker(&current).is_some() {
                tail = Some(self.analyze_quasi(&current, depth, cx)?);
                break;
            }
            first = false;

            match self.quasi_marker(&cell.car) {
                Some((op, arg)) if depth == 1 && op == self.special_forms.unquote_splicing => {
                    if !group.is_empty() {
                        segments.push(Expr::Construct(ConstructOp::List, std::mem::take(&mut group)));
                    }
                    segments.push(self.analyze(&arg, cx)?);
                }
                _ => group.push(self.analyze_quasi(&cell.car, depth, cx)?),
            }
            current = cell.cdr.clone();
        }

        let spliced = !segments.is_empty();
        if !group.is_empty() {
            segments.push(Expr::Construct(ConstructOp::List, group));
        }
        match tail {
            None if !spliced && segments.len() <= 1 => {
                Ok(segments.pop().unwrap_or(Expr::Literal(Value::Null)))
            }
            None => {
                // Append copies every part but the last; keep the result fresh
                segments.push(Expr::Literal(Value::Null));
                Ok(Expr::Construct(ConstructOp::Append, segments))
            }
            Some(tail) => {
                segments.push(tail);
                Ok(Expr::Construct(ConstructOp::Append, segments))
            }
        }
    }
}
