//! FILENAME: engine/src/lib.rs
//! PURPOSE: Main library entry point for the template evaluation engine.
//! CONTEXT: Re-exports the value model, records, the sandboxed evaluator and
//! the style vocabulary for use by the persistence and report crates.

pub mod builtins;
pub mod cell;
pub mod coord;
pub mod evaluator;
pub mod functions;
pub mod record;
pub mod style;

// Re-export commonly used types at the crate root
pub use cell::{format_number, CellError, CellValue};
pub use coord::{col_to_index, coord_to_a1, index_to_col, CellCoord};
pub use builtins::apply_number_format;
pub use evaluator::{EvalContext, EvalResult, Evaluator, RECORD_ALIAS, VALUE_LOCAL};
pub use functions::{FunctionRegistry, HostFunction};
pub use record::{Namespace, Record, SYS_NUM_REC};
pub use style::{
    Alignment, BorderLineStyle, BorderStyle, Borders, CellStyle, Color, Fill, FontStyle,
    StyleRegistry, TextAlign, VerticalAlign,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integration_test_record_evaluation_workflow() {
        let fields = vec!["price".to_string(), "qty".to_string()];
        let record = Record::from_row(&fields, &[2.5.into(), 4.0.into()], 0);
        let vars: Namespace = vec![("discount", 1.0)].into_iter().collect();
        let funcs = FunctionRegistry::new();

        let expr = parser::parse("record['price'] * record['qty'] - discount").unwrap();
        let evaluator = Evaluator::new(EvalContext::new(Some(&record), &vars, &funcs));
        let result = evaluator.evaluate(&expr);

        assert_eq!(result, EvalResult::Number(9.0));
        assert_eq!(result.to_cell_value(), CellValue::Number(9.0));
        assert_eq!(result.as_text(), "9");
    }

    #[test]
    fn integration_test_evaluation_without_record() {
        let vars = Namespace::new();
        let funcs = FunctionRegistry::new();
        let expr = parser::parse("record['anything']").unwrap();
        let evaluator = Evaluator::new(EvalContext::new(None, &vars, &funcs));
        assert_eq!(evaluator.evaluate(&expr), EvalResult::Error(CellError::Ref));
    }
}
