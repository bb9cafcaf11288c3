//! Query expression construction
//!
//! The backend grammar is reproduced literally: the offset clause is appended
//! to the raw expression as `<expr> offset <N>d` and the result is wrapped in
//! the aggregate function.

/// `aggregate(expr)`
pub fn current_query(aggregate: &str, expr: &str) -> String {
    format!("{}({})", aggregate, expr)
}

/// `aggregate(expr offset Nd)`
pub fn offset_query(aggregate: &str, expr: &str, offset_days: u32) -> String {
    format!("{}({} offset {}d)", aggregate, expr, offset_days)
}
