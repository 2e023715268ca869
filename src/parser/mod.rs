pub mod ast;
pub mod lexer;
pub mod sql_parser;

pub use ast::*;
pub use sql_parser::{parse_sql, Parser};
