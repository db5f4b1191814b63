//! Database entities, one module per table.

pub mod audit_log;
pub mod bug_report;
pub mod employee;
pub mod message;
pub mod order;
pub mod order_item;
pub mod product;
pub mod rating;
pub mod schedule_exception;
pub mod stock_history;
pub mod user;
