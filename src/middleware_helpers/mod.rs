pub mod audit;
pub mod request_id;

pub use audit::{audit_middleware, AuditLogger};
pub use request_id::{request_id_middleware, REQUEST_ID_HEADER};
