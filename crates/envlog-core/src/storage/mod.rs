pub mod nv_store;
pub mod record;
pub mod record_log;

pub use nv_store::*;
pub use record::*;
pub use record_log::*;
