pub mod describe;
pub mod sql;
pub mod validate;
