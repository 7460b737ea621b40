pub mod console;
pub mod xlsx;
