pub mod engine;
pub mod table;

pub use engine::run;
pub use table::DispatchTable;
