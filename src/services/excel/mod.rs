pub mod reader;
pub mod utils;

pub use reader::read_workbook;
