//! CSV input and output for the batch commands.

pub mod reader;
pub mod writer;

pub use reader::{read_input_rows, read_vrm_column};
pub use writer::{output_file_name, write_csv, ReportWriter};
