pub mod response;

pub use response::StatusReport;
