pub mod checksum;
pub mod printer;
pub mod schema;
pub mod stream;
pub mod validator;

pub use checksum::Crc16;
pub use printer::{PrinterReport, chunk_report_payload, reassemble_report_payload};
pub use schema::{FieldKind, FrameSchema, PRINTER_SCHEMA, VALIDATOR_SCHEMA};
pub use stream::{ParserState, StreamParser};
pub use validator::{ValidatorCommand, ValidatorStatus};
