//! The CSV codec: serializes transfer rows to CSV text and parses CSV text
//! back into validated rows.

mod decode;
mod encode;
mod field;

pub use decode::{DecodeOutcome, NumberedRow, decode};
pub use encode::encode;
