//! The domain types shared by the codec, extractor and repository.

mod draft;
mod movement;
mod row;

pub use draft::TransactionDraft;
pub use movement::MovementType;
pub use row::TransferRow;
