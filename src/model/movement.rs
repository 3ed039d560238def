//! The closed classification of a transaction's cash-flow direction.

use serde::{Deserialize, Serialize};

/// The cash-flow direction or purpose of a transaction.
///
/// The set is closed: import rejects rows whose movement type does not match
/// one of these variants (case-insensitively).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MovementType {
    /// Money entering an account, e.g. wages.
    Income,
    /// Money leaving an account, e.g. groceries.
    #[default]
    Expense,
    /// Money moving between two of the user's own accounts.
    ///
    /// Requires both a from-account and a to-account name, and they must
    /// differ.
    Transfer,
    /// Money moved into an investment position through a broker.
    Investment,
    /// Anything that does not fit the other variants.
    Other,
}

impl MovementType {
    /// Parse a movement type from CSV text, ignoring case.
    ///
    /// Returns `None` for values outside the closed set; the caller reports
    /// this as a row error.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "INCOME" => Some(Self::Income),
            "EXPENSE" => Some(Self::Expense),
            "TRANSFER" => Some(Self::Transfer),
            "INVESTMENT" => Some(Self::Investment),
            "OTHER" => Some(Self::Other),
            _ => None,
        }
    }

    /// The canonical uppercase spelling used in CSV cells and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "INCOME",
            Self::Expense => "EXPENSE",
            Self::Transfer => "TRANSFER",
            Self::Investment => "INVESTMENT",
            Self::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod movement_type_tests {
    use super::MovementType;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(MovementType::parse("income"), Some(MovementType::Income));
        assert_eq!(MovementType::parse("EXPENSE"), Some(MovementType::Expense));
        assert_eq!(MovementType::parse("Transfer"), Some(MovementType::Transfer));
        assert_eq!(
            MovementType::parse(" investment "),
            Some(MovementType::Investment)
        );
    }

    #[test]
    fn parse_rejects_values_outside_the_closed_set() {
        assert_eq!(MovementType::parse("withdrawal"), None);
        assert_eq!(MovementType::parse(""), None);
    }

    #[test]
    fn round_trips_through_canonical_spelling() {
        for movement in [
            MovementType::Income,
            MovementType::Expense,
            MovementType::Transfer,
            MovementType::Investment,
            MovementType::Other,
        ] {
            assert_eq!(MovementType::parse(movement.as_str()), Some(movement));
        }
    }
}
