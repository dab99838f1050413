//! Operator allow-list.

use std::collections::HashSet;

use swapdrop_core::error::{Result, SwapError};
use swapdrop_core::traits::{SupportAction, SupportAuthorizer};
use swapdrop_core::types::OperatorId;

/// Authorizes a fixed set of operators for every support action.
#[derive(Clone, Debug, Default)]
pub struct StaticAuthorizer {
    operators: HashSet<OperatorId>,
}

impl StaticAuthorizer {
    /// Allows exactly `operators`.
    pub fn new(operators: impl IntoIterator<Item = OperatorId>) -> Self {
        Self {
            operators: operators.into_iter().collect(),
        }
    }

    /// Parses a comma-separated list, skipping blanks.
    pub fn from_list(list: &str) -> Self {
        Self::new(list.split(',').filter_map(|s| OperatorId::new(s).ok()))
    }

    /// Number of allowed operators.
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    /// Returns true if nobody is allowed.
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

impl SupportAuthorizer for StaticAuthorizer {
    fn authorize(&self, operator: &OperatorId, action: SupportAction) -> Result<()> {
        if self.operators.contains(operator) {
            Ok(())
        } else {
            Err(SwapError::Unauthorized(format!("{} may not {:?}", operator, action)))
        }
    }
}
