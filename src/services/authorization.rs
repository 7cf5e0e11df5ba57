use crate::{
    entities::user_budget_line::{self, Entity as UserBudgetLine},
    errors::ServiceError,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::instrument;

/// Resolves which budget-line categories a user may operate against.
/// Allocation and adjustment write paths consult this before mutating stock.
#[derive(Clone)]
pub struct AuthorizationService {
    db: Arc<DatabaseConnection>,
}

impl AuthorizationService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Sorted, de-duplicated set of active budget lines for the user.
    #[instrument(skip(self))]
    pub async fn permitted_budget_lines(&self, user_id: i64) -> Result<Vec<i32>, ServiceError> {
        if user_id <= 0 {
            return Ok(Vec::new());
        }

        let rows = UserBudgetLine::find()
            .filter(user_budget_line::Column::UserId.eq(user_id))
            .filter(user_budget_line::Column::Active.eq(true))
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let unique: BTreeSet<i32> = rows.into_iter().map(|r| r.budget_line).collect();
        Ok(unique.into_iter().collect())
    }
}

/// Per-line check used by the write paths. `line_index` is zero-based;
/// messages are one-based to match the submitted document.
pub fn ensure_budget_line_permitted(
    permitted: &[i32],
    budget_line: i32,
    line_index: usize,
) -> Result<(), ServiceError> {
    if permitted.contains(&budget_line) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "budget line {} is not permitted for this user (line #{})",
            budget_line,
            line_index + 1
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_permitted_set_rejects_everything() {
        assert!(ensure_budget_line_permitted(&[], 182, 0).is_err());
    }

    #[test]
    fn member_is_permitted() {
        assert!(ensure_budget_line_permitted(&[182, 195], 195, 3).is_ok());
    }

    #[test]
    fn rejection_names_the_line() {
        let err = ensure_budget_line_permitted(&[182], 268, 2).unwrap_err();
        assert!(err.to_string().contains("line #3"));
        assert!(err.to_string().contains("268"));
    }
}
