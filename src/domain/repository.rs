use crate::domain::expense::{Expense, ExpenseFields};
use crate::domain::user::User;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn save_user(&self, user: User) -> Result<()>;
    /// Exact-case lookup; emails are stored and compared as given.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>>;
}

/// Owner-scoped expense persistence. `update` and `delete` report a missing
/// record and a record owned by someone else the same way, so callers cannot
/// probe for other users' ids.
#[async_trait]
pub trait ExpenseRepository: Send + Sync {
    /// Expenses for one owner, in creation order.
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Expense>>;
    async fn insert(&self, expense: Expense) -> Result<()>;
    /// Replaces the editable fields, returns the stored form, or `None` if no
    /// record with this id exists under this owner.
    async fn update(
        &self,
        owner_id: &str,
        expense_id: &str,
        fields: ExpenseFields,
    ) -> Result<Option<Expense>>;
    /// Returns whether a record was removed.
    async fn delete(&self, owner_id: &str, expense_id: &str) -> Result<bool>;
}
