use crate::domain::error::DomainError;
use crate::domain::expense::{Expense, ExpenseFields};
use crate::domain::repository::ExpenseRepository;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub struct ExpenseService<R: ExpenseRepository> {
    repository: Arc<R>,
}

impl<R: ExpenseRepository> ExpenseService<R> {
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    #[instrument(skip(self), fields(owner_id = owner_id))]
    pub async fn list(&self, owner_id: &str) -> Result<Vec<Expense>> {
        let expenses = self.repository.list_for_owner(owner_id).await?;
        debug!(count = expenses.len(), "Expenses listed");
        Ok(expenses)
    }

    #[instrument(skip(self, fields), fields(owner_id = owner_id))]
    pub async fn create(&self, owner_id: &str, fields: ExpenseFields) -> Result<Expense> {
        validate_fields(&fields)?;

        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            fields,
        };
        self.repository.insert(expense.clone()).await?;

        info!(expense_id = %expense.id, "Expense created");
        Ok(expense)
    }

    #[instrument(skip(self, fields), fields(owner_id = owner_id, expense_id = expense_id))]
    pub async fn update(
        &self,
        owner_id: &str,
        expense_id: &str,
        fields: ExpenseFields,
    ) -> Result<Expense> {
        validate_fields(&fields)?;

        let updated = self
            .repository
            .update(owner_id, expense_id, fields)
            .await?
            .ok_or_else(|| DomainError::NotFound("Expense not found".to_string()))?;

        info!(expense_id = %updated.id, "Expense updated");
        Ok(updated)
    }

    #[instrument(skip(self), fields(owner_id = owner_id, expense_id = expense_id))]
    pub async fn delete(&self, owner_id: &str, expense_id: &str) -> Result<()> {
        if !self.repository.delete(owner_id, expense_id).await? {
            return Err(DomainError::NotFound("Expense not found".to_string()).into());
        }

        info!("Expense deleted");
        Ok(())
    }
}

fn validate_fields(fields: &ExpenseFields) -> Result<()> {
    if !fields.amount.is_valid() {
        return Err(
            DomainError::Validation("amount must be a non-negative number".to_string()).into(),
        );
    }
    Ok(())
}
