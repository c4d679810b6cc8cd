use crate::domain::expense::{Expense, ExpenseFields};
use crate::domain::repository::ExpenseRepository;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, trace};

/// Expenses keyed by owner id; each owner's Vec keeps creation order.
#[derive(Clone)]
pub struct InMemoryExpenseRepository {
    storage: Arc<RwLock<HashMap<String, Vec<Expense>>>>,
}

impl InMemoryExpenseRepository {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryExpenseRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExpenseRepository for InMemoryExpenseRepository {
    #[instrument(skip(self), fields(owner_id = owner_id))]
    async fn list_for_owner(&self, owner_id: &str) -> Result<Vec<Expense>> {
        let storage = self.storage.read().await;
        let expenses = storage.get(owner_id).cloned().unwrap_or_default();
        trace!(count = expenses.len(), "Listed expenses for owner");
        Ok(expenses)
    }

    #[instrument(skip(self, expense), fields(owner_id = %expense.owner_id, expense_id = %expense.id))]
    async fn insert(&self, expense: Expense) -> Result<()> {
        let mut storage = self.storage.write().await;
        storage
            .entry(expense.owner_id.clone())
            .or_default()
            .push(expense.clone());
        debug!(
            owner_id = %expense.owner_id,
            expense_id = %expense.id,
            "Expense saved to memory storage"
        );
        Ok(())
    }

    #[instrument(skip(self, fields), fields(owner_id = owner_id, expense_id = expense_id))]
    async fn update(
        &self,
        owner_id: &str,
        expense_id: &str,
        fields: ExpenseFields,
    ) -> Result<Option<Expense>> {
        let mut storage = self.storage.write().await;
        let Some(expenses) = storage.get_mut(owner_id) else {
            trace!("Owner has no expenses");
            return Ok(None);
        };
        let Some(expense) = expenses.iter_mut().find(|e| e.id == expense_id) else {
            trace!("No expense with this id under this owner");
            return Ok(None);
        };
        expense.fields = fields;
        debug!("Expense updated");
        Ok(Some(expense.clone()))
    }

    #[instrument(skip(self), fields(owner_id = owner_id, expense_id = expense_id))]
    async fn delete(&self, owner_id: &str, expense_id: &str) -> Result<bool> {
        let mut storage = self.storage.write().await;
        let Some(expenses) = storage.get_mut(owner_id) else {
            return Ok(false);
        };
        let before = expenses.len();
        expenses.retain(|e| e.id != expense_id);
        let removed = expenses.len() < before;
        if removed {
            debug!("Expense deleted");
        } else {
            trace!("No expense with this id under this owner");
        }
        Ok(removed)
    }
}
