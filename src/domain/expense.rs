use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Canonical expense categories. The UI layers map these to display labels;
/// the wire format is the lowercase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Transport,
    Bills,
    Shopping,
    School,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(f64);

impl Amount {
    pub fn new(value: f64) -> Self {
        Amount(value)
    }

    pub fn inner(&self) -> f64 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_finite() && self.0 >= 0.0
    }
}

/// The client-settable part of an expense. Id and owner are assigned by the
/// store and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseFields {
    #[serde(default)]
    pub description: String,
    pub amount: Amount,
    pub category: Category,
    pub date: NaiveDate,
    #[serde(default)]
    pub note: String,
}

/// Stored form of an expense, bound to exactly one owner. Never leaves the
/// server as-is; the wire form is [`ExpenseRecord`], which omits the owner.
#[derive(Debug, Clone)]
pub struct Expense {
    pub id: String,
    pub owner_id: String,
    pub fields: ExpenseFields,
}

/// Owner-stripped expense as it appears on the wire and in the client mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub id: String,
    #[serde(flatten)]
    pub fields: ExpenseFields,
}

impl From<Expense> for ExpenseRecord {
    fn from(expense: Expense) -> Self {
        ExpenseRecord {
            id: expense.id,
            fields: expense.fields,
        }
    }
}
