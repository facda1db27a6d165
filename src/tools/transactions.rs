//! Transaction functions

use super::{bool_param, f64_param, require_str, str_param, Tool, ToolContext};
use crate::models::{ApprovalStatus, PendingTask, PendingTaskDetail, ToolInput, ToolOutput};
use crate::store::NewTransaction;
use crate::Result;
use serde_json::{json, Value};
use tracing::info;

const BAD_AMOUNT: &str = "Please provide a positive amount for the transaction.";

pub struct CreateTransactionTool;

#[async_trait::async_trait]
impl Tool for CreateTransactionTool {
    fn name(&self) -> &'static str {
        "create_transaction"
    }

    fn description(&self) -> &'static str {
        "Create a transaction; it is held for approval unless approval_needed is false"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "transaction_type": {
                    "type": "string",
                    "description": "Type of transaction (payment, purchase, transfer)"
                },
                "amount": { "type": "number", "description": "Transaction amount" },
                "recipient": { "type": "string", "description": "Recipient of the transaction" },
                "notes": { "type": "string", "description": "Transaction notes" },
                "approval_needed": { "type": "boolean", "description": "Defaults to true" }
            },
            "required": ["transaction_type", "amount"]
        })
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        let transaction_type = require_str(input, "transaction_type")?.to_lowercase();
        let amount = match f64_param(input, "amount") {
            Some(amount) if amount.is_finite() && amount > 0.0 => amount,
            _ => return Ok(ToolOutput::failure(BAD_AMOUNT)),
        };

        let new_transaction = NewTransaction {
            transaction_type,
            amount,
            recipient: str_param(input, "recipient").map(str::to_string),
            notes: str_param(input, "notes").unwrap_or_default().to_string(),
            approval_needed: bool_param(input, "approval_needed").unwrap_or(true),
        };
        info!(
            transaction_type = %new_transaction.transaction_type,
            amount,
            approval_needed = new_transaction.approval_needed,
            "Creating transaction"
        );

        let profile_id = ctx.profile_id()?;
        let (transaction, task_id) = ctx
            .store
            .create_transaction(profile_id, new_transaction)
            .await?;
        let description = transaction.describe();

        match task_id {
            Some(task_id) => {
                ctx.session.pending_tasks.insert(PendingTask {
                    task_id,
                    detail: PendingTaskDetail::Transaction(transaction),
                });
                Ok(ToolOutput::success(format!(
                    "Transaction created and pending approval as task {}: {}",
                    task_id, description
                )))
            }
            None => {
                ctx.session.transaction_history.push(transaction);
                Ok(ToolOutput::success(format!(
                    "Transaction recorded: {}",
                    description
                )))
            }
        }
    }
}

pub struct ListTransactionsTool;

#[async_trait::async_trait]
impl Tool for ListTransactionsTool {
    fn name(&self) -> &'static str {
        "list_transactions"
    }

    fn description(&self) -> &'static str {
        "List stored transactions, newest first, optionally filtered by status"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "enum": ["pending", "approved", "rejected", "completed"]
                }
            }
        })
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, input: &ToolInput) -> Result<ToolOutput> {
        let status = match str_param(input, "status") {
            Some(raw) => match ApprovalStatus::parse(raw) {
                Some(status) => Some(status),
                None => {
                    return Ok(ToolOutput::failure(format!(
                        "Unknown status '{}'. Use pending, approved, rejected or completed.",
                        raw
                    )))
                }
            },
            None => None,
        };

        let transactions = ctx.store.transactions(ctx.profile_id()?, status).await?;
        if transactions.is_empty() {
            return Ok(ToolOutput::success("No transactions found"));
        }

        let mut text = String::from("Transactions:\n");
        for (i, transaction) in transactions.iter().enumerate() {
            text.push_str(&format!(
                "{}. {} ({}) on {}\n",
                i + 1,
                transaction.describe(),
                transaction.status,
                transaction.timestamp
            ));
        }
        Ok(ToolOutput::success(text))
    }
}

pub struct TransactionHistoryTool;

#[async_trait::async_trait]
impl Tool for TransactionHistoryTool {
    fn name(&self) -> &'static str {
        "transaction_history"
    }

    fn description(&self) -> &'static str {
        "List the transactions approved during this session"
    }

    async fn execute(&self, ctx: &mut ToolContext<'_>, _input: &ToolInput) -> Result<ToolOutput> {
        let history = &ctx.session.transaction_history;
        if history.is_empty() {
            return Ok(ToolOutput::success(
                "No transactions have been approved in this session",
            ));
        }

        let mut text = String::from("Approved transactions:\n");
        for transaction in history {
            text.push_str(&format!("- {}\n", transaction.describe()));
        }
        Ok(ToolOutput::success(text))
    }
}
