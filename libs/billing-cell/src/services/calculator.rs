use tracing::debug;

use crate::models::{BillingError, BillingItem, BillingItemInput, BillingStatus};

/// Rounds a monetary value to cents.
pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct BillingTotals {
    pub items: Vec<BillingItem>,
    pub subtotal: f64,
    pub tax: f64,
    pub discount: f64,
    pub total: f64,
}

/// Invoice arithmetic. `tax_rate` applies only when no explicit tax is given.
pub struct BillingCalculator {
    tax_rate: f64,
}

impl BillingCalculator {
    pub fn new(tax_rate: f64) -> Self {
        Self { tax_rate }
    }

    pub fn calculate(
        &self,
        items: &[BillingItemInput],
        tax: Option<f64>,
        discount: Option<f64>,
    ) -> Result<BillingTotals, BillingError> {
        if items.is_empty() {
            return Err(BillingError::ValidationError(
                "At least one billing item is required".to_string(),
            ));
        }

        let items = items
            .iter()
            .enumerate()
            .map(|(index, item)| price_item(index, item))
            .collect::<Result<Vec<_>, _>>()?;

        let subtotal = round_money(items.iter().map(|item| item.amount).sum());

        let tax = match tax {
            Some(tax) => ensure_non_negative("tax", tax)?,
            None => subtotal * self.tax_rate,
        };
        let tax = round_money(tax);
        let discount = round_money(ensure_non_negative("discount", discount.unwrap_or(0.0))?);

        let total = round_money(subtotal + tax - discount);
        if total < 0.0 {
            return Err(BillingError::ValidationError(
                "Discount cannot exceed subtotal plus tax".to_string(),
            ));
        }

        debug!("Billing totals: subtotal {} tax {} discount {} total {}", subtotal, tax, discount, total);

        Ok(BillingTotals {
            items,
            subtotal,
            tax,
            discount,
            total,
        })
    }

    /// Status implied by the cumulative amount received.
    pub fn payment_status(amount_paid: f64, total: f64) -> BillingStatus {
        if amount_paid >= total {
            BillingStatus::Paid
        } else if amount_paid > 0.0 {
            BillingStatus::PartiallyPaid
        } else {
            BillingStatus::Unpaid
        }
    }
}

fn price_item(index: usize, item: &BillingItemInput) -> Result<BillingItem, BillingError> {
    let position = index + 1;

    if item.description.trim().is_empty() {
        return Err(BillingError::ValidationError(format!(
            "Item {} needs a description",
            position
        )));
    }
    if item.quantity == 0 {
        return Err(BillingError::ValidationError(format!(
            "Item {} quantity must be greater than zero",
            position
        )));
    }
    if !item.unit_price.is_finite() || item.unit_price < 0.0 {
        return Err(BillingError::ValidationError(format!(
            "Item {} unit price cannot be negative",
            position
        )));
    }

    Ok(BillingItem {
        description: item.description.trim().to_string(),
        quantity: item.quantity,
        unit_price: item.unit_price,
        amount: round_money(f64::from(item.quantity) * item.unit_price),
    })
}

fn ensure_non_negative(field: &str, value: f64) -> Result<f64, BillingError> {
    if !value.is_finite() || value < 0.0 {
        return Err(BillingError::ValidationError(format!("{} cannot be negative", field)));
    }
    Ok(value)
}
