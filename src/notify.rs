use anyhow::Result;
use tracing::info;

use crate::models::SaleEntry;

/// Delivery boundary for detected sales. Errors here are logged by the
/// cycle driver, never retried.
pub trait SaleNotifier: Send + Sync {
    fn notify(&self, owner_id: i64, sales: &[SaleEntry]) -> Result<()>;
}

/// Writes sales to the log. Stands in for a real delivery channel.
pub struct LogNotifier;

impl SaleNotifier for LogNotifier {
    fn notify(&self, owner_id: i64, sales: &[SaleEntry]) -> Result<()> {
        for sale in sales {
            info!(
                owner_id,
                name = %sale.name,
                discount = sale.discount_percent,
                now = %sale.final_formatted,
                was = %sale.initial_formatted,
                url = %sale.store_url,
                "sale detected"
            );
        }
        Ok(())
    }
}
