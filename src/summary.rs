use crate::model::{Summary, WorkOrder};

/// Running totals over the whole collection.
pub fn summarize(orders: &[WorkOrder]) -> Summary {
    let total_extra_hours = orders.iter().map(|o| o.extra_hours).sum();
    let total_price: f64 = orders.iter().map(|o| o.total_price).sum();
    let paid_amount: f64 = orders.iter().filter(|o| o.is_paid()).map(|o| o.total_price).sum();

    Summary {
        total_extra_hours,
        total_price,
        paid_amount,
        unpaid_amount: total_price - paid_amount,
    }
}
