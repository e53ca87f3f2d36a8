use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Flat surcharge billed per extra hour.
pub const EXTRA_HOUR_RATE: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WorkStatus {
    Unpaid,
    Processing,
    Paid,
}

impl WorkStatus {
    pub fn label(&self) -> &'static str {
        match self {
            WorkStatus::Unpaid => "Unpaid",
            WorkStatus::Processing => "Processing",
            WorkStatus::Paid => "Paid",
        }
    }
}

impl fmt::Display for WorkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One serviced job. Field names follow the `workData` blob layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrder {
    pub work_number: u32,
    pub date: NaiveDate,
    pub address: String,
    pub price: f64,
    pub extra_hours: f64,
    pub total_price: f64,
    pub status: WorkStatus,
    pub payment_date: Option<NaiveDate>,
}

impl WorkOrder {
    /// Builds a fresh unpaid order; the total is fixed here and never recomputed.
    pub fn new(work_number: u32, date: NaiveDate, address: &str, price: f64, extra_hours: f64) -> Self {
        WorkOrder {
            work_number,
            date,
            address: address.to_string(),
            price,
            extra_hours,
            total_price: price + extra_hours * EXTRA_HOUR_RATE,
            status: WorkStatus::Unpaid,
            payment_date: None,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.status == WorkStatus::Paid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_extra_hours: f64,
    pub total_price: f64,
    pub paid_amount: f64,
    pub unpaid_amount: f64,
}
