use std::collections::BTreeMap;

use comfy_table::{Attribute, Cell, Color, Table};

use crate::geo::{Coordinate, directions_url};
use crate::model::{Summary, WorkOrder, WorkStatus};

const PAID_GREEN: Color = Color::Rgb { r: 4, g: 120, b: 87 };
const UNPAID_RED: Color = Color::Rgb { r: 185, g: 28, b: 28 };
const PROCESSING_AMBER: Color = Color::Rgb { r: 180, g: 83, b: 9 };

fn status_color(status: WorkStatus) -> Color {
    match status {
        WorkStatus::Paid => PAID_GREEN,
        WorkStatus::Processing => PROCESSING_AMBER,
        WorkStatus::Unpaid => UNPAID_RED,
    }
}

fn money(amount: f64) -> String {
    format!("${:.2}", amount)
}

pub fn orders_table(orders: &[WorkOrder]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("#"),
        Cell::new("Date"),
        Cell::new("Address"),
        Cell::new("Price"),
        Cell::new("Extra Hours"),
        Cell::new("Total"),
        Cell::new("Status"),
        Cell::new("Payment Date"),
    ]);

    for order in orders {
        let payment_date = order
            .payment_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "N/A".to_string());

        table.add_row(vec![
            Cell::new(order.work_number),
            Cell::new(order.date.format("%Y-%m-%d")),
            Cell::new(&order.address),
            Cell::new(order.price),
            Cell::new(order.extra_hours),
            Cell::new(money(order.total_price)),
            Cell::new(order.status.label()).fg(status_color(order.status)),
            Cell::new(payment_date),
        ]);
    }
    table
}

pub fn summary_table(summary: &Summary) -> Table {
    let paid_cell = Cell::new(money(summary.paid_amount)).add_attribute(Attribute::Bold);
    let paid_cell = if summary.paid_amount > 0.0 { paid_cell.fg(PAID_GREEN) } else { paid_cell };

    let unpaid_cell = Cell::new(money(summary.unpaid_amount)).add_attribute(Attribute::Bold);
    let unpaid_cell = if summary.unpaid_amount > 0.0 { unpaid_cell.fg(UNPAID_RED) } else { unpaid_cell };

    let mut table = Table::new();
    table.set_header(vec![
        Cell::new("Total Extra Hours"),
        Cell::new("Total Price"),
        Cell::new("Paid"),
        Cell::new("Unpaid"),
    ]);
    table.add_row(vec![
        Cell::new(summary.total_extra_hours),
        Cell::new(money(summary.total_price)),
        paid_cell,
        unpaid_cell,
    ]);
    table
}

pub fn markers_table(markers: &BTreeMap<String, Coordinate>) -> Table {
    let mut table = Table::new();
    table.set_header(vec![Cell::new("Address"), Cell::new("Lat"), Cell::new("Lon"), Cell::new("Directions")]);
    for (address, at) in markers {
        table.add_row(vec![
            Cell::new(address),
            Cell::new(format!("{:.5}", at.lat)),
            Cell::new(format!("{:.5}", at.lon)),
            Cell::new(directions_url(address)),
        ]);
    }
    table
}
