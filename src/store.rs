use std::collections::HashSet;

use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{Result, TrackerError};
use crate::model::{WorkOrder, WorkStatus};
use crate::storage::{BlobStore, WORK_DATA_KEY};

type Listener = Box<dyn FnMut(&[WorkOrder])>;

/// Parses a user-entered amount, rejecting anything that is not a finite,
/// non-negative decimal.
pub fn parse_amount(field: &'static str, input: &str) -> Result<f64> {
    let invalid = || TrackerError::InvalidAmount { field, value: input.to_string() };
    let value: f64 = input.trim().parse().map_err(|_| invalid())?;
    check_amount(field, value).map_err(|_| invalid())
}

fn check_amount(field: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        // folds -0 into 0
        Ok(value + 0.0)
    } else {
        Err(TrackerError::InvalidAmount { field, value: value.to_string() })
    }
}

/// Ordered collection of work orders, written through to a blob store after
/// every mutation.
pub struct RecordStore<B: BlobStore> {
    backend: B,
    clock: Box<dyn Clock>,
    orders: Vec<WorkOrder>,
    listeners: Vec<Listener>,
}

impl<B: BlobStore> RecordStore<B> {
    pub fn open(backend: B, clock: impl Clock + 'static) -> Result<Self> {
        let orders: Vec<WorkOrder> = match backend.read(WORK_DATA_KEY)? {
            Some(blob) if !blob.trim().is_empty() => serde_json::from_str(&blob)?,
            _ => Vec::new(),
        };

        let mut seen = HashSet::new();
        for order in &orders {
            if !seen.insert(order.work_number) {
                return Err(TrackerError::DuplicateWorkNumber(order.work_number));
            }
        }
        debug!(count = orders.len(), "loaded work orders");

        Ok(RecordStore { backend, clock: Box::new(clock), orders, listeners: Vec::new() })
    }

    pub fn load_all(&self) -> &[WorkOrder] {
        &self.orders
    }

    pub fn get(&self, work_number: u32) -> Option<&WorkOrder> {
        self.orders.iter().find(|o| o.work_number == work_number)
    }

    /// Registers a callback run with the full collection after each persisted mutation.
    pub fn subscribe(&mut self, listener: impl FnMut(&[WorkOrder]) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn create(&mut self, address: &str, price: f64, extra_hours: f64) -> Result<WorkOrder> {
        let order = self.build(address, price, extra_hours)?;
        let mut next = self.orders.clone();
        next.push(order.clone());
        self.commit(next)?;
        info!(work_number = order.work_number, total = order.total_price, "work order created");
        Ok(order)
    }

    pub fn set_status(&mut self, work_number: u32, status: WorkStatus) -> Result<WorkOrder> {
        let today = self.clock.today();
        let mut next = self.orders.clone();
        let order = next
            .iter_mut()
            .find(|o| o.work_number == work_number)
            .ok_or(TrackerError::NotFound(work_number))?;

        order.status = status;
        order.payment_date = (status == WorkStatus::Paid).then_some(today);
        let updated = order.clone();

        self.commit(next)?;
        info!(work_number, status = status.label(), "status changed");
        Ok(updated)
    }

    /// Removes the order if present. Absent numbers are a no-op and write nothing.
    pub fn delete(&mut self, work_number: u32) -> Result<Option<WorkOrder>> {
        let Some(index) = self.orders.iter().position(|o| o.work_number == work_number) else {
            debug!(work_number, "delete skipped, no such work order");
            return Ok(None);
        };
        let mut next = self.orders.clone();
        let removed = next.remove(index);
        self.commit(next)?;
        info!(work_number, "work order deleted");
        Ok(Some(removed))
    }

    /// Replaces an order with a brand-new one. The replacement gets a fresh
    /// number, today's date and `unpaid` status.
    pub fn edit(&mut self, work_number: u32, address: &str, price: f64, extra_hours: f64) -> Result<WorkOrder> {
        let index = self
            .orders
            .iter()
            .position(|o| o.work_number == work_number)
            .ok_or(TrackerError::NotFound(work_number))?;
        let replacement = self.build(address, price, extra_hours)?;

        let mut next = self.orders.clone();
        next.remove(index);
        next.push(replacement.clone());
        self.commit(next)?;
        info!(old = work_number, new = replacement.work_number, "work order replaced");
        Ok(replacement)
    }

    fn build(&self, address: &str, price: f64, extra_hours: f64) -> Result<WorkOrder> {
        let price = check_amount("price", price)?;
        let extra_hours = check_amount("extra hours", extra_hours)?;
        let work_number = match self.orders.iter().map(|o| o.work_number).max() {
            Some(max) => max.checked_add(1).ok_or(TrackerError::WorkNumbersExhausted(max))?,
            None => 1,
        };
        Ok(WorkOrder::new(work_number, self.clock.today(), address, price, extra_hours))
    }

    // The in-memory collection only changes once the blob write has succeeded.
    fn commit(&mut self, next: Vec<WorkOrder>) -> Result<()> {
        let blob = serde_json::to_string(&next)?;
        self.backend.write(WORK_DATA_KEY, &blob)?;
        self.orders = next;
        for listener in &mut self.listeners {
            listener(&self.orders);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::storage::{FileBlobStore, MemoryBlobStore};
    use crate::summary::summarize;
    use chrono::NaiveDate;
    use rstest::{fixture, rstest};
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
    }

    #[fixture]
    fn backend() -> MemoryBlobStore {
        MemoryBlobStore::new()
    }

    #[fixture]
    fn store(backend: MemoryBlobStore) -> RecordStore<MemoryBlobStore> {
        RecordStore::open(backend, FixedClock(day())).unwrap()
    }

    struct FailingBlobStore;

    impl BlobStore for FailingBlobStore {
        fn read(&self, _key: &str) -> io::Result<Option<String>> {
            Ok(None)
        }

        fn write(&self, _key: &str, _blob: &str) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }
    }

    #[rstest]
    fn create_computes_total_and_defaults_to_unpaid(mut store: RecordStore<MemoryBlobStore>) {
        let order = store.create("123 Main St", 100.0, 1.0).unwrap();

        assert_eq!(order.work_number, 1);
        assert_eq!(order.total_price, 140.0);
        assert_eq!(order.status, WorkStatus::Unpaid);
        assert_eq!(order.payment_date, None);
        assert_eq!(order.date, day());
    }

    #[rstest]
    fn work_numbers_increase_from_one(mut store: RecordStore<MemoryBlobStore>) {
        let numbers: Vec<u32> = (0..4).map(|i| store.create("x", i as f64, 0.0).unwrap().work_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[rstest]
    fn work_numbers_continue_from_the_stored_maximum(backend: MemoryBlobStore) {
        let blob = serde_json::to_string(&vec![
            WorkOrder::new(9, day(), "a", 1.0, 0.0),
            WorkOrder::new(4, day(), "b", 1.0, 0.0),
        ])
        .unwrap();
        backend.write(WORK_DATA_KEY, &blob).unwrap();

        let mut store = RecordStore::open(backend, FixedClock(day())).unwrap();
        assert_eq!(store.create("c", 1.0, 0.0).unwrap().work_number, 10);
    }

    #[rstest]
    fn paid_status_sets_payment_date(mut store: RecordStore<MemoryBlobStore>) {
        let order = store.create("123 Main St", 100.0, 1.0).unwrap();

        let paid = store.set_status(order.work_number, WorkStatus::Paid).unwrap();
        assert_eq!(paid.payment_date, Some(day()));

        let summary = summarize(store.load_all());
        assert_eq!(summary.paid_amount, 140.0);
        assert_eq!(summary.unpaid_amount, 0.0);
    }

    #[rstest]
    #[case(WorkStatus::Unpaid)]
    #[case(WorkStatus::Processing)]
    fn leaving_paid_clears_payment_date(mut store: RecordStore<MemoryBlobStore>, #[case] status: WorkStatus) {
        let n = store.create("5 Oak Ave", 50.0, 0.0).unwrap().work_number;
        store.set_status(n, WorkStatus::Paid).unwrap();

        let order = store.set_status(n, status).unwrap();
        assert_eq!(order.payment_date, None);
        assert!(store.load_all().iter().all(|o| o.is_paid() == o.payment_date.is_some()));
    }

    #[rstest]
    fn two_orders_one_paid(mut store: RecordStore<MemoryBlobStore>) {
        let first = store.create("123 Main St", 100.0, 1.0).unwrap();
        store.create("9 Elm St", 60.0, 0.0).unwrap();
        store.set_status(first.work_number, WorkStatus::Paid).unwrap();

        let summary = summarize(store.load_all());
        assert_eq!(summary.total_price, 200.0);
        assert_eq!(summary.paid_amount, 140.0);
        assert_eq!(summary.unpaid_amount, 60.0);
    }

    #[rstest]
    fn set_status_on_missing_order_is_not_found(mut store: RecordStore<MemoryBlobStore>) {
        let err = store.set_status(42, WorkStatus::Paid).unwrap_err();
        assert!(matches!(err, TrackerError::NotFound(42)));
    }

    #[rstest]
    fn deleted_order_is_gone_after_reload(backend: MemoryBlobStore) {
        let mut store = RecordStore::open(backend.clone(), FixedClock(day())).unwrap();
        store.create("a", 1.0, 0.0).unwrap();
        let doomed = store.create("b", 2.0, 0.0).unwrap();

        let removed = store.delete(doomed.work_number).unwrap();
        assert_eq!(removed, Some(doomed.clone()));

        let reopened = RecordStore::open(backend, FixedClock(day())).unwrap();
        assert!(reopened.load_all().iter().all(|o| o.work_number != doomed.work_number));
    }

    #[rstest]
    fn deleting_missing_order_is_a_noop(mut store: RecordStore<MemoryBlobStore>) {
        store.create("a", 1.0, 0.0).unwrap();
        assert_eq!(store.delete(99).unwrap(), None);
        assert_eq!(store.load_all().len(), 1);
    }

    #[rstest]
    fn persisted_collection_round_trips(backend: MemoryBlobStore) {
        let mut store = RecordStore::open(backend.clone(), FixedClock(day())).unwrap();
        store.create("a", 10.0, 0.5).unwrap();
        let b = store.create("b", 20.0, 0.0).unwrap();
        store.set_status(b.work_number, WorkStatus::Paid).unwrap();

        let reopened = RecordStore::open(backend, FixedClock(day())).unwrap();
        assert_eq!(reopened.load_all(), store.load_all());
    }

    #[rstest]
    fn file_backend_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = RecordStore::open(FileBlobStore::new(dir.path()), FixedClock(day())).unwrap();
        store.create("12 Pine", 75.25, 2.0).unwrap();

        let reopened = RecordStore::open(FileBlobStore::new(dir.path()), FixedClock(day())).unwrap();
        assert_eq!(reopened.load_all(), store.load_all());
        assert_eq!(reopened.load_all()[0].total_price, 155.25);
    }

    #[rstest]
    fn edit_replaces_with_a_fresh_record(mut store: RecordStore<MemoryBlobStore>) {
        let original = store.create("1 Old Rd", 100.0, 0.0).unwrap();
        store.create("2 Next Rd", 10.0, 0.0).unwrap();
        store.set_status(original.work_number, WorkStatus::Paid).unwrap();

        let edited = store.edit(original.work_number, "1 New Rd", 120.0, 1.0).unwrap();

        assert_eq!(edited.work_number, 3);
        assert_eq!(edited.status, WorkStatus::Unpaid);
        assert_eq!(edited.total_price, 160.0);
        assert!(store.get(original.work_number).is_none());
        assert_eq!(store.load_all().last(), Some(&edited));
    }

    #[rstest]
    fn edit_of_missing_order_is_not_found(mut store: RecordStore<MemoryBlobStore>) {
        assert!(matches!(store.edit(3, "x", 1.0, 0.0), Err(TrackerError::NotFound(3))));
    }

    #[rstest]
    #[case(f64::NAN, 0.0)]
    #[case(-1.0, 0.0)]
    #[case(10.0, f64::INFINITY)]
    fn create_rejects_bad_amounts(mut store: RecordStore<MemoryBlobStore>, #[case] price: f64, #[case] hours: f64) {
        let err = store.create("x", price, hours).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidAmount { .. }));
        assert!(store.load_all().is_empty());
    }

    #[rstest]
    #[case("abc")]
    #[case("NaN")]
    #[case("-1")]
    #[case("")]
    fn parse_amount_rejects_non_numbers(#[case] input: &str) {
        let err = parse_amount("price", input).unwrap_err();
        match err {
            TrackerError::InvalidAmount { field, value } => {
                assert_eq!(field, "price");
                assert_eq!(value, input);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[rstest]
    fn parse_amount_accepts_trimmed_decimals() {
        assert_eq!(parse_amount("extra hours", " 2.5 ").unwrap(), 2.5);
    }

    #[rstest]
    fn failed_write_leaves_memory_untouched() {
        let mut store = RecordStore::open(FailingBlobStore, FixedClock(day())).unwrap();
        assert!(matches!(store.create("x", 1.0, 0.0), Err(TrackerError::Storage(_))));
        assert!(store.load_all().is_empty());
    }

    #[rstest]
    fn duplicate_numbers_in_stored_data_are_rejected(backend: MemoryBlobStore) {
        let blob = serde_json::to_string(&vec![
            WorkOrder::new(2, day(), "a", 1.0, 0.0),
            WorkOrder::new(2, day(), "b", 1.0, 0.0),
        ])
        .unwrap();
        backend.write(WORK_DATA_KEY, &blob).unwrap();

        let result = RecordStore::open(backend, FixedClock(day()));
        assert!(matches!(result, Err(TrackerError::DuplicateWorkNumber(2))));
    }

    #[rstest]
    fn garbage_blob_is_corrupt(backend: MemoryBlobStore) {
        backend.write(WORK_DATA_KEY, "not json").unwrap();
        let result = RecordStore::open(backend, FixedClock(day()));
        assert!(matches!(result, Err(TrackerError::Corrupt(_))));
    }

    #[rstest]
    fn listeners_see_each_mutation(mut store: RecordStore<MemoryBlobStore>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        store.subscribe(move |orders| sink.borrow_mut().push(orders.len()));

        let n = store.create("a", 1.0, 0.0).unwrap().work_number;
        store.create("b", 1.0, 0.0).unwrap();
        store.set_status(n, WorkStatus::Processing).unwrap();
        store.delete(n).unwrap();
        store.delete(n).unwrap();

        assert_eq!(*seen.borrow(), vec![1, 2, 2, 1]);
    }

    #[rstest]
    fn create_after_the_last_work_number_is_refused(backend: MemoryBlobStore) {
        let blob = serde_json::to_string(&vec![WorkOrder::new(u32::MAX, day(), "a", 1.0, 0.0)]).unwrap();
        backend.write(WORK_DATA_KEY, &blob).unwrap();
        let mut store = RecordStore::open(backend, FixedClock(day())).unwrap();

        let err = store.create("b", 1.0, 0.0).unwrap_err();
        assert!(matches!(err, TrackerError::WorkNumbersExhausted(u32::MAX)));
        assert_eq!(store.load_all().len(), 1);
    }

    #[rstest]
    fn negative_zero_is_stored_as_zero(mut store: RecordStore<MemoryBlobStore>) {
        let price = parse_amount("price", "-0").unwrap();
        assert!(price.is_sign_positive());

        let order = store.create("x", -0.0, -0.0).unwrap();
        assert!(order.price.is_sign_positive());
        assert!(order.extra_hours.is_sign_positive());
    }
}
