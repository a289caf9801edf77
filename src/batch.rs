use std::time::Duration;

use tracing::{info, warn};

use crate::destination::{Destination, Row};
use crate::error::Result;
use crate::models::{BatchError, DestinationRecord};

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, Default)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub batches: usize,
    pub inserted: usize,
    pub errors: Vec<BatchError>,
}

fn write_with_retry<D: Destination + ?Sized>(
    dest: &mut D,
    table: &str,
    rows: &[Row],
    index: usize,
    retry: RetryPolicy,
) -> Result<usize> {
    let mut attempt = 0u32;
    loop {
        match dest.write_batch(table, rows) {
            Ok(n) => return Ok(n),
            Err(e) if attempt < retry.retries => {
                attempt += 1;
                warn!(batch = index, attempt, "batch write failed, retrying: {e}");
                if !retry.delay.is_zero() {
                    std::thread::sleep(retry.delay);
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Write `records` in contiguous batches of `batch_size`.
///
/// A failed batch is recorded and the loop moves on, so one failure costs at
/// most one batch of rows.
pub fn load_batches<D: Destination + ?Sized>(
    dest: &mut D,
    table: &str,
    owner_column: &str,
    records: &[DestinationRecord],
    batch_size: usize,
    retry: RetryPolicy,
) -> BatchOutcome {
    let batch_size = batch_size.max(1);
    let total = records.len();
    let mut outcome = BatchOutcome::default();

    for (index, chunk) in records.chunks(batch_size).enumerate() {
        outcome.batches += 1;
        let rows: Vec<Row> = chunk.iter().map(|r| r.to_row(owner_column)).collect();
        match write_with_retry(dest, table, &rows, index, retry) {
            Ok(n) => {
                outcome.inserted += n;
                let done = index * batch_size + chunk.len();
                info!(batch = index + 1, "migrated {done}/{total} ({:.0}%)", done as f64 / total as f64 * 100.0);
            }
            Err(e) => {
                warn!(batch = index + 1, "batch failed: {e}");
                outcome.errors.push(BatchError {
                    batch_index: index,
                    message: e.to_string(),
                });
            }
        }
    }
    outcome
}
