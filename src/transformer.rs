use tracing::{info, warn};

use crate::models::{CleanedRecord, DestinationRecord, OwnerId};
use crate::reference::ReferenceMaps;

pub struct Transformed {
    pub records: Vec<DestinationRecord>,
    pub skipped: usize,
}

/// Resolve lookups and attach the owner. Rows whose category or type is null
/// or unknown are skipped, never an error. Input order is preserved.
pub fn transform(records: &[CleanedRecord], maps: &ReferenceMaps, owner: &OwnerId) -> Transformed {
    let mut out = Vec::with_capacity(records.len());
    let mut skipped = 0usize;

    for rec in records {
        let category_id = rec.category.as_deref().and_then(|c| maps.categories.get(c));
        let type_id = rec.kind.as_deref().and_then(|t| maps.types.get(t));
        let (Some(category_id), Some(type_id)) = (category_id, type_id) else {
            skipped += 1;
            continue;
        };
        out.push(DestinationRecord {
            owner_id: owner.to_string(),
            category_id: category_id.to_string(),
            type_id: type_id.to_string(),
            description: rec.description.clone(),
            amount: rec.amount,
            date: rec.date,
            note: rec.note.clone(),
        });
    }

    if skipped > 0 {
        warn!("skipped {skipped} rows due to invalid category/type");
    }
    info!(records = out.len(), "transformed expenses");
    Transformed { records: out, skipped }
}
