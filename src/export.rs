use std::io;
use tracing::info;

use crate::category::Category;
use crate::store::AggregateStore;

/// Writes one `value,date` line per occurrence of `category` across every
/// stored draw, oldest draw first. Returns the number of lines written.
pub fn export_category<W: io::Write>(
    store: &AggregateStore,
    category: Category,
    writer: W,
) -> Result<usize, csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    let mut rows = 0;
    for date in store.keys() {
        let Some(aggregate) = store.get(date) else {
            continue;
        };
        let date = date.format("%Y-%m-%d").to_string();
        for value in aggregate.values(category) {
            wtr.write_record([value, date.as_str()])?;
            rows += 1;
        }
    }
    wtr.flush()?;

    info!(action = "export", component = "csv_export", %category, rows, "Exported category values");
    Ok(rows)
}
