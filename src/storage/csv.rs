use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use tracing::info;

use crate::config::Config;
use crate::crawler::models::NormalizedRecord;

/// UTF-8 signature expected by spreadsheet tools opening the artifact.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Persists the harvested rows as `<source>_<deal_type>_<YYYYMMDD>.csv`
/// under the configured output directory. An empty harvest writes nothing
/// and reports `None`.
pub fn write_dataset(
    cfg: &Config,
    records: &[NormalizedRecord],
) -> anyhow::Result<Option<PathBuf>> {
    if records.is_empty() {
        info!("No records harvested, skipping dataset write");
        return Ok(None);
    }

    let filename = format!(
        "{}_{}_{}.csv",
        cfg.source_tag,
        cfg.deal_type,
        Local::now().format("%Y%m%d")
    );
    let path = Path::new(&cfg.output_dir).join(filename);

    write_records(&path, records)?;
    info!(count = records.len(), path = %path.display(), "Dataset written");

    Ok(Some(path))
}

/// Writes the BOM, the header row and one row per record to `path`.
/// Column order is the `NormalizedRecord` field order.
pub fn write_records(path: &Path, records: &[NormalizedRecord]) -> anyhow::Result<()> {
    let mut file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}
