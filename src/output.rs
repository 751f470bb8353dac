use crate::error::{ResultsError, ResultsResult};
use crate::models::{LeaderPartyLabel, SeatCountRow, WideDistrictRow, WideTable};
use csv::Writer;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const LEADER_COLUMNS: [&str; 8] = [
    "Electoral District Code",
    "Electoral District Name",
    "leadingParty",
    "leadingCandidate",
    "popVote",
    "FinalTotals",
    "Initial Count Status",
    "colorCategory",
];

fn format_pct(value: f64) -> String {
    value.to_string()
}

fn map_record(row: &WideDistrictRow, party_columns: &[String], label: LeaderPartyLabel) -> Vec<String> {
    let leader = &row.leader;
    let mut record = vec![
        leader.district_code.clone(),
        leader.district_name.clone(),
        leader.leading_party(label).unwrap_or_default().to_string(),
        leader.leading_candidate.clone().unwrap_or_default(),
        leader.leading_vote_pct.map(format_pct).unwrap_or_default(),
        leader.final_totals.clone(),
        leader.status.clone(),
        leader.color_category.clone().unwrap_or_default(),
    ];
    record.extend(
        party_columns
            .iter()
            .map(|party| row.party_votes.get(party).copied().map(format_pct).unwrap_or_default()),
    );
    record
}

/// Write to a sibling temp file and rename it over `path`, so a failed write
/// leaves any previous output untouched.
fn write_atomic<F>(path: &Path, fill: F) -> ResultsResult<()>
where
    F: FnOnce(&mut Writer<File>) -> csv::Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path: PathBuf = path.with_file_name(tmp_name);

    let written = Writer::from_path(&tmp_path).and_then(|mut writer| {
        fill(&mut writer)?;
        writer.flush()?;
        Ok(())
    });

    if let Err(source) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(ResultsError::Write {
            path: path.to_path_buf(),
            source,
        });
    }

    if let Err(source) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(ResultsError::Persist {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

/// District-level table used by the map (and by the region subsets).
pub fn write_map(path: &Path, table: &WideTable, label: LeaderPartyLabel) -> ResultsResult<()> {
    write_atomic(path, |writer| {
        let mut header: Vec<&str> = LEADER_COLUMNS.to_vec();
        header.extend(table.party_columns.iter().map(String::as_str));
        writer.write_record(&header)?;

        for row in &table.rows {
            writer.write_record(map_record(row, &table.party_columns, label))?;
        }
        Ok(())
    })
}

pub fn write_seats(path: &Path, seats: &SeatCountRow) -> ResultsResult<()> {
    write_atomic(path, |writer| {
        let mut header = vec!["region"];
        header.extend(seats.counts.iter().map(|(category, _)| category.as_str()));
        writer.write_record(&header)?;

        let mut record = vec![seats.region.clone()];
        record.extend(seats.counts.iter().map(|(_, n)| n.to_string()));
        writer.write_record(&record)?;
        Ok(())
    })
}
