use crate::models::{
    normalize_row, CandidateRow, Config, DistrictLeader, NormalizedRow, SeatCountRow, SeatKey,
    WideDistrictRow, WideTable,
};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

/// Everything one run produces, ready to be written out.
#[derive(Debug, Clone)]
pub struct ResultsAnalysis {
    pub leaders: Vec<DistrictLeader>,
    pub map: WideTable,
    pub seats: SeatCountRow,
    /// (region name, output path, filtered map rows)
    pub regions: Vec<(String, String, WideTable)>,
}

/// Rows of one district share these values within a single feed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DistrictKey<'r> {
    code: &'r str,
    name: &'r str,
    final_totals: &'r str,
    status: &'r str,
}

impl<'r> DistrictKey<'r> {
    fn of(row: &'r CandidateRow) -> Self {
        Self {
            code: &row.district_code,
            name: &row.district_name,
            final_totals: &row.final_totals,
            status: &row.initial_count_status,
        }
    }
}

pub struct ResultsAnalyzer<'a> {
    pub config: &'a Config,
}

impl<'a> ResultsAnalyzer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Run the whole transform over the parsed feed.
    pub fn analyze(&self, rows: &[CandidateRow]) -> ResultsAnalysis {
        let normalized = self.normalize_all(rows);
        let leaders = self.resolve_leaders(&normalized);
        let map = self.build_wide_table(&leaders, &normalized);
        let seats = self.aggregate_seats(&leaders);

        let regions = self
            .config
            .regions
            .iter()
            .map(|region| {
                let allowed: HashSet<String> = region.districts.iter().cloned().collect();
                (region.name.clone(), region.output.clone(), map.filtered(&allowed))
            })
            .collect();

        ResultsAnalysis {
            leaders,
            map,
            seats,
            regions,
        }
    }

    pub fn normalize_all(&self, rows: &[CandidateRow]) -> Vec<NormalizedRow> {
        rows.iter()
            .map(|row| {
                let normalized = normalize_row(row, &self.config.party_table);
                if normalized.vote_pct.is_nan() {
                    warn!(
                        "Unparsable popular vote '{}' for {} in {}; excluded from leader selection",
                        row.popular_vote_percentage, row.candidate_name, row.district_code
                    );
                }
                normalized
            })
            .collect()
    }

    /// One leader per district key, in the order districts first appear in the feed.
    ///
    /// The maximum is computed first and the leader is then the first row whose
    /// percentage equals it exactly, so ties go to the earlier row. NaN rows never
    /// win; a district with no parsable percentage gets empty leader fields.
    pub fn resolve_leaders(&self, rows: &[NormalizedRow]) -> Vec<DistrictLeader> {
        let mut index: HashMap<DistrictKey, usize> = HashMap::new();
        let mut groups: Vec<(DistrictKey, Vec<&NormalizedRow>)> = Vec::new();

        for row in rows {
            let key = DistrictKey::of(&row.candidate);
            let slot = *index.entry(key.clone()).or_insert_with(|| {
                groups.push((key, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(row);
        }

        groups
            .into_iter()
            .map(|(key, members)| {
                let max_vote = members
                    .iter()
                    .map(|r| r.vote_pct)
                    .filter(|v| !v.is_nan())
                    .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))));

                let leader = max_vote.and_then(|max| members.iter().find(|r| r.vote_pct == max));

                let leading_affiliation = leader.map(|r| r.candidate.affiliation.clone());
                let party = leading_affiliation
                    .as_deref()
                    .map(|a| self.config.party_table.canonicalize(a));
                let color_category = party
                    .as_deref()
                    .map(|p| self.config.colors.category(p, key.status));

                debug!(
                    "{} {}: leader {:?} ({:?}) at {:?}",
                    key.code,
                    key.name,
                    leader.map(|r| r.candidate.candidate_name.as_str()),
                    party,
                    max_vote
                );

                DistrictLeader {
                    district_code: key.code.to_string(),
                    district_name: key.name.to_string(),
                    leading_affiliation,
                    party,
                    leading_candidate: leader.map(|r| r.candidate.candidate_name.clone()),
                    leading_vote_pct: leader.map(|r| r.vote_pct),
                    final_totals: key.final_totals.to_string(),
                    status: key.status.to_string(),
                    color_category,
                }
            })
            .collect()
    }

    /// Pivot each district's candidates into party columns and join them onto the leaders.
    ///
    /// Configured canonical parties are always present, with 0 standing in for a missing
    /// or NaN value. Any other party seen in the feed becomes an extra column that is only
    /// filled where the party actually ran.
    pub fn build_wide_table(
        &self,
        leaders: &[DistrictLeader],
        candidates: &[NormalizedRow],
    ) -> WideTable {
        let canonical = &self.config.canonical_parties;

        let mut by_district: HashMap<&str, Vec<&NormalizedRow>> = HashMap::new();
        let mut extra_columns: Vec<String> = Vec::new();
        for row in candidates {
            by_district
                .entry(row.candidate.district_code.as_str())
                .or_default()
                .push(row);
            if !canonical.contains(&row.party) && !extra_columns.contains(&row.party) {
                extra_columns.push(row.party.clone());
            }
        }

        let rows = leaders
            .iter()
            .map(|leader| {
                let mut party_votes: HashMap<String, f64> = HashMap::new();
                if let Some(members) = by_district.get(leader.district_code.as_str()) {
                    // Duplicate parties within a district: last one wins.
                    for member in members {
                        party_votes.insert(member.party.clone(), member.vote_pct);
                    }
                }
                for party in canonical {
                    let value = party_votes.entry(party.clone()).or_insert(0.0);
                    if value.is_nan() {
                        *value = 0.0;
                    }
                }
                WideDistrictRow {
                    leader: leader.clone(),
                    party_votes,
                }
            })
            .collect();

        let mut party_columns = canonical.clone();
        party_columns.extend(extra_columns);
        WideTable {
            party_columns,
            rows,
        }
    }

    /// Count districts per party (or color category). Categories with no districts
    /// get no column, and leaders without a resolvable party are not counted.
    pub fn aggregate_seats(&self, leaders: &[DistrictLeader]) -> SeatCountRow {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for leader in leaders {
            let category = match self.config.seat_key {
                SeatKey::Party => leader.party.as_deref(),
                SeatKey::ColorCategory => leader.color_category.as_deref(),
            };
            let Some(category) = category else {
                warn!(
                    "{} {} has no resolvable leader; not counted in seats",
                    leader.district_code, leader.district_name
                );
                continue;
            };
            match counts.iter_mut().find(|(name, _)| name == category) {
                Some((_, n)) => *n += 1,
                None => counts.push((category.to_string(), 1)),
            }
        }

        SeatCountRow {
            region: self.config.region_label.clone(),
            counts,
        }
    }
}

/// Keep the rows whose district code is in `allowed`, preserving order.
pub fn filter_by_district_set(
    rows: &[WideDistrictRow],
    allowed: &HashSet<String>,
) -> Vec<WideDistrictRow> {
    rows.iter()
        .filter(|row| allowed.contains(&row.leader.district_code))
        .cloned()
        .collect()
}

impl WideTable {
    pub fn filtered(&self, allowed: &HashSet<String>) -> WideTable {
        WideTable {
            party_columns: self.party_columns.clone(),
            rows: filter_by_district_set(&self.rows, allowed),
        }
    }
}
