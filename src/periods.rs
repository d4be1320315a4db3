//! Period labelling and line-score normalisation.
//!
//! Raw period values arrive as strings in source order. They are labelled
//! `1st`..`4th`, then `OT`, `OT2`, `OT3`, … and summed best-effort to give a
//! fallback `Final` whenever the page did not carry an explicit total.

use serde::ser::{Serialize, SerializeMap, Serializer};

pub const QUARTER_LABELS: [&str; 4] = ["1st", "2nd", "3rd", "4th"];
pub const FINAL_LABEL: &str = "Final";

const OT_PREFIX: &str = "OT";
const UNPARSABLE_OT_RANK: u32 = 99;

pub fn period_label(index: usize) -> String {
    if let Some(label) = QUARTER_LABELS.get(index) {
        return (*label).to_string();
    }
    let ot_number = index - QUARTER_LABELS.len() + 1;
    if ot_number == 1 {
        OT_PREFIX.to_string()
    } else {
        format!("{OT_PREFIX}{ot_number}")
    }
}

/// Label every value and compute the summed total. Values that do not parse
/// as integers keep their slot but add nothing.
pub fn build_period_scores<S: AsRef<str>>(values: &[S]) -> (Vec<(String, String)>, String) {
    let mut periods = Vec::with_capacity(values.len());
    let mut total: i64 = 0;
    for (idx, raw) in values.iter().enumerate() {
        let value = raw.as_ref();
        if let Ok(points) = value.trim().parse::<i64>() {
            total += points;
        }
        periods.push((period_label(idx), value.to_string()));
    }
    (periods, total.to_string())
}

/// Display order: quarters in fixed order, then overtime periods numerically.
/// Labels that are neither (including `Final`) are left out.
pub fn ordered_period_keys<'a, I>(labels: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let labels: Vec<&str> = labels.into_iter().collect();
    let mut ordered: Vec<&str> = QUARTER_LABELS
        .iter()
        .filter_map(|q| labels.iter().copied().find(|l| l == q))
        .collect();

    let mut overtime: Vec<&str> = labels
        .iter()
        .copied()
        .filter(|l| l.starts_with(OT_PREFIX))
        .collect();
    overtime.sort_by_key(|l| ot_rank(l));
    ordered.extend(overtime);
    ordered
}

fn ot_rank(label: &str) -> u32 {
    let suffix = &label[OT_PREFIX.len()..];
    if suffix.is_empty() {
        return 1;
    }
    if suffix.chars().all(|c| c.is_ascii_digit()) {
        suffix.parse().unwrap_or(UNPARSABLE_OT_RANK)
    } else {
        UNPARSABLE_OT_RANK
    }
}

/// One team's line score: labelled periods in source order plus `Final`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamLine {
    periods: Vec<(String, String)>,
    final_score: Option<String>,
}

impl TeamLine {
    /// `None` when there are no period values at all. An explicit final wins
    /// over the computed sum as long as it is purely numeric.
    pub fn from_periods<S: AsRef<str>>(values: &[S], explicit_final: Option<&str>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let (periods, computed) = build_period_scores(values);
        let final_score = explicit_final
            .map(str::trim)
            .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string)
            .unwrap_or(computed);
        Some(Self {
            periods,
            final_score: Some(final_score),
        })
    }

    /// A team known only by its final score (meta-tag fallback).
    pub fn final_only(score: &str) -> Self {
        Self {
            periods: Vec::new(),
            final_score: Some(score.to_string()),
        }
    }

    pub fn periods(&self) -> &[(String, String)] {
        &self.periods
    }

    pub fn final_score(&self) -> Option<&str> {
        self.final_score.as_deref()
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        if label == FINAL_LABEL {
            return self.final_score();
        }
        self.periods
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn ordered_periods(&self) -> Vec<(&str, &str)> {
        ordered_period_keys(self.periods.iter().map(|(l, _)| l.as_str()))
            .into_iter()
            .filter_map(|label| self.get(label).map(|v| (label, v)))
            .collect()
    }
}

impl Serialize for TeamLine {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.periods.len() + usize::from(self.final_score.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (label, value) in &self.periods {
            map.serialize_entry(label, value)?;
        }
        if let Some(final_score) = &self.final_score {
            map.serialize_entry(FINAL_LABEL, final_score)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_quarters_then_overtime() {
        let labels: Vec<String> = (0..7).map(period_label).collect();
        assert_eq!(labels, ["1st", "2nd", "3rd", "4th", "OT", "OT2", "OT3"]);
    }

    #[test]
    fn four_numeric_periods_sum_to_final() {
        let (periods, total) = build_period_scores(&["7", "10", "0", "7"]);
        assert_eq!(periods.len(), 4);
        assert_eq!(total, "24");
    }

    #[test]
    fn non_numeric_periods_are_kept_but_not_counted() {
        let (periods, total) = build_period_scores(&["3", "-", "14", "x"]);
        assert_eq!(periods[1], ("2nd".to_string(), "-".to_string()));
        assert_eq!(periods[3], ("4th".to_string(), "x".to_string()));
        assert_eq!(total, "17");
    }

    #[test]
    fn display_order_puts_overtime_after_quarters() {
        let keys = ordered_period_keys(["4th", "1st", "OT2", "OT", "3rd"]);
        assert_eq!(keys, ["1st", "3rd", "4th", "OT", "OT2"]);
    }

    #[test]
    fn unparsable_overtime_sorts_last() {
        let keys = ordered_period_keys(["OTx", "OT3", "Final", "OT"]);
        assert_eq!(keys, ["OT", "OT3", "OTx"]);
    }

    #[test]
    fn explicit_final_beats_computed_sum() {
        let line = TeamLine::from_periods(&["7", "7"], Some("21")).expect("periods present");
        assert_eq!(line.final_score(), Some("21"));

        let line = TeamLine::from_periods(&["7", "7"], Some("n/a")).expect("periods present");
        assert_eq!(line.final_score(), Some("14"));
    }

    #[test]
    fn empty_periods_produce_no_line() {
        let empty: [&str; 0] = [];
        assert!(TeamLine::from_periods(&empty, Some("10")).is_none());
    }

    #[test]
    fn serializes_periods_in_order_then_final() {
        let line = TeamLine::from_periods(&["0", "3", "7", "0", "3"], None).expect("periods");
        let json = serde_json::to_string(&line).expect("serialize");
        assert_eq!(
            json,
            r#"{"1st":"0","2nd":"3","3rd":"7","4th":"0","OT":"3","Final":"13"}"#
        );
    }
}
