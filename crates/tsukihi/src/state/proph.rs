//! Prophylaxis state: per-OI line pointers, toxicity, resistance.

use serde::{Deserialize, Serialize};

use crate::types::{ProphToxKind, ProphType};

/// Prophylaxis state group. All vectors are parallel to the OI catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProphState {
    /// Patient may ever receive prophylaxis.
    pub may_receive: bool,
    pub non_compliant: bool,
    /// Number of prophs currently taken.
    pub total_on: u32,
    pub on_proph: Vec<bool>,
    /// Valid while `on_proph` holds.
    pub proph_type: Vec<ProphType>,
    pub proph_line: Vec<usize>,
    pub month_started: Vec<Option<u32>>,
    /// Next line pointer per OI, if one remains.
    pub next_line: Vec<Option<(ProphType, usize)>>,
    /// Worst toxicity accrued per OI.
    pub toxicity: Vec<ProphToxKind>,
    pub resistant: Vec<bool>,
    /// Lines ever taken, per OI and proph type.
    pub ever_taken: Vec<[bool; ProphType::COUNT]>,
}

impl ProphState {
    pub fn new(oi_count: usize) -> Self {
        Self {
            may_receive: true,
            non_compliant: false,
            total_on: 0,
            on_proph: vec![false; oi_count],
            proph_type: vec![ProphType::Primary; oi_count],
            proph_line: vec![0; oi_count],
            month_started: vec![None; oi_count],
            next_line: vec![Some((ProphType::Primary, 0)); oi_count],
            toxicity: vec![ProphToxKind::None; oi_count],
            resistant: vec![false; oi_count],
            ever_taken: vec![[false; ProphType::COUNT]; oi_count],
        }
    }

    /// Months on the current proph for an OI.
    pub fn months_on(&self, oi: usize, month: u32) -> u32 {
        match self.month_started[oi] {
            Some(start) if self.on_proph[oi] => month.saturating_sub(start),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_has_primary_next_lines() {
        let ps = ProphState::new(2);
        assert_eq!(ps.next_line[0], Some((ProphType::Primary, 0)));
        assert_eq!(ps.total_on, 0);
    }

    #[test]
    fn test_months_on_requires_active() {
        let mut ps = ProphState::new(1);
        ps.month_started[0] = Some(3);
        assert_eq!(ps.months_on(0, 10), 0);
        ps.on_proph[0] = true;
        assert_eq!(ps.months_on(0, 10), 7);
    }
}
