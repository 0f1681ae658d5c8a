use chrono::{Duration, NaiveDateTime, NaiveTime};

use crate::models::{Enrollment, Term};

/// Days before a term's first day from which it already counts as current.
pub const TERM_LEAD_DAYS: i64 = 2;

/// Course-number marker for the secondary study hall kept for IEP case managers.
pub const IEP_DUPLICATE_MARKER: &str = "IN";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeBand {
    Middle,
    High,
}

impl GradeBand {
    pub fn for_grade(grade_level: i64) -> Option<Self> {
        match grade_level {
            6..=8 => Some(Self::Middle),
            9..=12 => Some(Self::High),
            _ => None,
        }
    }

    /// Substring a course number must contain to count as this band's study hall.
    pub fn course_marker(self) -> &'static str {
        match self {
            Self::Middle => "SH",
            Self::High => "Commons",
        }
    }
}

pub fn term_is_current(term: &Term, now: NaiveDateTime) -> bool {
    let opens = term.first_day.and_time(NaiveTime::MIN) - Duration::days(TERM_LEAD_DAYS);
    let closes = term.last_day.and_time(NaiveTime::MIN) + Duration::days(1);
    opens < now && closes > now
}

/// First current term in the order given (descending DCID from the database).
pub fn resolve_term(terms: &[Term], now: NaiveDateTime) -> Option<&Term> {
    terms.iter().find(|term| term_is_current(term, now))
}

pub fn is_iep_duplicate(enrollment: &Enrollment) -> bool {
    enrollment.course_number.contains(IEP_DUPLICATE_MARKER)
}

/// Candidates that survive duplicate filtering. A lone candidate is never filtered.
pub fn legitimate_candidates(candidates: &[Enrollment]) -> Vec<&Enrollment> {
    if candidates.len() == 1 {
        return candidates.iter().collect();
    }
    candidates
        .iter()
        .filter(|enrollment| !is_iep_duplicate(enrollment))
        .collect()
}

/// Last legitimate candidate in course-number order.
pub fn select_enrollment(candidates: &[Enrollment]) -> Option<&Enrollment> {
    legitimate_candidates(candidates).into_iter().last()
}
