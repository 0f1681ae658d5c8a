use chrono::NaiveDateTime;

use crate::db::{SchoolData, StudentRowError};
use crate::models::{Assignment, Enrollment, ReportLine, Student};
use crate::schedule::{self, GradeBand};

const PROGRESS_EVERY: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("no schoolstaff row for teacher id {0}")]
    MissingStaff(i64),

    #[error("no users row for dcid {0}")]
    MissingUser(i64),

    #[error("no sections row for section id {0}")]
    MissingSection(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub assigned: usize,
    pub blank: usize,
    pub errors: usize,
}

/// Find the study hall for one student, or `None` when they have no current one.
pub async fn resolve_assignment<S: SchoolData>(
    source: &S,
    student: &Student,
    now: NaiveDateTime,
) -> Result<Option<Assignment>, LookupError> {
    if !student.is_active() {
        return Ok(None);
    }
    let Some(band) = GradeBand::for_grade(student.grade_level) else {
        return Ok(None);
    };

    let terms = source.terms_for_school(student.school_id).await?;
    let Some(term) = schedule::resolve_term(&terms, now) else {
        tracing::debug!(
            student = student.student_number,
            school = student.school_id,
            "no current term"
        );
        return Ok(None);
    };
    tracing::debug!(
        student = student.student_number,
        term_id = term.id,
        term_dcid = term.dcid,
        "found good term"
    );

    let candidates = source
        .enrollments_matching(student.internal_id, term.id, band.course_marker())
        .await?;
    let Some(chosen) = choose(student, &candidates) else {
        return Ok(None);
    };

    let assignment = join_details(source, chosen).await?;
    tracing::debug!(
        student = student.student_number,
        teacher = %assignment.teacher,
        room = %assignment.room,
        period = %assignment.period,
        "study hall resolved"
    );
    Ok(Some(assignment))
}

fn choose<'a>(student: &Student, candidates: &'a [Enrollment]) -> Option<&'a Enrollment> {
    if candidates.len() > 1 {
        tracing::debug!(
            student = student.student_number,
            count = candidates.len(),
            "student has more than one study hall listed, finding correct one"
        );
    }

    let legitimate = schedule::legitimate_candidates(candidates);
    for enrollment in &legitimate {
        tracing::debug!(
            student = student.student_number,
            school = enrollment.school_id,
            course = %enrollment.course_number,
            section_id = enrollment.section_id,
            section_number = %enrollment.section_number,
            expression = %enrollment.expression,
            teacher_id = enrollment.teacher_id,
            "candidate"
        );
    }
    if legitimate.len() > 1 {
        let courses: Vec<&str> = legitimate.iter().map(|e| e.course_number.as_str()).collect();
        tracing::warn!(
            student = student.student_number,
            ?courses,
            "more than one non-duplicate study hall; keeping the last"
        );
    }
    if legitimate.is_empty() && !candidates.is_empty() {
        tracing::debug!(
            student = student.student_number,
            "every study hall listed is an IEP duplicate"
        );
    }

    schedule::select_enrollment(candidates)
}

async fn join_details<S: SchoolData>(
    source: &S,
    enrollment: &Enrollment,
) -> Result<Assignment, LookupError> {
    let users_dcid = source
        .staff_user_dcid(enrollment.teacher_id)
        .await?
        .ok_or(LookupError::MissingStaff(enrollment.teacher_id))?;
    let teacher = source
        .teacher_name(users_dcid)
        .await?
        .ok_or(LookupError::MissingUser(users_dcid))?;
    let section = source
        .section(enrollment.section_id)
        .await?
        .ok_or(LookupError::MissingSection(enrollment.section_id))?;

    Ok(Assignment {
        teacher: teacher.short(),
        room: section.room,
        period: section.period,
    })
}

/// One report line per student row, in the order given. Failures are confined to the
/// student they occur on and yield a blank line.
pub async fn build_lines<S: SchoolData>(
    source: &S,
    students: &[Result<Student, StudentRowError>],
    now: NaiveDateTime,
) -> (Vec<ReportLine>, RunSummary) {
    let mut lines = Vec::with_capacity(students.len());
    let mut summary = RunSummary::default();

    for (count, row) in students.iter().enumerate() {
        if count > 0 && count % PROGRESS_EVERY == 0 {
            tracing::info!(count, total = students.len(), "processing students");
        }
        summary.processed += 1;

        let student = match row {
            Ok(student) => student,
            Err(err) => {
                summary.errors += 1;
                tracing::warn!(error = %err, "error on students row");
                if let Some(number) = err.student_number {
                    summary.blank += 1;
                    lines.push(ReportLine::blank(number));
                }
                continue;
            }
        };

        let line = match resolve_assignment(source, student, now).await {
            Ok(Some(assignment)) => {
                summary.assigned += 1;
                ReportLine::assigned(student.student_number, &assignment)
            }
            Ok(None) => {
                summary.blank += 1;
                ReportLine::blank(student.student_number)
            }
            Err(err) => {
                summary.errors += 1;
                summary.blank += 1;
                tracing::warn!(
                    student = student.student_number,
                    error = %err,
                    "error getting courses"
                );
                ReportLine::blank(student.student_number)
            }
        };
        lines.push(line);
    }

    (lines, summary)
}
