use chrono::NaiveDate;
use serde::Serialize;

/// `enroll_status` value for a currently enrolled student.
pub const ACTIVE_STATUS: i64 = 0;

#[derive(Debug, Clone)]
pub struct Student {
    pub student_number: i64,
    pub internal_id: i64,
    pub school_id: i64,
    pub enroll_status: i64,
    pub grade_level: i64,
}

impl Student {
    pub fn is_active(&self) -> bool {
        self.enroll_status == ACTIVE_STATUS
    }
}

#[derive(Debug, Clone)]
pub struct Term {
    pub id: i64,
    pub dcid: i64,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

/// One `cc` row: a student's seat in a course section for a term.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub school_id: i64,
    pub course_number: String,
    pub section_id: i64,
    pub section_number: String,
    pub expression: String,
    pub teacher_id: i64,
}

#[derive(Debug, Clone)]
pub struct SectionInfo {
    pub room: String,
    pub period: String,
}

#[derive(Debug, Clone)]
pub struct TeacherName {
    pub last_name: String,
    pub first_name: String,
}

impl TeacherName {
    /// `Last, F`
    pub fn short(&self) -> String {
        let initial: String = self.first_name.chars().take(1).collect();
        format!("{}, {}", self.last_name, initial)
    }
}

/// The resolved study hall for one student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub teacher: String,
    pub room: String,
    pub period: String,
}

impl Assignment {
    pub fn label(&self) -> String {
        format!("{} - {}", self.teacher, self.period)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportLine {
    pub student_number: i64,
    pub assignment: String,
}

impl ReportLine {
    pub fn blank(student_number: i64) -> Self {
        Self {
            student_number,
            assignment: String::new(),
        }
    }

    pub fn assigned(student_number: i64, assignment: &Assignment) -> Self {
        Self {
            student_number,
            assignment: assignment.label(),
        }
    }
}
