use anyhow::Context;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::config::DatabaseSettings;
use crate::models::{Enrollment, SectionInfo, Student, TeacherName, Term};

/// Read access to the scheduling tables needed to place one student.
pub trait SchoolData {
    async fn terms_for_school(&self, school_id: i64) -> Result<Vec<Term>, sqlx::Error>;

    /// `cc` rows whose course number contains `marker`, ordered by course number.
    async fn enrollments_matching(
        &self,
        student_id: i64,
        term_id: i64,
        marker: &str,
    ) -> Result<Vec<Enrollment>, sqlx::Error>;

    async fn staff_user_dcid(&self, teacher_id: i64) -> Result<Option<i64>, sqlx::Error>;

    async fn teacher_name(&self, users_dcid: i64) -> Result<Option<TeacherName>, sqlx::Error>;

    async fn section(&self, section_id: i64) -> Result<Option<SectionInfo>, sqlx::Error>;
}

#[derive(Debug, thiserror::Error)]
#[error("unreadable students row (student_number {student_number:?}): {source}")]
pub struct StudentRowError {
    pub student_number: Option<i64>,
    #[source]
    pub source: sqlx::Error,
}

pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<PgPool> {
    let options: PgConnectOptions = settings
        .url()
        .parse()
        .context("POWERSCHOOL_PROD_DB is not a valid connection string")?;
    let options = options
        .username(&settings.user)
        .password(&settings.password);

    PgPoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to {}", settings.connection))
}

pub async fn server_version(pool: &PgPool) -> anyhow::Result<String> {
    let version: String = sqlx::query_scalar("SELECT version()")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

/// Every student, highest student number first. Rows that fail to decode are kept
/// as errors so the caller can still account for them.
pub async fn fetch_students(
    pool: &PgPool,
) -> anyhow::Result<Vec<Result<Student, StudentRowError>>> {
    let rows = sqlx::query(
        r#"
        SELECT student_number::bigint AS student_number,
               id::bigint AS id,
               schoolid::bigint AS schoolid,
               enroll_status::bigint AS enroll_status,
               grade_level::bigint AS grade_level
        FROM students
        ORDER BY student_number DESC
        "#,
    )
    .fetch_all(pool)
    .await
    .context("failed to list students")?;

    Ok(rows.iter().map(decode_student).collect())
}

fn decode_student(row: &PgRow) -> Result<Student, StudentRowError> {
    read_student(row).map_err(|source| StudentRowError {
        student_number: row.try_get::<i64, _>("student_number").ok(),
        source,
    })
}

fn read_student(row: &PgRow) -> Result<Student, sqlx::Error> {
    Ok(Student {
        student_number: row.try_get("student_number")?,
        internal_id: row.try_get("id")?,
        school_id: row.try_get("schoolid")?,
        enroll_status: row.try_get("enroll_status")?,
        grade_level: row.try_get("grade_level")?,
    })
}

pub struct PgSchoolData<'a> {
    pool: &'a PgPool,
}

impl<'a> PgSchoolData<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

impl SchoolData for PgSchoolData<'_> {
    async fn terms_for_school(&self, school_id: i64) -> Result<Vec<Term>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id::bigint AS id,
                   dcid::bigint AS dcid,
                   firstday::date AS firstday,
                   lastday::date AS lastday
            FROM terms
            WHERE schoolid = $1
            ORDER BY dcid DESC
            "#,
        )
        .bind(school_id)
        .fetch_all(self.pool)
        .await?;

        let mut terms = Vec::with_capacity(rows.len());
        for row in rows {
            terms.push(Term {
                id: row.try_get("id")?,
                dcid: row.try_get("dcid")?,
                first_day: row.try_get("firstday")?,
                last_day: row.try_get("lastday")?,
            });
        }
        Ok(terms)
    }

    async fn enrollments_matching(
        &self,
        student_id: i64,
        term_id: i64,
        marker: &str,
    ) -> Result<Vec<Enrollment>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT schoolid::bigint AS schoolid,
                   course_number::text AS course_number,
                   sectionid::bigint AS sectionid,
                   section_number::text AS section_number,
                   expression::text AS expression,
                   teacherid::bigint AS teacherid
            FROM cc
            WHERE strpos(course_number, $1) > 0
              AND studentid = $2
              AND termid = $3
            ORDER BY course_number
            "#,
        )
        .bind(marker)
        .bind(student_id)
        .bind(term_id)
        .fetch_all(self.pool)
        .await?;

        let mut enrollments = Vec::with_capacity(rows.len());
        for row in rows {
            enrollments.push(Enrollment {
                school_id: row.try_get("schoolid")?,
                course_number: row.try_get("course_number")?,
                section_id: row.try_get("sectionid")?,
                section_number: text_or_empty(&row, "section_number")?,
                expression: text_or_empty(&row, "expression")?,
                teacher_id: row.try_get("teacherid")?,
            });
        }
        Ok(enrollments)
    }

    async fn staff_user_dcid(&self, teacher_id: i64) -> Result<Option<i64>, sqlx::Error> {
        let row = sqlx::query("SELECT users_dcid::bigint AS users_dcid FROM schoolstaff WHERE id = $1")
            .bind(teacher_id)
            .fetch_optional(self.pool)
            .await?;

        match row {
            Some(row) => row.try_get::<Option<i64>, _>("users_dcid"),
            None => Ok(None),
        }
    }

    async fn teacher_name(&self, users_dcid: i64) -> Result<Option<TeacherName>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT last_name::text AS last_name, first_name::text AS first_name FROM users WHERE dcid = $1",
        )
        .bind(users_dcid)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(TeacherName {
            last_name: text_or_empty(&row, "last_name")?,
            first_name: text_or_empty(&row, "first_name")?,
        }))
    }

    async fn section(&self, section_id: i64) -> Result<Option<SectionInfo>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT room::text AS room, expression::text AS expression FROM sections WHERE id = $1",
        )
        .bind(section_id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(SectionInfo {
            room: text_or_empty(&row, "room")?,
            period: text_or_empty(&row, "expression")?,
        }))
    }
}

fn text_or_empty(row: &PgRow, column: &str) -> Result<String, sqlx::Error> {
    Ok(row
        .try_get::<Option<String>, _>(column)?
        .unwrap_or_default())
}
