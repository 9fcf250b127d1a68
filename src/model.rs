//! Data model: student records, typed field paths, and job descriptions.
//!
//! The original administration system accessed student attributes as
//! free-form dynamic lookups; here every readable attribute is a variant of
//! [`Field`] and resolution goes through [`StudentRecord::resolve`], which
//! implements the one defined fallback chain:
//!
//! ```text
//! entity field  →  job-level override (validity dates only)  →  absent
//! ```
//!
//! Absent means the placing directive is skipped, never an error. Marksheet
//! figures (totals, grade, pass/fail) are derived values and live behind
//! [`ComputedField`] so the layout engine stays a pure interpreter of
//! template data.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// One student — the subject of one generated document.
///
/// Field names mirror the administration system's store schema (camelCase in
/// the roster JSON). Everything beyond the name is optional; which fields a
/// document actually needs is decided by its template, and a missing value
/// simply leaves that element off the page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentRecord {
    /// Store identifier. Used for failure reporting when no roll/GR number
    /// is present.
    pub id: String,
    pub full_name: String,
    /// Guardian (father) name — the secondary name printed under the
    /// student's own.
    pub father_name: String,
    /// Class / level the student is admitted for. Rendered in Roman
    /// numerals on cards.
    pub admission_for: String,
    pub roll_number: String,
    pub gr_number: String,
    #[serde(deserialize_with = "de_flexible_date")]
    pub dob: Option<NaiveDate>,
    #[serde(deserialize_with = "de_flexible_date")]
    pub issue_date: Option<NaiveDate>,
    #[serde(deserialize_with = "de_flexible_date")]
    pub expiry_date: Option<NaiveDate>,
    pub photo_url: Option<String>,
    pub phone_number: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub gender: Option<String>,
    pub nationality: Option<String>,
    pub cnic_or_bform: Option<String>,
    pub medical_condition: Option<String>,
    pub former_education: Option<String>,
    pub previous_institute: Option<String>,
    pub last_exam_percentage: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_contact: Option<String>,
    pub guardian_relation: Option<String>,
    /// Per-subject exam scores, present only for marksheet jobs.
    pub marks: Vec<SubjectMark>,
}

/// One subject's score on a marksheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubjectMark {
    pub subject: String,
    pub score: u32,
}

impl StudentRecord {
    /// Identifier used in failure reports and archive entry names:
    /// roll number, falling back to GR number, falling back to the store id.
    pub fn display_id(&self) -> &str {
        if !self.roll_number.is_empty() {
            &self.roll_number
        } else if !self.gr_number.is_empty() {
            &self.gr_number
        } else {
            &self.id
        }
    }

    /// Identifier archive entries are named after: roll number, falling
    /// back to GR number, falling back to a generic label.
    pub fn archive_stem(&self) -> &str {
        if !self.roll_number.is_empty() {
            &self.roll_number
        } else if !self.gr_number.is_empty() {
            &self.gr_number
        } else {
            "student"
        }
    }

    /// Resolve a field to its printable string, or `None` when absent.
    ///
    /// Validity-window dates fall back to the job-level override; a
    /// per-student value always wins. Dates come back in the fixed
    /// long-form pattern (day, full month name, four-digit year).
    pub fn resolve(&self, field: Field, params: &JobParams) -> Option<String> {
        use crate::pipeline::format::format_long_date;

        let non_empty = |s: &str| {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        };

        match field {
            Field::FullName => non_empty(&self.full_name),
            Field::FatherName => non_empty(&self.father_name),
            Field::AdmissionFor => non_empty(&self.admission_for),
            Field::RollNumber => non_empty(&self.roll_number),
            Field::GrNumber => non_empty(&self.gr_number),
            Field::Dob => self.dob.map(format_long_date),
            Field::IssueDate => self.issue_date.or(params.issue_date).map(format_long_date),
            Field::ExpiryDate => self.expiry_date.or(params.expiry_date).map(format_long_date),
            Field::PhoneNumber => non_empty(&self.phone_number),
            Field::Email => self.email.as_deref().and_then(non_empty),
            Field::Address => self.address.as_deref().and_then(non_empty),
            Field::Gender => self.gender.as_deref().and_then(non_empty),
            Field::Nationality => self.nationality.as_deref().and_then(non_empty),
            Field::CnicOrBform => self.cnic_or_bform.as_deref().and_then(non_empty),
            Field::MedicalCondition => self.medical_condition.as_deref().and_then(non_empty),
            Field::FormerEducation => self.former_education.as_deref().and_then(non_empty),
            Field::PreviousInstitute => self.previous_institute.as_deref().and_then(non_empty),
            Field::LastExamPercentage => {
                self.last_exam_percentage.as_deref().and_then(non_empty)
            }
            Field::GuardianName => self.guardian_name.as_deref().and_then(non_empty),
            Field::GuardianContact => self.guardian_contact.as_deref().and_then(non_empty),
            Field::GuardianRelation => self.guardian_relation.as_deref().and_then(non_empty),
        }
    }

    /// Resolve a derived marksheet value. Always produces a string; students
    /// without marks read as zero / `Fail`.
    pub fn resolve_computed(&self, field: ComputedField, params: &JobParams) -> String {
        let summary = ExamSummary::compute(&self.marks, params);
        match field {
            ComputedField::ExamTitle => params
                .exam_title
                .clone()
                .unwrap_or_else(|| "Exam".to_string()),
            ComputedField::MaxMarksPerSubject => params.max_marks_per_subject.to_string(),
            ComputedField::MinMarksPerSubject => params.min_marks_per_subject.to_string(),
            ComputedField::TotalMarks => {
                format!("{} / {}", summary.total, summary.total_max)
            }
            ComputedField::Percentage => format!("{}%", summary.percent),
            ComputedField::Grade => summary.grade.to_string(),
            ComputedField::Status => summary.status.to_string(),
            ComputedField::Remarks => summary.remarks.to_string(),
        }
    }
}

/// Every student attribute a template text directive may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    FullName,
    FatherName,
    AdmissionFor,
    RollNumber,
    GrNumber,
    Dob,
    IssueDate,
    ExpiryDate,
    PhoneNumber,
    Email,
    Address,
    Gender,
    Nationality,
    CnicOrBform,
    MedicalCondition,
    FormerEducation,
    PreviousInstitute,
    LastExamPercentage,
    GuardianName,
    GuardianContact,
    GuardianRelation,
}

/// Derived marksheet values computed from [`StudentRecord::marks`] and the
/// job's exam parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputedField {
    ExamTitle,
    MaxMarksPerSubject,
    MinMarksPerSubject,
    TotalMarks,
    Percentage,
    Grade,
    Status,
    Remarks,
}

/// Exam totals and classifications for one student.
#[derive(Debug, Clone, Copy)]
pub struct ExamSummary {
    pub total: u32,
    pub total_max: u32,
    pub percent: u32,
    pub grade: &'static str,
    pub status: &'static str,
    pub remarks: &'static str,
}

impl ExamSummary {
    /// Grade boundaries and remark thresholds follow the school's published
    /// scale: 85/75/65/50/40 for grades, 80/60/40 for remarks. Any subject
    /// under the per-subject minimum fails the student, as does an empty
    /// marks list.
    pub fn compute(marks: &[SubjectMark], params: &JobParams) -> Self {
        let total: u32 = marks.iter().map(|m| m.score).sum();
        let total_max = params.max_marks_per_subject * marks.len() as u32;
        let percent = if total_max > 0 {
            ((total as f64 / total_max as f64) * 100.0).round() as u32
        } else {
            0
        };
        let grade = match percent {
            p if p >= 85 => "A+",
            p if p >= 75 => "A",
            p if p >= 65 => "B",
            p if p >= 50 => "C",
            p if p >= 40 => "D",
            _ => "F",
        };
        let failed =
            marks.is_empty() || marks.iter().any(|m| m.score < params.min_marks_per_subject);
        let status = if failed { "Fail" } else { "Pass" };
        let remarks = match percent {
            p if p >= 80 => "Excellent",
            p if p >= 60 => "Good",
            p if p >= 40 => "Average",
            _ => "Poor",
        };
        Self {
            total,
            total_max,
            percent,
            grade,
            status,
            remarks,
        }
    }
}

/// Job-level parameters: overrides applied when a per-student field is
/// absent, plus the exam settings marksheets derive their figures from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobParams {
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    /// School name printed in marksheet and form headers.
    pub school: String,
    pub exam_title: Option<String>,
    pub max_marks_per_subject: u32,
    pub min_marks_per_subject: u32,
}

impl Default for JobParams {
    fn default() -> Self {
        Self {
            issue_date: None,
            expiry_date: None,
            school: "Al Ghazali High School".to_string(),
            exam_title: None,
            max_marks_per_subject: 100,
            min_marks_per_subject: 0,
        }
    }
}

/// Which document type a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    IdCard,
    AdmissionForm,
    Marksheet,
}

impl DocumentKind {
    /// Suffix appended to the sanitised student identifier in archive entry
    /// names: `<id>_<suffix>.pdf`.
    pub fn entry_suffix(self) -> &'static str {
        match self {
            DocumentKind::IdCard => "card",
            DocumentKind::AdmissionForm => "form",
            DocumentKind::Marksheet => "marksheet",
        }
    }

    /// Suggested download name for the finished archive.
    pub fn archive_name(self) -> &'static str {
        match self {
            DocumentKind::IdCard => "student_cards.zip",
            DocumentKind::AdmissionForm => "admission_forms.zip",
            DocumentKind::Marksheet => "marksheets.zip",
        }
    }
}

/// Which card side(s) to render. Ignored for single-sided document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardSide {
    Front,
    Back,
    #[default]
    Both,
}

/// One batch request: the ordered students to process, the document kind,
/// and job-level parameters. Lives only for the duration of the job.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub students: Vec<StudentRecord>,
    pub kind: DocumentKind,
    pub side: CardSide,
    pub params: JobParams,
    /// Explicit templates, overriding the built-in set for `kind`/`side`.
    pub templates: Option<Vec<crate::template::DocumentTemplate>>,
}

impl GenerationJob {
    pub fn new(students: Vec<StudentRecord>, kind: DocumentKind) -> Self {
        Self {
            students,
            kind,
            side: CardSide::Both,
            params: JobParams::default(),
            templates: None,
        }
    }

    pub fn with_side(mut self, side: CardSide) -> Self {
        self.side = side;
        self
    }

    pub fn with_params(mut self, params: JobParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_templates(mut self, templates: Vec<crate::template::DocumentTemplate>) -> Self {
        self.templates = Some(templates);
        self
    }
}

// ── Flexible date parsing ────────────────────────────────────────────────

/// Parse the date formats that occur in real roster exports.
///
/// Accepts ISO (`2018-11-02`, with or without a time suffix), `d/m/Y`,
/// `d-m-Y`, the month-first variants, and two-digit years (mapped to 2000+).
/// Anything unparseable is `None` — a bad date blanks one line on one
/// document, it does not fail the student.
pub fn parse_date_flexible(value: &str) -> Option<NaiveDate> {
    let s = value.trim();
    if s.is_empty() || matches!(s, "nan" | "NaT" | "None" | "null") {
        return None;
    }

    let iso = s.split('T').next().unwrap_or(s);
    if let Ok(d) = NaiveDate::parse_from_str(iso, "%Y-%m-%d") {
        return Some(d);
    }

    for sep in ['/', '-'] {
        let parts: Vec<&str> = s.split(sep).collect();
        if parts.len() != 3 {
            continue;
        }
        let (Ok(a), Ok(b), Ok(mut year)) = (
            parts[0].trim().parse::<u32>(),
            parts[1].trim().parse::<u32>(),
            parts[2].trim().parse::<i32>(),
        ) else {
            continue;
        };
        if year < 100 {
            year += 2000;
        }
        // Day-first, then month-first.
        if let Some(d) = NaiveDate::from_ymd_opt(year, b, a) {
            return Some(d);
        }
        if let Some(d) = NaiveDate::from_ymd_opt(year, a, b) {
            return Some(d);
        }
    }

    None
}

fn de_flexible_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_date_flexible))
}
