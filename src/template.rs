//! Document templates: page geometry plus an ordered list of placement
//! directives.
//!
//! A template is pure data — serde-deserialisable, loaded once per job,
//! never mutated, shareable across any number of concurrent tasks. The
//! layout engine interprets directives in order; nothing about a specific
//! document type lives in the engine itself. Coordinates are points from the
//! page's **top-left** corner (text anchors on the baseline, images on their
//! top-left corner), so templates stay portable across renderer
//! implementations regardless of the output format's native origin.
//!
//! [`builtin`] holds the coordinate tables for the three shipped document
//! types, transcribed from the school's print layouts.

use crate::model::{ComputedField, Field};
use serde::{Deserialize, Serialize};

/// An opaque 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Card ink blue (`#231f55`).
pub const INK: Color = Color::rgb(35, 31, 85);
pub const WHITE: Color = Color::rgb(255, 255, 255);
pub const BLACK: Color = Color::rgb(0, 0, 0);
/// Marksheet/form header maroon.
pub const MAROON: Color = Color::rgb(83, 36, 42);
/// Section band amber.
pub const AMBER: Color = Color::rgb(255, 202, 124);
const LABEL_GRAY: Color = Color::rgb(70, 70, 70);
const FOOTER_GRAY: Color = Color::rgb(120, 120, 120);

/// Which built-in Helvetica face a text directive uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontStyle {
    #[default]
    Regular,
    Bold,
    Oblique,
}

/// Horizontal anchoring of a text run at its x coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    #[default]
    Start,
    Center,
}

/// Where a text directive's content comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    /// A student field, resolved through the entity → job-override chain.
    Field(Field),
    /// A derived marksheet value.
    Computed(ComputedField),
    /// Fixed template text.
    Literal(String),
}

/// Content transform applied after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextTransform {
    #[default]
    None,
    Uppercase,
    /// Integer → Roman numerals (class/level display).
    Roman,
}

/// One placed text run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDirective {
    pub source: ContentSource,
    #[serde(default)]
    pub transform: TextTransform,
    /// Fixed text prepended after the transform (e.g. `LEVEL-`).
    #[serde(default)]
    pub prefix: Option<String>,
    pub x: f32,
    /// Baseline, points from the top edge.
    pub y: f32,
    #[serde(default)]
    pub align: Align,
    pub size: f32,
    #[serde(default)]
    pub style: FontStyle,
    pub color: Color,
}

/// Where an image directive's pixels come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    /// The student's photo, fetched from their photo URL.
    Photo,
    /// A barcode/QR render of labeled student fields joined by newlines.
    Barcode { lines: Vec<BarcodeLine> },
    /// A static raster shipped with the template (e.g. watermark logo),
    /// resolved against the configured asset directory.
    Asset { path: String },
}

/// One `Label: value` line of a barcode payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarcodeLine {
    pub label: String,
    pub field: Field,
}

/// How an image is scaled into its declared box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFit {
    /// Stretch to the exact box (backgrounds, barcodes).
    #[default]
    Stretch,
    /// Preserve aspect ratio, fill the box, crop overflow (watermarks).
    Cover,
}

/// One placed image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageDirective {
    pub source: ImageSource,
    /// Top-left corner, points from the page's top-left.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Pipe the pixels through the circular-crop compositor first.
    #[serde(default)]
    pub circular: bool,
    /// Strip the near-white backing plate before placement.
    #[serde(default)]
    pub chroma_key: bool,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub fit: ImageFit,
}

fn default_opacity() -> f32 {
    1.0
}

/// A filled and/or stroked rectangle (header bands, photo frames,
/// signature rules).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectDirective {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub fill: Option<Color>,
    #[serde(default)]
    pub stroke: Option<Color>,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f32,
}

fn default_stroke_width() -> f32 {
    1.0
}

/// The subject/marks table on a marksheet, expanded per student at render
/// time. Rows beyond `max_rows` are dropped (and logged) rather than
/// overflowing into the signature block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarksTableDirective {
    /// Subject column anchor.
    pub x: f32,
    /// Marks column anchor.
    pub marks_x: f32,
    /// Baseline of the first row.
    pub y: f32,
    pub row_height: f32,
    pub max_rows: usize,
    pub size: f32,
    pub color: Color,
}

/// One placed element within a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlacementDirective {
    Text(TextDirective),
    Image(ImageDirective),
    Rect(RectDirective),
    MarksTable(MarksTableDirective),
}

/// A full page description: size, optional background raster, and the
/// ordered directives laid over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTemplate {
    pub name: String,
    /// Page width in points.
    pub width: f32,
    /// Page height in points.
    pub height: f32,
    /// Background raster file name, resolved against the asset directory.
    #[serde(default)]
    pub background: Option<String>,
    pub directives: Vec<PlacementDirective>,
}

impl DocumentTemplate {
    /// Parse a template from its JSON representation.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ── Built-in coordinate tables ───────────────────────────────────────────

/// The shipped templates: ID card front/back (189 × 321 pt), A4 marksheet,
/// and A4 admission form. Coordinates are transcribed from the school's
/// print layouts; y values are measured from the top edge.
pub mod builtin {
    use super::*;

    const CARD_W: f32 = 189.0;
    const CARD_H: f32 = 321.0;
    const A4_W: f32 = 595.28;
    const A4_H: f32 = 841.89;
    const MARGIN: f32 = 50.0;
    const CONTENT_W: f32 = A4_W - MARGIN * 2.0;

    fn text(
        source: ContentSource,
        x: f32,
        y: f32,
        size: f32,
        style: FontStyle,
        color: Color,
    ) -> TextDirective {
        TextDirective {
            source,
            transform: TextTransform::None,
            prefix: None,
            x,
            y,
            align: Align::Start,
            size,
            style,
            color,
        }
    }

    fn centered(mut d: TextDirective) -> TextDirective {
        d.align = Align::Center;
        d
    }

    fn label_value(
        label: &str,
        field: Field,
        label_x: f32,
        value_x: f32,
        y: f32,
    ) -> [PlacementDirective; 2] {
        [
            PlacementDirective::Text(text(
                ContentSource::Literal(format!("{label}:")),
                label_x,
                y,
                10.0,
                FontStyle::Bold,
                LABEL_GRAY,
            )),
            PlacementDirective::Text(text(
                ContentSource::Field(field),
                value_x,
                y,
                11.0,
                FontStyle::Regular,
                BLACK,
            )),
        ]
    }

    /// Maroon header band with the school name and a subtitle.
    fn header_band(school: &str, subtitle: Vec<PlacementDirective>) -> Vec<PlacementDirective> {
        let mut out = vec![
            PlacementDirective::Rect(RectDirective {
                x: MARGIN,
                y: 55.0,
                width: CONTENT_W,
                height: 45.0,
                fill: Some(MAROON),
                stroke: None,
                stroke_width: 1.0,
            }),
            PlacementDirective::Text(centered(text(
                ContentSource::Literal(school.to_string()),
                A4_W / 2.0,
                80.0,
                26.0,
                FontStyle::Bold,
                WHITE,
            ))),
        ];
        out.extend(subtitle);
        out
    }

    /// Amber section band with its maroon title.
    fn section_band(title: &str, band_y: f32, text_y: f32) -> [PlacementDirective; 2] {
        [
            PlacementDirective::Rect(RectDirective {
                x: MARGIN,
                y: band_y,
                width: CONTENT_W,
                height: 28.0,
                fill: Some(AMBER),
                stroke: Some(MAROON),
                stroke_width: 1.0,
            }),
            PlacementDirective::Text(text(
                ContentSource::Literal(title.to_string()),
                MARGIN + 12.0,
                text_y,
                14.0,
                FontStyle::Bold,
                MAROON,
            )),
        ]
    }

    /// Signature rules with centered captions, plus the italic footer.
    fn signature_block(
        captions: &[&str],
        line_y: f32,
        school: &str,
    ) -> Vec<PlacementDirective> {
        let line_w = 140.0;
        let gap = (CONTENT_W - line_w * captions.len() as f32)
            / (captions.len().saturating_sub(1)).max(1) as f32;
        let mut out = Vec::new();
        for (i, caption) in captions.iter().enumerate() {
            let x = MARGIN + 20.0 + (line_w + gap) * i as f32;
            out.push(PlacementDirective::Rect(RectDirective {
                x,
                y: line_y,
                width: line_w,
                height: 1.0,
                fill: Some(BLACK),
                stroke: None,
                stroke_width: 1.0,
            }));
            out.push(PlacementDirective::Text(centered(text(
                ContentSource::Literal(caption.to_string()),
                x + line_w / 2.0,
                line_y + 15.0,
                9.0,
                FontStyle::Regular,
                BLACK,
            ))));
        }
        out.push(PlacementDirective::Text(centered(text(
            ContentSource::Literal(format!("Generated by IT Department - {school}")),
            A4_W / 2.0,
            A4_H - 20.0,
            8.0,
            FontStyle::Oblique,
            FOOTER_GRAY,
        ))));
        out
    }

    /// ID card front: background art, circular photo, name block, level
    /// badge, and the roll/GR/DOB column.
    pub fn card_front() -> DocumentTemplate {
        let mut directives = vec![PlacementDirective::Image(ImageDirective {
            source: ImageSource::Photo,
            x: CARD_W - 149.0,
            y: 58.5,
            width: 103.0,
            height: 103.0,
            circular: true,
            chroma_key: false,
            opacity: 1.0,
            fit: ImageFit::Cover,
        })];

        let mut name = centered(text(
            ContentSource::Field(Field::FullName),
            94.5,
            CARD_H - 140.0,
            10.0,
            FontStyle::Bold,
            INK,
        ));
        name.transform = TextTransform::Uppercase;
        directives.push(PlacementDirective::Text(name));

        let mut father = centered(text(
            ContentSource::Field(Field::FatherName),
            94.5,
            CARD_H - 113.0,
            10.0,
            FontStyle::Bold,
            INK,
        ));
        father.transform = TextTransform::Uppercase;
        directives.push(PlacementDirective::Text(father));

        let mut level = centered(text(
            ContentSource::Field(Field::AdmissionFor),
            90.5,
            CARD_H - 96.2,
            10.0,
            FontStyle::Bold,
            WHITE,
        ));
        level.transform = TextTransform::Roman;
        level.prefix = Some("LEVEL-".to_string());
        directives.push(PlacementDirective::Text(level));

        directives.push(PlacementDirective::Text(text(
            ContentSource::Field(Field::RollNumber),
            65.0,
            CARD_H - 67.3,
            10.0,
            FontStyle::Regular,
            INK,
        )));
        directives.push(PlacementDirective::Text(text(
            ContentSource::Field(Field::GrNumber),
            65.0,
            CARD_H - 52.4,
            10.0,
            FontStyle::Regular,
            INK,
        )));
        directives.push(PlacementDirective::Text(text(
            ContentSource::Field(Field::Dob),
            65.0,
            CARD_H - 38.0,
            10.0,
            FontStyle::Regular,
            INK,
        )));

        DocumentTemplate {
            name: "card_front".into(),
            width: CARD_W,
            height: CARD_H,
            background: Some("card_front.jpg".into()),
            directives,
        }
    }

    /// ID card back: chroma-keyed QR block, validity dates, phone line.
    pub fn card_back() -> DocumentTemplate {
        let qr_lines = [
            ("Name", Field::FullName),
            ("Father Name", Field::FatherName),
            ("Roll No", Field::RollNumber),
            ("GR NO", Field::GrNumber),
            ("DOB", Field::Dob),
            ("Issue", Field::IssueDate),
            ("Expiry", Field::ExpiryDate),
            ("Phone", Field::PhoneNumber),
        ];

        let directives = vec![
            PlacementDirective::Image(ImageDirective {
                source: ImageSource::Barcode {
                    lines: qr_lines
                        .into_iter()
                        .map(|(label, field)| BarcodeLine {
                            label: label.to_string(),
                            field,
                        })
                        .collect(),
                },
                x: 50.0,
                y: CARD_H - 125.0 - 80.0,
                width: 80.0,
                height: 80.0,
                circular: false,
                chroma_key: true,
                opacity: 1.0,
                fit: ImageFit::Stretch,
            }),
            PlacementDirective::Text(text(
                ContentSource::Field(Field::IssueDate),
                95.0,
                CARD_H - 104.0,
                9.0,
                FontStyle::Bold,
                INK,
            )),
            PlacementDirective::Text(text(
                ContentSource::Field(Field::ExpiryDate),
                95.0,
                CARD_H - 93.0,
                9.0,
                FontStyle::Bold,
                INK,
            )),
            PlacementDirective::Text(text(
                ContentSource::Field(Field::PhoneNumber),
                85.5,
                CARD_H - 62.5,
                10.0,
                FontStyle::Bold,
                WHITE,
            )),
        ];

        DocumentTemplate {
            name: "card_back".into(),
            width: CARD_W,
            height: CARD_H,
            background: Some("card_back.jpg".into()),
            directives,
        }
    }

    /// A4 exam marksheet: header band, watermark, framed photo, summary
    /// rows, exam figures, subject table, status line, signatures.
    pub fn marksheet(school: &str) -> DocumentTemplate {
        let mut directives = header_band(
            school,
            vec![PlacementDirective::Text({
                let mut d = centered(text(
                    ContentSource::Computed(ComputedField::ExamTitle),
                    A4_W / 2.0,
                    95.0,
                    12.0,
                    FontStyle::Regular,
                    WHITE,
                ));
                d.prefix = Some("Exam Marksheet • ".to_string());
                d
            })],
        );

        // Watermark logo, centered in the content area at 12% opacity.
        let wm_w = CONTENT_W * 0.6;
        let wm_h = (A4_H - MARGIN * 2.0) * 0.6;
        directives.push(PlacementDirective::Image(ImageDirective {
            source: ImageSource::Asset {
                path: "logo.png".into(),
            },
            x: MARGIN + (CONTENT_W - wm_w) / 2.0,
            y: MARGIN + ((A4_H - MARGIN * 2.0) - wm_h) / 2.0,
            width: wm_w,
            height: wm_h,
            circular: false,
            chroma_key: false,
            opacity: 0.12,
            fit: ImageFit::Cover,
        }));

        // Framed photo.
        directives.push(PlacementDirective::Rect(RectDirective {
            x: MARGIN - 2.0,
            y: 140.0,
            width: 71.0,
            height: 71.0,
            fill: None,
            stroke: Some(MAROON),
            stroke_width: 2.0,
        }));
        directives.push(PlacementDirective::Image(ImageDirective {
            source: ImageSource::Photo,
            x: MARGIN,
            y: 142.0,
            width: 67.0,
            height: 67.0,
            circular: false,
            chroma_key: false,
            opacity: 1.0,
            fit: ImageFit::Cover,
        }));

        // Identity rows to the right of the photo.
        let kv_x = MARGIN + 67.0 + 18.0;
        let value_x = kv_x + 90.0;
        for (i, (label, field)) in [
            ("Student", Field::FullName),
            ("Father", Field::FatherName),
            ("Roll Number", Field::RollNumber),
            ("GR Number", Field::GrNumber),
        ]
        .into_iter()
        .enumerate()
        {
            directives.extend(label_value(label, field, kv_x, value_x, 152.0 + 16.0 * i as f32));
        }

        directives.extend(section_band("Exam Summary", 228.0, 244.0));

        let pair = |label: &str, computed: ComputedField, x: f32, y: f32| {
            [
                PlacementDirective::Text(text(
                    ContentSource::Literal(format!("{label}:")),
                    x,
                    y,
                    10.0,
                    FontStyle::Bold,
                    LABEL_GRAY,
                )),
                PlacementDirective::Text(text(
                    ContentSource::Computed(computed),
                    x + 110.0,
                    y,
                    10.0,
                    FontStyle::Regular,
                    BLACK,
                )),
            ]
        };
        let right_x = MARGIN + CONTENT_W / 2.0 + 10.0;
        directives.extend(pair(
            "Max Marks / Subject",
            ComputedField::MaxMarksPerSubject,
            MARGIN,
            271.0,
        ));
        directives.extend(pair(
            "Min Marks / Subject",
            ComputedField::MinMarksPerSubject,
            MARGIN,
            289.0,
        ));
        directives.extend(pair("Total Marks", ComputedField::TotalMarks, right_x, 307.0));
        directives.extend(pair("Percentage", ComputedField::Percentage, right_x, 325.0));
        directives.extend(pair("Grade", ComputedField::Grade, right_x, 343.0));

        directives.extend(section_band("Subject-wise Marks", 378.0, 394.0));
        directives.push(PlacementDirective::Text(text(
            ContentSource::Literal("Subject".into()),
            MARGIN + 8.0,
            421.0,
            10.0,
            FontStyle::Bold,
            BLACK,
        )));
        directives.push(PlacementDirective::Text(text(
            ContentSource::Literal("Marks".into()),
            MARGIN + 320.0,
            421.0,
            10.0,
            FontStyle::Bold,
            BLACK,
        )));
        directives.push(PlacementDirective::MarksTable(MarksTableDirective {
            x: MARGIN + 8.0,
            marks_x: MARGIN + 320.0,
            y: 437.0,
            row_height: 16.0,
            max_rows: 12,
            size: 10.0,
            color: BLACK,
        }));

        let mut status = text(
            ContentSource::Computed(ComputedField::Status),
            MARGIN + 8.0,
            637.0,
            10.0,
            FontStyle::Bold,
            BLACK,
        );
        status.prefix = Some("Status: ".to_string());
        directives.push(PlacementDirective::Text(status));
        let mut remarks = text(
            ContentSource::Computed(ComputedField::Remarks),
            MARGIN + 160.0,
            637.0,
            10.0,
            FontStyle::Bold,
            BLACK,
        );
        remarks.prefix = Some("Remarks: ".to_string());
        directives.push(PlacementDirective::Text(remarks));

        directives.extend(signature_block(
            &["Class Teacher", "Parent/Guardian", "Principal"],
            717.0,
            school,
        ));

        DocumentTemplate {
            name: "marksheet".into(),
            width: A4_W,
            height: A4_H,
            background: None,
            directives,
        }
    }

    /// A4 admission form: header band, framed photo, and the full student /
    /// guardian / prior-education field groups, in the marksheet's visual
    /// language.
    pub fn admission_form(school: &str) -> DocumentTemplate {
        let mut directives = header_band(
            school,
            vec![PlacementDirective::Text(centered(text(
                ContentSource::Literal("Student Admission Form".into()),
                A4_W / 2.0,
                95.0,
                12.0,
                FontStyle::Regular,
                WHITE,
            )))],
        );

        // Photo frame, top-right.
        let photo_x = A4_W - MARGIN - 67.0;
        directives.push(PlacementDirective::Rect(RectDirective {
            x: photo_x - 2.0,
            y: 140.0,
            width: 71.0,
            height: 71.0,
            fill: None,
            stroke: Some(MAROON),
            stroke_width: 2.0,
        }));
        directives.push(PlacementDirective::Image(ImageDirective {
            source: ImageSource::Photo,
            x: photo_x,
            y: 142.0,
            width: 67.0,
            height: 67.0,
            circular: false,
            chroma_key: false,
            opacity: 1.0,
            fit: ImageFit::Cover,
        }));

        let value_x = MARGIN + 130.0;
        // Field groups start below the photo block so the section bands
        // never paint across the frame.
        let mut y = 230.0;
        let row_h = 18.0;

        let rows = |directives: &mut Vec<PlacementDirective>,
                        fields: &[(&str, Field)],
                        y: &mut f32| {
            for (label, field) in fields {
                directives.extend(label_value(label, *field, MARGIN, value_x, *y));
                *y += row_h;
            }
        };

        directives.extend(section_band("Student Information", y - 12.0, y + 4.0));
        y += 31.0;
        rows(
            &mut directives,
            &[
                ("Full Name", Field::FullName),
                ("Father Name", Field::FatherName),
                ("Gender", Field::Gender),
                ("Date of Birth", Field::Dob),
                ("Nationality", Field::Nationality),
                ("CNIC / B-Form", Field::CnicOrBform),
                ("Admission For", Field::AdmissionFor),
                ("Roll Number", Field::RollNumber),
                ("GR Number", Field::GrNumber),
                ("Medical Condition", Field::MedicalCondition),
            ],
            &mut y,
        );

        y += 14.0;
        directives.extend(section_band("Guardian Information", y - 12.0, y + 4.0));
        y += 31.0;
        rows(
            &mut directives,
            &[
                ("Guardian Name", Field::GuardianName),
                ("Relation", Field::GuardianRelation),
                ("Guardian Contact", Field::GuardianContact),
                ("Phone", Field::PhoneNumber),
                ("Email", Field::Email),
                ("Address", Field::Address),
            ],
            &mut y,
        );

        y += 14.0;
        directives.extend(section_band("Prior Education", y - 12.0, y + 4.0));
        y += 31.0;
        rows(
            &mut directives,
            &[
                ("Former Education", Field::FormerEducation),
                ("Previous Institute", Field::PreviousInstitute),
                ("Last Exam %", Field::LastExamPercentage),
            ],
            &mut y,
        );

        directives.extend(signature_block(&["Parent/Guardian", "Principal"], 760.0, school));

        DocumentTemplate {
            name: "admission_form".into(),
            width: A4_W,
            height: A4_H,
            background: None,
            directives,
        }
    }
}
