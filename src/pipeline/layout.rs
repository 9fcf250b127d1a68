//! Document layout: interpret a template's directives for one student and
//! produce encoded PDF bytes.
//!
//! ## Rendering model
//!
//! Each page is built in two passes:
//!
//! 1. **Raster pass** — background, image and rectangle directives are
//!    composited onto a page canvas rendered at `quality_scale ×` the page's
//!    point size (so a 189 × 321 pt card becomes a 567 × 963 px canvas at the
//!    default 3×). Alpha from the compositor (circular crops, chroma-keyed
//!    barcodes, faded watermarks) blends here, and the flattened RGB canvas
//!    is embedded once, full-page, at matching DPI.
//! 2. **Text pass** — text directives are drawn as real PDF text on top,
//!    with Helvetica metrics used for centered alignment.
//!
//! Template coordinates are top-left-origin points; this module owns the
//! flip to the PDF's bottom-left origin so templates stay portable.
//!
//! ## Failure tiers
//!
//! A directive that cannot be resolved or placed is skipped with a `warn!`
//! and the rest of the page proceeds. Only page-level problems — a missing
//! required identity field, an unusable background, a document that fails to
//! serialise — surface as [`EntityError`] for the batch layer to record.

use crate::config::GenerationConfig;
use crate::error::EntityError;
use crate::model::{JobParams, StudentRecord};
use crate::pipeline::{compositor, fetch::AssetFetcher, fetch::AssetRef, format, metrics};
use crate::template::{
    Align, ContentSource, DocumentTemplate, FontStyle, ImageDirective, ImageFit, ImageSource,
    MarksTableDirective, PlacementDirective, RectDirective, TextDirective, TextTransform,
};
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use printpdf::{
    BuiltinFont, ColorBits, ColorSpace, ImageTransform, ImageXObject, IndirectFontRef, Mm,
    PdfDocument, PdfLayerReference, Px, Rgb,
};
use std::collections::HashMap;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, warn};

const PT_TO_MM: f32 = 0.352_777_78;

// ── Template assets (loaded once per job) ────────────────────────────────

/// Backgrounds and static template images, decoded once and shared
/// read-only across every student in the job.
#[derive(Debug, Default)]
pub struct TemplateAssets {
    images: HashMap<String, DynamicImage>,
    errors: HashMap<String, String>,
}

impl TemplateAssets {
    /// Load every raster the given templates reference. Individual load
    /// failures are recorded, not returned: a missing *background* becomes a
    /// per-student page-construction failure at render time, while a missing
    /// static image (e.g. watermark) just skips that directive.
    pub fn load(templates: &[DocumentTemplate], asset_dir: &Path) -> Self {
        let mut assets = Self::default();
        for template in templates {
            if let Some(name) = &template.background {
                assets.load_one(name, asset_dir);
            }
            for directive in &template.directives {
                if let PlacementDirective::Image(ImageDirective {
                    source: ImageSource::Asset { path },
                    ..
                }) = directive
                {
                    assets.load_one(path, asset_dir);
                }
            }
        }
        assets
    }

    fn load_one(&mut self, name: &str, asset_dir: &Path) {
        if self.images.contains_key(name) || self.errors.contains_key(name) {
            return;
        }
        let path = asset_dir.join(name);
        match std::fs::read(&path).ok().and_then(|b| compositor::decode(&b)) {
            Some(img) => {
                debug!("Loaded template asset {} ({}x{})", name, img.width(), img.height());
                self.images.insert(name.to_string(), img);
            }
            None => {
                warn!("Template asset {} could not be loaded from {}", name, path.display());
                self.errors
                    .insert(name.to_string(), format!("cannot read '{}'", path.display()));
            }
        }
    }

    fn get(&self, name: &str) -> Result<&DynamicImage, String> {
        self.images
            .get(name)
            .ok_or_else(|| self.errors.get(name).cloned().unwrap_or_else(|| name.to_string()))
    }
}

// ── Per-student fetched assets ───────────────────────────────────────────

/// Network-sourced images for one student, prefetched before layout so the
/// render itself never suspends.
#[derive(Debug, Default, Clone)]
pub struct FetchedAssets {
    pub photo: Option<Vec<u8>>,
    pub barcode: Option<Vec<u8>>,
}

/// The barcode request the templates imply for this student, if any:
/// payload of `Label: value` lines plus the pixel size of the placement.
pub fn barcode_request(
    templates: &[DocumentTemplate],
    student: &StudentRecord,
    params: &JobParams,
    quality_scale: u32,
) -> Option<AssetRef> {
    for template in templates {
        for directive in &template.directives {
            if let PlacementDirective::Image(ImageDirective {
                source: ImageSource::Barcode { lines },
                width,
                height,
                ..
            }) = directive
            {
                let payload = lines
                    .iter()
                    .map(|line| {
                        let value = student.resolve(line.field, params).unwrap_or_default();
                        format!("{}: {}", line.label, value)
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                return Some(AssetRef::Barcode {
                    payload,
                    width: (*width).round() as u32 * quality_scale.max(1),
                    height: (*height).round() as u32 * quality_scale.max(1),
                });
            }
        }
    }
    None
}

/// Whether any template wants the student's photo placed.
fn wants_photo(templates: &[DocumentTemplate]) -> bool {
    templates.iter().any(|t| {
        t.directives.iter().any(|d| {
            matches!(
                d,
                PlacementDirective::Image(ImageDirective {
                    source: ImageSource::Photo,
                    ..
                })
            )
        })
    })
}

/// Resolve one student's network assets. Every failure degrades to `None`
/// per the fetcher contract; this function cannot fail.
pub async fn fetch_for_student(
    fetcher: &AssetFetcher,
    templates: &[DocumentTemplate],
    student: &StudentRecord,
    params: &JobParams,
    quality_scale: u32,
) -> FetchedAssets {
    let mut fetched = FetchedAssets::default();

    if wants_photo(templates) {
        if let Some(url) = student.photo_url.as_deref().filter(|u| !u.is_empty()) {
            fetched.photo = fetcher.fetch(&AssetRef::Url(url.to_string())).await;
        }
    }

    if let Some(request) = barcode_request(templates, student, params, quality_scale) {
        fetched.barcode = fetcher.fetch(&request).await;
    }

    fetched
}

// ── Rendering ────────────────────────────────────────────────────────────

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    oblique: IndirectFontRef,
}

impl Fonts {
    fn get(&self, style: FontStyle) -> &IndirectFontRef {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Bold => &self.bold,
            FontStyle::Oblique => &self.oblique,
        }
    }
}

/// Render one student's document: one page per template, in template order
/// (front before back for two-sided cards).
pub fn render_document(
    student: &StudentRecord,
    templates: &[DocumentTemplate],
    assets: &TemplateAssets,
    fetched: &FetchedAssets,
    params: &JobParams,
    config: &GenerationConfig,
) -> Result<Vec<u8>, EntityError> {
    let entity = student.display_id().to_string();

    if templates.is_empty() {
        return Err(EntityError::RenderFailed {
            entity,
            detail: "no templates supplied".into(),
        });
    }
    if student.full_name.trim().is_empty() {
        return Err(EntityError::MissingField {
            entity,
            field: "full_name".into(),
        });
    }

    let first = &templates[0];
    let (doc, page1, layer1) = PdfDocument::new(
        format!("{} — {}", first.name, student.full_name),
        Mm(first.width * PT_TO_MM),
        Mm(first.height * PT_TO_MM),
        "Layer 1",
    );

    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| render_failed(&entity, &e))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| render_failed(&entity, &e))?,
        oblique: doc
            .add_builtin_font(BuiltinFont::HelveticaOblique)
            .map_err(|e| render_failed(&entity, &e))?,
    };

    for (i, template) in templates.iter().enumerate() {
        let layer = if i == 0 {
            doc.get_page(page1).get_layer(layer1)
        } else {
            let (page, layer) = doc.add_page(
                Mm(template.width * PT_TO_MM),
                Mm(template.height * PT_TO_MM),
                "Layer 1",
            );
            doc.get_page(page).get_layer(layer)
        };

        let canvas = build_page_canvas(template, assets, fetched, &entity, config)?;
        embed_canvas(&layer, canvas, config.quality_scale);
        draw_text_pass(&layer, template, student, params, &fonts);
    }

    let mut bytes = Vec::new();
    {
        let mut writer = BufWriter::new(std::io::Cursor::new(&mut bytes));
        doc.save(&mut writer).map_err(|e| render_failed(&entity, &e))?;
    }
    debug!("Rendered document for {} → {} bytes", entity, bytes.len());
    Ok(bytes)
}

fn render_failed(entity: &str, error: &dyn std::fmt::Display) -> EntityError {
    EntityError::RenderFailed {
        entity: entity.to_string(),
        detail: error.to_string(),
    }
}

/// Composite the raster layer for one page: background plus every image and
/// rect directive, in template order.
fn build_page_canvas(
    template: &DocumentTemplate,
    assets: &TemplateAssets,
    fetched: &FetchedAssets,
    entity: &str,
    config: &GenerationConfig,
) -> Result<RgbaImage, EntityError> {
    let scale = config.quality_scale.max(1);
    let cw = (template.width * scale as f32).round() as u32;
    let ch = (template.height * scale as f32).round() as u32;

    let mut canvas = match &template.background {
        Some(name) => {
            let background = assets.get(name).map_err(|detail| EntityError::TemplateAsset {
                entity: entity.to_string(),
                detail,
            })?;
            compositor::stretch_fit(&background.to_rgba8(), cw, ch)
        }
        None => RgbaImage::from_pixel(cw, ch, Rgba([255, 255, 255, 255])),
    };

    for directive in &template.directives {
        let placed = match directive {
            PlacementDirective::Image(img) => {
                place_image(&mut canvas, img, assets, fetched, config, scale)
            }
            PlacementDirective::Rect(rect) => {
                place_rect(&mut canvas, rect, scale);
                Ok(())
            }
            // Text and tables belong to the vector pass.
            PlacementDirective::Text(_) | PlacementDirective::MarksTable(_) => Ok(()),
        };
        if let Err(detail) = placed {
            warn!("{}: skipping directive on '{}': {}", entity, template.name, detail);
        }
    }

    Ok(canvas)
}

/// Place one image directive. `Err` means "skip this element", never a page
/// failure; an absent source (missing photo, failed barcode fetch) skips
/// quietly so the template background shows through.
fn place_image(
    canvas: &mut RgbaImage,
    directive: &ImageDirective,
    assets: &TemplateAssets,
    fetched: &FetchedAssets,
    config: &GenerationConfig,
    scale: u32,
) -> Result<(), String> {
    let source = match &directive.source {
        ImageSource::Photo => match &fetched.photo {
            Some(bytes) => compositor::decode(bytes).ok_or("photo bytes undecodable")?,
            None => {
                debug!("No photo available; leaving template background visible");
                return Ok(());
            }
        },
        ImageSource::Barcode { .. } => match &fetched.barcode {
            Some(bytes) => compositor::decode(bytes).ok_or("barcode bytes undecodable")?,
            None => {
                debug!("No barcode render available; leaving template background visible");
                return Ok(());
            }
        },
        ImageSource::Asset { path } => assets.get(path).cloned()?,
    };

    let w = (directive.width * scale as f32).round() as u32;
    let h = (directive.height * scale as f32).round() as u32;
    if w == 0 || h == 0 {
        return Err("zero-sized placement".into());
    }

    let mut pixels = if directive.circular {
        let diameter = directive.width.round() as u32;
        match compositor::circular_crop(&source, diameter, scale) {
            Some(cropped) => cropped,
            // Fall back to the unmodified source in the same box.
            None => compositor::cover_fit(&source, w, h),
        }
    } else {
        let keyed = if directive.chroma_key {
            compositor::chroma_key(&source, config.chroma_threshold)
                .map(DynamicImage::ImageRgba8)
                .unwrap_or(source)
        } else {
            source
        };
        match directive.fit {
            ImageFit::Stretch => compositor::stretch_fit(&keyed.to_rgba8(), w, h),
            ImageFit::Cover => compositor::cover_fit(&keyed, w, h),
        }
    };

    if directive.opacity < 1.0 {
        compositor::fade(&mut pixels, directive.opacity);
    }

    let x = (directive.x * scale as f32).round() as i64;
    let y = (directive.y * scale as f32).round() as i64;
    imageops::overlay(canvas, &pixels, x, y);
    Ok(())
}

/// Rasterise a rect directive: optional fill, optional stroke drawn as four
/// edge bars.
fn place_rect(canvas: &mut RgbaImage, rect: &RectDirective, scale: u32) {
    let s = scale as f32;
    let x = (rect.x * s).round() as i64;
    let y = (rect.y * s).round() as i64;
    let w = (rect.width * s).round() as u32;
    let h = (rect.height * s).round() as u32;

    if let Some(fill) = rect.fill {
        compositor::fill_rect(canvas, x, y, w, h, Rgba([fill.r, fill.g, fill.b, 255]));
    }
    if let Some(stroke) = rect.stroke {
        let t = ((rect.stroke_width * s).round() as u32).max(1);
        let color = Rgba([stroke.r, stroke.g, stroke.b, 255]);
        compositor::fill_rect(canvas, x, y, w, t, color);
        compositor::fill_rect(canvas, x, y + h as i64 - t as i64, w, t, color);
        compositor::fill_rect(canvas, x, y, t, h, color);
        compositor::fill_rect(canvas, x + w as i64 - t as i64, y, t, h, color);
    }
}

/// Embed the flattened page canvas so it spans the page exactly:
/// at `72 × quality_scale` DPI, one canvas pixel is `1/scale` pt.
fn embed_canvas(layer: &PdfLayerReference, canvas: RgbaImage, quality_scale: u32) {
    let (w, h) = (canvas.width(), canvas.height());
    let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();

    let image = printpdf::Image::from(ImageXObject {
        width: Px(w as usize),
        height: Px(h as usize),
        color_space: ColorSpace::Rgb,
        bits_per_component: ColorBits::Bit8,
        interpolate: true,
        image_data: rgb.into_raw(),
        image_filter: None,
        clipping_bbox: None,
        smask: None,
    });

    image.add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(0.0)),
            translate_y: Some(Mm(0.0)),
            dpi: Some(72.0 * quality_scale.max(1) as f32),
            ..Default::default()
        },
    );
}

/// Draw every text and marks-table directive as PDF text. Unresolvable
/// content skips the directive; nothing here can fail the page.
fn draw_text_pass(
    layer: &PdfLayerReference,
    template: &DocumentTemplate,
    student: &StudentRecord,
    params: &JobParams,
    fonts: &Fonts,
) {
    for directive in &template.directives {
        match directive {
            PlacementDirective::Text(text) => {
                if let Some(content) = resolve_text(text, student, params) {
                    draw_text_run(layer, template, text, &content, fonts);
                }
            }
            PlacementDirective::MarksTable(table) => {
                draw_marks_table(layer, template, table, student, fonts);
            }
            PlacementDirective::Image(_) | PlacementDirective::Rect(_) => {}
        }
    }
}

/// Resolve a text directive's content through source → transform → prefix.
/// `None` means the directive is skipped (absent field, empty content).
fn resolve_text(
    directive: &TextDirective,
    student: &StudentRecord,
    params: &JobParams,
) -> Option<String> {
    let raw = match &directive.source {
        ContentSource::Field(field) => student.resolve(*field, params)?,
        ContentSource::Computed(computed) => student.resolve_computed(*computed, params),
        ContentSource::Literal(text) => text.clone(),
    };

    let transformed = match directive.transform {
        TextTransform::None => raw,
        TextTransform::Uppercase => raw.to_uppercase(),
        TextTransform::Roman => format::to_roman(&raw),
    };

    let content = match &directive.prefix {
        Some(prefix) => format!("{prefix}{transformed}"),
        None => transformed,
    };

    (!content.is_empty()).then_some(content)
}

fn draw_text_run(
    layer: &PdfLayerReference,
    template: &DocumentTemplate,
    directive: &TextDirective,
    content: &str,
    fonts: &Fonts,
) {
    let bold = directive.style == FontStyle::Bold;
    let x = match directive.align {
        Align::Start => directive.x,
        Align::Center => directive.x - metrics::text_width(content, directive.size, bold) / 2.0,
    };
    let y = template.height - directive.y;

    layer.set_fill_color(printpdf::Color::Rgb(Rgb::new(
        directive.color.r as f32 / 255.0,
        directive.color.g as f32 / 255.0,
        directive.color.b as f32 / 255.0,
        None,
    )));
    layer.use_text(
        content,
        directive.size,
        Mm(x * PT_TO_MM),
        Mm(y * PT_TO_MM),
        fonts.get(directive.style),
    );
}

fn draw_marks_table(
    layer: &PdfLayerReference,
    template: &DocumentTemplate,
    table: &MarksTableDirective,
    student: &StudentRecord,
    fonts: &Fonts,
) {
    if student.marks.len() > table.max_rows {
        warn!(
            "{}: {} subjects exceed the table's {} rows; extra rows dropped",
            student.display_id(),
            student.marks.len(),
            table.max_rows
        );
    }

    layer.set_fill_color(printpdf::Color::Rgb(Rgb::new(
        table.color.r as f32 / 255.0,
        table.color.g as f32 / 255.0,
        table.color.b as f32 / 255.0,
        None,
    )));

    for (i, mark) in student.marks.iter().take(table.max_rows).enumerate() {
        let y = template.height - (table.y + table.row_height * i as f32);
        layer.use_text(
            mark.subject.as_str(),
            table.size,
            Mm(table.x * PT_TO_MM),
            Mm(y * PT_TO_MM),
            &fonts.regular,
        );
        layer.use_text(
            mark.score.to_string(),
            table.size,
            Mm(table.marks_x * PT_TO_MM),
            Mm(y * PT_TO_MM),
            &fonts.regular,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubjectMark;
    use crate::template::builtin;

    fn student() -> StudentRecord {
        StudentRecord {
            id: "s-1".into(),
            full_name: "Ahmed Khan".into(),
            father_name: "Bashir Khan".into(),
            admission_for: "9".into(),
            roll_number: "14".into(),
            gr_number: "1021".into(),
            phone_number: "0300-1234567".into(),
            ..Default::default()
        }
    }

    fn config() -> GenerationConfig {
        GenerationConfig::builder().quality_scale(1).build().unwrap()
    }

    /// Count page objects in serialised PDF bytes (object dictionaries are
    /// written uncompressed by the writer).
    fn count_pages(bytes: &[u8]) -> usize {
        let haystack = String::from_utf8_lossy(bytes);
        // lopdf serialises dictionary entries without a space between the key
        // and value name tokens (`/Type/Page`); some versions emit
        // `/Type /Page`. Normalise so the count is independent of that spacing.
        let normalized = haystack.replace("/Type /Page", "/Type/Page");
        let pages = normalized.matches("/Type/Page").count();
        let trees = normalized.matches("/Type/Pages").count();
        pages - trees
    }

    #[test]
    fn renders_a_background_free_template() {
        let templates = vec![builtin::marksheet("Test High School")];
        let bytes = render_document(
            &student(),
            &templates,
            &TemplateAssets::default(),
            &FetchedAssets::default(),
            &JobParams::default(),
            &config(),
        )
        .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(count_pages(&bytes), 1);
    }

    #[test]
    fn missing_name_is_an_entity_failure() {
        let mut s = student();
        s.full_name = "  ".into();
        let templates = vec![builtin::admission_form("Test High School")];
        let err = render_document(
            &s,
            &templates,
            &TemplateAssets::default(),
            &FetchedAssets::default(),
            &JobParams::default(),
            &config(),
        )
        .unwrap_err();
        assert!(matches!(err, EntityError::MissingField { .. }));
        assert_eq!(err.entity(), "14");
    }

    #[test]
    fn missing_background_is_a_template_asset_failure() {
        // Card templates name a background raster; with no assets loaded the
        // page itself cannot be constructed.
        let templates = vec![builtin::card_front()];
        let err = render_document(
            &student(),
            &templates,
            &TemplateAssets::default(),
            &FetchedAssets::default(),
            &JobParams::default(),
            &config(),
        )
        .unwrap_err();
        assert!(matches!(err, EntityError::TemplateAsset { .. }));
    }

    #[test]
    fn absent_photo_degrades_not_fails() {
        // Marksheet wants a photo; none was fetched. The document must still
        // come out, with the photo area left to the page background.
        let templates = vec![builtin::marksheet("Test High School")];
        let result = render_document(
            &student(),
            &templates,
            &TemplateAssets::default(),
            &FetchedAssets::default(),
            &JobParams::default(),
            &config(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn two_sided_documents_have_front_before_back() {
        // Both sides are background-free stand-ins here; ordering is what we
        // assert (template order == page order).
        let mut front = builtin::card_front();
        front.background = None;
        let mut back = builtin::card_back();
        back.background = None;
        let bytes = render_document(
            &student(),
            &[front, back],
            &TemplateAssets::default(),
            &FetchedAssets::default(),
            &JobParams::default(),
            &config(),
        )
        .unwrap();
        assert_eq!(count_pages(&bytes), 2);
    }

    #[test]
    fn marksheet_renders_with_marks() {
        let mut s = student();
        s.marks = vec![
            SubjectMark {
                subject: "Mathematics".into(),
                score: 88,
            },
            SubjectMark {
                subject: "English".into(),
                score: 74,
            },
        ];
        let templates = vec![builtin::marksheet("Test High School")];
        let bytes = render_document(
            &s,
            &templates,
            &TemplateAssets::default(),
            &FetchedAssets::default(),
            &JobParams::default(),
            &config(),
        )
        .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn barcode_request_builds_labeled_payload() {
        let templates = vec![builtin::card_back()];
        let request =
            barcode_request(&templates, &student(), &JobParams::default(), 3).unwrap();
        match request {
            AssetRef::Barcode {
                payload,
                width,
                height,
            } => {
                assert_eq!(width, 240);
                assert_eq!(height, 240);
                let lines: Vec<&str> = payload.lines().collect();
                assert_eq!(lines[0], "Name: Ahmed Khan");
                assert_eq!(lines[2], "Roll No: 14");
                // Absent dates still produce their labeled line.
                assert!(lines.iter().any(|l| *l == "Issue: "));
            }
            other => panic!("expected barcode request, got {other:?}"),
        }
    }

    #[test]
    fn resolve_text_applies_transform_then_prefix() {
        let directive = TextDirective {
            source: ContentSource::Field(crate::model::Field::AdmissionFor),
            transform: TextTransform::Roman,
            prefix: Some("LEVEL-".into()),
            x: 0.0,
            y: 0.0,
            align: Align::Center,
            size: 10.0,
            style: FontStyle::Bold,
            color: crate::template::WHITE,
        };
        let content = resolve_text(&directive, &student(), &JobParams::default()).unwrap();
        assert_eq!(content, "LEVEL-IX");
    }

    #[test]
    fn resolve_text_skips_absent_fields() {
        let directive = TextDirective {
            source: ContentSource::Field(crate::model::Field::Email),
            transform: TextTransform::None,
            prefix: None,
            x: 0.0,
            y: 0.0,
            align: Align::Start,
            size: 10.0,
            style: FontStyle::Regular,
            color: crate::template::BLACK,
        };
        assert_eq!(resolve_text(&directive, &student(), &JobParams::default()), None);
    }
}

