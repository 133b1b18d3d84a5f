//! PDF certificate issued after an exam.
//!
//! Layout follows the paper certificate: light page, green double frame with
//! gold corners, the seal on top, employee block, results block and a
//! signature footer. Both the font and the seal are optional. Without the
//! font the built-in Helvetica face is used and Cyrillic text is
//! transliterated; without the seal the space stays empty.

use std::fs::File;
use std::path::{Path, PathBuf};

use image::GenericImageView;
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point, Rect, Rgb,
};

use crate::error::{AssetMissing, CertificateError};
use crate::quiz::grading::Grade;
use crate::quiz::session::{Profile, TestResult};
use crate::quiz::specialization;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const SEAL_SIZE: f32 = 28.0;
const SEAL_DPI: f32 = 300.0;

const GREEN: u32 = 0x006400;
const SEA_GREEN: u32 = 0x2e8b57;
const GOLD: u32 = 0xd4af37;
const GREY: u32 = 0x555555;
const LIGHT_GREY: u32 = 0x777777;

#[derive(Debug, Clone)]
pub struct CertificateRenderer {
    font_path: PathBuf,
    seal_path: PathBuf,
}

impl CertificateRenderer {
    pub fn new(font_path: impl Into<PathBuf>, seal_path: impl Into<PathBuf>) -> Self {
        Self {
            font_path: font_path.into(),
            seal_path: seal_path.into(),
        }
    }

    pub fn render(
        &self,
        profile: &Profile,
        result: &TestResult,
        user_id: u64,
    ) -> Result<Vec<u8>, CertificateError> {
        let (doc, page, layer) =
            PdfDocument::new("Сертификат", Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "certificate");
        let layer = doc.get_page(page).get_layer(layer);
        let canvas = Canvas::new(&doc, layer, &self.font_path)?;

        canvas.fill_rect(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT, 0xf7fbf7);
        canvas.draw_border();
        if let Err(missing) = draw_seal(&canvas.layer, &self.seal_path) {
            log::warn!("{}, certificate is rendered without the seal", missing);
        }

        canvas.centered("СЕРТИФИКАТ", 32.0, 226.0, GREEN);
        canvas.centered(
            "о прохождении профессионального тестирования",
            14.0,
            217.5,
            GREY,
        );
        canvas.line(53.0, 212.0, PAGE_WIDTH - 53.0, 212.0, GOLD, 2.0);

        let left = 35.0;
        let mut y = 198.0;
        for (label, value) in [
            ("ФИО:", profile.full_name.as_str()),
            ("Должность:", profile.position.as_str()),
            ("Подразделение:", profile.department.as_str()),
        ] {
            canvas.text(label, 11.0, left, y, GREY);
            canvas.text(value, 11.0, left + 42.0, y, 0x000000);
            y -= 9.0;
        }

        y -= 3.5;
        canvas.line(left, y, PAGE_WIDTH - left, y, 0xdddddd, 1.0);
        y -= 10.5;
        canvas.centered("РЕЗУЛЬТАТЫ ТЕСТИРОВАНИЯ", 13.0, y, GREEN);
        y -= 10.5;

        let rows = [
            (
                "Специализация:",
                specialization::title_of(&result.specialization).to_uppercase(),
            ),
            ("Уровень сложности:", result.difficulty.title().to_string()),
            ("Оценка:", result.grade.title().to_uppercase()),
            (
                "Правильных ответов:",
                format!("{} из {}", result.correct_count, result.total_questions),
            ),
            ("Результат:", format!("{:.1}%", result.percentage)),
            ("Затрачено времени:", result.elapsed_display()),
        ];
        for (label, value) in rows {
            canvas.text(label, 10.0, left, y, GREY);
            if label == "Оценка:" {
                canvas.text(&value, 12.0, left + 53.0, y, grade_color(result.grade));
            } else {
                canvas.text(&value, 10.0, left + 53.0, y, 0x000000);
            }
            // blank row between the track and the score
            y -= if label == "Уровень сложности:" { 15.5 } else { 7.8 };
        }

        let footer = 42.0;
        let signature = 70.0;
        let signature_x = (PAGE_WIDTH - signature) / 2.0;
        canvas.line(signature_x, footer, signature_x + signature, footer, GREEN, 1.0);
        canvas.centered("ФССП РОССИИ", 8.0, footer - 5.3, LIGHT_GREY);
        canvas.centered(
            "Система тестирования профессиональной подготовки",
            8.0,
            footer - 9.5,
            LIGHT_GREY,
        );

        let issued = result.timestamp.format("%d.%m.%Y").to_string();
        canvas.text(&format!("Дата выдачи: {}", issued), 8.0, 28.0, 17.6, LIGHT_GREY);
        canvas.right(&format!("ID: {}", user_id), 8.0, PAGE_WIDTH - 28.0, 17.6, LIGHT_GREY);
        canvas.centered("Telegram Bot", 7.0, 17.6, 0xbbbbbb);

        drop(canvas);
        doc.save_to_bytes()
            .map_err(|e| CertificateError::Pdf(format!("{:?}", e)))
    }
}

fn grade_color(grade: Grade) -> u32 {
    match grade {
        Grade::Excellent => 0x2d8c2d,
        Grade::Good => 0x5a9fd4,
        Grade::Satisfactory => 0xf39c12,
        Grade::Unsatisfactory => 0xc0392b,
    }
}

fn rgb(hex: u32) -> Color {
    let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
    Color::Rgb(Rgb::new(channel(16), channel(8), channel(0), None))
}

fn point(x: f32, y: f32) -> (Point, bool) {
    (Point::new(Mm(x), Mm(y)), false)
}

struct Canvas {
    layer: PdfLayerReference,
    font: IndirectFontRef,
    unicode: bool,
}

impl Canvas {
    fn new(
        doc: &PdfDocumentReference,
        layer: PdfLayerReference,
        font_path: &Path,
    ) -> Result<Self, CertificateError> {
        match load_font(doc, font_path) {
            Ok(font) => Ok(Self {
                layer,
                font,
                unicode: true,
            }),
            Err(missing) => {
                log::warn!("{}, falling back to Helvetica", missing);
                let font = doc
                    .add_builtin_font(BuiltinFont::Helvetica)
                    .map_err(|e| CertificateError::Pdf(format!("{:?}", e)))?;
                Ok(Self {
                    layer,
                    font,
                    unicode: false,
                })
            }
        }
    }

    fn text(&self, text: &str, size: f32, x: f32, y: f32, color: u32) {
        let text = if self.unicode {
            text.to_string()
        } else {
            transliterate(text)
        };
        self.layer.set_fill_color(rgb(color));
        self.layer.use_text(text, size, Mm(x), Mm(y), &self.font);
    }

    fn centered(&self, text: &str, size: f32, y: f32, color: u32) {
        let x = (PAGE_WIDTH - text_width(text, size)) / 2.0;
        self.text(text, size, x, y, color);
    }

    fn right(&self, text: &str, size: f32, right_edge: f32, y: f32, color: u32) {
        self.text(text, size, right_edge - text_width(text, size), y, color);
    }

    fn line(&self, x1: f32, y1: f32, x2: f32, y2: f32, color: u32, thickness: f32) {
        self.layer.set_outline_color(rgb(color));
        self.layer.set_outline_thickness(thickness);
        self.layer.add_line(Line {
            points: vec![point(x1, y1), point(x2, y2)],
            is_closed: false,
        });
    }

    fn fill_rect(&self, x: f32, y: f32, width: f32, height: f32, color: u32) {
        self.layer.set_fill_color(rgb(color));
        self.layer.add_rect(
            Rect::new(Mm(x), Mm(y), Mm(x + width), Mm(y + height)).with_mode(PaintMode::Fill),
        );
    }

    fn frame(&self, inset: f32, color: u32, thickness: f32) {
        self.layer.set_outline_color(rgb(color));
        self.layer.set_outline_thickness(thickness);
        self.layer.add_line(Line {
            points: vec![
                point(inset, inset),
                point(PAGE_WIDTH - inset, inset),
                point(PAGE_WIDTH - inset, PAGE_HEIGHT - inset),
                point(inset, PAGE_HEIGHT - inset),
            ],
            is_closed: true,
        });
    }

    fn draw_border(&self) {
        self.frame(10.6, GREEN, 3.0);
        self.frame(14.1, SEA_GREEN, 1.5);

        let (lo, hx, hy, c) = (14.1, PAGE_WIDTH - 14.1, PAGE_HEIGHT - 14.1, 5.3);
        for (x, y, dx, dy) in [
            (lo, hy, c, -c),
            (hx, hy, -c, -c),
            (lo, lo, c, c),
            (hx, lo, -c, c),
        ] {
            self.line(x, y, x + dx, y, GOLD, 2.0);
            self.line(x, y, x, y + dy, GOLD, 2.0);
        }
    }
}

fn load_font(doc: &PdfDocumentReference, path: &Path) -> Result<IndirectFontRef, AssetMissing> {
    let missing = |reason: String| AssetMissing {
        path: path.to_path_buf(),
        reason,
    };
    let file = File::open(path).map_err(|e| missing(e.to_string()))?;
    doc.add_external_font(file)
        .map_err(|e| missing(format!("{:?}", e)))
}

fn draw_seal(layer: &PdfLayerReference, path: &Path) -> Result<(), AssetMissing> {
    let decoded = image::open(path).map_err(|e| AssetMissing {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let (width_px, _) = decoded.dimensions();
    let natural = width_px.max(1) as f32 / SEAL_DPI * 25.4;
    let scale = SEAL_SIZE / natural;

    Image::from_dynamic_image(&decoded).add_to_layer(
        layer.clone(),
        ImageTransform {
            translate_x: Some(Mm((PAGE_WIDTH - SEAL_SIZE) / 2.0)),
            translate_y: Some(Mm(PAGE_HEIGHT - 42.3 - SEAL_SIZE / 2.0)),
            scale_x: Some(scale),
            scale_y: Some(scale),
            dpi: Some(SEAL_DPI),
            ..Default::default()
        },
    );
    log::debug!("Seal drawn from {}", path.display());
    Ok(())
}

/// Rough text width in millimetres. Good enough to centre a line without
/// reading glyph metrics.
fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.5 * 0.3528
}

/// Latin rendering of Cyrillic text for the built-in PDF fonts, which cannot
/// encode Cyrillic glyphs.
pub fn transliterate(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        let lower = c.to_lowercase().next().unwrap_or(c);
        let latin = match lower {
            'а' => "a",
            'б' => "b",
            'в' => "v",
            'г' => "g",
            'д' => "d",
            'е' => "e",
            'ё' => "e",
            'ж' => "zh",
            'з' => "z",
            'и' => "i",
            'й' => "y",
            'к' => "k",
            'л' => "l",
            'м' => "m",
            'н' => "n",
            'о' => "o",
            'п' => "p",
            'р' => "r",
            'с' => "s",
            'т' => "t",
            'у' => "u",
            'ф' => "f",
            'х' => "kh",
            'ц' => "ts",
            'ч' => "ch",
            'ш' => "sh",
            'щ' => "shch",
            'ъ' => "",
            'ы' => "y",
            'ь' => "",
            'э' => "e",
            'ю' => "yu",
            'я' => "ya",
            '№' => "No",
            '«' | '»' => "\"",
            '—' | '–' => "-",
            _ if c.is_ascii() => {
                out.push(c);
                continue;
            }
            _ => "?",
        };
        if c.is_uppercase() {
            // inside an all-caps word every Latin letter is capital
            let prev = i.checked_sub(1).and_then(|p| chars.get(p));
            let next = chars.get(i + 1);
            let shouting = next.map_or(false, |n| n.is_uppercase())
                || (prev.map_or(false, |p| p.is_uppercase())
                    && !next.map_or(false, |n| n.is_lowercase()));
            if shouting {
                out.push_str(&latin.to_ascii_uppercase());
            } else {
                let mut letters = latin.chars();
                if let Some(first) = letters.next() {
                    out.push(first.to_ascii_uppercase());
                    out.extend(letters);
                }
            }
        } else {
            out.push_str(latin);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::Difficulty;
    use chrono::{TimeZone, Utc};

    fn result() -> TestResult {
        TestResult {
            user_id: 1001,
            specialization: "oupds".into(),
            difficulty: Difficulty::Standard,
            correct_count: 36,
            total_questions: 40,
            percentage: 90.0,
            grade: Grade::Excellent,
            elapsed_secs: 845,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    fn profile() -> Profile {
        Profile {
            full_name: "Петрова Анна Сергеевна".into(),
            position: "Ведущий специалист".into(),
            department: "Отдел кадров".into(),
        }
    }

    #[test]
    fn renders_without_any_assets() {
        let renderer = CertificateRenderer::new("/nonexistent/font.ttf", "/nonexistent/seal.png");
        let pdf = renderer.render(&profile(), &result(), 1001).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert!(pdf.len() > 500);
    }

    #[test]
    fn renders_with_seal_image() {
        let seal = std::env::temp_dir().join(format!("seal-{}.png", std::process::id()));
        image::RgbImage::from_pixel(16, 16, image::Rgb([200, 30, 30]))
            .save(&seal)
            .unwrap();

        let without = CertificateRenderer::new("/nonexistent/font.ttf", "/nonexistent/seal.png")
            .render(&profile(), &result(), 1)
            .unwrap();
        let with = CertificateRenderer::new("/nonexistent/font.ttf", &seal)
            .render(&profile(), &result(), 1)
            .unwrap();
        let _ = std::fs::remove_file(&seal);

        assert!(with.starts_with(b"%PDF"));
        assert!(with.len() > without.len());
    }

    #[test]
    fn render_leaves_inputs_untouched() {
        let renderer = CertificateRenderer::new("/nonexistent/font.ttf", "/nonexistent/seal.png");
        let (employee, record) = (profile(), result());
        renderer.render(&employee, &record, 5).unwrap();
        assert_eq!(employee, profile());
        assert_eq!(record, result());
    }

    #[test]
    fn transliteration_keeps_case_and_ascii() {
        assert_eq!(transliterate("СЕРТИФИКАТ"), "SERTIFIKAT");
        assert_eq!(transliterate("Щукин Юрий"), "Shchukin Yuriy");
        assert_eq!(transliterate("ЩУКИН ЮРИЙ"), "SHCHUKIN YURIY");
        assert_eq!(transliterate("ОТДЕЛ ЖКХ"), "OTDEL ZHKKH");
        assert_eq!(transliterate("Я и Ю"), "Ya i Yu");
        assert_eq!(transliterate("ID: 42, 90.0%"), "ID: 42, 90.0%");
        assert_eq!(transliterate("№ 5 — «ОК»"), "No 5 - \"OK\"");
        assert_eq!(transliterate("日"), "?");
    }

    #[test]
    fn grade_colors_differ() {
        let colors = [
            grade_color(Grade::Excellent),
            grade_color(Grade::Good),
            grade_color(Grade::Satisfactory),
            grade_color(Grade::Unsatisfactory),
        ];
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
