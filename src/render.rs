use crate::{
    config::{FieldWidths, RenderConfig},
    model::{PlaybackSnapshot, TrackRef},
};
use anyhow::Context as _;
use egui::{Color32, FontData, FontDefinitions, FontFamily, FontId};
use std::{fs, path::Path, sync::Arc};

pub const ELLIPSIS: &str = "...";

const CUSTOM_FONT: &str = "target_app_font";

/// Pixel width of a string under one fixed font and size.
pub trait TextMeasure {
    fn width(&self, text: &str) -> f32;
}

/// Measures text with egui's font layout, optionally using the target application's own
/// font file so widths match what it will display.
pub struct EguiMeasure {
    ctx: egui::Context,
    font: FontId,
}

impl EguiMeasure {
    pub fn new(font_path: Option<&Path>, size: f32) -> anyhow::Result<Self> {
        let ctx = egui::Context::default();
        if let Some(path) = font_path {
            let bytes = fs::read(path)
                .with_context(|| format!("Failed to read font file: {}", path.display()))?;
            let mut fonts = FontDefinitions::default();
            fonts
                .font_data
                .insert(CUSTOM_FONT.to_owned(), Arc::new(FontData::from_owned(bytes)));
            fonts
                .families
                .entry(FontFamily::Proportional)
                .or_default()
                .insert(0, CUSTOM_FONT.to_owned());
            ctx.set_fonts(fonts);
        }
        // Fonts are only built once the context has run a pass.
        let _ = ctx.run(egui::RawInput::default(), |_| {});

        Ok(Self {
            ctx,
            font: FontId::proportional(size),
        })
    }

    pub fn from_config(config: &RenderConfig) -> anyhow::Result<Self> {
        Self::new(config.font_path.as_deref(), config.font_size())
    }
}

impl TextMeasure for EguiMeasure {
    fn width(&self, text: &str) -> f32 {
        self.ctx.fonts(|fonts| {
            fonts
                .layout_no_wrap(text.to_owned(), self.font.clone(), Color32::WHITE)
                .size()
                .x
        })
    }
}

/// Shortens `text` until it fits in `max_width` pixels.
///
/// Characters are dropped two at a time with [`ELLIPSIS`] appended and the result is
/// re-measured after every trim. Once a candidate fits, the last dropped character is
/// tried again so the result is the longest prefix that fits. Text that already fits is
/// returned unchanged.
pub fn fit_width(text: &str, max_width: f32, measure: &dyn TextMeasure) -> String {
    if measure.width(text) <= max_width {
        return text.to_owned();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut keep = chars.len();
    loop {
        keep = keep.saturating_sub(2);
        let candidate = with_ellipsis(&chars[..keep]);
        if keep == 0 || measure.width(&candidate) <= max_width {
            if keep + 1 < chars.len() {
                let longer = with_ellipsis(&chars[..keep + 1]);
                if measure.width(&longer) <= max_width {
                    return longer;
                }
            }
            return candidate;
        }
    }
}

fn with_ellipsis(prefix: &[char]) -> String {
    let mut out: String = prefix.iter().collect();
    out.push_str(ELLIPSIS);
    out
}

/// Turns a [`PlaybackSnapshot`] into the text pushed to the target window.
pub struct TextRenderer {
    template: String,
    widths: FieldWidths,
    reminders: Vec<String>,
    measure: Box<dyn TextMeasure + Send>,
}

impl TextRenderer {
    pub fn new(
        template: impl Into<String>,
        widths: FieldWidths,
        reminders: Vec<String>,
        measure: Box<dyn TextMeasure + Send>,
    ) -> Self {
        Self {
            template: template.into(),
            widths,
            reminders,
            measure,
        }
    }

    pub fn from_config(config: &RenderConfig, measure: Box<dyn TextMeasure + Send>) -> Self {
        Self::new(
            config.template.clone(),
            config.widths,
            config.reminders.clone(),
            measure,
        )
    }

    pub fn reminder_count(&self) -> usize {
        self.reminders.len()
    }

    pub fn render(&self, snapshot: &PlaybackSnapshot, reminder_index: usize) -> String {
        let fit = |value: &str, width: f32| fit_width(value, width, self.measure.as_ref());
        let reminder = if self.reminders.is_empty() {
            ""
        } else {
            self.reminders[reminder_index % self.reminders.len()].as_str()
        };

        let fields = TemplateFields {
            current: fit_track(&snapshot.current, self.widths.current, &fit),
            next: fit_track(&snapshot.next, self.widths.next, &fit),
            queue1: fit_track(&snapshot.queued[0], self.widths.queued, &fit),
            queue2: fit_track(&snapshot.queued[1], self.widths.queued, &fit),
            reminder,
        };
        fill_template(&self.template, &fields)
    }
}

fn fit_track(track: &TrackRef, width: f32, fit: &dyn Fn(&str, f32) -> String) -> TrackRef {
    TrackRef {
        artist: fit(&track.artist, width),
        title: fit(&track.title, width),
    }
}

struct TemplateFields<'a> {
    current: TrackRef,
    next: TrackRef,
    queue1: TrackRef,
    queue2: TrackRef,
    reminder: &'a str,
}

impl TemplateFields<'_> {
    fn lookup(&self, key: &str) -> Option<&str> {
        let value = match key {
            "current_title" => &self.current.title,
            "current_artist" => &self.current.artist,
            "next_title" => &self.next.title,
            "next_artist" => &self.next.artist,
            "queue1_title" => &self.queue1.title,
            "queue1_artist" => &self.queue1.artist,
            "queue2_title" => &self.queue2.title,
            "queue2_artist" => &self.queue2.artist,
            "reminder" => return Some(self.reminder),
            _ => return None,
        };
        Some(value.as_str())
    }
}

// Single pass, so braces inside substituted values are never expanded again.
fn fill_template(template: &str, fields: &TemplateFields<'_>) -> String {
    let mut out = String::with_capacity(template.len() + 128);
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => match fields.lookup(&after[..close]) {
                Some(value) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            },
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
