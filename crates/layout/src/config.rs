use serde::Deserialize;

/// Metrics used to estimate heights before (or instead of) host measurement.
///
/// All lengths are CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Body font size. Defaults to `14`.
    pub font_size: f32,
    /// Line height as a multiple of the font size. Defaults to `1.5`.
    pub line_height: f32,
    /// Average glyph advance as a fraction of the font size, used for wrap
    /// estimation. Defaults to `0.55`.
    pub glyph_width_ratio: f32,
    /// Inner padding on every side of a grid cell. Defaults to `8`.
    pub cell_padding: f32,
    /// Floor for every grid row, including rows fully covered by spans.
    /// Defaults to `24`.
    pub min_row_height: f32,
    /// Height reserved for an image that has not arrived yet. Defaults to `120`.
    pub image_placeholder_height: f32,
    /// Height of the error indicator drawn for a failed image. Defaults to `48`.
    pub image_error_height: f32,
    /// Upper bound on how far an image may be scaled up to fill its cell.
    /// Defaults to `1.0` (never upscale).
    pub image_max_scale: f32,
    /// Section titles are set at `font_size × title_scale`. Defaults to `1.25`.
    pub title_scale: f32,
    pub section_padding_top: f32,
    pub section_padding_bottom: f32,
    /// Vertical space between consecutive blocks of a section.
    pub section_gap: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            font_size: 14.0,
            line_height: 1.5,
            glyph_width_ratio: 0.55,
            cell_padding: 8.0,
            min_row_height: 24.0,
            image_placeholder_height: 120.0,
            image_error_height: 48.0,
            image_max_scale: 1.0,
            title_scale: 1.25,
            section_padding_top: 16.0,
            section_padding_bottom: 16.0,
            section_gap: 12.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: LayoutConfig =
            serde_json::from_str(r#"{ "font_size": 18, "section_gap": 4 }"#).unwrap();
        assert_eq!(config.font_size, 18.0);
        assert_eq!(config.section_gap, 4.0);
        assert_eq!(config.min_row_height, LayoutConfig::default().min_row_height);
    }
}
