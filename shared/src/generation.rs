use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

use crate::heroes::SUPERHEROES;
use crate::validation::{parse_style, validate_hero, validate_image_url};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, AsRefStr, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArtStyle {
    #[default]
    Realistic,
    Comic,
    Anime,
}

impl ArtStyle {
    pub const fn modifier(&self) -> &'static str {
        match self {
            Self::Realistic => "photorealistic, cinematic lighting, detailed",
            Self::Comic => "comic book style, bold colors, dynamic pose, Marvel Comics art",
            Self::Anime => "anime style, vibrant colors, Japanese animation aesthetic",
        }
    }
}

/// Modifier text for a raw style name. Unknown names get the realistic text.
pub fn style_modifier(style: &str) -> &'static str {
    style
        .parse::<ArtStyle>()
        .unwrap_or_default()
        .modifier()
}

pub fn hero_prompt(hero: &str) -> String {
    format!(
        "Transform the uploaded person into {}. Keep the person's identity and face recognizable. \
         High quality, cinematic lighting, detailed costume, realistic. No nudity. No gore.",
        hero
    )
}

/// Fixed template plus style modifier. Nothing user-typed reaches the prompt
/// besides an allowlisted hero name.
pub fn build_prompt(hero: &str, style: &str) -> String {
    format!("{} {}", hero_prompt(hero), style_modifier(style))
}

// === API Types ===

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub selected_hero: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// A generate request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOrder {
    pub image_url: String,
    pub hero: String,
    pub style: ArtStyle,
    pub seed: Option<u64>,
}

impl GenerationOrder {
    pub fn prompt(&self) -> String {
        build_prompt(&self.hero, self.style.as_ref())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Image URL is required. Please provide a public HTTPS image URL.")]
    MissingImageUrl,
    #[error("Image URL must be a public HTTPS URL (e.g. from ImgBB, Imgur).")]
    InsecureImageUrl,
    #[error("Selected hero is required")]
    MissingHero,
    #[error("Invalid hero. Must be one of: {}", SUPERHEROES.join(", "))]
    UnknownHero,
    #[error("Invalid style. Must be: realistic, comic, or anime")]
    InvalidStyle,
}

impl GenerateRequest {
    /// Checks fields in a fixed order and reports the first problem.
    pub fn validate(&self, allow_insecure_urls: bool) -> Result<GenerationOrder, RequestError> {
        let image_url = match self.image_url.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => return Err(RequestError::MissingImageUrl),
        };
        validate_image_url(image_url, allow_insecure_urls).map_err(|_| RequestError::InsecureImageUrl)?;

        let hero = match self.selected_hero.as_deref() {
            Some(hero) if !hero.is_empty() => hero,
            _ => return Err(RequestError::MissingHero),
        };
        validate_hero(hero).map_err(|_| RequestError::UnknownHero)?;

        let style = match self.style.as_deref() {
            None => ArtStyle::default(),
            Some(raw) => parse_style(raw).map_err(|_| RequestError::InvalidStyle)?,
        };

        Ok(GenerationOrder {
            image_url: image_url.to_string(),
            hero: hero.to_string(),
            style,
            seed: self.seed,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub image_url: String,
    pub filename: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}
