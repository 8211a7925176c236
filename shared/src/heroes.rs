use serde::Serialize;

/// Heroes available on the wheel, in segment order.
pub const SUPERHEROES: [&str; 16] = [
    "Spider-Man",
    "Iron Man",
    "Captain America",
    "Thor",
    "Hulk",
    "Black Panther",
    "Doctor Strange",
    "Wolverine",
    "Deadpool",
    "Black Widow",
    "Scarlet Witch",
    "Captain Marvel",
    "Ant-Man",
    "Vision",
    "Hawkeye",
    "Star-Lord",
];

/// Fallback emoji for labels without a dedicated glyph
pub const DEFAULT_HERO_EMOJI: &str = "🦸";

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct SegmentColor {
    pub background: &'static str,
    pub text: &'static str,
}

// Segment palette, cycled when there are more segments than colors
pub const WHEEL_COLORS: [SegmentColor; 16] = [
    SegmentColor { background: "#FF6B6B", text: "#FFFFFF" }, // Coral Red
    SegmentColor { background: "#4ECDC4", text: "#FFFFFF" }, // Teal
    SegmentColor { background: "#45B7D1", text: "#FFFFFF" }, // Sky Blue
    SegmentColor { background: "#96CEB4", text: "#1A1A2E" }, // Sage
    SegmentColor { background: "#FFEAA7", text: "#1A1A2E" }, // Soft Yellow
    SegmentColor { background: "#DDA0DD", text: "#1A1A2E" }, // Plum
    SegmentColor { background: "#98D8C8", text: "#1A1A2E" }, // Mint
    SegmentColor { background: "#F7DC6F", text: "#1A1A2E" }, // Gold
    SegmentColor { background: "#BB8FCE", text: "#FFFFFF" }, // Lavender
    SegmentColor { background: "#85C1E9", text: "#1A1A2E" }, // Light Blue
    SegmentColor { background: "#F8B500", text: "#1A1A2E" }, // Amber
    SegmentColor { background: "#FF8C94", text: "#FFFFFF" }, // Coral Pink
    SegmentColor { background: "#91EAE4", text: "#1A1A2E" }, // Aqua
    SegmentColor { background: "#FFD93D", text: "#1A1A2E" }, // Sunflower
    SegmentColor { background: "#C9B1FF", text: "#1A1A2E" }, // Periwinkle
    SegmentColor { background: "#6BCB77", text: "#FFFFFF" }, // Green
];

pub fn is_known_hero(name: &str) -> bool {
    SUPERHEROES.contains(&name)
}

pub fn segment_color(index: usize) -> SegmentColor {
    WHEEL_COLORS[index % WHEEL_COLORS.len()]
}

pub fn hero_emoji(name: &str) -> &'static str {
    match name {
        "Spider-Man" => "🕷️",
        "Iron Man" => "🤖",
        "Captain America" => "🛡️",
        "Thor" => "⚡",
        "Hulk" => "💪",
        "Black Panther" => "🐆",
        "Doctor Strange" => "🔮",
        "Wolverine" => "🐺",
        "Deadpool" => "💀",
        "Black Widow" => "🕸️",
        "Scarlet Witch" => "🔴",
        "Captain Marvel" => "⭐",
        "Ant-Man" => "🐜",
        "Vision" => "💎",
        "Hawkeye" => "🏹",
        "Star-Lord" => "🎧",
        _ => DEFAULT_HERO_EMOJI,
    }
}
