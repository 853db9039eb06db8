//! Item category vocabulary shared by the report form and the listing.

/// Category used whenever nothing more specific is known.
pub const DEFAULT_CATEGORY: &str = "Other";

/// Minimum detector confidence for a label to pick a category.
pub const DETECTION_CONFIDENCE_THRESHOLD: f64 = 0.65;

/// Detector labels grouped by the category they report under.
pub const CATEGORY_LABELS: &[(&str, &[&str])] = &[
    (
        "Electronics",
        &["cell phone", "laptop", "keyboard", "mouse", "remote", "tv", "monitor"],
    ),
    (
        "Accessories",
        &[
            "backpack", "handbag", "tie", "suitcase", "umbrella", "wallet", "sunglasses", "watch",
        ],
    ),
    (
        "Clothing",
        &["shirt", "pants", "shoes", "hat", "jacket", "coat", "dress", "skirt"],
    ),
    (
        "Sports Equipment",
        &[
            "sports ball",
            "baseball bat",
            "baseball glove",
            "skateboard",
            "surfboard",
            "tennis racket",
            "frisbee",
            "skis",
            "snowboard",
        ],
    ),
    ("Utils", &["book", "scissors", "pen", "pencil"]),
    (
        "Personal",
        &[
            "toothbrush",
            "hair drier",
            "bottle",
            "cup",
            "wine glass",
            "fork",
            "knife",
            "spoon",
        ],
    ),
    ("Keys/Cards", &["keys", "card"]),
    (DEFAULT_CATEGORY, &[]),
];

/// All category names in display order.
pub fn known_categories() -> impl Iterator<Item = &'static str> {
    CATEGORY_LABELS.iter().map(|(category, _)| *category)
}

/// Maps a detector label to a category, falling back to [`DEFAULT_CATEGORY`]
/// when the label is unknown or the detection is below `threshold`.
pub fn category_for_detection(label: &str, confidence: f64, threshold: f64) -> &'static str {
    if confidence < threshold {
        return DEFAULT_CATEGORY;
    }

    let label = label.trim();
    CATEGORY_LABELS
        .iter()
        .find(|(_, labels)| labels.iter().any(|known| known.eq_ignore_ascii_case(label)))
        .map(|(category, _)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}

/// Trims a free-form category and substitutes the default for blanks.
pub fn normalize_category(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}
