/// Menus shorter than this (in characters, after trimming) need a keyword
/// marker to count as a real menu.
pub const MIN_MENU_CHARS: usize = 50;

/// Currency symbols count wherever they appear.
const PRICE_SYMBOLS: &[char] = &['$', '€', '£'];

/// Words that only count as whole words, so "maintenance" is not "main".
const MENU_WORDS: &[&str] = &[
    "price", "prices", "dish", "dishes", "appetizer", "appetizers", "entree", "entrees",
    "entrée", "entrées", "main", "mains", "dessert", "desserts", "drink", "drinks", "special",
    "specials",
];

/// Whether the menu document carries enough content to recommend from.
pub fn menu_available(menu: Option<&str>) -> bool {
    let Some(menu) = menu.map(str::trim).filter(|m| !m.is_empty()) else {
        return false;
    };
    if menu.chars().count() >= MIN_MENU_CHARS {
        return true;
    }
    if menu.contains(PRICE_SYMBOLS) {
        return true;
    }
    let lower = menu.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| MENU_WORDS.contains(&word))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_menu_is_unavailable() {
        assert!(!menu_available(None));
        assert!(!menu_available(Some("  \n ")));
    }

    #[test]
    fn short_menu_without_markers_is_unavailable() {
        assert!(!menu_available(Some("coming soon")));
        assert!(!menu_available(Some("TBD")));
    }

    #[test]
    fn placeholder_notices_are_unavailable() {
        assert!(!menu_available(Some("Menu coming soon")));
        assert!(!menu_available(Some("Menu unavailable")));
        assert!(!menu_available(Some("Kitchen maintenance")));
    }

    #[test]
    fn short_menu_with_marker_is_available() {
        assert!(menu_available(Some("Pho bo $9")));
        assert!(menu_available(Some("Today's SPECIAL: ramen")));
        assert!(menu_available(Some("Mains: com tam, bun bo")));
    }

    #[test]
    fn long_menu_is_available_without_markers() {
        let menu = "Pho bo, bun cha, banh mi, goi cuon, com tam, ca phe sua da, che ba mau";
        assert!(menu.chars().count() >= MIN_MENU_CHARS);
        assert!(menu_available(Some(menu)));
    }

    #[test]
    fn threshold_counts_chars_not_bytes() {
        // 30 two-byte chars: 60 bytes but under the threshold
        let menu = "ăăăăăăăăăăăăăăăăăăăăăăăăăăăăăă";
        assert!(menu.len() >= MIN_MENU_CHARS);
        assert!(!menu_available(Some(menu)));
    }
}
