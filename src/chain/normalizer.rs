//! Display name to canonical underlying symbol mapping.

/// Index display names that do not reduce to their trading symbol by
/// dropping whitespace.
const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("NIFTY 50", "NIFTY"),
    ("NIFTY BANK", "BANKNIFTY"),
    ("BANK NIFTY", "BANKNIFTY"),
    ("NIFTY FIN SERVICE", "FINNIFTY"),
    ("NIFTY FINANCIAL SERVICES", "FINNIFTY"),
    ("NIFTY MID SELECT", "MIDCPNIFTY"),
    ("NIFTY MIDCAP SELECT", "MIDCPNIFTY"),
    ("NIFTY NEXT 50", "NIFTYNXT50"),
    ("BSE SENSEX", "SENSEX"),
    ("SENSEX 50", "SENSEX50"),
    ("BSE BANKEX", "BANKEX"),
];

/// Maps a human display name to the canonical underlying symbol.
///
/// Whitespace is collapsed and case folded before the lookup; names outside
/// the table become the uppercase name with whitespace removed.
#[must_use]
pub fn normalize_underlying(display_name: &str) -> String {
    let collapsed = display_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase();

    DISPLAY_NAMES
        .iter()
        .find(|(name, _)| *name == collapsed)
        .map(|(_, symbol)| (*symbol).to_string())
        .unwrap_or_else(|| collapsed.replace(' ', ""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_display_names() {
        assert_eq!(normalize_underlying("NIFTY BANK"), "BANKNIFTY");
        assert_eq!(normalize_underlying("NIFTY 50"), "NIFTY");
        assert_eq!(normalize_underlying("NIFTY FIN SERVICE"), "FINNIFTY");
        assert_eq!(normalize_underlying("NIFTY MID SELECT"), "MIDCPNIFTY");
        assert_eq!(normalize_underlying("BSE SENSEX"), "SENSEX");
    }

    #[test]
    fn test_case_and_whitespace_are_ignored() {
        assert_eq!(normalize_underlying("  nifty   bank "), "BANKNIFTY");
        assert_eq!(normalize_underlying("Nifty\t50"), "NIFTY");
    }

    #[test]
    fn test_canonical_symbols_pass_through() {
        assert_eq!(normalize_underlying("BANKNIFTY"), "BANKNIFTY");
        assert_eq!(normalize_underlying("nifty"), "NIFTY");
        assert_eq!(normalize_underlying("SENSEX"), "SENSEX");
    }

    #[test]
    fn test_unknown_names_drop_whitespace() {
        assert_eq!(normalize_underlying("Crude Oil"), "CRUDEOIL");
        assert_eq!(normalize_underlying("natural gas"), "NATURALGAS");
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(normalize_underlying("   "), "");
    }
}
