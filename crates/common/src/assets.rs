//! Raw asset code → display symbol mapping.
//!
//! Total: codes without an entry display as themselves. Several codes may map
//! to the same symbol.

use crate::query::fragments::quote_literal;

/// Exact raw-code matches, sorted by code.
pub const ASSET_SYMBOLS: &[(&str, &str)] = &[
    ("arb-wei", "ARB"),
    ("avalanche-uusdc", "Avalanche USDC"),
    ("avax-wei", "AVAX"),
    ("bnb-wei", "BNB"),
    ("busd-wei", "BUSD"),
    ("cbeth-wei", "cbETH"),
    ("cusd-wei", "cUSD"),
    ("dai-wei", "DAI"),
    ("dot-planck", "DOT"),
    ("eeur", "EURC"),
    ("ern-wei", "ERN"),
    ("eth-wei", "ETH"),
    (
        "factory/sei10hud5e5er4aul2l7sp2u9qp2lag5u4xf8mvyx38cnjvqhlgsrcls5qn5ke/seilor",
        "SEILOR",
    ),
    ("fil-wei", "FIL"),
    ("frax-wei", "FRAX"),
    ("ftm-wei", "FTM"),
    ("glmr-wei", "GLMR"),
    ("hzn-wei", "HZN"),
    ("link-wei", "LINK"),
    ("matic-wei", "MATIC"),
    ("mkr-wei", "MKR"),
    ("mpx-wei", "MPX"),
    ("oath-wei", "OATH"),
    ("op-wei", "OP"),
    ("orbs-wei", "ORBS"),
    ("pepe-wei", "PEPE"),
    ("polygon-uusdc", "Polygon USDC"),
    ("reth-wei", "rETH"),
    ("ring-wei", "RING"),
    ("shib-wei", "SHIB"),
    ("sonne-wei", "SONNE"),
    ("stuatom", "stATOM"),
    ("uatom", "ATOM"),
    ("uaxl", "AXL"),
    ("ukuji", "KUJI"),
    ("ulava", "LAVA"),
    ("uluna", "LUNA"),
    ("ungm", "NGM"),
    ("uni-wei", "UNI"),
    ("uosmo", "OSMO"),
    ("usomm", "SOMM"),
    ("ustrd", "STRD"),
    ("utia", "TIA"),
    ("uumee", "UMEE"),
    ("uusd", "USTC"),
    ("uusdc", "USDC"),
    ("uusdt", "USDT"),
    ("vela-wei", "VELA"),
    ("wavax-wei", "WAVAX"),
    ("wbnb-wei", "WBNB"),
    ("wbtc-satoshi", "WBTC"),
    ("weth-wei", "WETH"),
    ("wfil-wei", "WFIL"),
    ("wftm-wei", "WFTM"),
    ("wglmr-wei", "WGLMR"),
    ("wmai-wei", "WMAI"),
    ("wmatic-wei", "WMATIC"),
    ("wsteth-wei", "wstETH"),
    ("yield-eth-wei", "yieldETH"),
];

/// Case-insensitive prefix matches, checked after the exact table.
pub const ASSET_PREFIX_SYMBOLS: &[(&str, &str)] = &[("factory/sei10hub", "SEILOR")];

/// Display symbol for a raw asset code, or the code itself when unmapped.
pub fn display_symbol(raw: &str) -> &str {
    if let Ok(i) = ASSET_SYMBOLS.binary_search_by(|(code, _)| (*code).cmp(raw)) {
        return ASSET_SYMBOLS[i].1;
    }
    ASSET_PREFIX_SYMBOLS
        .iter()
        .find(|(prefix, _)| {
            raw.len() >= prefix.len()
                && raw.is_char_boundary(prefix.len())
                && raw[..prefix.len()].eq_ignore_ascii_case(prefix)
        })
        .map_or(raw, |(_, symbol)| symbol)
}

/// Inline classification expression equivalent to [`display_symbol`] applied to `column`.
pub fn symbol_case_sql(column: &str) -> String {
    let mut sql = String::from("CASE");
    for (code, symbol) in ASSET_SYMBOLS {
        sql.push_str(&format!(
            "\n      WHEN {column} = {} THEN {}",
            quote_literal(code),
            quote_literal(symbol)
        ));
    }
    for (prefix, symbol) in ASSET_PREFIX_SYMBOLS {
        sql.push_str(&format!(
            "\n      WHEN {column} ILIKE {} THEN {}",
            quote_literal(&format!("{prefix}%")),
            quote_literal(symbol)
        ));
    }
    sql.push_str(&format!("\n      ELSE {column}\n    END"));
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_table_is_sorted_for_binary_search() {
        assert!(ASSET_SYMBOLS.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_every_mapped_code_displays_its_symbol() {
        for (code, symbol) in ASSET_SYMBOLS {
            assert_eq!(display_symbol(code), *symbol);
        }
    }

    #[test]
    fn test_unmapped_code_passes_through() {
        assert_eq!(display_symbol("axlusdc"), "axlusdc");
        assert_eq!(display_symbol(""), "");
    }

    #[test]
    fn test_prefix_rule_ignores_case() {
        assert_eq!(display_symbol("FACTORY/SEI10HUB/whatever"), "SEILOR");
        assert_eq!(display_symbol("factory/sei10hu"), "factory/sei10hu");
    }

    #[test]
    fn test_many_codes_to_one_symbol() {
        assert_eq!(display_symbol("factory/sei10hubXYZ"), "SEILOR");
        assert_eq!(
            display_symbol(
                "factory/sei10hud5e5er4aul2l7sp2u9qp2lag5u4xf8mvyx38cnjvqhlgsrcls5qn5ke/seilor"
            ),
            "SEILOR"
        );
    }

    #[test]
    fn test_case_sql_covers_table_and_falls_back() {
        let sql = symbol_case_sql("raw_asset");
        assert!(sql.starts_with("CASE"));
        assert!(sql.contains("WHEN raw_asset = 'uusdc' THEN 'USDC'"));
        assert!(sql.contains("WHEN raw_asset ILIKE 'factory/sei10hub%' THEN 'SEILOR'"));
        assert!(sql.trim_end().ends_with("ELSE raw_asset\n    END"));
        assert_eq!(
            sql.matches("WHEN").count(),
            ASSET_SYMBOLS.len() + ASSET_PREFIX_SYMBOLS.len()
        );
    }
}
