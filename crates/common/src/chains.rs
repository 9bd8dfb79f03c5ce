//! Static allow-lists: chains offered by the chain selector and the relay
//! addresses whose traffic the dashboard counts.

use crate::error::ValidationError;

/// Selector value meaning "no chain filter".
pub const ALL_CHAINS: &str = "All";

/// Chains offered by the chain selector, in display order.
pub const CHAIN_OPTIONS: &[&str] = &[
    "Ethereum",
    "Agoric",
    "Arbitrum",
    "Archway",
    "Avalanche",
    "Babylon",
    "Base",
    "Binance",
    "Blast",
    "C4e",
    "Celestia",
    "Celo",
    "Chihuahua",
    "Comdex",
    "Carbon",
    "Crescent",
    "Cosmoshub",
    "Elys",
    "Evmos",
    "Fetch",
    "Fantom",
    "Filecoin",
    "Fraxtal",
    "Immutable",
    "Injective",
    "Juno",
    "Kava",
    "Kujira",
    "Lava",
    "Linea",
    "Mantle",
    "Moonbeam",
    "Neutron",
    "Nolus",
    "Optimism",
    "Osmosis",
    "Persistence",
    "Polygon",
    "Regen",
    "Saga",
    "Scroll",
    "Sei",
    "Sommelier",
    "Stargaze",
    "Stride",
    "Teritori",
    "Terra",
    "Terra-2",
    "Umee",
    "Secret",
    "Secret-snip",
    "Xpla",
    "Xion",
    "Xrol-evm",
];

/// A relay contract the bridge routes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayAddress {
    pub label: &'static str,
    pub address: &'static str,
}

/// The bridge's own relay addresses. Only transfers sent through one of these count.
pub const RELAY_ADDRESSES: &[RelayAddress] = &[
    RelayAddress {
        label: "Squid",
        address: "0xce16F69375520ab01377ce7B88f5BA8C48F8D666",
    },
    RelayAddress {
        label: "Squid-blast",
        address: "0x492751eC3c57141deb205eC2da8bFcb410738630",
    },
    RelayAddress {
        label: "Squid-fraxtal",
        address: "0xDC3D8e1Abe590BCa428a8a2FC4CfDbD1AcF57Bd9",
    },
    RelayAddress {
        label: "Squid coral",
        address: "0xdf4fFDa22270c12d0b5b3788F1669D709476111E",
    },
    RelayAddress {
        label: "Squid coral hub",
        address: "0xe6B3949F9bBF168f4E3EFc82bc8FD849868CC6d8",
    },
];

/// Resolve a selector value to its canonical chain name.
///
/// Matching is case-insensitive. `"All"` (or an empty value) means no filter.
pub fn canonical(chain: &str) -> Result<Option<&'static str>, ValidationError> {
    let chain = chain.trim();
    if chain.is_empty() || chain.eq_ignore_ascii_case(ALL_CHAINS) {
        return Ok(None);
    }
    CHAIN_OPTIONS
        .iter()
        .find(|c| c.eq_ignore_ascii_case(chain))
        .map(|c| Some(*c))
        .ok_or_else(|| ValidationError::UnknownChain(chain.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_is_case_insensitive() {
        assert_eq!(canonical("OSMOSIS").unwrap(), Some("Osmosis"));
        assert_eq!(canonical("terra-2").unwrap(), Some("Terra-2"));
    }

    #[test]
    fn test_all_and_empty_mean_no_filter() {
        assert_eq!(canonical("all").unwrap(), None);
        assert_eq!(canonical("").unwrap(), None);
    }

    #[test]
    fn test_chain_options_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for c in CHAIN_OPTIONS {
            assert!(seen.insert(c.to_ascii_lowercase()), "duplicate chain {c}");
        }
    }

    #[test]
    fn test_relay_addresses_look_like_evm_addresses() {
        for relay in RELAY_ADDRESSES {
            assert!(relay.address.starts_with("0x"), "{}", relay.label);
            assert_eq!(relay.address.len(), 42, "{}", relay.label);
        }
    }
}
