use serde::{Deserialize, Serialize};

/// Seed row of the tracked catalog: symbol, display name, opening price, opening volume.
pub struct CatalogEntry {
    pub symbol: &'static str,
    pub name: &'static str,
    pub price: f64,
    pub volume: u64,
}

const fn entry(symbol: &'static str, name: &'static str, price: f64, volume: u64) -> CatalogEntry {
    CatalogEntry {
        symbol,
        name,
        price,
        volume,
    }
}

/// PSEi constituents, kept in ascending symbol order.
pub const CATALOG: [CatalogEntry; 30] = [
    entry("AC", "Ayala Corporation", 800.0, 100_000),
    entry("ACEN", "ACEN Corporation", 6.0, 50_000),
    entry("ALI", "Ayala Land, Inc.", 30.0, 120_000),
    entry("AP", "Aboitiz Power Corporation", 35.0, 90_000),
    entry("AREIT", "AREIT, Inc.", 35.0, 80_000),
    entry("BDO", "BDO Unibank, Inc.", 145.0, 110_000),
    entry("BLOOM", "Bloomberry Resorts Corporation", 10.0, 95_000),
    entry("BPI", "Bank of the Philippine Islands", 112.0, 98_000),
    entry("CNVRG", "Converge ICT Solutions, Inc.", 15.0, 70_000),
    entry("DMC", "DMCI Holdings, Inc.", 9.0, 60_000),
    entry("EMP", "Emperador Inc.", 20.0, 65_000),
    entry("GLO", "Globe Telecom, Inc.", 1890.0, 34_000),
    entry("GTCAP", "GT Capital Holdings, Inc.", 500.0, 30_000),
    entry(
        "ICT",
        "International Container Terminal Services, Inc.",
        200.0,
        40_000,
    ),
    entry("JFC", "Jollibee Foods Corporation", 245.0, 78_000),
    entry("LTG", "LT Group, Inc.", 10.0, 50_000),
    entry("MBT", "Metropolitan Bank & Trust Company", 56.0, 156_000),
    entry("MEG", "Megaworld Corporation", 2.0, 80_000),
    entry("MER", "Manila Electric Company", 350.0, 25_000),
    entry("MONDE", "Monde Nissin Corporation", 10.0, 40_000),
    entry("MPI", "Metro Pacific Investments Corporation", 5.0, 60_000),
    entry("PGOLD", "Puregold Price Club, Inc.", 30.0, 40_000),
    entry("RRHI", "Robinsons Retail Holdings, Inc.", 50.0, 35_000),
    entry("SECB", "Security Bank Corporation", 80.0, 30_000),
    entry("SM", "SM Investments Corporation", 1025.0, 125_000),
    entry("SMC", "San Miguel Corporation", 98.0, 234_000),
    entry("SMPH", "SM Prime Holdings, Inc.", 35.0, 90_000),
    entry("TEL", "PLDT Inc.", 1234.0, 45_000),
    entry("URC", "Universal Robina Corporation", 134.0, 67_000),
    entry("WLCON", "Wilcon Depot, Inc.", 25.0, 30_000),
];

/// Live market-like state of one tracked equity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub percent_change: f64,
    pub volume: u64,
    #[serde(rename = "lastUpdated")]
    pub last_updated_ms: u64,
}

impl Instrument {
    pub fn from_catalog(entry: &CatalogEntry, timestamp_ms: u64) -> Self {
        Self {
            symbol: entry.symbol.to_string(),
            name: entry.name.to_string(),
            price: entry.price,
            change: 0.0,
            percent_change: 0.0,
            volume: entry.volume,
            last_updated_ms: timestamp_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_sorted_and_unique() {
        let symbols: Vec<_> = CATALOG.iter().map(|entry| entry.symbol).collect();
        let mut sorted = symbols.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(symbols, sorted, "catalog must be unique and ascending");
    }

    #[test]
    fn seed_prices_are_positive() {
        assert!(CATALOG.iter().all(|entry| entry.price > 0.0));
    }

    #[test]
    fn instrument_serializes_with_camel_case_fields() {
        let instrument = Instrument::from_catalog(&CATALOG[0], 1_700_000_000_000);
        let value = serde_json::to_value(&instrument).expect("serialize instrument");
        assert_eq!(value["symbol"], "AC");
        assert_eq!(value["percentChange"], 0.0);
        assert_eq!(value["lastUpdated"], 1_700_000_000_000u64);
    }
}
