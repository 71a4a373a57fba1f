//! Vendor error code to SQLSTATE mapping for server-reported SQL errors.

pub const DEFAULT_SQLSTATE: &str = "99999";

const CODE_PREFIXES: [&str; 2] = ["ORA-", "SQL-"];
const CODE_LEN: usize = 9;

/// Inclusive vendor-code ranges and their SQLSTATE class.
const RANGES: &[(u32, u32, &str)] = &[
    (0, 0, "00000"),
    (1, 1, "23000"),
    (18, 35, "61000"),
    (50, 68, "61000"),
    (100, 120, "62000"),
    (150, 159, "63000"),
    (200, 369, "64000"),
    (370, 429, "60000"),
    (430, 439, "67000"),
    (440, 569, "62000"),
    (570, 599, "69000"),
    (600, 899, "60000"),
    (1000, 1099, "72000"),
    (1100, 1250, "64000"),
    (1400, 1423, "72000"),
    (1424, 1424, "22025"),
    (1425, 1426, "72000"),
    (1427, 1427, "21000"),
    (1428, 1478, "72000"),
    (1479, 1480, "22024"),
    (1481, 1489, "72000"),
    (1495, 1699, "72000"),
    (1800, 1899, "22008"),
    (2091, 2092, "40000"),
    (2112, 2112, "21000"),
    (2121, 2121, "08003"),
    (2126, 2126, "07008"),
    (2128, 2128, "63000"),
    (2290, 2299, "23000"),
    (2376, 2399, "61000"),
    (2400, 2419, "72000"),
    (2425, 2449, "72000"),
    (2700, 2899, "63000"),
    (3000, 3099, "0A000"),
    (3100, 3199, "63000"),
    (4020, 4039, "61000"),
    (4060, 4069, "72000"),
    (6000, 6149, "66000"),
    (6200, 6249, "63000"),
    (6250, 6429, "66000"),
    (6430, 6449, "60000"),
    (6500, 6599, "65000"),
    (6600, 6999, "66000"),
    (7000, 7199, "69000"),
    (7200, 7999, "60000"),
    (9700, 9999, "60000"),
    (10000, 10999, "90000"),
    (12100, 12299, "66000"),
    (12500, 12599, "66000"),
];

/// Extracts the `ORA-nnnnn` / `SQL-nnnnn` token from an error message.
pub fn vendor_code(message: &str) -> Option<u32> {
    CODE_PREFIXES.iter().find_map(|prefix| {
        let start = message.find(prefix)?;
        let token = message.get(start..start + CODE_LEN)?;
        token[prefix.len()..].parse().ok()
    })
}

pub fn sql_state_for(code: u32) -> &'static str {
    RANGES
        .iter()
        .find(|(low, high, _)| (*low..=*high).contains(&code))
        .map(|(_, _, state)| *state)
        .unwrap_or(DEFAULT_SQLSTATE)
}

/// SQLSTATE and vendor code for a server message; messages without a
/// recognizable code map to the default state and vendor code 0.
pub fn state_and_vendor_code(message: &str) -> (&'static str, u32) {
    match vendor_code(message) {
        Some(code) => (sql_state_for(code), code),
        None => (DEFAULT_SQLSTATE, 0),
    }
}
