use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::{Error, Result};

/// A 6-octet device address, always rendered as lowercase colon-separated hex.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        MacAddress(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Accepts exactly `hh:hh:hh:hh:hh:hh` (any case) and nothing else.
    pub fn parse_strict(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() != 6 {
            return Err(Error::InvalidAddress(text.to_string()));
        }
        let mut octets = [0u8; 6];
        for (octet, part) in octets.iter_mut().zip(parts) {
            *octet = parse_pair(part).ok_or_else(|| Error::InvalidAddress(text.to_string()))?;
        }
        Ok(MacAddress(octets))
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    /// Lenient form: `:` or `-` separators, or twelve bare hex digits.
    fn from_str(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.contains(':') || trimmed.contains('-') {
            return MacAddress::parse_strict(&trimmed.replace('-', ":"))
                .map_err(|_| Error::InvalidAddress(text.to_string()));
        }
        if trimmed.len() != 12 || !trimmed.is_ascii() {
            return Err(Error::InvalidAddress(text.to_string()));
        }
        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            *octet = parse_pair(&trimmed[i * 2..i * 2 + 2])
                .ok_or_else(|| Error::InvalidAddress(text.to_string()))?;
        }
        Ok(MacAddress(octets))
    }
}

impl Display for MacAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(octets: [u8; 6]) -> Self {
        MacAddress(octets)
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Normalizes caller-supplied address text to lowercase colon form.
pub fn normalize(text: &str) -> Result<String> {
    text.parse::<MacAddress>().map(|address| address.to_string())
}

/// An address where any octet may be the `xx` placeholder.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AddressPattern([Option<u8>; 6]);

impl AddressPattern {
    pub fn is_exact(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    pub fn matches(&self, address: &MacAddress) -> bool {
        self.0
            .iter()
            .zip(address.octets())
            .all(|(expected, actual)| expected.is_none_or(|octet| octet == actual))
    }
}

impl FromStr for AddressPattern {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.trim().split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(Error::InvalidAddress(text.to_string()));
        }
        let mut octets = [None; 6];
        for (octet, part) in octets.iter_mut().zip(parts) {
            if part.eq_ignore_ascii_case("xx") {
                continue;
            }
            *octet = Some(parse_pair(part).ok_or_else(|| Error::InvalidAddress(text.to_string()))?);
        }
        Ok(AddressPattern(octets))
    }
}

impl From<MacAddress> for AddressPattern {
    fn from(address: MacAddress) -> Self {
        AddressPattern(address.octets().map(Some))
    }
}

/// True when `address` satisfies `pattern`. Unparseable input never matches.
pub fn matches(pattern: &str, address: &str) -> bool {
    match (pattern.parse::<AddressPattern>(), address.parse::<MacAddress>()) {
        (Ok(pattern), Ok(address)) => pattern.matches(&address),
        _ => false,
    }
}

fn parse_pair(part: &str) -> Option<u8> {
    if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(part, 16).ok()
}
