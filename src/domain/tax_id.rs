//! Polish business identifiers (NIP, REGON) with checksum validation.
//!
//! Customer records for companies carry a NIP (tax number) and optionally a
//! REGON (statistical number). Both are validated before a customer draft is
//! sent anywhere, so an invalid number never reaches the cache.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

const NIP_WEIGHTS: [u32; 9] = [6, 5, 7, 2, 3, 4, 5, 6, 7];
const REGON9_WEIGHTS: [u32; 8] = [8, 9, 2, 3, 4, 5, 6, 7];
const REGON14_WEIGHTS: [u32; 13] = [2, 4, 8, 5, 0, 9, 7, 3, 6, 1, 2, 4, 8];

/// Validated 10-digit NIP, stored without separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Nip(String);

impl Nip {
    /// Parse a NIP, accepting `-` and space separators and an optional `PL`
    /// prefix.
    ///
    /// # Errors
    ///
    /// Returns a [`DomainError`] on bad characters, length, or checksum.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let trimmed = input.trim();
        let trimmed = trimmed
            .strip_prefix("PL")
            .or_else(|| trimmed.strip_prefix("pl"))
            .unwrap_or(trimmed);
        let digits = digits("NIP", trimmed)?;
        if digits.len() != 10 {
            return Err(DomainError::InvalidLength {
                kind: "NIP",
                expected: "10",
                actual: digits.len(),
            });
        }

        let sum = weighted_sum(&digits, &NIP_WEIGHTS);
        let check = sum % 11;
        if check == 10 || check != digits[9] {
            return Err(DomainError::InvalidChecksum { kind: "NIP" });
        }

        Ok(Self(to_string(&digits)))
    }

    /// Digits without separators.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 123-456-32-18
        let s = &self.0;
        write!(f, "{}-{}-{}-{}", &s[0..3], &s[3..6], &s[6..8], &s[8..10])
    }
}

impl TryFrom<String> for Nip {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Nip> for String {
    fn from(value: Nip) -> Self {
        value.0
    }
}

/// Validated 9- or 14-digit REGON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Regon(String);

impl Regon {
    /// Parse a REGON. The 14-digit (local unit) form must also carry a valid
    /// 9-digit prefix.
    ///
    /// # Errors
    ///
    /// Returns a [`DomainError`] on bad characters, length, or checksum.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let digits = digits("REGON", input.trim())?;
        match digits.len() {
            9 => {
                check_regon(&digits, &REGON9_WEIGHTS)?;
            }
            14 => {
                check_regon(&digits[..9], &REGON9_WEIGHTS)?;
                check_regon(&digits, &REGON14_WEIGHTS)?;
            }
            actual => {
                return Err(DomainError::InvalidLength {
                    kind: "REGON",
                    expected: "9 or 14",
                    actual,
                })
            }
        }
        Ok(Self(to_string(&digits)))
    }

    /// Digits without separators.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the 14-digit local-unit form.
    #[must_use]
    pub fn is_local_unit(&self) -> bool {
        self.0.len() == 14
    }
}

impl fmt::Display for Regon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Regon {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Regon> for String {
    fn from(value: Regon) -> Self {
        value.0
    }
}

fn digits(kind: &'static str, input: &str) -> Result<Vec<u32>, DomainError> {
    let mut out = Vec::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '-' | ' ' => continue,
            _ => match c.to_digit(10) {
                Some(d) => out.push(d),
                None => return Err(DomainError::InvalidCharacter { kind, found: c }),
            },
        }
    }
    Ok(out)
}

fn weighted_sum(digits: &[u32], weights: &[u32]) -> u32 {
    digits.iter().zip(weights).map(|(d, w)| d * w).sum()
}

fn check_regon(digits: &[u32], weights: &[u32]) -> Result<(), DomainError> {
    // Check digit 10 maps to 0 for REGON.
    let check = weighted_sum(digits, weights) % 11 % 10;
    if check == digits[digits.len() - 1] {
        Ok(())
    } else {
        Err(DomainError::InvalidChecksum { kind: "REGON" })
    }
}

fn to_string(digits: &[u32]) -> String {
    digits
        .iter()
        .filter_map(|d| char::from_digit(*d, 10))
        .collect()
}
