//! Carrier identity and tracking-number normalization.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Prefix the table carrier expects on every consignment number.
pub const TPC_PREFIX: &str = "MAA";

/// The courier a consignment was booked with.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Carrier {
  /// Server-rendered form carrier; batched postbacks, HTML result table.
  Tpc,
  /// JSON proxy carrier; one tracking number per request.
  Franch,
}

impl Carrier {
  pub const ALL: [Carrier; 2] = [Carrier::Tpc, Carrier::Franch];

  /// The discriminant stored in the database and used in URLs.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Tpc => "tpc",
      Self::Franch => "franch",
    }
  }
}

impl fmt::Display for Carrier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Carrier {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "tpc" => Ok(Self::Tpc),
      "franch" => Ok(Self::Franch),
      _ => Err(Error::UnknownCarrier(s.to_owned())),
    }
  }
}

/// Canonicalise a raw consignment number for `carrier`.
///
/// Whitespace and punctuation are stripped and letters upper-cased. Table
/// carrier numbers that start with a digit get [`TPC_PREFIX`] prepended and
/// must then read `MAA<digits>`; JSON-proxy carrier numbers must be all
/// digits.
pub fn normalize_tracking_no(carrier: Carrier, raw: &str) -> Result<String> {
  let cleaned: String = raw
    .chars()
    .filter(char::is_ascii_alphanumeric)
    .map(|c| c.to_ascii_uppercase())
    .collect();

  let invalid = || Error::InvalidTrackingNo { carrier, raw: raw.to_owned() };

  if cleaned.is_empty() {
    return Err(invalid());
  }

  match carrier {
    Carrier::Tpc => {
      let prefixed = if cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        format!("{TPC_PREFIX}{cleaned}")
      } else {
        cleaned
      };
      let digits = prefixed.strip_prefix(TPC_PREFIX).ok_or_else(invalid)?;
      if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
      }
      Ok(prefixed)
    }
    Carrier::Franch => {
      if cleaned.bytes().all(|b| b.is_ascii_digit()) {
        Ok(cleaned)
      } else {
        Err(invalid())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn carrier_parses_case_insensitively() {
    assert_eq!("TPC".parse::<Carrier>().unwrap(), Carrier::Tpc);
    assert_eq!(" franch ".parse::<Carrier>().unwrap(), Carrier::Franch);
    assert!("dhl".parse::<Carrier>().is_err());
  }

  #[test]
  fn tpc_numbers_are_prefixed_and_uppercased() {
    assert_eq!(
      normalize_tracking_no(Carrier::Tpc, " 709470809 ").unwrap(),
      "MAA709470809"
    );
    assert_eq!(
      normalize_tracking_no(Carrier::Tpc, "maa-709470809").unwrap(),
      "MAA709470809"
    );
  }

  #[test]
  fn tpc_rejects_foreign_prefixes() {
    assert!(normalize_tracking_no(Carrier::Tpc, "BOM12345").is_err());
    assert!(normalize_tracking_no(Carrier::Tpc, "MAA").is_err());
    assert!(normalize_tracking_no(Carrier::Tpc, "MAA12X4").is_err());
    assert!(normalize_tracking_no(Carrier::Tpc, "  ").is_err());
  }

  #[test]
  fn franch_numbers_must_be_numeric() {
    assert_eq!(
      normalize_tracking_no(Carrier::Franch, "1234 5678").unwrap(),
      "12345678"
    );
    assert!(normalize_tracking_no(Carrier::Franch, "MAA1").is_err());
  }
}
