//! Serde helpers for MAC addresses as colon-separated strings.

/// Required MAC address.
pub mod string {
    use macaddr::MacAddr6;
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(mac: &MacAddr6, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&mac.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<MacAddr6, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MacAddr6::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Nullable MAC address. Empty strings read as `None`.
pub mod option_string {
    use macaddr::MacAddr6;
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(mac: &Option<MacAddr6>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match mac {
            Some(mac) => serializer.serialize_str(&mac.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<MacAddr6>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        match s.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => MacAddr6::from_str(s)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// MAC address without separators, as used in IPMI host names and
/// management interface names.
pub fn compact(mac: &macaddr::MacAddr6) -> String {
    mac.to_string().replace(':', "")
}
