//! Cable colour conventions
//!
//! Switch port descriptions end with a parenthesised note naming the colour
//! of the patch cable, e.g. `lar0101 eno1 (rack 1 port: red)`. NetBox stores
//! cable colours as hex RGB.

/// Named cable colours and their NetBox hex values.
pub const CABLE_COLORS: &[(&str, &str)] = &[
    ("red", "f44336"),
    ("pink", "e91e63"),
    ("rose", "ffe4e1"),
    ("fuschia", "ff66ff"),
    ("purple", "9c27b0"),
    ("indigo", "3f51b5"),
    ("blue", "2196f3"),
    ("cyan", "00bcd4"),
    ("teal", "009688"),
    ("aqua", "00ffff"),
    ("green", "4caf50"),
    ("lime", "cddc39"),
    ("yellow", "ffeb3b"),
    ("amber", "ffc107"),
    ("orange", "ff9800"),
    ("brown", "795548"),
    ("grey", "9e9e9e"),
    ("black", "111111"),
    ("white", "ffffff"),
];

/// Hex value of a named colour.
pub fn color_hex(name: &str) -> Option<&'static str> {
    CABLE_COLORS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, hex)| *hex)
}

/// Cable colour encoded in a switch port description.
pub fn cable_color(description: &str) -> Option<&'static str> {
    let open = description.rfind('(')?;
    let note = &description[open + 1..];
    let note = &note[..note.find(')')?];
    let (_, after) = note.rsplit_once("port:")?;
    let name: String = after
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();

    color_hex(&name)
}
