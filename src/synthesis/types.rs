//! Data-type names to NeXus field types.
//!
//! Two tiers: the many spellings a channel may report (numpy-style, Tango
//! `Dev*`, python builtins) collapse to a canonical dtype, and each canonical
//! dtype maps to exactly one NeXus type.

use tracing::warn;

/// Canonical dtype of a plain string.
pub const STRING_DTYPE: &str = "string";

const DTYPE_ALIASES: &[(&str, &str)] = &[
    ("int", "int64"),
    ("long", "int64"),
    ("short", "int16"),
    ("char", STRING_DTYPE),
    ("float", "float64"),
    ("double", "float64"),
    ("boolean", "bool"),
    ("str", STRING_DTYPE),
    ("unicode", STRING_DTYPE),
    ("devboolean", "bool"),
    ("devuchar", "uint8"),
    ("devshort", "int16"),
    ("devushort", "uint16"),
    ("devlong", "int32"),
    ("devulong", "uint32"),
    ("devlong64", "int64"),
    ("devulong64", "uint64"),
    ("devfloat", "float32"),
    ("devdouble", "float64"),
    ("devstring", STRING_DTYPE),
    ("devencoded", "encoded"),
    ("devstate", STRING_DTYPE),
];

const NEXUS_TYPES: &[(&str, &str)] = &[
    ("int8", "NX_INT8"),
    ("int16", "NX_INT16"),
    ("int32", "NX_INT32"),
    ("int64", "NX_INT64"),
    ("uint8", "NX_UINT8"),
    ("uint16", "NX_UINT16"),
    ("uint32", "NX_UINT32"),
    ("uint64", "NX_UINT64"),
    ("float32", "NX_FLOAT32"),
    ("float64", "NX_FLOAT64"),
    ("bool", "NX_BOOLEAN"),
    (STRING_DTYPE, "NX_CHAR"),
    ("encoded", "NX_CHAR"),
];

/// Canonical dtype for any accepted spelling, case-insensitive.
pub fn canonical_dtype(dtype: &str) -> Option<&'static str> {
    let key = dtype.trim().to_ascii_lowercase();
    if let Some((canonical, _)) = NEXUS_TYPES.iter().find(|(c, _)| *c == key) {
        return Some(*canonical);
    }
    if let Some((_, canonical)) = DTYPE_ALIASES.iter().find(|(alias, _)| *alias == key) {
        return Some(*canonical);
    }
    NEXUS_TYPES
        .iter()
        .find(|(_, nx)| nx.eq_ignore_ascii_case(&key))
        .map(|(canonical, _)| *canonical)
}

/// NeXus type of `dtype`; unknown names are written as `NX_CHAR`.
pub fn nexus_type(dtype: &str) -> &'static str {
    let canonical = canonical_dtype(dtype).unwrap_or_else(|| {
        warn!(dtype, "unknown data type; writing the field as a string");
        STRING_DTYPE
    });
    NEXUS_TYPES
        .iter()
        .find(|(c, _)| *c == canonical)
        .map_or("NX_CHAR", |(_, nx)| *nx)
}
