//! NeXus group paths.
//!
//! A path is a `/`-delimited sequence of segments, each `name:type`, `name`
//! or `:type`. A bare name gets the type `NX<name>`; a bare `NX...` segment is
//! a type-only node named after the type without its prefix.

use daq_selector_core::DEFAULT_DYNAMIC_PATH;

/// One `name:type` segment of a NeXus path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    /// Group name.
    pub name: String,
    /// NeXus class, e.g. `NXentry`.
    pub nx_type: String,
}

impl PathSegment {
    /// `name:type`, the form used in link targets.
    pub fn qualified(&self) -> String {
        format!("{}:{}", self.name, self.nx_type)
    }

    fn parse(segment: &str) -> Option<Self> {
        let segment = segment.trim();
        if segment.is_empty() {
            return None;
        }
        let (name, nx_type) = match segment.rsplit_once(':') {
            Some((name, nx_type)) => (name.trim(), nx_type.trim()),
            None if segment.starts_with("NX") => ("", segment),
            None => (segment, ""),
        };
        match (name.is_empty(), nx_type.is_empty()) {
            (true, true) => None,
            (true, false) => Some(Self {
                name: nx_type.strip_prefix("NX").unwrap_or(nx_type).to_string(),
                nx_type: nx_type.to_string(),
            }),
            (false, true) => Some(Self {
                name: name.to_string(),
                nx_type: format!("NX{name}"),
            }),
            (false, false) => Some(Self {
                name: name.to_string(),
                nx_type: nx_type.to_string(),
            }),
        }
    }
}

/// Split `path` into group segments; the last one is the field's parent group.
pub fn parse_path(path: &str) -> Vec<PathSegment> {
    path.split('/').filter_map(PathSegment::parse).collect()
}

/// Segments of the first candidate path that yields any, else of the default layout.
pub fn resolve_path<'a>(candidates: impl IntoIterator<Item = &'a str>) -> Vec<PathSegment> {
    candidates
        .into_iter()
        .map(parse_path)
        .find(|segments| !segments.is_empty())
        .unwrap_or_else(|| parse_path(DEFAULT_DYNAMIC_PATH))
}
