//! Resource address parsing.
//!
//! Plan addresses look like `aws_vpc.main`, `aws_subnet.private[1]`,
//! `module.net.aws_vpc.main` or `module.apps["web"].data.aws_ami.base`.
//! Cross-references inside attributes only ever name the `type.name`
//! part, so most lookups key on [`ResourceAddress::key`].

use serde::{Deserialize, Serialize};

/// A parsed resource address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceAddress {
    /// Module path prefix (e.g., `module.net` or `module.a.module.b`)
    pub module_path: Option<String>,
    /// True for `data.` addresses
    pub is_data: bool,
    /// Resource type (e.g., `aws_vpc`)
    pub resource_type: String,
    /// Resource name (e.g., `main`)
    pub name: String,
    /// Instance key without brackets (e.g., `0` or `"web"`)
    pub index: Option<String>,
}

impl ResourceAddress {
    /// Parse an address. Returns `None` when fewer than two segments remain
    /// after stripping module and data prefixes.
    #[must_use]
    pub fn parse(address: &str) -> Option<Self> {
        let segments = split_segments(address);
        let mut module_parts: Vec<&str> = Vec::new();
        let mut i = 0;

        while i + 1 < segments.len() && segments[i] == "module" {
            module_parts.push(segments[i + 1]);
            i += 2;
        }

        let is_data = segments.get(i) == Some(&"data");
        if is_data {
            i += 1;
        }

        let resource_type = (*segments.get(i)?).to_string();
        let raw_name = *segments.get(i + 1)?;
        let (name, index) = split_index(raw_name);
        if resource_type.is_empty() || name.is_empty() {
            return None;
        }

        let module_path = if module_parts.is_empty() {
            None
        } else {
            Some(
                module_parts
                    .iter()
                    .map(|m| format!("module.{m}"))
                    .collect::<Vec<_>>()
                    .join("."),
            )
        };

        Some(Self {
            module_path,
            is_data,
            resource_type,
            name: name.to_string(),
            index: index.map(ToString::to_string),
        })
    }

    /// The `type.name` key used by symbolic references.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }

    /// The `type.name[index]` key, or [`Self::key`] for single instances.
    #[must_use]
    pub fn instance_key(&self) -> String {
        match &self.index {
            Some(index) => format!("{}.{}[{index}]", self.resource_type, self.name),
            None => self.key(),
        }
    }
}

/// Split on `.` while ignoring dots inside `[...]` and quotes.
fn split_segments(address: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut start = 0;

    for (i, c) in address.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '[' if !in_quotes => depth += 1,
            ']' if !in_quotes => depth = depth.saturating_sub(1),
            '.' if depth == 0 && !in_quotes => {
                segments.push(&address[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&address[start..]);
    segments
}

/// `private[1]` -> (`private`, Some(`1`))
fn split_index(segment: &str) -> (&str, Option<&str>) {
    match segment.find('[') {
        Some(open) if segment.ends_with(']') => (&segment[..open], Some(&segment[open + 1..segment.len() - 1])),
        _ => (segment, None),
    }
}

/// Remove every `[...]` index from an attribute path
/// (`vpc_config[0].subnet_ids[1]` -> `vpc_config.subnet_ids`).
#[must_use]
pub fn strip_indices(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut depth = 0usize;
    for c in path.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_parse_simple() {
        let addr = ResourceAddress::parse("aws_vpc.main").unwrap();
        assert_eq!(addr.resource_type, "aws_vpc");
        assert_eq!(addr.name, "main");
        assert_eq!(addr.module_path, None);
        assert!(!addr.is_data);
        assert_eq!(addr.key(), "aws_vpc.main");
    }

    #[test]
    fn test_parse_module_and_index() {
        let addr = ResourceAddress::parse("module.net.module.inner.aws_subnet.private[1]").unwrap();
        assert_eq!(addr.module_path.as_deref(), Some("module.net.module.inner"));
        assert_eq!(addr.name, "private");
        assert_eq!(addr.index.as_deref(), Some("1"));
        assert_eq!(addr.instance_key(), "aws_subnet.private[1]");
    }

    #[test]
    fn test_parse_data_with_quoted_module_key() {
        let addr = ResourceAddress::parse("module.apps[\"web.v2\"].data.aws_ami.base").unwrap();
        assert!(addr.is_data);
        assert_eq!(addr.module_path.as_deref(), Some("module.apps[\"web.v2\"]"));
        assert_eq!(addr.key(), "aws_ami.base");
    }

    #[test]
    fn test_parse_rejects_single_segment() {
        assert!(ResourceAddress::parse("aws_vpc").is_none());
        assert!(ResourceAddress::parse("").is_none());
    }

    #[test_case("subnets[0]", "subnets")]
    #[test_case("vpc_config[0].subnet_ids[1]", "vpc_config.subnet_ids")]
    #[test_case("plain", "plain")]
    fn test_strip_indices(input: &str, expected: &str) {
        assert_eq!(strip_indices(input), expected);
    }
}
