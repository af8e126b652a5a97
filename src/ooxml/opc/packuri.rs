/// Utilities for working with package part names.
///
/// Parts are addressed by their ZIP member name, without the leading slash
/// the Open Packaging Conventions put on part URIs: `xl/workbook.xml`
/// rather than `/xl/workbook.xml`. The package itself is the empty name.

/// The package pseudo-partname, representing the package itself
pub const PACKAGE_PART: &str = "";

/// The member name of the [Content_Types].xml part
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Directory portion of a part name.
///
/// For example, "xl/worksheets" for "xl/worksheets/sheet1.xml", and the
/// empty string for a part at the package root.
pub fn base_dir(part: &str) -> &str {
    match part.rfind('/') {
        Some(pos) => &part[..pos],
        None => "",
    }
}

/// Filename portion of a part name.
pub fn filename(part: &str) -> &str {
    match part.rfind('/') {
        Some(pos) => &part[pos + 1..],
        None => part,
    }
}

/// Extension of a part name, without the leading period.
pub fn extension(part: &str) -> &str {
    let name = filename(part);
    match name.rfind('.') {
        Some(pos) => &name[pos + 1..],
        None => "",
    }
}

/// Numeric suffix of a tuple part name.
///
/// Returns 21 for "xl/worksheets/sheet21.xml" and None for "xl/workbook.xml".
pub fn index(part: &str) -> Option<u32> {
    let name = filename(part);
    let stem = match name.rfind('.') {
        Some(pos) => &name[..pos],
        None => name,
    };
    let digits = stem.len() - stem.bytes().rev().take_while(u8::is_ascii_digit).count();
    if digits == 0 || digits == stem.len() {
        return None;
    }
    stem[digits..].parse().ok()
}

/// Member name of the relationships part belonging to `part`.
///
/// "xl/_rels/workbook.xml.rels" for "xl/workbook.xml", and "_rels/.rels"
/// for the package itself.
pub fn rels_part(part: &str) -> String {
    let dir = base_dir(part);
    let name = filename(part);
    if dir.is_empty() {
        format!("_rels/{}.rels", name)
    } else {
        format!("{}/_rels/{}.rels", dir, name)
    }
}

/// Resolve a relationship target against the directory of its source part.
///
/// Absolute targets ("/xl/styles.xml") are taken from the package root.
pub fn resolve_target(base_dir: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None if base_dir.is_empty() => target.to_string(),
        None => format!("{}/{}", base_dir, target),
    };
    normalize(&joined)
}

/// Relative reference from `base_dir` to `part`.
///
/// For example, "../tables/table1.xml" from "xl/worksheets" to
/// "xl/tables/table1.xml".
pub fn relative_target(base_dir: &str, part: &str) -> String {
    if base_dir.is_empty() {
        return part.to_string();
    }

    let from: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    let to: Vec<&str> = part.split('/').filter(|s| !s.is_empty()).collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = "../".repeat(from.len() - common);
    result.push_str(&to[common..].join("/"));
    result
}

/// Resolve "." and ".." segments and collapse duplicate separators.
fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {},
            ".." => {
                parts.pop();
            },
            _ => parts.push(part),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_dir_and_filename() {
        assert_eq!(base_dir("xl/worksheets/sheet1.xml"), "xl/worksheets");
        assert_eq!(base_dir("[Content_Types].xml"), "");
        assert_eq!(filename("xl/worksheets/sheet1.xml"), "sheet1.xml");
        assert_eq!(extension("xl/workbook.xml"), "xml");
    }

    #[test]
    fn test_index() {
        assert_eq!(index("xl/worksheets/sheet21.xml"), Some(21));
        assert_eq!(index("xl/workbook.xml"), None);
        assert_eq!(index("xl/tables/7.xml"), None);
    }

    #[test]
    fn test_rels_part() {
        assert_eq!(rels_part("xl/workbook.xml"), "xl/_rels/workbook.xml.rels");
        assert_eq!(rels_part(PACKAGE_PART), "_rels/.rels");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(
            resolve_target("xl", "worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(
            resolve_target("xl/worksheets", "../tables/table1.xml"),
            "xl/tables/table1.xml"
        );
        assert_eq!(resolve_target("xl", "/xl/styles.xml"), "xl/styles.xml");
        assert_eq!(resolve_target("", "xl/workbook.xml"), "xl/workbook.xml");
    }

    #[test]
    fn test_relative_target() {
        assert_eq!(
            relative_target("xl/worksheets", "xl/tables/table1.xml"),
            "../tables/table1.xml"
        );
        assert_eq!(
            relative_target("xl", "xl/worksheets/sheet2.xml"),
            "worksheets/sheet2.xml"
        );
    }
}
