use bson::{Bson, Document};
use std::fmt;

use super::types::MAX_PATH_DEPTH;
use crate::document::format_value;
use crate::errors::{DbError, ErrorCode};

// Positional writes past the end pad with nulls up to this many elements.
const MAX_ARRAY_BACKFILL: usize = 1_500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathError {
    Empty,
    EmptyElement,
    TooDeep,
}

impl PathError {
    /// Error reported when `path` appears as an update target.
    #[must_use]
    pub fn to_update_error(self, path: &str) -> DbError {
        match self {
            Self::Empty => DbError::command(ErrorCode::EmptyName, "An empty update path is not valid."),
            Self::EmptyElement => DbError::command(
                ErrorCode::EmptyName,
                format!("The update path '{path}' contains an empty field name, which is not allowed."),
            ),
            Self::TooDeep => DbError::bad_value(format!(
                "The update path '{path}' is nested deeper than {MAX_PATH_DEPTH} levels"
            )),
        }
    }

    /// Error reported when `path` appears as a filter key.
    #[must_use]
    pub fn to_filter_error(self, path: &str) -> DbError {
        match self {
            Self::Empty | Self::EmptyElement => {
                DbError::bad_value("FieldPath field names may not be empty strings.")
            }
            Self::TooDeep => DbError::bad_value(format!(
                "The path '{path}' is nested deeper than {MAX_PATH_DEPTH} levels"
            )),
        }
    }
}

/// A dotted field path such as `a.b.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    dotted: String,
    segments: Vec<String>,
}

impl Path {
    /// # Errors
    /// Fails on an empty path, an empty segment, or more than `MAX_PATH_DEPTH` segments.
    pub fn parse(s: &str) -> Result<Self, PathError> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        let segments: Vec<String> = s.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PathError::EmptyElement);
        }
        if segments.len() > MAX_PATH_DEPTH {
            return Err(PathError::TooDeep);
        }
        Ok(Self { dotted: s.to_string(), segments })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.dotted
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment.
    #[must_use]
    pub fn leaf(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    #[must_use]
    pub fn is_dotted(&self) -> bool {
        self.segments.len() > 1
    }

    /// True when `self` equals `other` or is a segment-wise prefix of it.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.segments.len() <= other.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }

    #[must_use]
    pub fn conflicts_with(&self, other: &Self) -> bool {
        self.is_prefix_of(other) || other.is_prefix_of(self)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted)
    }
}

fn parse_index(seg: &str) -> Option<usize> {
    if seg.is_empty() || !seg.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    seg.parse().ok()
}

/// Every value reachable at `path`, reaching through arrays.
///
/// `None` marks a document on the way that lacks the next key. An empty
/// result means nothing along the path exists at all.
#[must_use]
pub fn find_values<'a>(doc: &'a Document, path: &Path) -> Vec<Option<&'a Bson>> {
    let mut out = Vec::new();
    walk_document(doc, &path.segments, &mut out);
    out
}

fn walk_document<'a>(doc: &'a Document, segs: &[String], out: &mut Vec<Option<&'a Bson>>) {
    let Some((seg, rest)) = segs.split_first() else { return };
    match doc.get(seg) {
        Some(v) if rest.is_empty() => out.push(Some(v)),
        Some(v) => walk_value(v, rest, out),
        None => out.push(None),
    }
}

fn walk_value<'a>(v: &'a Bson, segs: &[String], out: &mut Vec<Option<&'a Bson>>) {
    match v {
        Bson::Document(d) => walk_document(d, segs, out),
        Bson::Array(arr) => walk_array(arr, segs, out),
        _ => out.push(None),
    }
}

fn walk_array<'a>(arr: &'a [Bson], segs: &[String], out: &mut Vec<Option<&'a Bson>>) {
    let Some((seg, rest)) = segs.split_first() else { return };
    if let Some(el) = parse_index(seg).and_then(|i| arr.get(i)) {
        if rest.is_empty() {
            out.push(Some(el));
        } else {
            walk_value(el, rest, out);
        }
        return;
    }
    let before = out.len();
    for el in arr {
        if let Bson::Document(d) = el {
            walk_document(d, segs, out);
        }
    }
    if out.len() == before {
        out.push(None);
    }
}

/// Strict lookup: arrays are only entered through numeric segments.
#[must_use]
pub fn get_path<'a>(doc: &'a Document, path: &Path) -> Option<&'a Bson> {
    let (first, rest) = path.segments.split_first()?;
    let mut cur = doc.get(first)?;
    for seg in rest {
        cur = match cur {
            Bson::Document(d) => d.get(seg)?,
            Bson::Array(a) => a.get(parse_index(seg)?)?,
            _ => return None,
        };
    }
    Some(cur)
}

pub fn get_path_mut<'a>(doc: &'a mut Document, path: &Path) -> Option<&'a mut Bson> {
    let (first, rest) = path.segments.split_first()?;
    let mut cur = doc.get_mut(first)?;
    for seg in rest {
        cur = match cur {
            Bson::Document(d) => d.get_mut(seg)?,
            Bson::Array(a) => a.get_mut(parse_index(seg)?)?,
            _ => return None,
        };
    }
    Some(cur)
}

#[must_use]
pub fn has_path(doc: &Document, path: &Path) -> bool {
    get_path(doc, path).is_some()
}

/// Writes `value` at `path`, creating intermediate documents.
///
/// # Errors
/// `PathNotViable` when an intermediate is a scalar, or an array meets a non-numeric segment.
pub fn set_path(doc: &mut Document, path: &Path, value: Bson) -> Result<(), DbError> {
    set_in_document(doc, &path.segments, value)
}

fn set_in_document(doc: &mut Document, segs: &[String], value: Bson) -> Result<(), DbError> {
    let Some((seg, rest)) = segs.split_first() else { return Ok(()) };
    if rest.is_empty() {
        doc.insert(seg.clone(), value);
        return Ok(());
    }
    if !doc.contains_key(seg) {
        doc.insert(seg.clone(), Bson::Document(Document::new()));
    }
    match doc.get_mut(seg) {
        Some(child) => set_in_value(child, seg, rest, value),
        None => Ok(()),
    }
}

fn set_in_value(cur: &mut Bson, name: &str, segs: &[String], value: Bson) -> Result<(), DbError> {
    let Some((seg, rest)) = segs.split_first() else { return Ok(()) };
    match cur {
        Bson::Document(d) => set_in_document(d, segs, value),
        Bson::Array(arr) => {
            let Some(idx) = parse_index(seg) else {
                return Err(not_viable(seg, name, &Bson::Array(arr.clone())));
            };
            if idx >= arr.len() {
                if idx > MAX_ARRAY_BACKFILL {
                    return Err(DbError::bad_value(format!(
                        "can't backfill array to larger than {MAX_ARRAY_BACKFILL} elements"
                    )));
                }
                arr.resize(idx, Bson::Null);
                if rest.is_empty() {
                    arr.push(value);
                    return Ok(());
                }
                arr.push(Bson::Document(Document::new()));
            }
            if rest.is_empty() {
                arr[idx] = value;
                Ok(())
            } else {
                set_in_value(&mut arr[idx], seg, rest, value)
            }
        }
        other => Err(not_viable(seg, name, other)),
    }
}

fn not_viable(seg: &str, parent: &str, v: &Bson) -> DbError {
    DbError::command(
        ErrorCode::PathNotViable,
        format!("Cannot create field '{seg}' in element {{{parent}: {}}}", format_value(v)),
    )
}

/// Removes the value at `path`. Array elements are nulled rather than removed.
pub fn remove_path(doc: &mut Document, path: &Path) -> Option<Bson> {
    let (leaf, parents) = path.segments.split_last()?;
    if parents.is_empty() {
        return doc.remove(leaf);
    }
    let parent_path = Path { dotted: parents.join("."), segments: parents.to_vec() };
    match get_path_mut(doc, &parent_path)? {
        Bson::Document(d) => d.remove(leaf),
        Bson::Array(arr) => {
            let slot = arr.get_mut(parse_index(leaf)?)?;
            Some(std::mem::replace(slot, Bson::Null))
        }
        _ => None,
    }
}

/// Checks that every existing intermediate along `path` can be traversed.
///
/// # Errors
/// `PathNotViable` naming the first segment that cannot be entered.
pub fn check_traversable(doc: &Document, path: &Path) -> Result<(), DbError> {
    let Some((first, rest)) = path.segments.split_first() else { return Ok(()) };
    let Some(mut cur) = doc.get(first) else { return Ok(()) };
    let mut parent = first.as_str();
    for seg in rest {
        let next = match cur {
            Bson::Document(d) => d.get(seg),
            Bson::Array(a) => match parse_index(seg) {
                Some(i) => a.get(i),
                None => return Ok(()),
            },
            other => {
                return Err(DbError::command(
                    ErrorCode::PathNotViable,
                    format!(
                        "Cannot use the part ({seg}) of ({path}) to traverse the element ({{{parent}: {}}})",
                        format_value(other)
                    ),
                ));
            }
        };
        let Some(next) = next else { return Ok(()) };
        cur = next;
        parent = seg.as_str();
    }
    Ok(())
}

// First intermediate step holding an array or scalar, with its segment index.
fn blocking_step<'a>(doc: &'a Document, path: &Path) -> Option<(usize, &'a Bson)> {
    let (_, parents) = path.segments.split_last()?;
    let mut cur = doc;
    for (i, seg) in parents.iter().enumerate() {
        match cur.get(seg)? {
            Bson::Document(d) => cur = d,
            other => return Some((i, other)),
        }
    }
    None
}

/// Checks that `path` is read through embedded documents only.
///
/// # Errors
/// `PathNotViable` when an existing intermediate is an array or a scalar.
pub fn check_document_source(doc: &Document, path: &Path) -> Result<(), DbError> {
    match blocking_step(doc, path) {
        Some(_) => Err(DbError::command(
            ErrorCode::PathNotViable,
            format!("cannot use path '{path}' to traverse the document"),
        )),
        None => Ok(()),
    }
}

/// Checks that `path` can be created through embedded documents only.
///
/// # Errors
/// `PathNotViable` naming the segment that would land in an array or a scalar.
pub fn check_document_target(doc: &Document, path: &Path) -> Result<(), DbError> {
    match blocking_step(doc, path) {
        Some((i, v)) => Err(not_viable(&path.segments[i + 1], &path.segments[i], v)),
        None => Ok(()),
    }
}
