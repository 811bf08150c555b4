//! Named dimension layouts, as in "NCHW" or "[N,C,?,W]" or "N...C".
use anyhow::{bail, ensure};
use std::fmt;
use std::str::FromStr;

/// Names attached to the axes of a tensor.
///
/// A layout may contain one ellipsis standing for any number of unnamed
/// axes. Names after the ellipsis are indexed from the end (negative
/// indices). An unnamed axis is written `?`.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Layout {
    left: Vec<Option<String>>,
    right: Option<Vec<Option<String>>>,
}

impl Layout {
    /// The fully dynamic layout, "...".
    pub fn dynamic() -> Layout {
        Layout { left: vec![], right: Some(vec![]) }
    }

    pub fn is_dynamic(&self) -> bool {
        self.right.is_some()
    }

    /// Rank, if there is no ellipsis.
    pub fn rank(&self) -> Option<usize> {
        if self.right.is_some() { None } else { Some(self.left.len()) }
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Axis of `name`. Axes after the ellipsis are negative, counted from
    /// the end.
    pub fn index_of(&self, name: &str) -> Option<isize> {
        let name = name.to_uppercase();
        if let Some(ix) = self.left.iter().position(|n| n.as_deref() == Some(&*name)) {
            return Some(ix as isize);
        }
        let right = self.right.as_ref()?;
        let ix = right.iter().position(|n| n.as_deref() == Some(&*name))?;
        Some(ix as isize - right.len() as isize)
    }

    pub fn batch_idx(&self) -> Option<isize> {
        self.index_of("N")
    }

    pub fn channels_idx(&self) -> Option<isize> {
        self.index_of("C")
    }

    pub fn depth_idx(&self) -> Option<isize> {
        self.index_of("D")
    }

    pub fn height_idx(&self) -> Option<isize> {
        self.index_of("H")
    }

    pub fn width_idx(&self) -> Option<isize> {
        self.index_of("W")
    }

    fn compact(&self) -> bool {
        self.left
            .iter()
            .chain(self.right.iter().flatten())
            .all(|n| n.as_ref().is_none_or(|n| n.len() == 1))
    }
}

fn parse_name(s: &str) -> anyhow::Result<Option<String>> {
    let s = s.trim();
    ensure!(!s.is_empty(), "Empty dimension name in layout");
    if s == "?" {
        return Ok(None);
    }
    ensure!(
        s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
        "Invalid dimension name {s:?} in layout"
    );
    Ok(Some(s.to_uppercase()))
}

impl FromStr for Layout {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Layout> {
        let s = s.trim();
        let tokens: Vec<String> = if let Some(inner) = s.strip_prefix('[') {
            let Some(inner) = inner.strip_suffix(']') else { bail!("Unterminated layout {s:?}") };
            if inner.trim().is_empty() {
                vec![]
            } else {
                inner.split(',').map(|t| t.trim().to_string()).collect()
            }
        } else {
            let mut tokens = vec![];
            let mut rest = s;
            while !rest.is_empty() {
                if let Some(r) = rest.strip_prefix("...") {
                    tokens.push("...".to_string());
                    rest = r;
                } else {
                    let c = rest.chars().next().unwrap_or_default();
                    tokens.push(c.to_string());
                    rest = &rest[c.len_utf8()..];
                }
            }
            tokens
        };
        let mut layout = Layout::default();
        for token in tokens {
            if token == "..." {
                ensure!(layout.right.is_none(), "Multiple ellipsis in layout {s:?}");
                layout.right = Some(vec![]);
            } else {
                let name = parse_name(&token)?;
                if let Some(n) = &name {
                    ensure!(
                        !layout.has_name(n),
                        "Dimension name {n} appears twice in layout {s:?}"
                    );
                }
                match &mut layout.right {
                    Some(right) => right.push(name),
                    None => layout.left.push(name),
                }
            }
        }
        Ok(layout)
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let name = |n: &Option<String>| n.clone().unwrap_or_else(|| "?".to_string());
        let mut tokens: Vec<String> = self.left.iter().map(name).collect();
        if let Some(right) = &self.right {
            tokens.push("...".to_string());
            tokens.extend(right.iter().map(name));
        }
        if self.compact() {
            write!(fmt, "{}", tokens.join(""))
        } else {
            write!(fmt, "[{}]", tokens.join(","))
        }
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{self}")
    }
}
