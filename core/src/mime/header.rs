/*
 * header.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tagliacarte, a cross-platform email client.
 *
 * Tagliacarte is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tagliacarte is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tagliacarte.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Ordered header fields of one MIME entity.

use std::fmt;

/// One unfolded header field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: String,
    pub value: String,
}

impl HeaderField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    fn same_as(&self, other: &HeaderField) -> bool {
        self.name.eq_ignore_ascii_case(&other.name) && self.value == other.value
    }
}

/// Header fields in the order they appeared. Names keep their original case; lookup
/// ignores it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    fields: Vec<HeaderField>,
}

impl HeaderBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(HeaderField::new(name, value));
    }

    /// Parse a block of `Name: value` lines (CRLF or LF, folded lines allowed). Lines
    /// that are not header fields are skipped.
    pub fn parse(text: &str) -> Self {
        let mut block = Self::new();
        for line in text.lines() {
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some(last) = block.fields.last_mut() {
                    last.value.push_str(line);
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim_end();
                if !name.is_empty() && !name.contains(' ') {
                    block.push(name, value.trim());
                }
            }
        }
        for field in &mut block.fields {
            field.value = field.value.trim().to_string();
        }
        block
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.fields.iter()
    }

    /// First value of the named field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| f.value.as_str())
    }

    /// True if a field with the same name and identical value is present.
    pub fn contains(&self, field: &HeaderField) -> bool {
        self.fields.iter().any(|f| f.same_as(field))
    }

    /// Fields for which `keep` returns true, in order.
    pub fn filter(&self, keep: impl Fn(&HeaderField) -> bool) -> HeaderBlock {
        HeaderBlock {
            fields: self.fields.iter().filter(|f| keep(f)).cloned().collect(),
        }
    }
}

impl FromIterator<HeaderField> for HeaderBlock {
    fn from_iter<T: IntoIterator<Item = HeaderField>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// `Name: value` lines, each terminated by CRLF.
impl fmt::Display for HeaderBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in &self.fields {
            write!(f, "{}: {}\r\n", field.name, field.value)?;
        }
        Ok(())
    }
}
