//! Installation manifest embedded in every language package.

use chrono::{DateTime, Datelike, Utc};
use std::fmt::Write;

/// A folder of the archive and where the installer copies it to.
#[derive(Debug, Clone, PartialEq)]
pub struct FileGroup {
    pub folder: String,
    pub target: String,
    pub filenames: Vec<String>,
}

/// Extension descriptor of a language package.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub name: String,
    pub author: String,
    pub author_url: String,
    pub copyright: String,
    pub license: String,
    pub version: String,
    pub creation_date: String,
    pub description: String,
    pub groups: Vec<FileGroup>,
}

impl Manifest {
    /// Copyright notice for the year of `now`.
    pub fn copyright_for(author_name: &str, now: DateTime<Utc>) -> String {
        format!(
            "Copyright (C) 2010-{} {}. All rights reserved.",
            now.year(),
            author_name
        )
    }

    /// Creation date in the installer's format, e.g. "05 Mar 2024".
    pub fn creation_date_for(now: DateTime<Utc>) -> String {
        now.format("%d %b %Y").to_string()
    }

    /// Adds a group unless it has no files.
    pub fn push_group(&mut self, folder: &str, target: &str, filenames: Vec<String>) {
        if filenames.is_empty() {
            return;
        }
        self.groups.push(FileGroup {
            folder: folder.to_string(),
            target: target.to_string(),
            filenames,
        });
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        xml.push_str("<extension type=\"file\" version=\"1.6\" method=\"upgrade\" client=\"site\">\n");

        for (tag, value) in [
            ("name", &self.name),
            ("author", &self.author),
            ("authorurl", &self.author_url),
            ("copyright", &self.copyright),
            ("license", &self.license),
            ("version", &self.version),
            ("creationDate", &self.creation_date),
            ("description", &self.description),
        ] {
            let _ = writeln!(xml, "    <{tag}>{}</{tag}>", escape(value));
        }

        xml.push_str("    <fileset>\n");
        for group in &self.groups {
            let _ = writeln!(
                xml,
                "        <files folder=\"{}\" target=\"{}\">",
                escape(&group.folder),
                escape(&group.target)
            );
            for filename in &group.filenames {
                let _ = writeln!(xml, "            <filename>{}</filename>", escape(filename));
            }
            xml.push_str("        </files>\n");
        }
        xml.push_str("    </fileset>\n");
        xml.push_str("</extension>\n");

        xml
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
