//! HTML download index.
//!
//! The page and the per-language row are plain text templates with
//! `[PLACEHOLDER]` markers. Rows are rendered in package order and joined into
//! the page's `[LANGTABLE]` marker.

use chrono::{DateTime, Utc};
use log::debug;
use std::collections::BTreeMap;

use crate::completion::{CompletionMap, percent_of};
use crate::config::Parameters;
use crate::language::LanguageInfo;

/// Language code -> archive basename of the packages built in a run.
pub type BuiltPackages = BTreeMap<String, String>;

/// How complete a translation is, for visual signalling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// Below 75%
    Low,
    /// 75% up to 90%
    Medium,
    /// 90% and above
    High,
}

impl CompletionStatus {
    pub fn from_percent(percent: f64) -> Self {
        if percent < 75.0 {
            CompletionStatus::Low
        } else if percent < 90.0 {
            CompletionStatus::Medium
        } else {
            CompletionStatus::High
        }
    }

    /// Bootstrap contextual class used by the templates' progress bars.
    pub fn css_class(&self) -> &'static str {
        match self {
            CompletionStatus::Low => "danger",
            CompletionStatus::Medium => "warning",
            CompletionStatus::High => "success",
        }
    }
}

pub struct IndexRenderer<'a> {
    params: &'a Parameters,
    page_template: &'a str,
    row_template: &'a str,
}

impl<'a> IndexRenderer<'a> {
    pub fn new(params: &'a Parameters, page_template: &'a str, row_template: &'a str) -> Self {
        Self {
            params,
            page_template,
            row_template,
        }
    }

    pub fn render(
        &self,
        packages: &BuiltPackages,
        completion: &CompletionMap,
        now: DateTime<Utc>,
    ) -> String {
        let globals = self.global_replacements(now);

        let mut table = String::new();
        for (code, basename) in packages {
            let Some(row) = self.row_replacements(code, basename, completion) else {
                debug!("No display metadata for {}, leaving it out of the index", code);
                continue;
            };
            table.push_str(&replace_all(
                self.row_template,
                globals.iter().chain(row.iter()),
            ));
        }

        let lang_table = [("[LANGTABLE]", table)];
        replace_all(self.page_template, globals.iter().chain(lang_table.iter()))
    }

    fn global_replacements(&self, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
        let p = self.params;
        vec![
            ("[SOFTWARE]", p.software_name.clone()),
            ("[SOFTWARETYPE]", p.software_type.clone()),
            ("[PACKAGENAME]", p.package_name.clone()),
            ("[PACKAGENAMEURL]", p.package_name_url.clone()),
            ("[WEBLATEURL]", p.translation.url.clone()),
            ("[WEBLATEPROJECT]", p.translation.project.clone()),
            ("[AUTHORNAME]", p.author_name.clone()),
            ("[AUTHORURL]", p.author_url.clone()),
            ("[LICENSE]", p.license.clone()),
            ("[DATE]", now.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
            ("[YEAR]", now.format("%Y").to_string()),
        ]
    }

    fn row_replacements(
        &self,
        code: &str,
        basename: &str,
        completion: &CompletionMap,
    ) -> Option<Vec<(&'static str, String)>> {
        let info = LanguageInfo::resolve(code)?;
        let percent = percent_of(completion, code);

        Some(vec![
            ("[PACKAGEURL]", self.download_url(basename)),
            ("[LANGCOUNTRY]", info.country),
            ("[LANGNAME]", info.name),
            ("[LANGCODE]", info.code),
            ("[PERCENT]", format_percent(percent)),
            (
                "[BS_PROGRESSBAR_TYPE]",
                CompletionStatus::from_percent(percent).css_class().to_string(),
            ),
        ])
    }

    /// Public URL of an uploaded package.
    pub fn download_url(&self, basename: &str) -> String {
        let storage = &self.params.storage;
        format!(
            "https://{}/{}",
            storage.cdn_hostname.trim_matches('/'),
            crate::storage::object_key(&storage.path, &self.params.package_name_url, basename)
        )
    }
}

/// Whole percentages print without decimals, e.g. "92" or "92.5".
fn format_percent(percent: f64) -> String {
    format!("{}", percent)
}

fn replace_all<'r>(
    template: &str,
    replacements: impl Iterator<Item = &'r (&'static str, String)>,
) -> String {
    let mut out = template.to_string();
    for (placeholder, value) in replacements {
        out = out.replace(placeholder, value);
    }
    out
}
